/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
The byte-stream contract the connection driver runs over, plus an implementation on top of
`std::net::TcpStream`.

TLS and websocket framing are left to other implementations of [`Transport`].
 */

use crate::error::{MqttError, MqttResult};

use log::*;
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

const READ_BUFFER_SIZE : usize = 4096;

/// An ordered, reliable byte stream between the client and an MQTT server.
pub trait Transport {

    /// Writes as much of `bytes` as possible.  Anything that cannot be written immediately is
    /// buffered and written by a later `send_remaining` call.
    fn send(&mut self, bytes: &[u8]) -> MqttResult<()>;

    /// Attempts to write any bytes buffered by earlier `send` calls.
    fn send_remaining(&mut self) -> MqttResult<()>;

    /// Waits a bounded amount of time for inbound data.  Returns `Ok(None)` if nothing arrived and
    /// fails with an end-of-stream error once the peer has closed the connection.
    fn read(&mut self) -> MqttResult<Option<Vec<u8>>>;

    /// Closes the stream.  Calling close more than once has no further effect.
    fn close(&mut self);
}

/// A [`Transport`] over a plain TCP connection
pub struct TcpTransport {
    stream: TcpStream,

    unsent: Vec<u8>,

    closed: bool,
}

impl TcpTransport {

    /// Connects to `address`.  Reads and writes each wait at most `io_timeout` before giving
    /// control back to the caller.
    pub fn connect<A: ToSocketAddrs>(address: A, io_timeout: Duration) -> MqttResult<TcpTransport> {
        let stream = TcpStream::connect(address)?;
        TcpTransport::from_stream(stream, io_timeout)
    }

    /// Wraps an already-connected stream
    pub fn from_stream(stream: TcpStream, io_timeout: Duration) -> MqttResult<TcpTransport> {
        if io_timeout.is_zero() {
            error!("TcpTransport::from_stream - io timeout must be non-zero");
            return Err(MqttError::new_invalid_argument("io timeout must be non-zero"));
        }

        stream.set_read_timeout(Some(io_timeout))?;
        // a stalled peer leaves the rest in `unsent` for send_remaining
        stream.set_write_timeout(Some(io_timeout))?;
        stream.set_nodelay(true)?;

        Ok(TcpTransport {
            stream,
            unsent: Vec::new(),
            closed: false,
        })
    }

    fn check_open(&self) -> MqttResult<()> {
        if self.closed {
            error!("TcpTransport - operation attempted on a closed transport");
            return Err(MqttError::new_connection_closed("transport is closed"));
        }

        Ok(())
    }

    fn flush_unsent(&mut self) -> MqttResult<()> {
        let mut written = 0;
        while written < self.unsent.len() {
            match self.stream.write(&self.unsent[written..]) {
                Ok(0) => {
                    error!("TcpTransport::flush_unsent - socket accepted no bytes");
                    return Err(MqttError::new_connection_closed("socket closed while writing"));
                }
                Ok(bytes_written) => {
                    written += bytes_written;
                }
                Err(error) => {
                    match error.kind() {
                        ErrorKind::WouldBlock | ErrorKind::TimedOut => { break; }
                        ErrorKind::Interrupted => {}
                        _ => {
                            error!("TcpTransport::flush_unsent - write failed: {}", error);
                            return Err(MqttError::new_std_io_error(error));
                        }
                    }
                }
            }
        }

        self.unsent.drain(..written);
        if !self.unsent.is_empty() {
            debug!("TcpTransport::flush_unsent - {} bytes left unsent", self.unsent.len());
        }

        Ok(())
    }
}

impl Transport for TcpTransport {
    fn send(&mut self, bytes: &[u8]) -> MqttResult<()> {
        self.check_open()?;
        self.unsent.extend_from_slice(bytes);
        self.flush_unsent()
    }

    fn send_remaining(&mut self) -> MqttResult<()> {
        self.check_open()?;
        self.flush_unsent()
    }

    fn read(&mut self) -> MqttResult<Option<Vec<u8>>> {
        self.check_open()?;

        let mut buffer = [0u8; READ_BUFFER_SIZE];
        match self.stream.read(&mut buffer) {
            Ok(0) => {
                info!("TcpTransport::read - peer closed the connection");
                Err(MqttError::new_end_of_stream())
            }
            Ok(bytes_read) => {
                Ok(Some(buffer[..bytes_read].to_vec()))
            }
            Err(error) => {
                match error.kind() {
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted => { Ok(None) }
                    _ => {
                        error!("TcpTransport::read - read failed: {}", error);
                        Err(MqttError::new_std_io_error(error))
                    }
                }
            }
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }

        self.closed = true;
        self.unsent.clear();
        if let Err(error) = self.stream.shutdown(Shutdown::Both) {
            debug!("TcpTransport::close - shutdown failed: {}", error);
        }
    }
}
