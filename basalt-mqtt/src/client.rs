/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
The polling connection driver that moves bytes between a [`Transport`] and the session engine.

A client is driven by repeated calls to [`MqttClient::step`] (or [`MqttClient::run`]).  Each step
flushes buffered output, performs one bounded read, decodes and applies every complete packet, and
then runs the engine's time-based checks.  Application callbacks are invoked synchronously from
within the step through a [`ClientListener`].
 */

use crate::alias::OutboundAliasResolverFactory;
use crate::config::*;
use crate::decode::FrameAssembler;
use crate::error::{MqttError, MqttResult};
use crate::mqtt::*;
use crate::protocol::*;
use crate::transport::Transport;

use log::*;
use std::collections::VecDeque;
use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Application callbacks invoked by an [`MqttClient`] while it is being driven.
///
/// Every method has an empty default.  Callbacks run on the driving thread and must not block.
pub trait ClientListener {

    /// Invoked when the server accepts the connection
    fn on_connected(&mut self, _connack: &ConnackPacket) {}

    /// Invoked when a connection ends for any reason.  `disconnect` is the server's Disconnect
    /// packet if the server ended the connection with one.
    fn on_disconnected(&mut self, _disconnect: Option<&DisconnectPacket>) {}

    /// Invoked for every publish delivered by the server.  A QoS 2 publish is delivered once even
    /// if the server retransmits it.
    fn on_publish_received(&mut self, _publish: &PublishPacket) {}

    /// Invoked with the server's response to a subscribe
    fn on_suback(&mut self, _suback: &SubackPacket) {}

    /// Invoked with the server's response to an unsubscribe
    fn on_unsuback(&mut self, _unsuback: &UnsubackPacket) {}

    /// Invoked when the server continues an enhanced authentication exchange.  Returning data
    /// sends it back to the server in a new Auth packet; returning `None` sends nothing.
    fn on_authentication_challenge(&mut self, _auth: &AuthPacket) -> Option<Vec<u8>> { None }
}

/// Connection flags shared between a driving thread and its owner.
#[derive(Debug, Default)]
pub struct ConnectionStatus {
    running: AtomicBool,

    connack_received: AtomicBool,
}

impl ConnectionStatus {

    /// Returns true while the connection is being driven
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Returns true once the server has accepted the current connection
    pub fn is_connack_received(&self) -> bool {
        self.connack_received.load(Ordering::Acquire)
    }

    /// Requests that the client shut down.  The connection is closed at the start of the next
    /// `step`.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    fn reset_for_new_connection(&self) {
        self.connack_received.store(false, Ordering::Release);
        self.running.store(true, Ordering::Release);
    }
}

/// An MQTT client bound to a single transport connection.
///
/// Construction validates the options and sends the Connect packet immediately.  Nothing happens
/// after that unless the client is stepped.
pub struct MqttClient<T: Transport, L: ClientListener> {
    transport: T,

    listener: L,

    protocol_state: ProtocolState,

    maximum_incoming_packet_size: usize,

    assembler: FrameAssembler,

    status: Arc<ConnectionStatus>,

    outbound_data: Vec<u8>,

    packet_events: VecDeque<PacketEvent>,

    last_disconnect: Option<DisconnectPacket>,

    closed: bool,
}

impl<T: Transport, L: ClientListener> MqttClient<T, L> {

    /// Validates the options, then starts a connection over `transport` by sending a Connect
    /// packet.  Invalid options fail before any bytes are written.
    pub fn new(transport: T, listener: L, client_options: MqttClientOptions, connect_options: ConnectOptions) -> MqttResult<MqttClient<T, L>> {
        connect_options.validate()?;

        let outbound_alias_resolver = match &client_options.outbound_alias_resolver_factory {
            Some(factory) => { factory() }
            None => { (OutboundAliasResolverFactory::new_manual_factory())() }
        };

        let maximum_incoming_packet_size = connect_options.maximum_incoming_packet_size();
        let protocol_version = client_options.protocol_version;
        let state_config = ProtocolStateConfig {
            connect_options,
            protocol_version,
            connack_timeout: client_options.connack_timeout,
            base_timestamp: Instant::now(),
            outbound_alias_resolver,
        };

        let mut client = MqttClient {
            transport,
            listener,
            protocol_state: ProtocolState::new(state_config),
            maximum_incoming_packet_size,
            assembler: FrameAssembler::new(protocol_version, maximum_incoming_packet_size),
            status: Arc::new(ConnectionStatus::default()),
            outbound_data: Vec::new(),
            packet_events: VecDeque::new(),
            last_disconnect: None,
            closed: false,
        };

        client.begin_connection()?;

        Ok(client)
    }

    /// Returns the shared connection flags, usable from other threads
    pub fn status(&self) -> Arc<ConnectionStatus> {
        self.status.clone()
    }

    /// Returns the settings negotiated with the server, once connected
    pub fn negotiated_settings(&self) -> Option<&NegotiatedSettings> {
        self.protocol_state.negotiated_settings()
    }

    /// Returns the number of QoS 1 and QoS 2 publishes still awaiting acknowledgement.  New
    /// publishes fail with a quota error while this equals the server's receive maximum.
    pub fn pending_acknowledgement_count(&self) -> usize {
        self.protocol_state.pending_acknowledgement_count()
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    pub fn listener_mut(&mut self) -> &mut L {
        &mut self.listener
    }

    /// Performs one round of I/O and protocol processing.
    ///
    /// Any fatal error closes the connection, notifies the listener, and is returned.  A stop
    /// request made through [`ConnectionStatus::stop`] closes the connection and returns `Ok`.
    pub fn step(&mut self) -> MqttResult<()> {
        if self.closed {
            error!("MqttClient::step - connection is closed");
            return Err(MqttError::new_not_ready("connection is closed"));
        }

        if !self.status.is_running() {
            info!("MqttClient::step - stop requested, closing connection");
            self.close_connection();
            return Ok(());
        }

        match self.step_internal() {
            Ok(()) => { Ok(()) }
            Err(error) => { Err(self.fail(error)) }
        }
    }

    /// Steps the client until it stops or fails
    pub fn run(&mut self) -> MqttResult<()> {
        while !self.closed {
            self.step()?;
        }

        Ok(())
    }

    /// Submits a publish.  Returns the packet id assigned to a QoS 1 or QoS 2 publish.
    pub fn publish(&mut self, packet: PublishPacket) -> MqttResult<Option<u16>> {
        self.check_open("publish")?;

        let mut context = ServiceContext {
            current_time: Instant::now(),
            to_socket: &mut self.outbound_data,
        };

        let result = self.protocol_state.publish(packet, &mut context);
        self.complete_operation(result)
    }

    /// Submits a subscribe.  The server's answer arrives through [`ClientListener::on_suback`].
    pub fn subscribe(&mut self, packet: SubscribePacket) -> MqttResult<u16> {
        self.check_open("subscribe")?;

        let mut context = ServiceContext {
            current_time: Instant::now(),
            to_socket: &mut self.outbound_data,
        };

        let result = self.protocol_state.subscribe(packet, &mut context);
        self.complete_operation(result)
    }

    /// Submits an unsubscribe.  The server's answer arrives through [`ClientListener::on_unsuback`].
    pub fn unsubscribe(&mut self, packet: UnsubscribePacket) -> MqttResult<u16> {
        self.check_open("unsubscribe")?;

        let mut context = ServiceContext {
            current_time: Instant::now(),
            to_socket: &mut self.outbound_data,
        };

        let result = self.protocol_state.unsubscribe(packet, &mut context);
        self.complete_operation(result)
    }

    /// Starts an MQTT5 re-authentication using the authentication method from the connect options
    pub fn reauthenticate(&mut self, authentication_data: Vec<u8>) -> MqttResult<()> {
        self.check_open("reauthenticate")?;

        let mut context = ServiceContext {
            current_time: Instant::now(),
            to_socket: &mut self.outbound_data,
        };

        let result = self.protocol_state.reauthenticate(authentication_data, &mut context);
        self.complete_operation(result)
    }

    /// Sends a Disconnect packet and closes the connection
    pub fn disconnect(&mut self, packet: DisconnectPacket) -> MqttResult<()> {
        self.check_open("disconnect")?;

        let mut context = ServiceContext {
            current_time: Instant::now(),
            to_socket: &mut self.outbound_data,
        };

        self.protocol_state.disconnect(packet, &mut context)?;

        if let Err(error) = self.flush_outbound_data() {
            warn!("MqttClient::disconnect - failed to send DISCONNECT: {}", error);
        }

        self.close_connection();

        Ok(())
    }

    /// Starts a new connection over `transport` after the previous one has closed.  Session
    /// state is kept; whether it is resumed depends on the clean start setting and the server.
    pub fn reconnect(&mut self, transport: T) -> MqttResult<()> {
        if !self.closed {
            error!("MqttClient::reconnect - current connection is still open");
            return Err(MqttError::new_not_ready("reconnect requires a closed connection"));
        }

        info!("MqttClient::reconnect - starting a new connection");

        self.transport = transport;
        self.assembler = FrameAssembler::new(self.protocol_state.protocol_version(), self.maximum_incoming_packet_size);
        self.outbound_data.clear();
        self.packet_events.clear();
        self.last_disconnect = None;
        self.closed = false;

        self.begin_connection()
    }

    fn begin_connection(&mut self) -> MqttResult<()> {
        self.status.reset_for_new_connection();

        let mut context = ServiceContext {
            current_time: Instant::now(),
            to_socket: &mut self.outbound_data,
        };

        if let Err(error) = self.protocol_state.start_connection(&mut context) {
            return Err(self.fail(error));
        }

        if let Err(error) = self.flush_outbound_data() {
            return Err(self.fail(error));
        }

        Ok(())
    }

    fn check_open(&self, operation: &str) -> MqttResult<()> {
        if self.closed {
            error!("MqttClient::{} - connection is closed", operation);
            return Err(MqttError::new_not_ready(format!("{} requires an open connection", operation)));
        }

        Ok(())
    }

    fn complete_operation<R>(&mut self, result: MqttResult<R>) -> MqttResult<R> {
        match result {
            Ok(value) => {
                if let Err(error) = self.flush_outbound_data() {
                    return Err(self.fail(error));
                }

                Ok(value)
            }
            Err(error) => {
                if error.is_fatal() {
                    Err(self.fail(error))
                } else {
                    Err(error)
                }
            }
        }
    }

    fn step_internal(&mut self) -> MqttResult<()> {
        self.transport.send_remaining()?;

        if let Some(bytes) = self.transport.read()? {
            self.handle_incoming_bytes(&bytes)?;
        }

        let mut context = ServiceContext {
            current_time: Instant::now(),
            to_socket: &mut self.outbound_data,
        };

        self.protocol_state.service(&mut context)?;
        self.flush_outbound_data()
    }

    fn handle_incoming_bytes(&mut self, bytes: &[u8]) -> MqttResult<()> {
        debug!("MqttClient::handle_incoming_bytes - {} bytes", bytes.len());

        let decoded_packets : Vec<MqttResult<MqttPacket>> = self.assembler.feed(bytes).collect();
        for decoded_packet in decoded_packets {
            let packet = decoded_packet?;

            let mut context = NetworkEventContext {
                current_time: Instant::now(),
                to_socket: &mut self.outbound_data,
                packet_events: &mut self.packet_events,
            };

            let result = self.protocol_state.handle_packet(packet, &mut context);

            // events raised before a failure still reach the listener
            self.dispatch_packet_events()?;
            result?;

            self.flush_outbound_data()?;
        }

        Ok(())
    }

    fn dispatch_packet_events(&mut self) -> MqttResult<()> {
        while let Some(event) = self.packet_events.pop_front() {
            match event {
                PacketEvent::Connack(connack) => {
                    debug!("dispatch_packet_events - connack packet");
                    self.status.connack_received.store(true, Ordering::Release);
                    self.listener.on_connected(&connack);
                }
                PacketEvent::Publish(publish) => {
                    debug!("dispatch_packet_events - publish packet");
                    self.listener.on_publish_received(&publish);
                }
                PacketEvent::Suback(suback) => {
                    debug!("dispatch_packet_events - suback packet");
                    self.listener.on_suback(&suback);
                }
                PacketEvent::Unsuback(unsuback) => {
                    debug!("dispatch_packet_events - unsuback packet");
                    self.listener.on_unsuback(&unsuback);
                }
                PacketEvent::Disconnect(disconnect) => {
                    debug!("dispatch_packet_events - server-side disconnect packet");
                    self.last_disconnect = Some(disconnect);
                }
                PacketEvent::AuthenticationChallenge(auth) => {
                    debug!("dispatch_packet_events - authentication challenge");
                    match self.listener.on_authentication_challenge(&auth) {
                        Some(authentication_data) => {
                            let mut context = ServiceContext {
                                current_time: Instant::now(),
                                to_socket: &mut self.outbound_data,
                            };

                            self.protocol_state.continue_authentication(authentication_data, &mut context)?;
                        }
                        None => {
                            warn!("dispatch_packet_events - listener supplied no answer to an authentication challenge");
                        }
                    }
                }
            }
        }

        Ok(())
    }

    fn flush_outbound_data(&mut self) -> MqttResult<()> {
        if self.outbound_data.is_empty() {
            return Ok(());
        }

        let bytes = mem::take(&mut self.outbound_data);
        self.transport.send(&bytes)
    }

    // Tears down the connection after a fatal error and hands the error back for propagation.
    fn fail(&mut self, error: MqttError) -> MqttError {
        error!("MqttClient - connection failed: {}", error);

        if let Some(reason_code) = error.disconnect_reason_code() {
            self.send_best_effort_disconnect(reason_code);
        }

        self.close_connection();

        error
    }

    fn send_best_effort_disconnect(&mut self, reason_code: ReasonCode) {
        // an MQTT311 Disconnect means a normal disconnect and would discard the will
        if self.protocol_state.protocol_version() != ProtocolVersion::Mqtt5 || self.protocol_state.state() == ProtocolStateType::Disconnected {
            return;
        }

        let disconnect = DisconnectPacket {
            reason_code,
            ..Default::default()
        };

        let mut bytes = Vec::new();
        let mut context = ServiceContext {
            current_time: Instant::now(),
            to_socket: &mut bytes,
        };

        if let Err(error) = self.protocol_state.disconnect(disconnect, &mut context) {
            debug!("MqttClient - could not build DISCONNECT with reason {}: {}", reason_code, error);
            return;
        }

        if let Err(error) = self.transport.send(&bytes) {
            debug!("MqttClient - could not send DISCONNECT with reason {}: {}", reason_code, error);
        }
    }

    fn close_connection(&mut self) {
        if self.closed {
            return;
        }

        self.transport.close();
        self.protocol_state.handle_connection_closed();
        self.outbound_data.clear();
        self.closed = true;
        self.status.running.store(false, Ordering::Release);
        self.status.connack_received.store(false, Ordering::Release);

        let last_disconnect = self.last_disconnect.take();
        self.listener.on_disconnected(last_disconnect.as_ref());
    }
}
