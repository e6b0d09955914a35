/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
A module containing the core crate error enumeration, context structures, and conversion
definitions.
 */

use crate::mqtt::{DisconnectPacket, ReasonCode};
use crate::mqtt::utils::DISCONNECT_REASON_CODES;

use std::error::Error;
use std::fmt;

/// Additional details about a MalformedPacket error variant
#[derive(Debug)]
pub struct MalformedPacketContext {
    source: Box<dyn Error + Send + Sync + 'static>
}

/// Additional details about a ProtocolError error variant
#[derive(Debug)]
pub struct ProtocolErrorContext {
    source: Box<dyn Error + Send + Sync + 'static>
}

/// Additional details about a PacketTooLarge error variant
#[derive(Debug)]
pub struct PacketTooLargeContext {

    /// size, in bytes, of the offending packet
    pub packet_size: usize,

    /// the limit the packet size was checked against
    pub maximum_packet_size: usize,
}

/// Additional details about a PacketIdentifierNotFound error variant
#[derive(Debug)]
pub struct PacketIdentifierNotFoundContext {

    /// the packet id that had no matching session entry
    pub packet_id: u16,
}

/// Additional details about a PacketIdentifierInUse error variant
#[derive(Debug)]
pub struct PacketIdentifierInUseContext {

    /// the packet id that was already bound to a session entry
    pub packet_id: u16,
}

/// Additional details about a KeepAliveTimeout error variant
#[derive(Debug)]
pub struct KeepAliveTimeoutContext {
}

/// Additional details about a ConnackTimeout error variant
#[derive(Debug)]
pub struct ConnackTimeoutContext {
}

/// Additional details about a NotReady error variant
#[derive(Debug)]
pub struct NotReadyContext {
    source: Box<dyn Error + Send + Sync + 'static>
}

/// Additional details about a QuotaExceeded error variant
#[derive(Debug)]
pub struct QuotaExceededContext {

    /// the server's receive maximum at the time of the rejected publish
    pub receive_maximum: u16,
}

/// Additional details about a NotSupported error variant
#[derive(Debug)]
pub struct NotSupportedContext {
    source: Box<dyn Error + Send + Sync + 'static>
}

/// Additional details about a ReceiveMaximumExceeded error variant
#[derive(Debug)]
pub struct ReceiveMaximumExceededContext {
}

/// Additional details about an InvalidArgument error variant
#[derive(Debug)]
pub struct InvalidArgumentContext {
    source: Box<dyn Error + Send + Sync + 'static>
}

/// Additional details about an InternalStateError error variant
#[derive(Debug)]
pub struct InternalStateErrorContext {
    source: Box<dyn Error + Send + Sync + 'static>
}

/// Additional details about a ConnectionRejected error variant
#[derive(Debug)]
pub struct ConnectionRejectedContext {

    /// reason code of the rejecting Connack
    pub reason_code: ReasonCode,
}

/// Additional details about a SubscriptionRejected error variant
#[derive(Debug)]
pub struct SubscriptionRejectedContext {

    /// first failing reason code found in the Suback
    pub reason_code: ReasonCode,
}

/// Additional details about a ServerDisconnect error variant
#[derive(Debug)]
pub struct ServerDisconnectContext {

    /// the Disconnect packet sent by the server
    pub disconnect: DisconnectPacket,
}

/// Additional details about a ConnectionClosed error variant
#[derive(Debug)]
pub struct ConnectionClosedContext {
    source: Box<dyn Error + Send + Sync + 'static>
}

/// Additional details about an EndOfStream error variant
#[derive(Debug)]
pub struct EndOfStreamContext {
}

/// Additional details about a StdIoError error variant
#[derive(Debug)]
pub struct StdIoErrorContext {
    source: Box<dyn Error + Send + Sync + 'static>
}

/// Basic error type for the entire basalt-mqtt crate.
#[derive(Debug)]
#[non_exhaustive]
pub enum MqttError {

    /// Structurally invalid bytes were found while decoding an MQTT packet.  Examples include
    /// a truncated field, an over-long variable length integer, invalid utf-8, and mismatches
    /// between length fields and the actual packet length.
    MalformedPacket(MalformedPacketContext),

    /// A well-formed packet or peer behavior violates the MQTT specification in a way that cannot
    /// be safely ignored or recovered from.
    ProtocolError(ProtocolErrorContext),

    /// A packet exceeds the negotiated maximum packet size, either inbound or outbound.
    PacketTooLarge(PacketTooLargeContext),

    /// An acknowledgement referenced a packet id with no matching session entry.
    PacketIdentifierNotFound(PacketIdentifierNotFoundContext),

    /// A packet id was reused while its previous session entry was still outstanding.
    PacketIdentifierInUse(PacketIdentifierInUseContext),

    /// No traffic from the peer reset the keep alive timer within the keep alive interval.
    KeepAliveTimeout(KeepAliveTimeoutContext),

    /// The server did not respond to the Connect packet in time.
    ConnackTimeout(ConnackTimeoutContext),

    /// The operation cannot be performed in the connection's current state.  The connection
    /// remains usable.
    NotReady(NotReadyContext),

    /// The server's receive maximum has been reached; wait for an acknowledgement and retry.
    QuotaExceeded(QuotaExceededContext),

    /// The operation requested a capability the server does not offer (QoS level, retain,
    /// wildcard or shared subscriptions, subscription identifiers).
    NotSupported(NotSupportedContext),

    /// The server sent more unreleased QoS 2 publishes than the client's receive maximum.
    ReceiveMaximumExceeded(ReceiveMaximumExceededContext),

    /// Invalid caller input, either in configuration or in a submitted packet.
    InvalidArgument(InvalidArgumentContext),

    /// Something happened that should never happen.  Always indicates a bug.
    InternalStateError(InternalStateErrorContext),

    /// The server answered the Connect packet with a failing Connack.
    ConnectionRejected(ConnectionRejectedContext),

    /// The server refused one or more subscriptions in a Subscribe request.
    SubscriptionRejected(SubscriptionRejectedContext),

    /// The server ended the connection with a Disconnect packet.
    ServerDisconnect(ServerDisconnectContext),

    /// The transport was already closed when an operation tried to use it.
    ConnectionClosed(ConnectionClosedContext),

    /// The peer closed the byte stream in an orderly fashion.
    EndOfStream(EndOfStreamContext),

    /// Generic error wrapping std::io::Error
    StdIoError(StdIoErrorContext),
}

impl MqttError {

    pub(crate) fn new_malformed_packet(source: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        MqttError::MalformedPacket(
            MalformedPacketContext {
                source : source.into()
            }
        )
    }

    pub(crate) fn new_protocol_error(source: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        MqttError::ProtocolError(
            ProtocolErrorContext {
                source : source.into()
            }
        )
    }

    pub(crate) fn new_packet_too_large(packet_size: usize, maximum_packet_size: usize) -> Self {
        MqttError::PacketTooLarge(
            PacketTooLargeContext {
                packet_size,
                maximum_packet_size,
            }
        )
    }

    pub(crate) fn new_packet_identifier_not_found(packet_id: u16) -> Self {
        MqttError::PacketIdentifierNotFound(
            PacketIdentifierNotFoundContext {
                packet_id
            }
        )
    }

    pub(crate) fn new_packet_identifier_in_use(packet_id: u16) -> Self {
        MqttError::PacketIdentifierInUse(
            PacketIdentifierInUseContext {
                packet_id
            }
        )
    }

    pub(crate) fn new_keep_alive_timeout() -> Self {
        MqttError::KeepAliveTimeout(
            KeepAliveTimeoutContext {}
        )
    }

    pub(crate) fn new_connack_timeout() -> Self {
        MqttError::ConnackTimeout(
            ConnackTimeoutContext {}
        )
    }

    pub(crate) fn new_not_ready(source: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        MqttError::NotReady(
            NotReadyContext {
                source : source.into()
            }
        )
    }

    pub(crate) fn new_quota_exceeded(receive_maximum: u16) -> Self {
        MqttError::QuotaExceeded(
            QuotaExceededContext {
                receive_maximum
            }
        )
    }

    pub(crate) fn new_not_supported(source: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        MqttError::NotSupported(
            NotSupportedContext {
                source : source.into()
            }
        )
    }

    pub(crate) fn new_receive_maximum_exceeded() -> Self {
        MqttError::ReceiveMaximumExceeded(
            ReceiveMaximumExceededContext {}
        )
    }

    pub(crate) fn new_invalid_argument(source: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        MqttError::InvalidArgument(
            InvalidArgumentContext {
                source : source.into()
            }
        )
    }

    pub(crate) fn new_internal_state_error(source: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        MqttError::InternalStateError(
            InternalStateErrorContext {
                source : source.into()
            }
        )
    }

    pub(crate) fn new_connection_rejected(reason_code: ReasonCode) -> Self {
        MqttError::ConnectionRejected(
            ConnectionRejectedContext {
                reason_code
            }
        )
    }

    pub(crate) fn new_subscription_rejected(reason_code: ReasonCode) -> Self {
        MqttError::SubscriptionRejected(
            SubscriptionRejectedContext {
                reason_code
            }
        )
    }

    pub(crate) fn new_server_disconnect(disconnect: DisconnectPacket) -> Self {
        MqttError::ServerDisconnect(
            ServerDisconnectContext {
                disconnect
            }
        )
    }

    /// Constructs a ConnectionClosed variant.  Transport implementations should return this
    /// when asked to send on a transport that has already been closed.
    pub fn new_connection_closed(source: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        MqttError::ConnectionClosed(
            ConnectionClosedContext {
                source : source.into()
            }
        )
    }

    /// Constructs an EndOfStream variant.  Transport implementations should return this when
    /// a read observes an orderly close by the peer.
    pub fn new_end_of_stream() -> Self {
        MqttError::EndOfStream(
            EndOfStreamContext {}
        )
    }

    /// Constructs a StdIoError variant from an existing error.  Typically this should be a
    /// std::io::Error
    pub fn new_std_io_error(source: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        MqttError::StdIoError(
            StdIoErrorContext {
                source : source.into()
            }
        )
    }

    /// Returns true if the error ends the connection it was raised on.  Non-fatal errors are
    /// returned synchronously to the caller of a public operation and leave the connection
    /// running.
    pub fn is_fatal(&self) -> bool {
        !matches!(self,
            MqttError::NotReady(_) |
            MqttError::QuotaExceeded(_) |
            MqttError::NotSupported(_) |
            MqttError::InvalidArgument(_))
    }

    /// Reason code to place in the best-effort Disconnect packet sent when this error ends a
    /// connection.  `None` means no Disconnect should be sent at all.
    pub fn disconnect_reason_code(&self) -> Option<ReasonCode> {
        match self {
            MqttError::MalformedPacket(_) => { Some(ReasonCode::MalformedPacket) }
            MqttError::ProtocolError(_) => { Some(ReasonCode::ProtocolError) }
            MqttError::PacketTooLarge(_) => { Some(ReasonCode::PacketTooLarge) }
            MqttError::PacketIdentifierNotFound(_) | MqttError::PacketIdentifierInUse(_) => { Some(ReasonCode::ProtocolError) }
            MqttError::ReceiveMaximumExceeded(_) => { Some(ReasonCode::ReceiveMaximumExceeded) }
            MqttError::StdIoError(_) | MqttError::ConnectionClosed(_) => { Some(ReasonCode::UnspecifiedError) }
            MqttError::SubscriptionRejected(context) => {
                if DISCONNECT_REASON_CODES.contains(&context.reason_code) {
                    Some(context.reason_code)
                } else {
                    Some(ReasonCode::UnspecifiedError)
                }
            }
            MqttError::KeepAliveTimeout(_) |
            MqttError::ConnackTimeout(_) |
            MqttError::ConnectionRejected(_) |
            MqttError::ServerDisconnect(_) |
            MqttError::EndOfStream(_) => { None }
            _ => { Some(ReasonCode::ImplementationSpecificError) }
        }
    }
}

impl Error for MqttError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MqttError::MalformedPacket(context) => {
                Some(context.source.as_ref())
            }
            MqttError::ProtocolError(context) => {
                Some(context.source.as_ref())
            }
            MqttError::NotReady(context) => {
                Some(context.source.as_ref())
            }
            MqttError::NotSupported(context) => {
                Some(context.source.as_ref())
            }
            MqttError::InvalidArgument(context) => {
                Some(context.source.as_ref())
            }
            MqttError::InternalStateError(context) => {
                Some(context.source.as_ref())
            }
            MqttError::ConnectionClosed(context) => {
                Some(context.source.as_ref())
            }
            MqttError::StdIoError(context) => {
                Some(context.source.as_ref())
            }
            _ => { None }
        }
    }
}

impl fmt::Display for MqttError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MqttError::MalformedPacket(_) => {
                write!(f, "structurally invalid mqtt packet data; source contains further details")
            }
            MqttError::ProtocolError(_) => {
                write!(f, "peer behavior disallowed by the mqtt spec")
            }
            MqttError::PacketTooLarge(context) => {
                write!(f, "packet of {} bytes exceeds the maximum packet size of {} bytes", context.packet_size, context.maximum_packet_size)
            }
            MqttError::PacketIdentifierNotFound(context) => {
                write!(f, "no session entry exists for packet id {}", context.packet_id)
            }
            MqttError::PacketIdentifierInUse(context) => {
                write!(f, "packet id {} is already in use", context.packet_id)
            }
            MqttError::KeepAliveTimeout(_) => {
                write!(f, "keep alive interval elapsed without a reset")
            }
            MqttError::ConnackTimeout(_) => {
                write!(f, "server did not respond to connect in time")
            }
            MqttError::NotReady(_) => {
                write!(f, "operation not possible in the connection's current state")
            }
            MqttError::QuotaExceeded(context) => {
                write!(f, "server receive maximum of {} reached; wait for an acknowledgement before publishing", context.receive_maximum)
            }
            MqttError::NotSupported(_) => {
                write!(f, "operation requires a capability the server does not support")
            }
            MqttError::ReceiveMaximumExceeded(_) => {
                write!(f, "server exceeded the client's receive maximum")
            }
            MqttError::InvalidArgument(_) => {
                write!(f, "invalid argument; source contains further details")
            }
            MqttError::InternalStateError(_) => {
                write!(f, "invalid internal state reached; almost certainly a bug")
            }
            MqttError::ConnectionRejected(context) => {
                write!(f, "server rejected the connection with reason code {}", context.reason_code)
            }
            MqttError::SubscriptionRejected(context) => {
                write!(f, "server rejected a subscription with reason code {}", context.reason_code)
            }
            MqttError::ServerDisconnect(context) => {
                write!(f, "server closed the connection with reason code {}", context.disconnect.reason_code)
            }
            MqttError::ConnectionClosed(_) => {
                write!(f, "connection was already closed; source contains further details")
            }
            MqttError::EndOfStream(_) => {
                write!(f, "peer closed the connection")
            }
            MqttError::StdIoError(_) => {
                write!(f, "generic error wrapper for std::io::Error when no more specialized error is appropriate; source contains further details")
            }
        }
    }
}

impl From<std::io::Error> for MqttError {
    fn from(error: std::io::Error) -> Self {
        MqttError::new_std_io_error(error)
    }
}

impl From<core::str::Utf8Error> for MqttError {
    fn from(err: core::str::Utf8Error) -> Self {
        MqttError::new_malformed_packet(err)
    }
}

/// Crate-wide result type for functions that can fail
pub type MqttResult<T> = Result<T, MqttError>;
