/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
Module containing a set of structured data types that model the MQTT 3.1.1 and MQTT5 specifications.

A single packet model covers both protocol versions.  Fields that only exist in MQTT5 (reason codes
on acknowledgements, properties) are ignored when encoding for MQTT 3.1.1 and take their default
values when decoding MQTT 3.1.1 data.
 */

use std::fmt;
use log::error;
use crate::error::{MqttError};

pub(crate) mod auth;
pub(crate) mod connack;
pub(crate) mod connect;
pub(crate) mod disconnect;
pub(crate) mod pingreq;
pub(crate) mod pingresp;
pub(crate) mod properties;
pub(crate) mod puback;
pub(crate) mod pubcomp;
pub(crate) mod publish;
pub(crate) mod pubrec;
pub(crate) mod pubrel;
pub(crate) mod suback;
pub(crate) mod subscribe;
pub(crate) mod unsuback;
pub(crate) mod unsubscribe;
pub mod utils;

pub use properties::Properties;

/// Version of the MQTT protocol spoken on a connection.  Fixed for the lifetime of the connection.
///
/// Enum values match the protocol level byte of the CONNECT packet.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum ProtocolVersion {

    /// MQTT 3.1.1
    Mqtt311 = 4,

    /// MQTT 5
    #[default]
    Mqtt5 = 5,
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolVersion::Mqtt311 => { write!(f, "MQTT311") }
            ProtocolVersion::Mqtt5 => { write!(f, "MQTT5") }
        }
    }
}

/// MQTT message delivery quality of service.
///
/// Enum values match [MQTT5 spec](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901234) encoding values.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub enum QualityOfService {

    /// The message is delivered according to the capabilities of the underlying network. No response is sent by the
    /// receiver and no retry is performed by the sender. The message arrives at the receiver either once or not at all.
    #[default]
    AtMostOnce = 0,

    /// A level of service that ensures that the message arrives at the receiver at least once.
    AtLeastOnce = 1,

    /// A level of service that ensures that the message arrives at the receiver exactly once.
    ExactlyOnce = 2,
}

impl TryFrom<u8> for QualityOfService {
    type Error = MqttError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        utils::convert_u8_to_quality_of_service(value)
    }
}

/// Optional property describing a PUBLISH payload's format.
///
/// Enum values match [MQTT5 spec](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901111) encoding values.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PayloadFormatIndicator {

    /// The payload is arbitrary binary data
    #[default]
    Bytes = 0,

    /// The payload is a well-formed utf-8 string value.
    Utf8 = 1,
}

/// Configures how retained messages should be handled when subscribing with a topic filter that matches topics with
/// associated retained messages.
///
/// Enum values match [MQTT5 spec](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901169) encoding values.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum RetainHandlingType {

    /// The server should always send all retained messages on topics that match a subscription's filter.
    #[default]
    SendOnSubscribe = 0,

    /// The server should send retained messages on topics that match the subscription's filter, but only for the
    /// first matching subscription, per session.
    SendOnSubscribeIfNew = 1,

    /// Subscriptions must not trigger any retained message publishes from the server.
    DontSend = 2,
}

/// Status value carried by MQTT5 acknowledgement, disconnect, and auth packets.
///
/// A single enumeration covers every packet type; each packet type only accepts a subset of the
/// values (see the `*_REASON_CODES` tables in [`utils`]).  MQTT 3.1.1 Connack return codes and
/// Suback return codes are mapped onto this enumeration as well.
///
/// Enum values match [MQTT5 spec](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901031) encoding values.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum ReasonCode {

    /// Success.  Also used as Normal Disconnection and Granted QoS 0.
    #[default]
    Success = 0x00,

    /// Subscription accepted with a maximum QoS of 1.
    GrantedQos1 = 0x01,

    /// Subscription accepted with a maximum QoS of 2.
    GrantedQos2 = 0x02,

    /// The client wishes to disconnect but requires that the server also publishes its will message.
    DisconnectWithWillMessage = 0x04,

    /// The message was accepted but there are no subscribers.
    NoMatchingSubscribers = 0x10,

    /// No matching topic filter was being used by the client.
    NoSubscriptionExisted = 0x11,

    /// Continue the authentication with another step.
    ContinueAuthentication = 0x18,

    /// Initiate a re-authentication.
    ReAuthenticate = 0x19,

    /// The sender does not wish to reveal the reason for the failure, or none of the other reason codes apply.
    UnspecifiedError = 0x80,

    /// Data within the packet could not be correctly parsed.
    MalformedPacket = 0x81,

    /// Data in the packet does not conform to the specification.
    ProtocolError = 0x82,

    /// The packet is valid but is not accepted by the receiver's implementation.
    ImplementationSpecificError = 0x83,

    /// The server does not support the requested protocol version.
    UnsupportedProtocolVersion = 0x84,

    /// The client identifier is valid but not allowed by the server.
    ClientIdentifierNotValid = 0x85,

    /// The server does not accept the user name or password.
    BadUserNameOrPassword = 0x86,

    /// The operation is not authorized.
    NotAuthorized = 0x87,

    /// The server is not available.
    ServerUnavailable = 0x88,

    /// The server is busy.
    ServerBusy = 0x89,

    /// The client has been banned by administrative action.
    Banned = 0x8A,

    /// The server is shutting down.
    ServerShuttingDown = 0x8B,

    /// The authentication method is not supported or does not match the one currently in use.
    BadAuthenticationMethod = 0x8C,

    /// The connection was closed because no packet was received within 1.5 times the keep alive interval.
    KeepAliveTimeout = 0x8D,

    /// Another connection using the same client id has connected.
    SessionTakenOver = 0x8E,

    /// The topic filter is correctly formed but not accepted.
    TopicFilterInvalid = 0x8F,

    /// The topic name is correctly formed but not accepted.
    TopicNameInvalid = 0x90,

    /// The packet identifier is already in use.
    PacketIdentifierInUse = 0x91,

    /// The packet identifier is not known.
    PacketIdentifierNotFound = 0x92,

    /// More QoS 1 and QoS 2 publishes were received than the receive maximum allows.
    ReceiveMaximumExceeded = 0x93,

    /// A topic alias was received that is not valid.
    TopicAliasInvalid = 0x94,

    /// The packet exceeded the maximum permissible size.
    PacketTooLarge = 0x95,

    /// The received data rate is too high.
    MessageRateTooHigh = 0x96,

    /// An implementation or administrative imposed limit has been exceeded.
    QuotaExceeded = 0x97,

    /// The connection is closed due to an administrative action.
    AdministrativeAction = 0x98,

    /// The payload does not match the specified payload format indicator.
    PayloadFormatInvalid = 0x99,

    /// The server does not support retained messages.
    RetainNotSupported = 0x9A,

    /// The requested QoS is greater than the maximum QoS the server supports.
    QosNotSupported = 0x9B,

    /// The client should temporarily use another server.
    UseAnotherServer = 0x9C,

    /// The client should permanently use another server.
    ServerMoved = 0x9D,

    /// The server does not support shared subscriptions.
    SharedSubscriptionsNotSupported = 0x9E,

    /// The connection rate limit has been exceeded.
    ConnectionRateExceeded = 0x9F,

    /// The maximum connection time authorized for this connection has been exceeded.
    MaximumConnectTime = 0xA0,

    /// The server does not support subscription identifiers.
    SubscriptionIdentifiersNotSupported = 0xA1,

    /// The server does not support wildcard subscriptions.
    WildcardSubscriptionsNotSupported = 0xA2,
}

impl ReasonCode {

    /// Returns whether or not the reason code indicates success
    pub fn is_success(&self) -> bool {
        (*self as u8) < 0x80
    }
}

impl TryFrom<u8> for ReasonCode {
    type Error = MqttError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        utils::convert_u8_to_reason_code(value)
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", utils::reason_code_to_str(*self))
    }
}

/// MQTT5 user property.  A name-value pair of utf-8 strings that may be attached to most packets.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UserProperty {

    /// User property name
    pub name: String,

    /// User property value
    pub value: String,
}

impl UserProperty {

    /// Creates a new user property
    pub fn new(name: &str, value: &str) -> Self {
        UserProperty {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

/// Specifies a single subscription within a Subscribe operation
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Subscription {

    /// Topic filter to subscribe to
    pub topic_filter: String,

    /// Maximum QoS on which the subscriber will accept publish messages.
    pub qos: QualityOfService,

    /// MQTT5 only.  Should the server not send publishes to a client when that client was the one who sent the
    /// publish?
    pub no_local: bool,

    /// MQTT5 only.  Should messages sent due to this subscription keep the retain flag preserved on the message?
    pub retain_as_published: bool,

    /// MQTT5 only.  Should retained messages on matching topics be sent in reaction to this subscription?
    pub retain_handling_type: RetainHandlingType,
}

impl Subscription {

    /// Creates a subscription with default MQTT5 options
    pub fn new(topic_filter: &str, qos: QualityOfService) -> Self {
        Subscription {
            topic_filter: topic_filter.to_string(),
            qos,
            ..Default::default()
        }
    }
}

/// Data model of an [MQTT5 AUTH](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901217) packet.
/// MQTT5 only.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AuthPacket {

    /// Specifies an endpoint's response to a previously-received AUTH packet as part of an authentication exchange.
    pub reason_code: ReasonCode,

    /// Authentication method, authentication data, reason string, and user properties.
    pub properties: Properties,
}

/// Data model of a [CONNACK](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901074) packet.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ConnackPacket {

    /// True if the client rejoined an existing session on the server, false otherwise.
    pub session_present: bool,

    /// Indicates either success or the reason for failure for the connection attempt.  MQTT 3.1.1
    /// return codes are mapped onto the equivalent MQTT5 values.
    pub reason_code: ReasonCode,

    /// Server-negotiated connection settings and diagnostics.
    pub properties: Properties,
}

/// Data model of a [CONNECT](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901033) packet.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ConnectPacket {

    /// The maximum time interval, in seconds, that is permitted to elapse between the point at which the client
    /// finishes transmitting one MQTT packet and the point it starts sending the next.
    pub keep_alive_interval_seconds: u16,

    /// Whether the server should start a fresh session (MQTT5 Clean Start, MQTT 3.1.1 Clean Session).
    pub clean_start: bool,

    /// A unique string identifying the client to the server.
    pub client_id: String,

    /// A string value that the server may use for client authentication and authorization.
    pub username: Option<String>,

    /// Opaque binary data that the server may use for client authentication and authorization.
    pub password: Option<Vec<u8>>,

    /// The message the server should publish on the client's behalf if the connection is lost.
    /// The will's properties carry the will delay interval along with the usual publish properties.
    pub will: Option<PublishPacket>,

    /// MQTT5 Connect properties.
    pub properties: Properties,
}

/// Data model of a [DISCONNECT](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901205) packet.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DisconnectPacket {

    /// Value indicating the reason that the sender is closing the connection.  MQTT5 only.
    pub reason_code: ReasonCode,

    /// Session expiry, reason string, server reference, and user properties.  MQTT5 only.
    pub properties: Properties,
}

/// Data model of a [PINGREQ](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901195) packet.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PingreqPacket {}

/// Data model of a [PINGRESP](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901200) packet.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PingrespPacket {}

/// Data model of a [PUBACK](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901121) packet
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PubackPacket {

    /// Id of the QoS 1 publish this packet is acknowledging
    pub packet_id: u16,

    /// Success indicator or failure reason for the associated PUBLISH packet.  MQTT5 only.
    pub reason_code: ReasonCode,

    /// Reason string and user properties.  MQTT5 only.
    pub properties: Properties,
}

/// Data model of a [PUBCOMP](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901151) packet
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PubcompPacket {

    /// Id of the QoS 2 publish this packet is completing
    pub packet_id: u16,

    /// Success indicator or failure reason for the final step of a QoS 2 delivery.  MQTT5 only.
    pub reason_code: ReasonCode,

    /// Reason string and user properties.  MQTT5 only.
    pub properties: Properties,
}

/// Data model of a [PUBLISH](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901100) packet
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PublishPacket {

    /// Packet id; only meaningful (and non-zero) for QoS 1 and QoS 2 publishes.
    pub packet_id: u16,

    /// Topic this message was published, or should be published, to.  May be empty when an MQTT5
    /// topic alias is in use.
    pub topic: String,

    /// Quality of service level this message is delivered at.
    pub qos: QualityOfService,

    /// Whether this packet is a resend of a previously-sent publish.
    pub duplicate: bool,

    /// True if this is a retained message.
    pub retain: bool,

    /// The payload of the publish message.
    pub payload: Vec<u8>,

    /// MQTT5 publish properties.
    pub properties: Properties,
}

impl PublishPacket {

    /// Creates a new publish packet with no packet id, flags, or properties
    pub fn new(topic: &str, qos: QualityOfService, payload: &[u8]) -> Self {
        PublishPacket {
            topic: topic.to_string(),
            qos,
            payload: payload.to_vec(),
            ..Default::default()
        }
    }
}

/// Data model of a [PUBREC](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901131) packet
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PubrecPacket {

    /// Id of the QoS 2 publish this packet is acknowledging
    pub packet_id: u16,

    /// Success indicator or failure reason for the initial step of a QoS 2 delivery.  MQTT5 only.
    pub reason_code: ReasonCode,

    /// Reason string and user properties.  MQTT5 only.
    pub properties: Properties,
}

/// Data model of a [PUBREL](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901141) packet
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PubrelPacket {

    /// Id of the QoS 2 publish this packet is releasing
    pub packet_id: u16,

    /// Success indicator or failure reason for the middle step of a QoS 2 delivery.  MQTT5 only.
    pub reason_code: ReasonCode,

    /// Reason string and user properties.  MQTT5 only.
    pub properties: Properties,
}

/// Data model of a [SUBACK](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901171) packet.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SubackPacket {

    /// Id of the subscribe this packet is acknowledging
    pub packet_id: u16,

    /// One result per subscription in the associated subscribe, in order.
    pub reason_codes: Vec<ReasonCode>,

    /// Reason string and user properties.  MQTT5 only.
    pub properties: Properties,
}

/// Data model of a [SUBSCRIBE](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901161) packet.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SubscribePacket {

    /// Packet id correlating this subscribe with its suback
    pub packet_id: u16,

    /// List of topic filter subscriptions that the client wishes to listen to
    pub subscriptions: Vec<Subscription>,

    /// Subscription identifier and user properties.  MQTT5 only.
    pub properties: Properties,
}

/// Data model of an [UNSUBACK](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901187) packet.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UnsubackPacket {

    /// Id of the unsubscribe this packet is acknowledging
    pub packet_id: u16,

    /// One result per topic filter in the associated unsubscribe, in order.  Always empty for MQTT 3.1.1.
    pub reason_codes: Vec<ReasonCode>,

    /// Reason string and user properties.  MQTT5 only.
    pub properties: Properties,
}

/// Data model of an [UNSUBSCRIBE](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901179) packet.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UnsubscribePacket {

    /// Packet id correlating this unsubscribe with its unsuback
    pub packet_id: u16,

    /// List of topic filters that the client wishes to unsubscribe from.
    pub topic_filters: Vec<String>,

    /// User properties.  MQTT5 only.
    pub properties: Properties,
}

/// Algebraic union of all MQTT packet types.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MqttPacket {
    /// CONNECT
    Connect(ConnectPacket),
    /// CONNACK
    Connack(ConnackPacket),
    /// PUBLISH
    Publish(PublishPacket),
    /// PUBACK
    Puback(PubackPacket),
    /// PUBREC
    Pubrec(PubrecPacket),
    /// PUBREL
    Pubrel(PubrelPacket),
    /// PUBCOMP
    Pubcomp(PubcompPacket),
    /// SUBSCRIBE
    Subscribe(SubscribePacket),
    /// SUBACK
    Suback(SubackPacket),
    /// UNSUBSCRIBE
    Unsubscribe(UnsubscribePacket),
    /// UNSUBACK
    Unsuback(UnsubackPacket),
    /// PINGREQ
    Pingreq(PingreqPacket),
    /// PINGRESP
    Pingresp(PingrespPacket),
    /// DISCONNECT
    Disconnect(DisconnectPacket),
    /// AUTH
    Auth(AuthPacket),
}

/// Packet type of an MQTT packet.
///
/// Enum values match the packet type nibble of the fixed header.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum PacketType {
    /// CONNECT
    Connect = 1,
    /// CONNACK
    Connack = 2,
    /// PUBLISH
    Publish = 3,
    /// PUBACK
    Puback = 4,
    /// PUBREC
    Pubrec = 5,
    /// PUBREL
    Pubrel = 6,
    /// PUBCOMP
    Pubcomp = 7,
    /// SUBSCRIBE
    Subscribe = 8,
    /// SUBACK
    Suback = 9,
    /// UNSUBSCRIBE
    Unsubscribe = 10,
    /// UNSUBACK
    Unsuback = 11,
    /// PINGREQ
    Pingreq = 12,
    /// PINGRESP
    Pingresp = 13,
    /// DISCONNECT
    Disconnect = 14,
    /// AUTH
    Auth = 15,
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", utils::packet_type_to_str(*self as u8))
    }
}

impl TryFrom<u8> for PacketType {
    type Error = MqttError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => { Ok(PacketType::Connect) }
            2 => { Ok(PacketType::Connack) }
            3 => { Ok(PacketType::Publish) }
            4 => { Ok(PacketType::Puback) }
            5 => { Ok(PacketType::Pubrec) }
            6 => { Ok(PacketType::Pubrel) }
            7 => { Ok(PacketType::Pubcomp) }
            8 => { Ok(PacketType::Subscribe) }
            9 => { Ok(PacketType::Suback) }
            10 => { Ok(PacketType::Unsubscribe) }
            11 => { Ok(PacketType::Unsuback) }
            12 => { Ok(PacketType::Pingreq) }
            13 => { Ok(PacketType::Pingresp) }
            14 => { Ok(PacketType::Disconnect) }
            15 => { Ok(PacketType::Auth) }
            _ => {
                let message = format!("PacketType::try_from - invalid packet type value ({})", value);
                error!("{}", message);
                Err(MqttError::new_malformed_packet(message))
            }
        }
    }
}
