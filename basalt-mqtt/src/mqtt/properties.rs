/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
The MQTT5 property bag shared by every packet type, along with the per-packet property whitelists
and the property section codec.
 */

use crate::decode::utils::*;
use crate::encode::utils::*;
use crate::error::{MqttError, MqttResult};
use crate::logging::*;
use crate::mqtt::*;
use crate::mqtt::utils::*;

use log::*;
use std::fmt;

/// Set of MQTT5 properties attached to a packet.
///
/// Each packet type only permits a subset of these properties.  Properties that are not legal for a
/// packet type are rejected when decoding and skipped when encoding.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Properties {

    /// Property specifying the format of a publish payload.
    pub payload_format_indicator: Option<PayloadFormatIndicator>,

    /// Lifetime, in seconds, of a published message.
    pub message_expiry_interval: Option<u32>,

    /// Content type of a publish payload.
    pub content_type: Option<String>,

    /// Topic a request-response subscriber should send its response to.
    pub response_topic: Option<String>,

    /// Opaque data used to correlate a response with its request.
    pub correlation_data: Option<Vec<u8>>,

    /// Subscription identifiers.  At most one is legal on a Subscribe; a Publish may carry several.
    pub subscription_identifiers: Vec<u32>,

    /// Time, in seconds, that the server keeps session state after the connection closes.
    pub session_expiry_interval: Option<u32>,

    /// Client id the server assigned because the client connected with an empty one.
    pub assigned_client_identifier: Option<String>,

    /// Keep alive interval, in seconds, that the server requires the client to use.
    pub server_keep_alive: Option<u16>,

    /// Name of the enhanced authentication method.
    pub authentication_method: Option<String>,

    /// Method-specific enhanced authentication data.
    pub authentication_data: Option<Vec<u8>>,

    /// Whether the server may send reason strings and user properties on failures.
    pub request_problem_information: Option<bool>,

    /// Delay, in seconds, before the server publishes a will message.
    pub will_delay_interval: Option<u32>,

    /// Whether the server should return response information in the Connack.
    pub request_response_information: Option<bool>,

    /// Basis for building response topics.
    pub response_information: Option<String>,

    /// Another server the client should use.
    pub server_reference: Option<String>,

    /// Human-readable diagnostic.
    pub reason_string: Option<String>,

    /// Maximum number of unacknowledged QoS 1 and QoS 2 publishes the sender will accept.
    pub receive_maximum: Option<u16>,

    /// Highest topic alias value the sender will accept.
    pub topic_alias_maximum: Option<u16>,

    /// Integer standing in for the publish topic.
    pub topic_alias: Option<u16>,

    /// Highest QoS the server supports.
    pub maximum_qos: Option<QualityOfService>,

    /// Whether the server supports retained messages.
    pub retain_available: Option<bool>,

    /// Name-value pairs.  May repeat; order is preserved.
    pub user_properties: Vec<UserProperty>,

    /// Largest packet, in bytes, the sender will accept.
    pub maximum_packet_size: Option<u32>,

    /// Whether the server supports wildcard subscriptions.
    pub wildcard_subscriptions_available: Option<bool>,

    /// Whether the server supports subscription identifiers.
    pub subscription_identifiers_available: Option<bool>,

    /// Whether the server supports shared subscriptions.
    pub shared_subscriptions_available: Option<bool>,
}

impl Properties {

    /// Returns true if no property is set
    pub fn is_empty(&self) -> bool {
        *self == Properties::default()
    }
}

pub(crate) const PUBLISH_PROPERTIES : &[u8] = &[
    PROPERTY_KEY_PAYLOAD_FORMAT_INDICATOR,
    PROPERTY_KEY_MESSAGE_EXPIRY_INTERVAL,
    PROPERTY_KEY_TOPIC_ALIAS,
    PROPERTY_KEY_RESPONSE_TOPIC,
    PROPERTY_KEY_CORRELATION_DATA,
    PROPERTY_KEY_USER_PROPERTY,
    PROPERTY_KEY_SUBSCRIPTION_IDENTIFIER,
    PROPERTY_KEY_CONTENT_TYPE,
];

pub(crate) const WILL_PROPERTIES : &[u8] = &[
    PROPERTY_KEY_WILL_DELAY_INTERVAL,
    PROPERTY_KEY_PAYLOAD_FORMAT_INDICATOR,
    PROPERTY_KEY_MESSAGE_EXPIRY_INTERVAL,
    PROPERTY_KEY_CONTENT_TYPE,
    PROPERTY_KEY_RESPONSE_TOPIC,
    PROPERTY_KEY_CORRELATION_DATA,
    PROPERTY_KEY_USER_PROPERTY,
];

pub(crate) const CONNECT_PROPERTIES : &[u8] = &[
    PROPERTY_KEY_SESSION_EXPIRY_INTERVAL,
    PROPERTY_KEY_RECEIVE_MAXIMUM,
    PROPERTY_KEY_MAXIMUM_PACKET_SIZE,
    PROPERTY_KEY_TOPIC_ALIAS_MAXIMUM,
    PROPERTY_KEY_REQUEST_RESPONSE_INFORMATION,
    PROPERTY_KEY_REQUEST_PROBLEM_INFORMATION,
    PROPERTY_KEY_USER_PROPERTY,
    PROPERTY_KEY_AUTHENTICATION_METHOD,
    PROPERTY_KEY_AUTHENTICATION_DATA,
];

pub(crate) const CONNACK_PROPERTIES : &[u8] = &[
    PROPERTY_KEY_SESSION_EXPIRY_INTERVAL,
    PROPERTY_KEY_RECEIVE_MAXIMUM,
    PROPERTY_KEY_MAXIMUM_QOS,
    PROPERTY_KEY_RETAIN_AVAILABLE,
    PROPERTY_KEY_MAXIMUM_PACKET_SIZE,
    PROPERTY_KEY_ASSIGNED_CLIENT_IDENTIFIER,
    PROPERTY_KEY_TOPIC_ALIAS_MAXIMUM,
    PROPERTY_KEY_REASON_STRING,
    PROPERTY_KEY_USER_PROPERTY,
    PROPERTY_KEY_WILDCARD_SUBSCRIPTIONS_AVAILABLE,
    PROPERTY_KEY_SUBSCRIPTION_IDENTIFIERS_AVAILABLE,
    PROPERTY_KEY_SHARED_SUBSCRIPTIONS_AVAILABLE,
    PROPERTY_KEY_SERVER_KEEP_ALIVE,
    PROPERTY_KEY_RESPONSE_INFORMATION,
    PROPERTY_KEY_SERVER_REFERENCE,
    PROPERTY_KEY_AUTHENTICATION_METHOD,
    PROPERTY_KEY_AUTHENTICATION_DATA,
];

/// Puback, Pubrec, Pubrel, Pubcomp, Suback and Unsuback
pub(crate) const ACK_PROPERTIES : &[u8] = &[
    PROPERTY_KEY_REASON_STRING,
    PROPERTY_KEY_USER_PROPERTY,
];

pub(crate) const SUBSCRIBE_PROPERTIES : &[u8] = &[
    PROPERTY_KEY_SUBSCRIPTION_IDENTIFIER,
    PROPERTY_KEY_USER_PROPERTY,
];

pub(crate) const UNSUBSCRIBE_PROPERTIES : &[u8] = &[
    PROPERTY_KEY_USER_PROPERTY,
];

pub(crate) const DISCONNECT_PROPERTIES : &[u8] = &[
    PROPERTY_KEY_SESSION_EXPIRY_INTERVAL,
    PROPERTY_KEY_REASON_STRING,
    PROPERTY_KEY_USER_PROPERTY,
    PROPERTY_KEY_SERVER_REFERENCE,
];

pub(crate) const AUTH_PROPERTIES : &[u8] = &[
    PROPERTY_KEY_AUTHENTICATION_METHOD,
    PROPERTY_KEY_AUTHENTICATION_DATA,
    PROPERTY_KEY_REASON_STRING,
    PROPERTY_KEY_USER_PROPERTY,
];

fn convert_u8_to_maximum_qos(value: u8) -> MqttResult<QualityOfService> {
    match value {
        0 => { Ok(QualityOfService::AtMostOnce) }
        1 => { Ok(QualityOfService::AtLeastOnce) }
        _ => {
            let message = format!("convert_u8_to_maximum_qos - invalid maximum qos value ({})", value);
            error!("{}", message);
            Err(MqttError::new_protocol_error(message))
        }
    }
}

fn encode_optional_u16_property(key: u8, value: Option<u16>, dest: &mut Vec<u8>) {
    if let Some(val) = value {
        encode_u8(key, dest);
        encode_u16(val, dest);
    }
}

fn encode_optional_u32_property(key: u8, value: Option<u32>, dest: &mut Vec<u8>) {
    if let Some(val) = value {
        encode_u8(key, dest);
        encode_u32(val, dest);
    }
}

fn encode_optional_bool_property(key: u8, value: Option<bool>, dest: &mut Vec<u8>) {
    if let Some(val) = value {
        encode_u8(key, dest);
        encode_bool(val, dest);
    }
}

fn encode_optional_string_property(key: u8, value: &Option<String>, dest: &mut Vec<u8>) -> MqttResult<()> {
    if let Some(val) = value {
        encode_u8(key, dest);
        encode_length_prefixed_string(val, dest)?;
    }

    Ok(())
}

fn encode_optional_bytes_property(key: u8, value: &Option<Vec<u8>>, dest: &mut Vec<u8>) -> MqttResult<()> {
    if let Some(val) = value {
        encode_u8(key, dest);
        encode_length_prefixed_bytes(val, dest)?;
    }

    Ok(())
}

fn encode_property(properties: &Properties, key: u8, packet_type: PacketType, dest: &mut Vec<u8>) -> MqttResult<()> {
    match key {
        PROPERTY_KEY_PAYLOAD_FORMAT_INDICATOR => {
            if let Some(indicator) = properties.payload_format_indicator {
                encode_u8(key, dest);
                encode_u8(indicator as u8, dest);
            }
        }
        PROPERTY_KEY_MESSAGE_EXPIRY_INTERVAL => { encode_optional_u32_property(key, properties.message_expiry_interval, dest); }
        PROPERTY_KEY_CONTENT_TYPE => { encode_optional_string_property(key, &properties.content_type, dest)?; }
        PROPERTY_KEY_RESPONSE_TOPIC => { encode_optional_string_property(key, &properties.response_topic, dest)?; }
        PROPERTY_KEY_CORRELATION_DATA => { encode_optional_bytes_property(key, &properties.correlation_data, dest)?; }
        PROPERTY_KEY_SUBSCRIPTION_IDENTIFIER => {
            if packet_type != PacketType::Publish && properties.subscription_identifiers.len() > 1 {
                let message = format!("encode_properties - {} packets may carry at most one subscription identifier", packet_type);
                error!("{}", message);
                return Err(MqttError::new_invalid_argument(message));
            }

            for identifier in &properties.subscription_identifiers {
                if *identifier == 0 {
                    let message = "encode_properties - subscription identifier may not be zero";
                    error!("{}", message);
                    return Err(MqttError::new_invalid_argument(message));
                }

                encode_u8(key, dest);
                encode_vli(*identifier, dest)?;
            }
        }
        PROPERTY_KEY_SESSION_EXPIRY_INTERVAL => { encode_optional_u32_property(key, properties.session_expiry_interval, dest); }
        PROPERTY_KEY_ASSIGNED_CLIENT_IDENTIFIER => { encode_optional_string_property(key, &properties.assigned_client_identifier, dest)?; }
        PROPERTY_KEY_SERVER_KEEP_ALIVE => { encode_optional_u16_property(key, properties.server_keep_alive, dest); }
        PROPERTY_KEY_AUTHENTICATION_METHOD => { encode_optional_string_property(key, &properties.authentication_method, dest)?; }
        PROPERTY_KEY_AUTHENTICATION_DATA => { encode_optional_bytes_property(key, &properties.authentication_data, dest)?; }
        PROPERTY_KEY_REQUEST_PROBLEM_INFORMATION => { encode_optional_bool_property(key, properties.request_problem_information, dest); }
        PROPERTY_KEY_WILL_DELAY_INTERVAL => { encode_optional_u32_property(key, properties.will_delay_interval, dest); }
        PROPERTY_KEY_REQUEST_RESPONSE_INFORMATION => { encode_optional_bool_property(key, properties.request_response_information, dest); }
        PROPERTY_KEY_RESPONSE_INFORMATION => { encode_optional_string_property(key, &properties.response_information, dest)?; }
        PROPERTY_KEY_SERVER_REFERENCE => { encode_optional_string_property(key, &properties.server_reference, dest)?; }
        PROPERTY_KEY_REASON_STRING => { encode_optional_string_property(key, &properties.reason_string, dest)?; }
        PROPERTY_KEY_RECEIVE_MAXIMUM => { encode_optional_u16_property(key, properties.receive_maximum, dest); }
        PROPERTY_KEY_TOPIC_ALIAS_MAXIMUM => { encode_optional_u16_property(key, properties.topic_alias_maximum, dest); }
        PROPERTY_KEY_TOPIC_ALIAS => { encode_optional_u16_property(key, properties.topic_alias, dest); }
        PROPERTY_KEY_MAXIMUM_QOS => {
            if let Some(qos) = properties.maximum_qos {
                encode_u8(key, dest);
                encode_u8(qos as u8, dest);
            }
        }
        PROPERTY_KEY_RETAIN_AVAILABLE => { encode_optional_bool_property(key, properties.retain_available, dest); }
        PROPERTY_KEY_USER_PROPERTY => {
            for property in &properties.user_properties {
                encode_u8(key, dest);
                encode_user_property(property, dest)?;
            }
        }
        PROPERTY_KEY_MAXIMUM_PACKET_SIZE => { encode_optional_u32_property(key, properties.maximum_packet_size, dest); }
        PROPERTY_KEY_WILDCARD_SUBSCRIPTIONS_AVAILABLE => { encode_optional_bool_property(key, properties.wildcard_subscriptions_available, dest); }
        PROPERTY_KEY_SUBSCRIPTION_IDENTIFIERS_AVAILABLE => { encode_optional_bool_property(key, properties.subscription_identifiers_available, dest); }
        PROPERTY_KEY_SHARED_SUBSCRIPTIONS_AVAILABLE => { encode_optional_bool_property(key, properties.shared_subscriptions_available, dest); }
        _ => {
            let message = format!("encode_properties - unknown property key ({})", key);
            error!("{}", message);
            return Err(MqttError::new_internal_state_error(message));
        }
    }

    Ok(())
}

/// Writes the property section (length prefix plus properties) of an MQTT5 packet.  Only
/// properties in the whitelist are written, in whitelist order.
pub(crate) fn encode_properties(properties: &Properties, whitelist: &[u8], packet_type: PacketType, dest: &mut Vec<u8>) -> MqttResult<()> {
    let mut scratch = Vec::new();
    for key in whitelist {
        encode_property(properties, *key, packet_type, &mut scratch)?;
    }

    encode_vli(scratch.len() as u32, dest)?;
    dest.extend_from_slice(&scratch);

    Ok(())
}

fn check_non_zero<T: Default + PartialEq>(value: &Option<T>, property_name: &str) -> MqttResult<()> {
    if let Some(val) = value {
        if *val == T::default() {
            let message = format!("decode_properties - {} may not be zero", property_name);
            error!("{}", message);
            return Err(MqttError::new_protocol_error(message));
        }
    }

    Ok(())
}

fn decode_property<'a>(bytes: &'a[u8], key: u8, packet_type: PacketType, properties: &mut Properties) -> MqttResult<&'a[u8]> {
    match key {
        PROPERTY_KEY_PAYLOAD_FORMAT_INDICATOR => { decode_optional_u8_as_enum(bytes, &mut properties.payload_format_indicator, convert_u8_to_payload_format_indicator) }
        PROPERTY_KEY_MESSAGE_EXPIRY_INTERVAL => { decode_optional_u32(bytes, &mut properties.message_expiry_interval) }
        PROPERTY_KEY_CONTENT_TYPE => { decode_optional_length_prefixed_string(bytes, &mut properties.content_type) }
        PROPERTY_KEY_RESPONSE_TOPIC => { decode_optional_length_prefixed_string(bytes, &mut properties.response_topic) }
        PROPERTY_KEY_CORRELATION_DATA => { decode_optional_length_prefixed_bytes(bytes, &mut properties.correlation_data) }
        PROPERTY_KEY_SUBSCRIPTION_IDENTIFIER => {
            if packet_type != PacketType::Publish && !properties.subscription_identifiers.is_empty() {
                let message = format!("decode_properties - duplicate subscription identifier in {} packet", packet_type);
                error!("{}", message);
                return Err(MqttError::new_protocol_error(message));
            }

            let mut identifier : usize = 0;
            let remaining_bytes = decode_vli_into_mutable(bytes, &mut identifier)?;
            if identifier == 0 {
                let message = "decode_properties - subscription identifier may not be zero";
                error!("{}", message);
                return Err(MqttError::new_protocol_error(message));
            }

            properties.subscription_identifiers.push(identifier as u32);
            Ok(remaining_bytes)
        }
        PROPERTY_KEY_SESSION_EXPIRY_INTERVAL => { decode_optional_u32(bytes, &mut properties.session_expiry_interval) }
        PROPERTY_KEY_ASSIGNED_CLIENT_IDENTIFIER => { decode_optional_length_prefixed_string(bytes, &mut properties.assigned_client_identifier) }
        PROPERTY_KEY_SERVER_KEEP_ALIVE => { decode_optional_u16(bytes, &mut properties.server_keep_alive) }
        PROPERTY_KEY_AUTHENTICATION_METHOD => { decode_optional_length_prefixed_string(bytes, &mut properties.authentication_method) }
        PROPERTY_KEY_AUTHENTICATION_DATA => { decode_optional_length_prefixed_bytes(bytes, &mut properties.authentication_data) }
        PROPERTY_KEY_REQUEST_PROBLEM_INFORMATION => { decode_optional_u8_as_bool(bytes, &mut properties.request_problem_information) }
        PROPERTY_KEY_WILL_DELAY_INTERVAL => { decode_optional_u32(bytes, &mut properties.will_delay_interval) }
        PROPERTY_KEY_REQUEST_RESPONSE_INFORMATION => { decode_optional_u8_as_bool(bytes, &mut properties.request_response_information) }
        PROPERTY_KEY_RESPONSE_INFORMATION => { decode_optional_length_prefixed_string(bytes, &mut properties.response_information) }
        PROPERTY_KEY_SERVER_REFERENCE => { decode_optional_length_prefixed_string(bytes, &mut properties.server_reference) }
        PROPERTY_KEY_REASON_STRING => { decode_optional_length_prefixed_string(bytes, &mut properties.reason_string) }
        PROPERTY_KEY_RECEIVE_MAXIMUM => {
            let remaining_bytes = decode_optional_u16(bytes, &mut properties.receive_maximum)?;
            check_non_zero(&properties.receive_maximum, "receive maximum")?;
            Ok(remaining_bytes)
        }
        PROPERTY_KEY_TOPIC_ALIAS_MAXIMUM => { decode_optional_u16(bytes, &mut properties.topic_alias_maximum) }
        PROPERTY_KEY_TOPIC_ALIAS => { decode_optional_u16(bytes, &mut properties.topic_alias) }
        PROPERTY_KEY_MAXIMUM_QOS => { decode_optional_u8_as_enum(bytes, &mut properties.maximum_qos, convert_u8_to_maximum_qos) }
        PROPERTY_KEY_RETAIN_AVAILABLE => { decode_optional_u8_as_bool(bytes, &mut properties.retain_available) }
        PROPERTY_KEY_USER_PROPERTY => { decode_user_property(bytes, &mut properties.user_properties) }
        PROPERTY_KEY_MAXIMUM_PACKET_SIZE => {
            let remaining_bytes = decode_optional_u32(bytes, &mut properties.maximum_packet_size)?;
            check_non_zero(&properties.maximum_packet_size, "maximum packet size")?;
            Ok(remaining_bytes)
        }
        PROPERTY_KEY_WILDCARD_SUBSCRIPTIONS_AVAILABLE => { decode_optional_u8_as_bool(bytes, &mut properties.wildcard_subscriptions_available) }
        PROPERTY_KEY_SUBSCRIPTION_IDENTIFIERS_AVAILABLE => { decode_optional_u8_as_bool(bytes, &mut properties.subscription_identifiers_available) }
        PROPERTY_KEY_SHARED_SUBSCRIPTIONS_AVAILABLE => { decode_optional_u8_as_bool(bytes, &mut properties.shared_subscriptions_available) }
        _ => {
            let message = format!("decode_properties - unknown property key ({})", key);
            error!("{}", message);
            Err(MqttError::new_protocol_error(message))
        }
    }
}

/// Reads the property section (length prefix plus properties) of an MQTT5 packet, returning the
/// decoded properties and the bytes that follow the section.
///
/// Fails with a protocol error if a property is not in the whitelist or a single-valued property
/// repeats; fails with a malformed packet error if the section is truncated.
pub(crate) fn decode_properties<'a>(bytes: &'a[u8], whitelist: &[u8], packet_type: PacketType) -> MqttResult<(Properties, &'a[u8])> {
    let mut property_length : usize = 0;
    let mutable_bytes = decode_vli_into_mutable(bytes, &mut property_length)?;
    if property_length > mutable_bytes.len() {
        let message = format!("decode_properties - {} property length exceeds remaining packet bytes", packet_type);
        error!("{}", message);
        return Err(MqttError::new_malformed_packet(message));
    }

    let (mut property_bytes, remaining_bytes) = mutable_bytes.split_at(property_length);
    let mut properties = Properties::default();

    while !property_bytes.is_empty() {
        let key = property_bytes[0];
        property_bytes = &property_bytes[1..];

        if !whitelist.contains(&key) {
            let message = format!("decode_properties - property key ({}) is not valid for {} packets", key, packet_type);
            error!("{}", message);
            return Err(MqttError::new_protocol_error(message));
        }

        property_bytes = decode_property(property_bytes, key, packet_type, &mut properties)?;
    }

    Ok((properties, remaining_bytes))
}

impl fmt::Display for Properties {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{")?;
        log_optional_enum!(self.payload_format_indicator, f, "payload_format_indicator", value, payload_format_indicator_to_str);
        log_optional_primitive_value!(self.message_expiry_interval, f, "message_expiry_interval_seconds", value);
        log_optional_string!(self.content_type, f, "content_type", value);
        log_optional_string!(self.response_topic, f, "response_topic", value);
        log_optional_binary_data!(self.correlation_data, f, "correlation_data", value);
        if !self.subscription_identifiers.is_empty() {
            write!(f, " subscription_identifiers:{:?}", self.subscription_identifiers)?;
        }
        log_optional_primitive_value!(self.session_expiry_interval, f, "session_expiry_interval_seconds", value);
        log_optional_string!(self.assigned_client_identifier, f, "assigned_client_identifier", value);
        log_optional_primitive_value!(self.server_keep_alive, f, "server_keep_alive", value);
        log_optional_string!(self.authentication_method, f, "authentication_method", value);
        log_optional_binary_data_sensitive!(self.authentication_data, f, "authentication_data");
        log_optional_primitive_value!(self.request_problem_information, f, "request_problem_information", value);
        log_optional_primitive_value!(self.will_delay_interval, f, "will_delay_interval_seconds", value);
        log_optional_primitive_value!(self.request_response_information, f, "request_response_information", value);
        log_optional_string!(self.response_information, f, "response_information", value);
        log_optional_string!(self.server_reference, f, "server_reference", value);
        log_optional_string!(self.reason_string, f, "reason_string", value);
        log_optional_primitive_value!(self.receive_maximum, f, "receive_maximum", value);
        log_optional_primitive_value!(self.topic_alias_maximum, f, "topic_alias_maximum", value);
        log_optional_primitive_value!(self.topic_alias, f, "topic_alias", value);
        log_optional_enum!(self.maximum_qos, f, "maximum_qos", value, quality_of_service_to_str);
        log_optional_primitive_value!(self.retain_available, f, "retain_available", value);
        log_user_properties!(self.user_properties, f, "user_properties");
        log_optional_primitive_value!(self.maximum_packet_size, f, "maximum_packet_size", value);
        log_optional_primitive_value!(self.wildcard_subscriptions_available, f, "wildcard_subscriptions_available", value);
        log_optional_primitive_value!(self.subscription_identifiers_available, f, "subscription_identifiers_available", value);
        log_optional_primitive_value!(self.shared_subscriptions_available, f, "shared_subscriptions_available", value);
        write!(f, " }}")
    }
}
