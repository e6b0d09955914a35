/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use crate::decode::utils::*;
use crate::encode::utils::*;
use crate::error::{MqttError, MqttResult};
use crate::logging::*;
use crate::mqtt::*;
use crate::mqtt::properties::*;
use crate::mqtt::utils::*;

use log::*;
use std::fmt;

const CONNECT_FIRST_BYTE : u8 = PACKET_TYPE_CONNECT << 4;

fn compute_connect_flags(packet: &ConnectPacket) -> u8 {
    let mut flags: u8 = 0;
    if packet.clean_start {
        flags |= CONNECT_PACKET_CLEAN_START_FLAG_MASK;
    }

    if let Some(will) = &packet.will {
        flags |= CONNECT_PACKET_HAS_WILL_FLAG_MASK;
        flags |= (will.qos as u8) << CONNECT_PACKET_WILL_QOS_FLAG_SHIFT;
        if will.retain {
            flags |= CONNECT_PACKET_WILL_RETAIN_FLAG_MASK;
        }
    }

    if packet.password.is_some() {
        flags |= CONNECT_PACKET_HAS_PASSWORD_FLAG_MASK;
    }

    if packet.username.is_some() {
        flags |= CONNECT_PACKET_HAS_USERNAME_FLAG_MASK;
    }

    flags
}

pub(crate) fn encode_connect_packet(packet: &ConnectPacket, version: ProtocolVersion, dest: &mut Vec<u8>) -> MqttResult<u8> {
    if version == ProtocolVersion::Mqtt311 && packet.password.is_some() && packet.username.is_none() {
        error!("ConnectPacket Encode - MQTT311 does not allow a password without a username");
        return Err(MqttError::new_invalid_argument("password set without a username"));
    }

    encode_length_prefixed_string(MQTT_PROTOCOL_NAME, dest)?;
    encode_u8(version as u8, dest);
    encode_u8(compute_connect_flags(packet), dest);
    encode_u16(packet.keep_alive_interval_seconds, dest);

    if version == ProtocolVersion::Mqtt5 {
        encode_properties(&packet.properties, CONNECT_PROPERTIES, PacketType::Connect, dest)?;
    }

    encode_length_prefixed_string(&packet.client_id, dest)?;

    if let Some(will) = &packet.will {
        if version == ProtocolVersion::Mqtt5 {
            encode_properties(&will.properties, WILL_PROPERTIES, PacketType::Connect, dest)?;
        }

        encode_length_prefixed_string(&will.topic, dest)?;
        encode_length_prefixed_bytes(&will.payload, dest)?;
    }

    if let Some(username) = &packet.username {
        encode_length_prefixed_string(username, dest)?;
    }

    if let Some(password) = &packet.password {
        encode_length_prefixed_bytes(password, dest)?;
    }

    Ok(CONNECT_FIRST_BYTE)
}

fn decode_protocol_version(level: u8) -> MqttResult<ProtocolVersion> {
    match level {
        4 => { Ok(ProtocolVersion::Mqtt311) }
        5 => { Ok(ProtocolVersion::Mqtt5) }
        _ => {
            let message = format!("ConnectPacket Decode - unsupported protocol level ({})", level);
            error!("{}", message);
            Err(MqttError::new_protocol_error(message))
        }
    }
}

/// The protocol version is read from the packet itself, so a server can decode a Connect before
/// it knows which version the client speaks.
pub(crate) fn decode_connect_packet(first_byte: u8, packet_body: &[u8]) -> MqttResult<ConnectPacket> {
    check_fixed_header_first_byte(first_byte, CONNECT_FIRST_BYTE, PacketType::Connect)?;

    let mut packet = ConnectPacket::default();

    let mut protocol_name = String::new();
    let mut mutable_body = decode_length_prefixed_string(packet_body, &mut protocol_name)?;
    if protocol_name != MQTT_PROTOCOL_NAME {
        error!("ConnectPacket Decode - invalid protocol name");
        return Err(MqttError::new_protocol_error("connect protocol name is not MQTT"));
    }

    let mut level = 0;
    mutable_body = decode_u8(mutable_body, &mut level)?;
    let version = decode_protocol_version(level)?;

    let mut flags = 0;
    mutable_body = decode_u8(mutable_body, &mut flags)?;
    if (flags & CONNECT_PACKET_RESERVED_FLAG_MASK) != 0 {
        error!("ConnectPacket Decode - reserved flag bit set");
        return Err(MqttError::new_protocol_error("connect reserved flag set"));
    }

    packet.clean_start = (flags & CONNECT_PACKET_CLEAN_START_FLAG_MASK) != 0;
    let has_will = (flags & CONNECT_PACKET_HAS_WILL_FLAG_MASK) != 0;
    let will_retain = (flags & CONNECT_PACKET_WILL_RETAIN_FLAG_MASK) != 0;
    let will_qos = convert_u8_to_quality_of_service((flags >> CONNECT_PACKET_WILL_QOS_FLAG_SHIFT) & QOS_MASK)?;
    let has_username = (flags & CONNECT_PACKET_HAS_USERNAME_FLAG_MASK) != 0;
    let has_password = (flags & CONNECT_PACKET_HAS_PASSWORD_FLAG_MASK) != 0;

    if !has_will && (will_retain || will_qos != QualityOfService::AtMostOnce) {
        error!("ConnectPacket Decode - will flags set without a will");
        return Err(MqttError::new_protocol_error("connect will qos or retain set without a will"));
    }

    if version == ProtocolVersion::Mqtt311 && has_password && !has_username {
        error!("ConnectPacket Decode - MQTT311 password without a username");
        return Err(MqttError::new_protocol_error("connect password flag set without the username flag"));
    }

    mutable_body = decode_u16(mutable_body, &mut packet.keep_alive_interval_seconds)?;

    if version == ProtocolVersion::Mqtt5 {
        let (properties, remaining_body) = decode_properties(mutable_body, CONNECT_PROPERTIES, PacketType::Connect)?;
        packet.properties = properties;
        mutable_body = remaining_body;
    }

    mutable_body = decode_length_prefixed_string(mutable_body, &mut packet.client_id)?;

    if has_will {
        let mut will = PublishPacket {
            qos: will_qos,
            retain: will_retain,
            ..Default::default()
        };

        if version == ProtocolVersion::Mqtt5 {
            let (properties, remaining_body) = decode_properties(mutable_body, WILL_PROPERTIES, PacketType::Connect)?;
            will.properties = properties;
            mutable_body = remaining_body;
        }

        mutable_body = decode_length_prefixed_string(mutable_body, &mut will.topic)?;
        mutable_body = decode_length_prefixed_bytes(mutable_body, &mut will.payload)?;

        packet.will = Some(will);
    }

    if has_username {
        mutable_body = decode_optional_length_prefixed_string(mutable_body, &mut packet.username)?;
    }

    if has_password {
        mutable_body = decode_optional_length_prefixed_bytes(mutable_body, &mut packet.password)?;
    }

    check_body_consumed(mutable_body, PacketType::Connect)?;

    Ok(packet)
}

impl fmt::Display for ConnectPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ConnectPacket {{")?;
        log_primitive_value!(self.keep_alive_interval_seconds, f, "keep_alive_interval_seconds");
        log_primitive_value!(self.clean_start, f, "clean_start");
        log_string!(self.client_id, f, "client_id");
        log_optional_string!(self.username, f, "username", value);
        log_optional_binary_data_sensitive!(self.password, f, "password");
        if let Some(will) = &self.will {
            write!(f, " will:{}", will)?;
        }
        log_properties!(self.properties, f);
        write!(f, " }}")
    }
}
