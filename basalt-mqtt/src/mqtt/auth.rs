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

const AUTH_FIRST_BYTE : u8 = PACKET_TYPE_AUTH << 4;

pub(crate) fn encode_auth_packet(packet: &AuthPacket, version: ProtocolVersion, dest: &mut Vec<u8>) -> MqttResult<u8> {
    if version != ProtocolVersion::Mqtt5 {
        error!("AuthPacket Encode - auth packets are not part of MQTT 3.1.1");
        return Err(MqttError::new_invalid_argument("auth packets are only valid in MQTT5"));
    }

    validate_reason_code_outbound(packet.reason_code, AUTH_REASON_CODES, PacketType::Auth)?;

    let mut property_section = Vec::new();
    encode_properties(&packet.properties, AUTH_PROPERTIES, PacketType::Auth, &mut property_section)?;

    let has_properties = property_section.len() > 1;
    if packet.reason_code != ReasonCode::Success || has_properties {
        encode_u8(packet.reason_code as u8, dest);
    }

    if has_properties {
        dest.extend_from_slice(&property_section);
    }

    Ok(AUTH_FIRST_BYTE)
}

pub(crate) fn decode_auth_packet(first_byte: u8, packet_body: &[u8]) -> MqttResult<AuthPacket> {
    check_fixed_header_first_byte(first_byte, AUTH_FIRST_BYTE, PacketType::Auth)?;

    let mut packet = AuthPacket::default();
    if packet_body.is_empty() {
        return Ok(packet);
    }

    let mut reason_code_byte = 0;
    let mutable_body = decode_u8(packet_body, &mut reason_code_byte)?;
    packet.reason_code = convert_u8_to_reason_code_inbound(reason_code_byte, AUTH_REASON_CODES, PacketType::Auth)?;
    if mutable_body.is_empty() {
        return Ok(packet);
    }

    let (properties, remaining_body) = decode_properties(mutable_body, AUTH_PROPERTIES, PacketType::Auth)?;
    check_body_consumed(remaining_body, PacketType::Auth)?;
    packet.properties = properties;

    Ok(packet)
}

impl fmt::Display for AuthPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "AuthPacket {{")?;
        log_enum!(self.reason_code, f, "reason_code", reason_code_to_str);
        log_optional_string!(self.properties.authentication_method, f, "authentication_method", value);
        log_optional_binary_data_sensitive!(self.properties.authentication_data, f, "authentication_data");
        log_optional_string!(self.properties.reason_string, f, "reason_string", value);
        log_user_properties!(self.properties.user_properties, f, "user_properties");
        write!(f, " }}")
    }
}
