/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use crate::decode::utils::*;
use crate::encode::utils::*;
use crate::error::MqttResult;
use crate::logging::*;
use crate::mqtt::*;
use crate::mqtt::properties::*;
use crate::mqtt::utils::*;

use std::fmt;

const UNSUBACK_FIRST_BYTE : u8 = PACKET_TYPE_UNSUBACK << 4;

pub(crate) fn encode_unsuback_packet(packet: &UnsubackPacket, version: ProtocolVersion, dest: &mut Vec<u8>) -> MqttResult<u8> {
    validate_packet_id_outbound(packet.packet_id, PacketType::Unsuback)?;
    encode_u16(packet.packet_id, dest);

    if version == ProtocolVersion::Mqtt5 {
        encode_properties(&packet.properties, ACK_PROPERTIES, PacketType::Unsuback, dest)?;
        for reason_code in &packet.reason_codes {
            validate_reason_code_outbound(*reason_code, UNSUBACK_REASON_CODES, PacketType::Unsuback)?;
            encode_u8(*reason_code as u8, dest);
        }
    }

    Ok(UNSUBACK_FIRST_BYTE)
}

/// MQTT 3.1.1 Unsubacks carry nothing beyond the packet id; the decoded packet has no reason codes.
pub(crate) fn decode_unsuback_packet(first_byte: u8, packet_body: &[u8], version: ProtocolVersion) -> MqttResult<UnsubackPacket> {
    check_fixed_header_first_byte(first_byte, UNSUBACK_FIRST_BYTE, PacketType::Unsuback)?;

    let mut packet = UnsubackPacket::default();
    let mut mutable_body = decode_u16(packet_body, &mut packet.packet_id)?;
    validate_packet_id_inbound(packet.packet_id, PacketType::Unsuback)?;

    if version == ProtocolVersion::Mqtt311 {
        check_body_consumed(mutable_body, PacketType::Unsuback)?;
        return Ok(packet);
    }

    let (properties, remaining_body) = decode_properties(mutable_body, ACK_PROPERTIES, PacketType::Unsuback)?;
    packet.properties = properties;
    mutable_body = remaining_body;

    packet.reason_codes.reserve(mutable_body.len());
    for reason_code_byte in mutable_body {
        packet.reason_codes.push(convert_u8_to_reason_code_inbound(*reason_code_byte, UNSUBACK_REASON_CODES, PacketType::Unsuback)?);
    }

    Ok(packet)
}

impl fmt::Display for UnsubackPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "UnsubackPacket {{")?;
        log_primitive_value!(self.packet_id, f, "packet_id");
        if !self.reason_codes.is_empty() {
            write!(f, " reason_codes: [")?;
            for (i, reason_code) in self.reason_codes.iter().enumerate() {
                write!(f, " {}:{}", i, reason_code_to_str(*reason_code))?;
            }
            write!(f, " ]")?;
        }
        log_properties!(self.properties, f);
        write!(f, " }}")
    }
}
