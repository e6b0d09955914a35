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

const SUBACK_FIRST_BYTE : u8 = PACKET_TYPE_SUBACK << 4;

pub(crate) fn encode_suback_packet(packet: &SubackPacket, version: ProtocolVersion, dest: &mut Vec<u8>) -> MqttResult<u8> {
    validate_packet_id_outbound(packet.packet_id, PacketType::Suback)?;
    encode_u16(packet.packet_id, dest);

    match version {
        ProtocolVersion::Mqtt5 => {
            encode_properties(&packet.properties, ACK_PROPERTIES, PacketType::Suback, dest)?;
            for reason_code in &packet.reason_codes {
                validate_reason_code_outbound(*reason_code, SUBACK_REASON_CODES, PacketType::Suback)?;
                encode_u8(*reason_code as u8, dest);
            }
        }
        ProtocolVersion::Mqtt311 => {
            for reason_code in &packet.reason_codes {
                encode_u8(suback_reason_code_to_return_code_311(*reason_code)?, dest);
            }
        }
    }

    Ok(SUBACK_FIRST_BYTE)
}

pub(crate) fn decode_suback_packet(first_byte: u8, packet_body: &[u8], version: ProtocolVersion) -> MqttResult<SubackPacket> {
    check_fixed_header_first_byte(first_byte, SUBACK_FIRST_BYTE, PacketType::Suback)?;

    let mut packet = SubackPacket::default();
    let mut mutable_body = decode_u16(packet_body, &mut packet.packet_id)?;
    validate_packet_id_inbound(packet.packet_id, PacketType::Suback)?;

    if version == ProtocolVersion::Mqtt5 {
        let (properties, remaining_body) = decode_properties(mutable_body, ACK_PROPERTIES, PacketType::Suback)?;
        packet.properties = properties;
        mutable_body = remaining_body;
    }

    if mutable_body.is_empty() {
        error!("SubackPacket Decode - no reason codes");
        return Err(MqttError::new_protocol_error("suback contains no reason codes"));
    }

    packet.reason_codes.reserve(mutable_body.len());
    for reason_code_byte in mutable_body {
        let reason_code = match version {
            ProtocolVersion::Mqtt5 => { convert_u8_to_reason_code_inbound(*reason_code_byte, SUBACK_REASON_CODES, PacketType::Suback)? }
            ProtocolVersion::Mqtt311 => { convert_suback_return_code_311(*reason_code_byte)? }
        };

        packet.reason_codes.push(reason_code);
    }

    Ok(packet)
}

impl fmt::Display for SubackPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SubackPacket {{")?;
        log_primitive_value!(self.packet_id, f, "packet_id");
        write!(f, " reason_codes: [")?;
        for (i, reason_code) in self.reason_codes.iter().enumerate() {
            write!(f, " {}:{}", i, reason_code_to_str(*reason_code))?;
        }
        write!(f, " ]")?;
        log_properties!(self.properties, f);
        write!(f, " }}")
    }
}
