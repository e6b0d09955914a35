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

const CONNACK_FIRST_BYTE : u8 = PACKET_TYPE_CONNACK << 4;

pub(crate) fn encode_connack_packet(packet: &ConnackPacket, version: ProtocolVersion, dest: &mut Vec<u8>) -> MqttResult<u8> {
    if packet.session_present && !packet.reason_code.is_success() {
        error!("ConnackPacket Encode - session present set on a failing connack");
        return Err(MqttError::new_invalid_argument("session present must be false when the connection is rejected"));
    }

    let flags = if packet.session_present { CONNACK_PACKET_SESSION_PRESENT_FLAG_MASK } else { 0 };
    encode_u8(flags, dest);

    match version {
        ProtocolVersion::Mqtt5 => {
            validate_reason_code_outbound(packet.reason_code, CONNACK_REASON_CODES, PacketType::Connack)?;
            encode_u8(packet.reason_code as u8, dest);
            encode_properties(&packet.properties, CONNACK_PROPERTIES, PacketType::Connack, dest)?;
        }
        ProtocolVersion::Mqtt311 => {
            encode_u8(connack_reason_code_to_return_code_311(packet.reason_code)?, dest);
        }
    }

    Ok(CONNACK_FIRST_BYTE)
}

pub(crate) fn decode_connack_packet(first_byte: u8, packet_body: &[u8], version: ProtocolVersion) -> MqttResult<ConnackPacket> {
    check_fixed_header_first_byte(first_byte, CONNACK_FIRST_BYTE, PacketType::Connack)?;

    let mut packet = ConnackPacket::default();

    let mut flags = 0;
    let mut mutable_body = decode_u8(packet_body, &mut flags)?;
    if (flags & !CONNACK_PACKET_SESSION_PRESENT_FLAG_MASK) != 0 {
        error!("ConnackPacket Decode - reserved flag bits set");
        return Err(MqttError::new_protocol_error("connack reserved flags set"));
    }
    packet.session_present = flags != 0;

    let mut reason_code_byte = 0;
    mutable_body = decode_u8(mutable_body, &mut reason_code_byte)?;

    match version {
        ProtocolVersion::Mqtt5 => {
            packet.reason_code = convert_u8_to_reason_code_inbound(reason_code_byte, CONNACK_REASON_CODES, PacketType::Connack)?;

            let (properties, remaining_body) = decode_properties(mutable_body, CONNACK_PROPERTIES, PacketType::Connack)?;
            packet.properties = properties;
            mutable_body = remaining_body;
        }
        ProtocolVersion::Mqtt311 => {
            packet.reason_code = convert_connack_return_code_311(reason_code_byte)?;
        }
    }

    check_body_consumed(mutable_body, PacketType::Connack)?;

    if packet.session_present && !packet.reason_code.is_success() {
        error!("ConnackPacket Decode - session present set on a failing connack");
        return Err(MqttError::new_protocol_error("connack rejected the connection but reported a session"));
    }

    Ok(packet)
}

impl fmt::Display for ConnackPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ConnackPacket {{")?;
        log_primitive_value!(self.session_present, f, "session_present");
        log_enum!(self.reason_code, f, "reason_code", reason_code_to_str);
        log_properties!(self.properties, f);
        write!(f, " }}")
    }
}
