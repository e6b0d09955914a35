/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use crate::decode::utils::*;
use crate::error::MqttResult;
use crate::mqtt::*;
use crate::mqtt::utils::*;

use std::fmt;

const PINGREQ_FIRST_BYTE : u8 = PACKET_TYPE_PINGREQ << 4;

pub(crate) fn encode_pingreq_packet(_: &PingreqPacket, _: ProtocolVersion, _: &mut Vec<u8>) -> MqttResult<u8> {
    Ok(PINGREQ_FIRST_BYTE)
}

pub(crate) fn decode_pingreq_packet(first_byte: u8, packet_body: &[u8]) -> MqttResult<PingreqPacket> {
    check_fixed_header_first_byte(first_byte, PINGREQ_FIRST_BYTE, PacketType::Pingreq)?;
    check_body_consumed(packet_body, PacketType::Pingreq)?;

    Ok(PingreqPacket {})
}

impl fmt::Display for PingreqPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PingreqPacket {{}}")
    }
}
