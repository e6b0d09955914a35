/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use crate::decode::utils::*;
use crate::error::MqttResult;
use crate::mqtt::*;
use crate::mqtt::utils::*;

use std::fmt;

const PINGRESP_FIRST_BYTE : u8 = PACKET_TYPE_PINGRESP << 4;

pub(crate) fn encode_pingresp_packet(_: &PingrespPacket, _: ProtocolVersion, _: &mut Vec<u8>) -> MqttResult<u8> {
    Ok(PINGRESP_FIRST_BYTE)
}

pub(crate) fn decode_pingresp_packet(first_byte: u8, packet_body: &[u8]) -> MqttResult<PingrespPacket> {
    check_fixed_header_first_byte(first_byte, PINGRESP_FIRST_BYTE, PacketType::Pingresp)?;
    check_body_consumed(packet_body, PacketType::Pingresp)?;

    Ok(PingrespPacket {})
}

impl fmt::Display for PingrespPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PingrespPacket {{}}")
    }
}
