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

const UNSUBSCRIBE_FIRST_BYTE : u8 = (PACKET_TYPE_UNSUBSCRIBE << 4) | 0x02;

pub(crate) fn encode_unsubscribe_packet(packet: &UnsubscribePacket, version: ProtocolVersion, dest: &mut Vec<u8>) -> MqttResult<u8> {
    if packet.topic_filters.is_empty() {
        error!("UnsubscribePacket Encode - empty topic filter list");
        return Err(MqttError::new_invalid_argument("unsubscribe packets must contain at least one topic filter"));
    }

    validate_packet_id_outbound(packet.packet_id, PacketType::Unsubscribe)?;
    encode_u16(packet.packet_id, dest);

    if version == ProtocolVersion::Mqtt5 {
        encode_properties(&packet.properties, UNSUBSCRIBE_PROPERTIES, PacketType::Unsubscribe, dest)?;
    }

    for topic_filter in &packet.topic_filters {
        encode_length_prefixed_string(topic_filter, dest)?;
    }

    Ok(UNSUBSCRIBE_FIRST_BYTE)
}

pub(crate) fn decode_unsubscribe_packet(first_byte: u8, packet_body: &[u8], version: ProtocolVersion) -> MqttResult<UnsubscribePacket> {
    check_fixed_header_first_byte(first_byte, UNSUBSCRIBE_FIRST_BYTE, PacketType::Unsubscribe)?;

    let mut packet = UnsubscribePacket::default();
    let mut mutable_body = decode_u16(packet_body, &mut packet.packet_id)?;
    validate_packet_id_inbound(packet.packet_id, PacketType::Unsubscribe)?;

    if version == ProtocolVersion::Mqtt5 {
        let (properties, remaining_body) = decode_properties(mutable_body, UNSUBSCRIBE_PROPERTIES, PacketType::Unsubscribe)?;
        packet.properties = properties;
        mutable_body = remaining_body;
    }

    while !mutable_body.is_empty() {
        let mut topic_filter = String::new();
        mutable_body = decode_length_prefixed_string(mutable_body, &mut topic_filter)?;
        packet.topic_filters.push(topic_filter);
    }

    if packet.topic_filters.is_empty() {
        error!("UnsubscribePacket Decode - no topic filters");
        return Err(MqttError::new_protocol_error("unsubscribe packet contains no topic filters"));
    }

    Ok(packet)
}

impl fmt::Display for UnsubscribePacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "UnsubscribePacket {{")?;
        log_primitive_value!(self.packet_id, f, "packet_id");
        write!(f, " topic_filters: [")?;
        for (i, topic_filter) in self.topic_filters.iter().enumerate() {
            write!(f, " {}:\"{}\"", i, topic_filter)?;
        }
        write!(f, " ]")?;
        log_properties!(self.properties, f);
        write!(f, " }}")
    }
}
