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

const SUBSCRIBE_FIRST_BYTE : u8 = (PACKET_TYPE_SUBSCRIBE << 4) | 0x02;

fn compute_subscription_options_byte(subscription: &Subscription, version: ProtocolVersion) -> u8 {
    let mut options_byte = subscription.qos as u8;

    if version == ProtocolVersion::Mqtt5 {
        if subscription.no_local {
            options_byte |= SUBSCRIPTION_OPTIONS_NO_LOCAL_MASK;
        }

        if subscription.retain_as_published {
            options_byte |= SUBSCRIPTION_OPTIONS_RETAIN_AS_PUBLISHED_MASK;
        }

        options_byte |= (subscription.retain_handling_type as u8) << SUBSCRIPTION_OPTIONS_RETAIN_HANDLING_SHIFT;
    }

    options_byte
}

pub(crate) fn encode_subscribe_packet(packet: &SubscribePacket, version: ProtocolVersion, dest: &mut Vec<u8>) -> MqttResult<u8> {
    if packet.subscriptions.is_empty() {
        error!("SubscribePacket Encode - empty subscription list");
        return Err(MqttError::new_invalid_argument("subscribe packets must contain at least one subscription"));
    }

    validate_packet_id_outbound(packet.packet_id, PacketType::Subscribe)?;
    encode_u16(packet.packet_id, dest);

    if version == ProtocolVersion::Mqtt5 {
        encode_properties(&packet.properties, SUBSCRIBE_PROPERTIES, PacketType::Subscribe, dest)?;
    }

    for subscription in &packet.subscriptions {
        encode_length_prefixed_string(&subscription.topic_filter, dest)?;
        encode_u8(compute_subscription_options_byte(subscription, version), dest);
    }

    Ok(SUBSCRIBE_FIRST_BYTE)
}

fn decode_subscription<'a>(bytes: &'a [u8], version: ProtocolVersion) -> MqttResult<(Subscription, &'a [u8])> {
    let mut subscription = Subscription::default();

    let mut mutable_bytes = decode_length_prefixed_string(bytes, &mut subscription.topic_filter)?;
    if subscription.topic_filter.is_empty() {
        error!("SubscribePacket Decode - empty topic filter");
        return Err(MqttError::new_protocol_error("empty subscription topic filter"));
    }

    let mut options_byte = 0;
    mutable_bytes = decode_u8(mutable_bytes, &mut options_byte)?;

    let reserved_mask = match version {
        ProtocolVersion::Mqtt5 => { SUBSCRIPTION_OPTIONS_RESERVED_MASK }
        ProtocolVersion::Mqtt311 => { !QOS_MASK }
    };

    if (options_byte & reserved_mask) != 0 {
        error!("SubscribePacket Decode - reserved subscription option bits set");
        return Err(MqttError::new_protocol_error("subscription options reserved bits set"));
    }

    subscription.qos = convert_u8_to_quality_of_service(options_byte & QOS_MASK)?;
    subscription.no_local = (options_byte & SUBSCRIPTION_OPTIONS_NO_LOCAL_MASK) != 0;
    subscription.retain_as_published = (options_byte & SUBSCRIPTION_OPTIONS_RETAIN_AS_PUBLISHED_MASK) != 0;
    subscription.retain_handling_type = convert_u8_to_retain_handling_type((options_byte >> SUBSCRIPTION_OPTIONS_RETAIN_HANDLING_SHIFT) & QOS_MASK)?;

    Ok((subscription, mutable_bytes))
}

pub(crate) fn decode_subscribe_packet(first_byte: u8, packet_body: &[u8], version: ProtocolVersion) -> MqttResult<SubscribePacket> {
    check_fixed_header_first_byte(first_byte, SUBSCRIBE_FIRST_BYTE, PacketType::Subscribe)?;

    let mut packet = SubscribePacket::default();
    let mut mutable_body = decode_u16(packet_body, &mut packet.packet_id)?;
    validate_packet_id_inbound(packet.packet_id, PacketType::Subscribe)?;

    if version == ProtocolVersion::Mqtt5 {
        let (properties, remaining_body) = decode_properties(mutable_body, SUBSCRIBE_PROPERTIES, PacketType::Subscribe)?;
        packet.properties = properties;
        mutable_body = remaining_body;
    }

    while !mutable_body.is_empty() {
        let (subscription, remaining_body) = decode_subscription(mutable_body, version)?;
        packet.subscriptions.push(subscription);
        mutable_body = remaining_body;
    }

    if packet.subscriptions.is_empty() {
        error!("SubscribePacket Decode - no subscriptions");
        return Err(MqttError::new_protocol_error("subscribe packet contains no subscriptions"));
    }

    Ok(packet)
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{")?;
        log_string!(self.topic_filter, f, "topic_filter");
        log_enum!(self.qos, f, "qos", quality_of_service_to_str);
        log_primitive_value!(self.no_local, f, "no_local");
        log_primitive_value!(self.retain_as_published, f, "retain_as_published");
        log_enum!(self.retain_handling_type, f, "retain_handling_type", retain_handling_type_to_str);
        write!(f, " }}")
    }
}

impl fmt::Display for SubscribePacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SubscribePacket {{")?;
        log_primitive_value!(self.packet_id, f, "packet_id");
        write!(f, " subscriptions: [")?;
        for (i, subscription) in self.subscriptions.iter().enumerate() {
            write!(f, " {}:{}", i, subscription)?;
        }
        write!(f, " ]")?;
        log_properties!(self.properties, f);
        write!(f, " }}")
    }
}
