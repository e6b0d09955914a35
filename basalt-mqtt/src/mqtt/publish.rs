/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use crate::decode::utils::*;
use crate::encode::*;
use crate::encode::utils::*;
use crate::error::{MqttError, MqttResult};
use crate::logging::*;
use crate::mqtt::*;
use crate::mqtt::properties::*;
use crate::mqtt::utils::*;

use log::*;
use std::borrow::Cow;
use std::fmt;

/*
 * Fixed Header
 * byte 1:
 *  bits 4-7: MQTT Control Packet Type
 *  bit 3: DUP flag
 *  bit 1-2: QoS level
 *  bit 0: RETAIN
 */
fn compute_publish_fixed_header_first_byte(packet: &PublishPacket) -> u8 {
    let mut first_byte: u8 = PACKET_TYPE_PUBLISH << 4;

    if packet.duplicate {
        first_byte |= PUBLISH_PACKET_FIXED_HEADER_DUPLICATE_FLAG;
    }

    first_byte |= (packet.qos as u8) << 1;

    if packet.retain {
        first_byte |= PUBLISH_PACKET_FIXED_HEADER_RETAIN_FLAG;
    }

    first_byte
}

pub(crate) fn encode_publish_packet(packet: &PublishPacket, version: ProtocolVersion, context: &EncodingContext, dest: &mut Vec<u8>) -> MqttResult<u8> {
    if packet.duplicate && packet.qos == QualityOfService::AtMostOnce {
        error!("PublishPacket Encode - duplicate flag set on a QoS 0 publish");
        return Err(MqttError::new_invalid_argument("qos 0 publishes cannot be duplicates"));
    }

    let resolution = &context.outbound_alias_resolution;
    let apply_alias = version == ProtocolVersion::Mqtt5 && resolution.alias.is_some();

    if apply_alias && resolution.skip_topic {
        // an existing alias binding stands in for the topic
        encode_u16(0, dest);
    } else {
        encode_length_prefixed_string(&packet.topic, dest)?;
    }

    if packet.qos != QualityOfService::AtMostOnce {
        validate_packet_id_outbound(packet.packet_id, PacketType::Publish)?;
        encode_u16(packet.packet_id, dest);
    }

    if version == ProtocolVersion::Mqtt5 {
        let properties = if apply_alias {
            let mut aliased_properties = packet.properties.clone();
            aliased_properties.topic_alias = resolution.alias;
            Cow::Owned(aliased_properties)
        } else {
            Cow::Borrowed(&packet.properties)
        };

        encode_properties(&properties, PUBLISH_PROPERTIES, PacketType::Publish, dest)?;
    }

    dest.extend_from_slice(&packet.payload);

    Ok(compute_publish_fixed_header_first_byte(packet))
}

pub(crate) fn decode_publish_packet(first_byte: u8, packet_body: &[u8], version: ProtocolVersion) -> MqttResult<PublishPacket> {
    if (first_byte >> 4) != PACKET_TYPE_PUBLISH {
        error!("PublishPacket Decode - invalid first byte");
        return Err(MqttError::new_malformed_packet("packet type is not publish"));
    }

    let mut packet = PublishPacket {
        duplicate: (first_byte & PUBLISH_PACKET_FIXED_HEADER_DUPLICATE_FLAG) != 0,
        retain: (first_byte & PUBLISH_PACKET_FIXED_HEADER_RETAIN_FLAG) != 0,
        ..Default::default()
    };

    let qos_bits = (first_byte >> 1) & QOS_MASK;
    if qos_bits == QOS_MASK {
        error!("PublishPacket Decode - qos bits both set");
        return Err(MqttError::new_malformed_packet("invalid qos in publish fixed header"));
    }
    packet.qos = convert_u8_to_quality_of_service(qos_bits)?;

    if packet.duplicate && packet.qos == QualityOfService::AtMostOnce {
        error!("PublishPacket Decode - duplicate flag set on a QoS 0 publish");
        return Err(MqttError::new_protocol_error("qos 0 publish with the duplicate flag set"));
    }

    let mut mutable_body = decode_length_prefixed_string(packet_body, &mut packet.topic)?;
    if packet.topic.contains(['#', '+']) {
        error!("PublishPacket Decode - wildcard in topic");
        return Err(MqttError::new_protocol_error("publish topic contains a wildcard"));
    }

    if packet.qos != QualityOfService::AtMostOnce {
        mutable_body = decode_u16(mutable_body, &mut packet.packet_id)?;
        validate_packet_id_inbound(packet.packet_id, PacketType::Publish)?;
    }

    match version {
        ProtocolVersion::Mqtt5 => {
            let (properties, remaining_body) = decode_properties(mutable_body, PUBLISH_PROPERTIES, PacketType::Publish)?;
            packet.properties = properties;
            mutable_body = remaining_body;
        }
        ProtocolVersion::Mqtt311 => {
            if packet.topic.is_empty() {
                error!("PublishPacket Decode - empty topic");
                return Err(MqttError::new_protocol_error("empty publish topic"));
            }
        }
    }

    packet.payload = mutable_body.to_vec();

    Ok(packet)
}

impl fmt::Display for PublishPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PublishPacket {{")?;
        log_string!(self.topic, f, "topic");
        log_enum!(self.qos, f, "qos", quality_of_service_to_str);
        if self.qos != QualityOfService::AtMostOnce {
            log_primitive_value!(self.packet_id, f, "packet_id");
        }
        log_primitive_value!(self.retain, f, "retain");
        log_primitive_value!(self.duplicate, f, "duplicate");
        write!(f, " payload:<{} Bytes>", self.payload.len())?;
        log_properties!(self.properties, f);
        write!(f, " }}")
    }
}
