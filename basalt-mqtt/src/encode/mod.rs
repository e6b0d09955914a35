/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

pub(crate) mod utils;

use crate::alias::OutboundAliasResolution;
use crate::encode::utils::*;
use crate::error::{MqttError, MqttResult};
use crate::logging::*;
use crate::mqtt::*;
use crate::mqtt::auth::*;
use crate::mqtt::connack::*;
use crate::mqtt::connect::*;
use crate::mqtt::disconnect::*;
use crate::mqtt::pingreq::*;
use crate::mqtt::pingresp::*;
use crate::mqtt::puback::*;
use crate::mqtt::pubcomp::*;
use crate::mqtt::publish::*;
use crate::mqtt::pubrec::*;
use crate::mqtt::pubrel::*;
use crate::mqtt::suback::*;
use crate::mqtt::subscribe::*;
use crate::mqtt::unsuback::*;
use crate::mqtt::unsubscribe::*;
use crate::mqtt::utils::MAXIMUM_VARIABLE_LENGTH_INTEGER;

use log::*;

/// Per-packet encoding inputs that are not part of the packet itself
#[derive(Default)]
pub(crate) struct EncodingContext {
    pub(crate) outbound_alias_resolution: OutboundAliasResolution,
}

macro_rules! define_ack_packet_encode_function {
    ($function_name: ident, $packet_type: ident, $packet_type_enum: expr, $first_byte: expr, $valid_reason_codes: expr) => {
        pub(crate) fn $function_name(packet: &$packet_type, version: ProtocolVersion, dest: &mut Vec<u8>) -> MqttResult<u8> {
            validate_packet_id_outbound(packet.packet_id, $packet_type_enum)?;
            encode_u16(packet.packet_id, dest);

            if version == ProtocolVersion::Mqtt5 {
                validate_reason_code_outbound(packet.reason_code, $valid_reason_codes, $packet_type_enum)?;

                let mut property_section = Vec::new();
                encode_properties(&packet.properties, ACK_PROPERTIES, $packet_type_enum, &mut property_section)?;

                /* success with no properties may be shortened to just the packet id */
                let has_properties = property_section.len() > 1;
                if packet.reason_code != ReasonCode::Success || has_properties {
                    encode_u8(packet.reason_code as u8, dest);
                }

                if has_properties {
                    dest.extend_from_slice(&property_section);
                }
            }

            Ok($first_byte)
        }
    };
}

pub(crate) use define_ack_packet_encode_function;

fn assemble_packet(first_byte: u8, body: Vec<u8>) -> MqttResult<Vec<u8>> {
    if body.len() > MAXIMUM_VARIABLE_LENGTH_INTEGER {
        let packet_size = 1 + 4 + body.len();
        error!("assemble_packet - packet body of {} bytes exceeds the maximum remaining length", body.len());
        return Err(MqttError::new_packet_too_large(packet_size, MAXIMUM_VARIABLE_LENGTH_INTEGER + 5));
    }

    let mut encoding = Vec::with_capacity(body.len() + 5);
    encode_u8(first_byte, &mut encoding);
    encode_vli(body.len() as u32, &mut encoding)?;
    encoding.extend_from_slice(&body);

    Ok(encoding)
}

/// Encodes a packet, fixed header included, for the given protocol version.
///
/// MQTT5-only content (reason codes, properties) is dropped when encoding for MQTT 3.1.1.  Invalid
/// packet content fails with an invalid argument error.
pub(crate) fn encode_packet(mqtt_packet: &MqttPacket, version: ProtocolVersion, context: &EncodingContext) -> MqttResult<Vec<u8>> {
    log_packet("Encoding packet: ", mqtt_packet);

    let mut body = Vec::new();
    let first_byte = match mqtt_packet {
        MqttPacket::Connect(packet) => { encode_connect_packet(packet, version, &mut body)? }
        MqttPacket::Connack(packet) => { encode_connack_packet(packet, version, &mut body)? }
        MqttPacket::Publish(packet) => { encode_publish_packet(packet, version, context, &mut body)? }
        MqttPacket::Puback(packet) => { encode_puback_packet(packet, version, &mut body)? }
        MqttPacket::Pubrec(packet) => { encode_pubrec_packet(packet, version, &mut body)? }
        MqttPacket::Pubrel(packet) => { encode_pubrel_packet(packet, version, &mut body)? }
        MqttPacket::Pubcomp(packet) => { encode_pubcomp_packet(packet, version, &mut body)? }
        MqttPacket::Subscribe(packet) => { encode_subscribe_packet(packet, version, &mut body)? }
        MqttPacket::Suback(packet) => { encode_suback_packet(packet, version, &mut body)? }
        MqttPacket::Unsubscribe(packet) => { encode_unsubscribe_packet(packet, version, &mut body)? }
        MqttPacket::Unsuback(packet) => { encode_unsuback_packet(packet, version, &mut body)? }
        MqttPacket::Pingreq(packet) => { encode_pingreq_packet(packet, version, &mut body)? }
        MqttPacket::Pingresp(packet) => { encode_pingresp_packet(packet, version, &mut body)? }
        MqttPacket::Disconnect(packet) => { encode_disconnect_packet(packet, version, &mut body)? }
        MqttPacket::Auth(packet) => { encode_auth_packet(packet, version, &mut body)? }
    };

    assemble_packet(first_byte, body)
}

/// Encodes a complete packet for `version` without any topic alias substitution.
///
/// Intended for callers that drive the codec directly, such as a broker writing server-direction
/// packets.
pub fn encode_mqtt_packet(mqtt_packet: &MqttPacket, version: ProtocolVersion) -> MqttResult<Vec<u8>> {
    encode_packet(mqtt_packet, version, &EncodingContext::default())
}
