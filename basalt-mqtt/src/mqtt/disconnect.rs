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

const DISCONNECT_FIRST_BYTE : u8 = PACKET_TYPE_DISCONNECT << 4;

pub(crate) fn encode_disconnect_packet(packet: &DisconnectPacket, version: ProtocolVersion, dest: &mut Vec<u8>) -> MqttResult<u8> {
    if version == ProtocolVersion::Mqtt311 {
        return Ok(DISCONNECT_FIRST_BYTE);
    }

    validate_reason_code_outbound(packet.reason_code, DISCONNECT_REASON_CODES, PacketType::Disconnect)?;

    let mut property_section = Vec::new();
    encode_properties(&packet.properties, DISCONNECT_PROPERTIES, PacketType::Disconnect, &mut property_section)?;

    let has_properties = property_section.len() > 1;
    if packet.reason_code != ReasonCode::Success || has_properties {
        encode_u8(packet.reason_code as u8, dest);
    }

    if has_properties {
        dest.extend_from_slice(&property_section);
    }

    Ok(DISCONNECT_FIRST_BYTE)
}

pub(crate) fn decode_disconnect_packet(first_byte: u8, packet_body: &[u8], version: ProtocolVersion) -> MqttResult<DisconnectPacket> {
    check_fixed_header_first_byte(first_byte, DISCONNECT_FIRST_BYTE, PacketType::Disconnect)?;

    let mut packet = DisconnectPacket::default();
    if version == ProtocolVersion::Mqtt311 || packet_body.is_empty() {
        check_body_consumed(packet_body, PacketType::Disconnect)?;
        return Ok(packet);
    }

    let mut reason_code_byte = 0;
    let mutable_body = decode_u8(packet_body, &mut reason_code_byte)?;
    packet.reason_code = convert_u8_to_reason_code_inbound(reason_code_byte, DISCONNECT_REASON_CODES, PacketType::Disconnect)?;
    if mutable_body.is_empty() {
        return Ok(packet);
    }

    let (properties, remaining_body) = decode_properties(mutable_body, DISCONNECT_PROPERTIES, PacketType::Disconnect)?;
    check_body_consumed(remaining_body, PacketType::Disconnect)?;
    packet.properties = properties;

    Ok(packet)
}

impl fmt::Display for DisconnectPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "DisconnectPacket {{")?;
        log_enum!(self.reason_code, f, "reason_code", reason_code_to_str);
        log_properties!(self.properties, f);
        write!(f, " }}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::testing::*;
    use crate::encode::*;
    use crate::error::MqttError;
    use assert_matches::assert_matches;

    fn create_disconnect_with_all_properties() -> DisconnectPacket {
        DisconnectPacket {
            reason_code: ReasonCode::ServerMoved,
            properties: Properties {
                session_expiry_interval: Some(600),
                reason_string: Some("Maintenance".to_string()),
                server_reference: Some("other.example.com".to_string()),
                user_properties: vec!(UserProperty::new("disconnect", "now")),
                ..Default::default()
            },
        }
    }

    #[test]
    fn disconnect_round_trip_encode_decode_default() {
        let packet = DisconnectPacket::default();

        assert!(do_round_trip_encode_decode_test(&MqttPacket::Disconnect(packet.clone()), ProtocolVersion::Mqtt5));
        assert!(do_round_trip_encode_decode_test(&MqttPacket::Disconnect(packet), ProtocolVersion::Mqtt311));
    }

    #[test]
    fn disconnect_round_trip_encode_decode_reason_only() {
        let packet = DisconnectPacket {
            reason_code: ReasonCode::DisconnectWithWillMessage,
            ..Default::default()
        };

        assert!(do_round_trip_encode_decode_test(&MqttPacket::Disconnect(packet), ProtocolVersion::Mqtt5));
    }

    #[test]
    fn disconnect_round_trip_encode_decode_all_properties() {
        let packet = create_disconnect_with_all_properties();
        assert!(do_round_trip_encode_decode_test(&MqttPacket::Disconnect(packet), ProtocolVersion::Mqtt5));
    }

    #[test]
    fn disconnect_mqtt311_encoding_is_empty() {
        let packet = create_disconnect_with_all_properties();

        let encoding = encode_packet_for_test(&MqttPacket::Disconnect(packet), ProtocolVersion::Mqtt311);
        assert_eq!(vec!(0xE0u8, 0), encoding);
    }

    #[test]
    fn disconnect_encode_failure_invalid_reason_code() {
        let packet = MqttPacket::Disconnect(DisconnectPacket {
            reason_code: ReasonCode::GrantedQos2,
            ..Default::default()
        });

        assert_matches!(encode_packet(&packet, ProtocolVersion::Mqtt5, &EncodingContext::default()), Err(MqttError::InvalidArgument(_)));
    }

    #[test]
    fn disconnect_decode_failure_bad_fixed_header() {
        let packet = create_disconnect_with_all_properties();
        do_fixed_header_flag_decode_failure_test(&MqttPacket::Disconnect(packet), ProtocolVersion::Mqtt5, 0x03);
    }

    #[test]
    fn disconnect_decode_failure_bad_reason_code() {
        let packet = create_disconnect_with_all_properties();

        let corrupt_reason_code = | bytes: &[u8] | -> Vec<u8> {
            let mut clone = bytes.to_vec();
            clone[2] = 0x18;
            clone
        };

        let error = do_mutated_decode_failure_test(&MqttPacket::Disconnect(packet), ProtocolVersion::Mqtt5, corrupt_reason_code);
        assert_matches!(error, MqttError::ProtocolError(_));
    }

    #[test]
    fn disconnect_decode_failure_invalid_property() {
        let packet = create_disconnect_with_all_properties();

        let add_topic_alias = | bytes: &[u8] | -> Vec<u8> {
            let mut clone = bytes.to_vec();

            clone[1] += 3;
            clone[3] += 3;
            clone.push(PROPERTY_KEY_TOPIC_ALIAS);
            clone.push(0);
            clone.push(1);

            clone
        };

        let error = do_mutated_decode_failure_test(&MqttPacket::Disconnect(packet), ProtocolVersion::Mqtt5, add_topic_alias);
        assert_matches!(error, MqttError::ProtocolError(_));
    }

    #[test]
    fn disconnect_decode_failure_packet_size() {
        let packet = create_disconnect_with_all_properties();
        do_inbound_size_decode_failure_test(&MqttPacket::Disconnect(packet), ProtocolVersion::Mqtt5);
    }
}
