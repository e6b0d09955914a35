/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
Packet decoding: the per-packet-type dispatcher and the incremental frame assembler that turns an
arbitrarily chunked byte stream into complete packets.
 */

pub(crate) mod utils;

use crate::decode::utils::*;
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
use crate::mqtt::utils::*;

use log::*;

const DECODE_BUFFER_DEFAULT_SIZE : usize = 16 * 1024;

macro_rules! define_ack_packet_decode_function {
    ($function_name: ident, $packet_type: ident, $packet_type_enum: expr, $first_byte: expr, $valid_reason_codes: expr) => {
        pub(crate) fn $function_name(first_byte: u8, packet_body: &[u8], version: ProtocolVersion) -> MqttResult<$packet_type> {
            check_fixed_header_first_byte(first_byte, $first_byte, $packet_type_enum)?;

            let mut packet = $packet_type::default();
            let mut mutable_body = decode_u16(packet_body, &mut packet.packet_id)?;
            validate_packet_id_inbound(packet.packet_id, $packet_type_enum)?;

            /* a bare packet id is shorthand for success with no properties */
            if version == ProtocolVersion::Mqtt311 || mutable_body.is_empty() {
                check_body_consumed(mutable_body, $packet_type_enum)?;
                return Ok(packet);
            }

            let mut reason_code_byte = 0;
            mutable_body = decode_u8(mutable_body, &mut reason_code_byte)?;
            packet.reason_code = convert_u8_to_reason_code_inbound(reason_code_byte, $valid_reason_codes, $packet_type_enum)?;
            if mutable_body.is_empty() {
                return Ok(packet);
            }

            let (properties, remaining_body) = decode_properties(mutable_body, ACK_PROPERTIES, $packet_type_enum)?;
            check_body_consumed(remaining_body, $packet_type_enum)?;
            packet.properties = properties;

            Ok(packet)
        }
    };
}

pub(crate) use define_ack_packet_decode_function;

/// Decodes a single packet from its fixed header first byte and its body (everything after the
/// remaining length field).
pub(crate) fn decode_packet(first_byte: u8, packet_body: &[u8], version: ProtocolVersion) -> MqttResult<MqttPacket> {
    let packet_type = first_byte >> 4;

    debug!("Decoding a packet of type {}", packet_type_to_str(packet_type));

    match packet_type {
        PACKET_TYPE_CONNECT => { Ok(MqttPacket::Connect(decode_connect_packet(first_byte, packet_body)?)) }
        PACKET_TYPE_CONNACK => { Ok(MqttPacket::Connack(decode_connack_packet(first_byte, packet_body, version)?)) }
        PACKET_TYPE_PUBLISH => { Ok(MqttPacket::Publish(decode_publish_packet(first_byte, packet_body, version)?)) }
        PACKET_TYPE_PUBACK => { Ok(MqttPacket::Puback(decode_puback_packet(first_byte, packet_body, version)?)) }
        PACKET_TYPE_PUBREC => { Ok(MqttPacket::Pubrec(decode_pubrec_packet(first_byte, packet_body, version)?)) }
        PACKET_TYPE_PUBREL => { Ok(MqttPacket::Pubrel(decode_pubrel_packet(first_byte, packet_body, version)?)) }
        PACKET_TYPE_PUBCOMP => { Ok(MqttPacket::Pubcomp(decode_pubcomp_packet(first_byte, packet_body, version)?)) }
        PACKET_TYPE_SUBSCRIBE => { Ok(MqttPacket::Subscribe(decode_subscribe_packet(first_byte, packet_body, version)?)) }
        PACKET_TYPE_SUBACK => { Ok(MqttPacket::Suback(decode_suback_packet(first_byte, packet_body, version)?)) }
        PACKET_TYPE_UNSUBSCRIBE => { Ok(MqttPacket::Unsubscribe(decode_unsubscribe_packet(first_byte, packet_body, version)?)) }
        PACKET_TYPE_UNSUBACK => { Ok(MqttPacket::Unsuback(decode_unsuback_packet(first_byte, packet_body, version)?)) }
        PACKET_TYPE_PINGREQ => { Ok(MqttPacket::Pingreq(decode_pingreq_packet(first_byte, packet_body)?)) }
        PACKET_TYPE_PINGRESP => { Ok(MqttPacket::Pingresp(decode_pingresp_packet(first_byte, packet_body)?)) }
        PACKET_TYPE_DISCONNECT => { Ok(MqttPacket::Disconnect(decode_disconnect_packet(first_byte, packet_body, version)?)) }
        PACKET_TYPE_AUTH => {
            if version != ProtocolVersion::Mqtt5 {
                let message = "decode_packet - Auth packets are not valid in MQTT311";
                error!("{}", message);
                return Err(MqttError::new_protocol_error(message));
            }

            Ok(MqttPacket::Auth(decode_auth_packet(first_byte, packet_body)?))
        }
        _ => {
            let message = format!("decode_packet - invalid packet type ({})", packet_type);
            error!("{}", message);
            Err(MqttError::new_malformed_packet(message))
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum AssemblerState {
    ReadPacketType,
    ReadTotalRemainingLength,
    ReadPacketBody,
    TerminalError
}

/// Reassembles complete MQTT packets from a transport byte stream.
///
/// Bytes may arrive in any chunking.  Packets whose total size exceeds the configured maximum are
/// rejected as soon as their fixed header is read.  The first decode failure is reported once and
/// leaves the assembler in a terminal state; the connection must be torn down.
pub struct FrameAssembler {
    protocol_version: ProtocolVersion,

    maximum_packet_size: usize,

    state: AssemblerState,

    buffer: Vec<u8>,

    position: usize,

    first_byte: u8,

    remaining_length: usize,
}

impl FrameAssembler {

    /// Creates a new assembler for a connection speaking `protocol_version` that accepts packets
    /// of at most `maximum_packet_size` bytes, fixed header included.
    pub fn new(protocol_version: ProtocolVersion, maximum_packet_size: usize) -> FrameAssembler {
        FrameAssembler {
            protocol_version,
            maximum_packet_size,
            state: AssemblerState::ReadPacketType,
            buffer: Vec::with_capacity(DECODE_BUFFER_DEFAULT_SIZE),
            position: 0,
            first_byte: 0,
            remaining_length: 0,
        }
    }

    /// Appends `bytes` to the assembly buffer and returns an iterator over the packets that can
    /// now be completed.  Packets not pulled from the iterator stay buffered for the next call.
    pub fn feed(&mut self, bytes: &[u8]) -> DecodedPackets<'_> {
        if self.state != AssemblerState::TerminalError {
            self.buffer.drain(..self.position);
            self.position = 0;
            self.buffer.extend_from_slice(bytes);
        } else {
            warn!("FrameAssembler - ignoring {} bytes fed after a terminal error", bytes.len());
        }

        DecodedPackets {
            assembler: self
        }
    }

    /// Returns true once a decode failure has occurred
    pub fn is_terminal(&self) -> bool {
        self.state == AssemblerState::TerminalError
    }

    fn fail(&mut self, error: MqttError) -> Option<MqttResult<MqttPacket>> {
        self.state = AssemblerState::TerminalError;
        self.buffer.clear();
        self.position = 0;

        Some(Err(error))
    }

    fn next_packet(&mut self) -> Option<MqttResult<MqttPacket>> {
        loop {
            match self.state {
                AssemblerState::ReadPacketType => {
                    if self.position >= self.buffer.len() {
                        return None;
                    }

                    self.first_byte = self.buffer[self.position];
                    self.position += 1;
                    self.state = AssemblerState::ReadTotalRemainingLength;
                }

                AssemblerState::ReadTotalRemainingLength => {
                    let unread_length = self.buffer.len() - self.position;
                    let vli_result = match decode_vli(&self.buffer[self.position..]) {
                        Ok(DecodeVliResult::InsufficientData) => { Ok(None) }
                        Ok(DecodeVliResult::Value(value, remaining_bytes)) => {
                            Ok(Some((value as usize, unread_length - remaining_bytes.len())))
                        }
                        Err(error) => { Err(error) }
                    };

                    let (remaining_length, vli_size) = match vli_result {
                        Ok(Some(length_and_size)) => { length_and_size }
                        Ok(None) => { return None; }
                        Err(error) => { return self.fail(error); }
                    };

                    let total_packet_size = 1 + vli_size + remaining_length;
                    if total_packet_size > self.maximum_packet_size {
                        error!("FrameAssembler - inbound packet size ({}) exceeds maximum ({})", total_packet_size, self.maximum_packet_size);
                        return self.fail(MqttError::new_packet_too_large(total_packet_size, self.maximum_packet_size));
                    }

                    self.position += vli_size;
                    self.remaining_length = remaining_length;
                    self.state = AssemblerState::ReadPacketBody;
                }

                AssemblerState::ReadPacketBody => {
                    if self.buffer.len() - self.position < self.remaining_length {
                        return None;
                    }

                    let body_end = self.position + self.remaining_length;
                    let decode_result = decode_packet(self.first_byte, &self.buffer[self.position..body_end], self.protocol_version);
                    self.position = body_end;
                    self.state = AssemblerState::ReadPacketType;

                    return match decode_result {
                        Ok(packet) => {
                            log_packet("Successfully decoded incoming packet: ", &packet);
                            Some(Ok(packet))
                        }
                        Err(error) => { self.fail(error) }
                    };
                }

                AssemblerState::TerminalError => {
                    return None;
                }
            }
        }
    }
}

/// Lazy sequence of packets completed by a single [`FrameAssembler::feed`] call.
pub struct DecodedPackets<'a> {
    assembler: &'a mut FrameAssembler,
}

impl Iterator for DecodedPackets<'_> {
    type Item = MqttResult<MqttPacket>;

    fn next(&mut self) -> Option<Self::Item> {
        self.assembler.next_packet()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::encode::*;
    use assert_matches::assert_matches;

    pub(crate) fn encode_packet_for_test(packet: &MqttPacket, version: ProtocolVersion) -> Vec<u8> {
        encode_packet(packet, version, &EncodingContext::default()).unwrap()
    }

    fn do_single_encode_decode_test(packet: &MqttPacket, version: ProtocolVersion, decode_size: usize, encode_repetitions: u32) -> bool {
        let mut full_encoded_stream = Vec::new();
        for _ in 0..encode_repetitions {
            full_encoded_stream.extend_from_slice(&encode_packet_for_test(packet, version));
        }

        let mut assembler = FrameAssembler::new(version, MAXIMUM_VARIABLE_LENGTH_INTEGER + 5);
        let mut decoded_packets = Vec::new();

        for fragment in full_encoded_stream.chunks(decode_size) {
            for result in assembler.feed(fragment) {
                decoded_packets.push(result.unwrap());
            }
        }

        assert_eq!(encode_repetitions as usize, decoded_packets.len());
        for decoded_packet in decoded_packets {
            assert_eq!(*packet, decoded_packet);
        }

        true
    }

    pub(crate) fn do_round_trip_encode_decode_test(packet: &MqttPacket, version: ProtocolVersion) -> bool {
        let decode_fragment_sizes : Vec<usize> = vec!(1, 2, 3, 5, 7, 11, 17, 31, 47, 71, 131, 1023);

        for decode_size in decode_fragment_sizes.iter() {
            assert!(do_single_encode_decode_test(packet, version, *decode_size, 5));
        }

        true
    }

    /*
     * verifies that the packet encodes/decodes correctly, but applying the supplied mutator
     * to the encoding leads to a decode failure.  The failure is returned for inspection.
     */
    pub(crate) fn do_mutated_decode_failure_test<F>(packet: &MqttPacket, version: ProtocolVersion, mutator: F) -> MqttError where F : Fn(&[u8]) -> Vec<u8> {
        let good_encoded_bytes = encode_packet_for_test(packet, version);

        let mut assembler = FrameAssembler::new(version, MAXIMUM_VARIABLE_LENGTH_INTEGER + 5);
        let decoded : Vec<MqttResult<MqttPacket>> = assembler.feed(&good_encoded_bytes).collect();
        assert_eq!(1, decoded.len());
        assert_eq!(*packet, *decoded[0].as_ref().unwrap());

        let bad_encoded_bytes = mutator(good_encoded_bytes.as_slice());
        assert_ne!(good_encoded_bytes.as_slice(), bad_encoded_bytes.as_slice());

        let mut assembler = FrameAssembler::new(version, MAXIMUM_VARIABLE_LENGTH_INTEGER + 5);
        let mut decoded : Vec<MqttResult<MqttPacket>> = assembler.feed(&bad_encoded_bytes).collect();
        assert_eq!(1, decoded.len());
        assert!(assembler.is_terminal());

        match decoded.remove(0) {
            Err(error) => { error }
            Ok(_) => { panic!("mutated packet decoded successfully") }
        }
    }

    pub(crate) fn do_inbound_size_decode_failure_test(packet: &MqttPacket, version: ProtocolVersion) {
        let encoded_bytes = encode_packet_for_test(packet, version);

        let mut assembler = FrameAssembler::new(version, encoded_bytes.len());
        let decoded : Vec<MqttResult<MqttPacket>> = assembler.feed(&encoded_bytes).collect();
        assert_eq!(1, decoded.len());
        assert!(decoded[0].is_ok());

        let mut assembler = FrameAssembler::new(version, encoded_bytes.len() - 1);
        let decoded : Vec<MqttResult<MqttPacket>> = assembler.feed(&encoded_bytes).collect();
        assert_eq!(1, decoded.len());
        assert_matches!(decoded[0], Err(MqttError::PacketTooLarge(_)));
    }

    pub(crate) fn do_fixed_header_flag_decode_failure_test(packet: &MqttPacket, version: ProtocolVersion, flags_mask: u8) {
        let reserved_mutator = | bytes: &[u8] | -> Vec<u8> {
            let mut clone = bytes.to_vec();
            clone[0] |= flags_mask;
            clone
        };

        let error = do_mutated_decode_failure_test(packet, version, reserved_mutator);
        assert_matches!(error, MqttError::ProtocolError(_));
    }
}
