/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use crate::decode::*;
use crate::decode::utils::*;
use crate::encode::*;
use crate::encode::utils::*;
use crate::error::MqttResult;
use crate::logging::*;
use crate::mqtt::*;
use crate::mqtt::properties::*;
use crate::mqtt::utils::*;

use std::fmt;

const PUBREC_FIRST_BYTE : u8 = PACKET_TYPE_PUBREC << 4;

define_ack_packet_encode_function!(encode_pubrec_packet, PubrecPacket, PacketType::Pubrec, PUBREC_FIRST_BYTE, PUBREC_REASON_CODES);
define_ack_packet_decode_function!(decode_pubrec_packet, PubrecPacket, PacketType::Pubrec, PUBREC_FIRST_BYTE, PUBREC_REASON_CODES);

define_ack_packet_display_trait!(PubrecPacket, "PubrecPacket");
