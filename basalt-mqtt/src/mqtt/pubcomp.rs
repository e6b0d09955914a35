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

const PUBCOMP_FIRST_BYTE : u8 = PACKET_TYPE_PUBCOMP << 4;

define_ack_packet_encode_function!(encode_pubcomp_packet, PubcompPacket, PacketType::Pubcomp, PUBCOMP_FIRST_BYTE, PUBCOMP_REASON_CODES);
define_ack_packet_decode_function!(decode_pubcomp_packet, PubcompPacket, PacketType::Pubcomp, PUBCOMP_FIRST_BYTE, PUBCOMP_REASON_CODES);

define_ack_packet_display_trait!(PubcompPacket, "PubcompPacket");
