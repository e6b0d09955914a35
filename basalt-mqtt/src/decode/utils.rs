/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use crate::error::{MqttError, MqttResult};
use crate::mqtt::{PacketType, UserProperty};

use log::*;

#[derive(Eq, PartialEq, Debug)]
pub(crate) enum DecodeVliResult<'a> {
    InsufficientData,
    Value(u32, &'a[u8]), /* (decoded value, remaining bytes) */
}

pub(crate) fn decode_vli(buffer: &[u8]) -> MqttResult<DecodeVliResult> {
    let mut value: u32 = 0;
    let mut needs_data: bool;
    let mut shift: u32 = 0;
    let data_len = buffer.len();

    for i in 0..4 {
        if i >= data_len {
            return Ok(DecodeVliResult::InsufficientData);
        }

        let byte = buffer[i];
        value |= ((byte & 0x7F) as u32) << shift;
        shift += 7;

        needs_data = (byte & 0x80) != 0;
        if !needs_data {
            return Ok(DecodeVliResult::Value(value, &buffer[(i + 1)..]));
        }
    }

    let message = "decode_vli - invalid variable length integer";
    error!("{}", message);
    Err(MqttError::new_malformed_packet(message))
}

pub(crate) fn decode_vli_into_mutable<'a>(buffer: &'a[u8], value: &mut usize) -> MqttResult<&'a[u8]> {
    match decode_vli(buffer)? {
        DecodeVliResult::InsufficientData => {
            let message = "decode_vli_into_mutable - truncated variable length integer";
            error!("{}", message);
            Err(MqttError::new_malformed_packet(message))
        }
        DecodeVliResult::Value(vli, remaining_slice) => {
            *value = vli as usize;
            Ok(remaining_slice)
        }
    }
}

fn split_length_prefixed<'a>(bytes: &'a[u8], function_name: &str) -> MqttResult<(&'a[u8], &'a[u8])> {
    if bytes.len() < 2 {
        let message = format!("{} - value does not have a full length prefix", function_name);
        error!("{}", message);
        return Err(MqttError::new_malformed_packet(message));
    }

    let value_length = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
    let mutable_bytes = &bytes[2..];
    if value_length > mutable_bytes.len() {
        let message = format!("{} - value has length larger than remaining packet bytes", function_name);
        error!("{}", message);
        return Err(MqttError::new_malformed_packet(message));
    }

    Ok((&mutable_bytes[..value_length], &mutable_bytes[value_length..]))
}

pub(crate) fn decode_length_prefixed_string<'a>(bytes: &'a[u8], value: &mut String) -> MqttResult<&'a[u8]> {
    let (value_bytes, remaining_bytes) = split_length_prefixed(bytes, "decode_length_prefixed_string")?;

    let decode_utf8_result = std::str::from_utf8(value_bytes).map_err(|err| {
        error!("decode_length_prefixed_string - invalid utf-8");
        MqttError::from(err)
    })?;

    *value = decode_utf8_result.to_string();
    Ok(remaining_bytes)
}

pub(crate) fn decode_length_prefixed_bytes<'a>(bytes: &'a[u8], value: &mut Vec<u8>) -> MqttResult<&'a[u8]> {
    let (value_bytes, remaining_bytes) = split_length_prefixed(bytes, "decode_length_prefixed_bytes")?;

    *value = value_bytes.to_vec();
    Ok(remaining_bytes)
}

pub(crate) fn decode_user_property<'a>(bytes: &'a[u8], properties: &mut Vec<UserProperty>) -> MqttResult<&'a[u8]> {
    let mut property : UserProperty = UserProperty { ..Default::default() };

    let mut mutable_bytes = bytes;
    mutable_bytes = decode_length_prefixed_string(mutable_bytes, &mut property.name)?;
    mutable_bytes = decode_length_prefixed_string(mutable_bytes, &mut property.value)?;

    properties.push(property);

    Ok(mutable_bytes)
}

pub(crate) fn decode_u8<'a>(bytes: &'a[u8], value: &mut u8) -> MqttResult<&'a[u8]> {
    if bytes.is_empty() {
        let message = "decode_u8 - insufficient packet bytes for u8 value";
        error!("{}", message);
        return Err(MqttError::new_malformed_packet(message));
    }

    *value = bytes[0];

    Ok(&bytes[1..])
}

pub(crate) fn decode_u8_as_bool<'a>(bytes: &'a[u8], value: &mut bool) -> MqttResult<&'a[u8]> {
    let mut raw_value = 0;
    let remaining_bytes = decode_u8(bytes, &mut raw_value)?;

    match raw_value {
        0 => { *value = false; }
        1 => { *value = true; }
        _ => {
            let message = format!("decode_u8_as_bool - invalid byte value ({}) for boolean property", raw_value);
            error!("{}", message);
            return Err(MqttError::new_protocol_error(message));
        }
    }

    Ok(remaining_bytes)
}

pub(crate) fn decode_u16<'a>(bytes: &'a[u8], value: &mut u16) -> MqttResult<&'a[u8]> {
    if bytes.len() < 2 {
        let message = "decode_u16 - insufficient packet bytes for u16 value";
        error!("{}", message);
        return Err(MqttError::new_malformed_packet(message));
    }

    *value = u16::from_be_bytes([bytes[0], bytes[1]]);

    Ok(&bytes[2..])
}

pub(crate) fn decode_u32<'a>(bytes: &'a[u8], value: &mut u32) -> MqttResult<&'a[u8]> {
    if bytes.len() < 4 {
        let message = "decode_u32 - insufficient packet bytes for u32 value";
        error!("{}", message);
        return Err(MqttError::new_malformed_packet(message));
    }

    *value = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);

    Ok(&bytes[4..])
}

pub(crate) fn check_fixed_header_first_byte(first_byte: u8, expected_first_byte: u8, packet_type: PacketType) -> MqttResult<()> {
    if first_byte != expected_first_byte {
        let message = format!("check_fixed_header_first_byte - invalid fixed header flags ({:#04x}) for {} packet", first_byte & 0x0F, packet_type);
        error!("{}", message);
        return Err(MqttError::new_protocol_error(message));
    }

    Ok(())
}

pub(crate) fn check_body_consumed(bytes: &[u8], packet_type: PacketType) -> MqttResult<()> {
    if !bytes.is_empty() {
        let message = format!("check_body_consumed - {} packet has {} unexpected trailing bytes", packet_type, bytes.len());
        error!("{}", message);
        return Err(MqttError::new_malformed_packet(message));
    }

    Ok(())
}

fn check_optional_unset<T>(value: &Option<T>, function_name: &str) -> MqttResult<()> {
    if value.is_some() {
        let message = format!("{} - invalid duplicate property", function_name);
        error!("{}", message);
        return Err(MqttError::new_protocol_error(message));
    }

    Ok(())
}

pub(crate) fn decode_optional_length_prefixed_string<'a>(bytes: &'a[u8], value: &mut Option<String>) -> MqttResult<&'a[u8]> {
    check_optional_unset(value, "decode_optional_length_prefixed_string")?;

    let mut decoded = String::new();
    let remaining_bytes = decode_length_prefixed_string(bytes, &mut decoded)?;
    *value = Some(decoded);

    Ok(remaining_bytes)
}

pub(crate) fn decode_optional_length_prefixed_bytes<'a>(bytes: &'a[u8], value: &mut Option<Vec<u8>>) -> MqttResult<&'a[u8]> {
    check_optional_unset(value, "decode_optional_length_prefixed_bytes")?;

    let mut decoded = Vec::new();
    let remaining_bytes = decode_length_prefixed_bytes(bytes, &mut decoded)?;
    *value = Some(decoded);

    Ok(remaining_bytes)
}

pub(crate) fn decode_optional_u8_as_bool<'a>(bytes: &'a[u8], value: &mut Option<bool>) -> MqttResult<&'a[u8]> {
    check_optional_unset(value, "decode_optional_u8_as_bool")?;

    let mut decoded = false;
    let remaining_bytes = decode_u8_as_bool(bytes, &mut decoded)?;
    *value = Some(decoded);

    Ok(remaining_bytes)
}

pub(crate) fn decode_optional_u8_as_enum<'a, T>(bytes: &'a[u8], value: &mut Option<T>, converter: fn(u8) -> MqttResult<T>) -> MqttResult<&'a[u8]> {
    check_optional_unset(value, "decode_optional_u8_as_enum")?;

    let mut raw_value = 0;
    let remaining_bytes = decode_u8(bytes, &mut raw_value)?;
    *value = Some(converter(raw_value)?);

    Ok(remaining_bytes)
}

pub(crate) fn decode_optional_u16<'a>(bytes: &'a[u8], value: &mut Option<u16>) -> MqttResult<&'a[u8]> {
    check_optional_unset(value, "decode_optional_u16")?;

    let mut decoded = 0;
    let remaining_bytes = decode_u16(bytes, &mut decoded)?;
    *value = Some(decoded);

    Ok(remaining_bytes)
}

pub(crate) fn decode_optional_u32<'a>(bytes: &'a[u8], value: &mut Option<u32>) -> MqttResult<&'a[u8]> {
    check_optional_unset(value, "decode_optional_u32")?;

    let mut decoded = 0;
    let remaining_bytes = decode_u32(bytes, &mut decoded)?;
    *value = Some(decoded);

    Ok(remaining_bytes)
}
