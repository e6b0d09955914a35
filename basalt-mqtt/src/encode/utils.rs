/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
Internal utilities to encode MQTT primitives (integers, variable length integers, length-prefixed
strings and binary data) into a byte vector.
 */

use crate::error::{MqttError, MqttResult};
use crate::mqtt::UserProperty;
use crate::mqtt::utils::MAXIMUM_VARIABLE_LENGTH_INTEGER;

use log::*;

pub(crate) const MAXIMUM_STRING_LENGTH : usize = 65535;
pub(crate) const MAXIMUM_BINARY_LENGTH : usize = 65535;

#[cfg(test)]
pub(crate) fn compute_variable_length_integer_encode_size(value: usize) -> MqttResult<usize> {
    if value < 1usize << 7 {
        Ok(1)
    } else if value < 1usize << 14 {
        Ok(2)
    } else if value < 1usize << 21 {
        Ok(3)
    } else if value < 1usize << 28 {
        Ok(4)
    } else {
        let message = format!("compute_variable_length_integer_encode_size - value {} exceeds the maximum variable length integer", value);
        error!("{}", message);
        Err(MqttError::new_invalid_argument(message))
    }
}

pub(crate) fn encode_vli(value: u32, dest: &mut Vec<u8>) -> MqttResult<()> {
    if value as usize > MAXIMUM_VARIABLE_LENGTH_INTEGER {
        let message = format!("encode_vli - value {} exceeds the maximum variable length integer", value);
        error!("{}", message);
        return Err(MqttError::new_invalid_argument(message));
    }

    let mut done = false;
    let mut val = value;
    while !done {
        let mut byte: u8 = (val & 0x7F) as u8;
        val /= 128;

        if val != 0 {
            byte |= 128;
        }

        dest.push(byte);

        done = val == 0;
    }

    Ok(())
}

pub(crate) fn encode_u8(value: u8, dest: &mut Vec<u8>) {
    dest.push(value);
}

pub(crate) fn encode_u16(value: u16, dest: &mut Vec<u8>) {
    dest.extend_from_slice(&value.to_be_bytes());
}

pub(crate) fn encode_u32(value: u32, dest: &mut Vec<u8>) {
    dest.extend_from_slice(&value.to_be_bytes());
}

pub(crate) fn encode_bool(value: bool, dest: &mut Vec<u8>) {
    dest.push(if value { 1u8 } else { 0u8 });
}

pub(crate) fn encode_length_prefixed_string(value: &str, dest: &mut Vec<u8>) -> MqttResult<()> {
    if value.len() > MAXIMUM_STRING_LENGTH {
        let message = format!("encode_length_prefixed_string - string of {} bytes is too long", value.len());
        error!("{}", message);
        return Err(MqttError::new_invalid_argument(message));
    }

    encode_u16(value.len() as u16, dest);
    dest.extend_from_slice(value.as_bytes());

    Ok(())
}

pub(crate) fn encode_length_prefixed_bytes(value: &[u8], dest: &mut Vec<u8>) -> MqttResult<()> {
    if value.len() > MAXIMUM_BINARY_LENGTH {
        let message = format!("encode_length_prefixed_bytes - binary data of {} bytes is too long", value.len());
        error!("{}", message);
        return Err(MqttError::new_invalid_argument(message));
    }

    encode_u16(value.len() as u16, dest);
    dest.extend_from_slice(value);

    Ok(())
}

pub(crate) fn encode_user_property(property: &UserProperty, dest: &mut Vec<u8>) -> MqttResult<()> {
    encode_length_prefixed_string(&property.name, dest)?;
    encode_length_prefixed_string(&property.value, dest)
}
