/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use crate::mqtt::*;
use crate::mqtt::utils::mqtt_packet_to_str;
use log::*;
use std::fmt;
use std::fmt::Write;

impl fmt::Display for UserProperty {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {}) ", self.name, self.value)
    }
}

pub(crate) fn create_user_properties_log_string(properties: &[UserProperty]) -> String {
    let mut val : String = "[ ".to_string();
    for property in properties {
        write!(&mut val, " (\"{}\",\"{}\")", property.name, property.value).ok();
    }
    write!(&mut val, " ]").ok();
    val
}

macro_rules! log_primitive_value {
    ($integral_value: expr, $formatter: expr, $log_field: expr) => {
        write!($formatter, " {}:{}", $log_field, $integral_value)?;
    };
}

pub(crate) use log_primitive_value;

macro_rules! log_optional_primitive_value {
    ($optional_integral_value: expr, $formatter: expr, $log_field: expr, $value: ident) => {
        if let Some($value) = &$optional_integral_value {
            write!($formatter, " {}:{}", $log_field, $value)?;
        }
    };
}

pub(crate) use log_optional_primitive_value;

macro_rules! log_enum {
    ($enum_value: expr, $formatter: expr, $log_field: expr, $converter: ident) => {
        write!($formatter, " {}:{}", $log_field, $converter($enum_value))?;
    };
}

pub(crate) use log_enum;

macro_rules! log_optional_enum {
    ($optional_enum_value: expr, $formatter: expr, $log_field: expr, $value:ident, $converter: ident) => {
        if let Some($value) = &$optional_enum_value {
            write!($formatter, " {}:{}", $log_field, $converter(*$value))?;
        }
    };
}

pub(crate) use log_optional_enum;

macro_rules! log_string {
    ($value: expr, $formatter: expr, $log_field: expr) => {
        write!($formatter, " {}:\"{}\"", $log_field, $value)?;
    };
}

pub(crate) use log_string;

macro_rules! log_optional_string {
    ($optional_string: expr, $formatter: expr, $log_field: expr, $value:ident) => {
        if let Some($value) = &$optional_string {
            write!($formatter, " {}:\"{}\"", $log_field, $value)?;
        }
    };
}

pub(crate) use log_optional_string;

macro_rules! log_optional_binary_data {
    ($optional_data: expr, $formatter: expr, $log_field: expr, $value:ident) => {
        if let Some($value) = &$optional_data {
            write!($formatter, " {}:<{} Bytes>",  $log_field, $value.len())?;
        }
    };
}

pub(crate) use log_optional_binary_data;

macro_rules! log_optional_binary_data_sensitive {
    ($optional_data: expr, $formatter: expr, $log_field: expr) => {
        if $optional_data.is_some() {
            write!($formatter, " {}:<...redacted>", $log_field)?;
        }
    };
}

pub(crate) use log_optional_binary_data_sensitive;

macro_rules! log_user_properties {
    ($user_properties: expr, $formatter: expr, $log_field: expr) => {
        if !$user_properties.is_empty() {
            write!($formatter, " {}:{}", $log_field, create_user_properties_log_string(&$user_properties))?;
        }
    };
}

pub(crate) use log_user_properties;

macro_rules! log_properties {
    ($properties: expr, $formatter: expr) => {
        if !$properties.is_empty() {
            write!($formatter, " properties:{}", $properties)?;
        }
    };
}

pub(crate) use log_properties;

macro_rules! define_ack_packet_display_trait {
    ($packet_type: ident, $packet_name: expr) => {
        impl fmt::Display for $packet_type {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{} {{", $packet_name)?;
                log_primitive_value!(self.packet_id, f, "packet_id");
                log_enum!(self.reason_code, f, "reason_code", reason_code_to_str);
                log_properties!(self.properties, f);
                write!(f, " }}")
            }
        }
    };
}

pub(crate) use define_ack_packet_display_trait;

fn packet_id_for_logging(packet: &MqttPacket) -> Option<u16> {
    match packet {
        MqttPacket::Publish(publish) if publish.packet_id != 0 => { Some(publish.packet_id) }
        MqttPacket::Puback(ack) => { Some(ack.packet_id) }
        MqttPacket::Pubrec(ack) => { Some(ack.packet_id) }
        MqttPacket::Pubrel(ack) => { Some(ack.packet_id) }
        MqttPacket::Pubcomp(ack) => { Some(ack.packet_id) }
        MqttPacket::Subscribe(subscribe) => { Some(subscribe.packet_id) }
        MqttPacket::Suback(suback) => { Some(suback.packet_id) }
        MqttPacket::Unsubscribe(unsubscribe) => { Some(unsubscribe.packet_id) }
        MqttPacket::Unsuback(unsuback) => { Some(unsuback.packet_id) }
        _ => { None }
    }
}

/// One-line packet summary used when full packet logging is not enabled.
pub(crate) fn summarize_packet(packet: &MqttPacket) -> String {
    match packet_id_for_logging(packet) {
        Some(packet_id) => { format!("{} (id {})", mqtt_packet_to_str(packet), packet_id) }
        None => { mqtt_packet_to_str(packet).to_string() }
    }
}

impl MqttPacket {
    fn as_display(&self) -> &dyn fmt::Display {
        match self {
            MqttPacket::Connect(packet) => { packet }
            MqttPacket::Connack(packet) => { packet }
            MqttPacket::Publish(packet) => { packet }
            MqttPacket::Puback(packet) => { packet }
            MqttPacket::Pubrec(packet) => { packet }
            MqttPacket::Pubrel(packet) => { packet }
            MqttPacket::Pubcomp(packet) => { packet }
            MqttPacket::Subscribe(packet) => { packet }
            MqttPacket::Suback(packet) => { packet }
            MqttPacket::Unsubscribe(packet) => { packet }
            MqttPacket::Unsuback(packet) => { packet }
            MqttPacket::Pingreq(packet) => { packet }
            MqttPacket::Pingresp(packet) => { packet }
            MqttPacket::Disconnect(packet) => { packet }
            MqttPacket::Auth(packet) => { packet }
        }
    }
}

impl fmt::Display for MqttPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.as_display().fmt(f)
    }
}

// Full packet contents only at debug and above; info gets the summary.
pub(crate) fn log_packet(prefix: &str, packet: &MqttPacket) {
    if log_enabled!(Level::Debug) {
        debug!("{}{}", prefix, packet);
    } else if log_enabled!(Level::Info) {
        info!("{}{}", prefix, summarize_packet(packet));
    }
}
