/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
Wire-level constants and conversion helpers shared by the packet codec and the protocol engine.
 */

use crate::error::{MqttError, MqttResult};
use crate::mqtt::*;

use log::*;

pub(crate) const PACKET_TYPE_CONNECT: u8 = 1;
pub(crate) const PACKET_TYPE_CONNACK: u8 = 2;
pub(crate) const PACKET_TYPE_PUBLISH: u8 = 3;
pub(crate) const PACKET_TYPE_PUBACK: u8 = 4;
pub(crate) const PACKET_TYPE_PUBREC: u8 = 5;
pub(crate) const PACKET_TYPE_PUBREL: u8 = 6;
pub(crate) const PACKET_TYPE_PUBCOMP: u8 = 7;
pub(crate) const PACKET_TYPE_SUBSCRIBE: u8 = 8;
pub(crate) const PACKET_TYPE_SUBACK: u8 = 9;
pub(crate) const PACKET_TYPE_UNSUBSCRIBE: u8 = 10;
pub(crate) const PACKET_TYPE_UNSUBACK: u8 = 11;
pub(crate) const PACKET_TYPE_PINGREQ: u8 = 12;
pub(crate) const PACKET_TYPE_PINGRESP: u8 = 13;
pub(crate) const PACKET_TYPE_DISCONNECT: u8 = 14;
pub(crate) const PACKET_TYPE_AUTH: u8 = 15;

pub(crate) const PROPERTY_KEY_PAYLOAD_FORMAT_INDICATOR: u8 = 1;
pub(crate) const PROPERTY_KEY_MESSAGE_EXPIRY_INTERVAL: u8 = 2;
pub(crate) const PROPERTY_KEY_CONTENT_TYPE: u8 = 3;
pub(crate) const PROPERTY_KEY_RESPONSE_TOPIC: u8 = 8;
pub(crate) const PROPERTY_KEY_CORRELATION_DATA: u8 = 9;
pub(crate) const PROPERTY_KEY_SUBSCRIPTION_IDENTIFIER: u8 = 11;
pub(crate) const PROPERTY_KEY_SESSION_EXPIRY_INTERVAL: u8 = 17;
pub(crate) const PROPERTY_KEY_ASSIGNED_CLIENT_IDENTIFIER: u8 = 18;
pub(crate) const PROPERTY_KEY_SERVER_KEEP_ALIVE: u8 = 19;
pub(crate) const PROPERTY_KEY_AUTHENTICATION_METHOD: u8 = 21;
pub(crate) const PROPERTY_KEY_AUTHENTICATION_DATA: u8 = 22;
pub(crate) const PROPERTY_KEY_REQUEST_PROBLEM_INFORMATION: u8 = 23;
pub(crate) const PROPERTY_KEY_WILL_DELAY_INTERVAL: u8 = 24;
pub(crate) const PROPERTY_KEY_REQUEST_RESPONSE_INFORMATION: u8 = 25;
pub(crate) const PROPERTY_KEY_RESPONSE_INFORMATION: u8 = 26;
pub(crate) const PROPERTY_KEY_SERVER_REFERENCE: u8 = 28;
pub(crate) const PROPERTY_KEY_REASON_STRING: u8 = 31;
pub(crate) const PROPERTY_KEY_RECEIVE_MAXIMUM: u8 = 33;
pub(crate) const PROPERTY_KEY_TOPIC_ALIAS_MAXIMUM: u8 = 34;
pub(crate) const PROPERTY_KEY_TOPIC_ALIAS: u8 = 35;
pub(crate) const PROPERTY_KEY_MAXIMUM_QOS: u8 = 36;
pub(crate) const PROPERTY_KEY_RETAIN_AVAILABLE: u8 = 37;
pub(crate) const PROPERTY_KEY_USER_PROPERTY: u8 = 38;
pub(crate) const PROPERTY_KEY_MAXIMUM_PACKET_SIZE: u8 = 39;
pub(crate) const PROPERTY_KEY_WILDCARD_SUBSCRIPTIONS_AVAILABLE: u8 = 40;
pub(crate) const PROPERTY_KEY_SUBSCRIPTION_IDENTIFIERS_AVAILABLE: u8 = 41;
pub(crate) const PROPERTY_KEY_SHARED_SUBSCRIPTIONS_AVAILABLE: u8 = 42;

pub(crate) const PUBLISH_PACKET_FIXED_HEADER_DUPLICATE_FLAG : u8 = 8;
pub(crate) const PUBLISH_PACKET_FIXED_HEADER_RETAIN_FLAG : u8 = 1;
pub(crate) const QOS_MASK : u8 = 3;

pub(crate) const CONNECT_PACKET_CLEAN_START_FLAG_MASK : u8 = 1 << 1;
pub(crate) const CONNECT_PACKET_HAS_WILL_FLAG_MASK : u8 = 1 << 2;
pub(crate) const CONNECT_PACKET_WILL_RETAIN_FLAG_MASK : u8 = 1 << 5;
pub(crate) const CONNECT_PACKET_WILL_QOS_FLAG_SHIFT : u8 = 3;
pub(crate) const CONNECT_PACKET_HAS_USERNAME_FLAG_MASK : u8 = 1 << 7;
pub(crate) const CONNECT_PACKET_HAS_PASSWORD_FLAG_MASK : u8 = 1 << 6;
pub(crate) const CONNECT_PACKET_RESERVED_FLAG_MASK : u8 = 1;

pub(crate) const CONNACK_PACKET_SESSION_PRESENT_FLAG_MASK : u8 = 1;

pub(crate) const SUBSCRIPTION_OPTIONS_NO_LOCAL_MASK : u8 = 1u8 << 2;
pub(crate) const SUBSCRIPTION_OPTIONS_RETAIN_AS_PUBLISHED_MASK : u8 = 1u8 << 3;
pub(crate) const SUBSCRIPTION_OPTIONS_RETAIN_HANDLING_SHIFT : u8 = 4;
pub(crate) const SUBSCRIPTION_OPTIONS_RESERVED_MASK : u8 = 0xC0;

/// Protocol name carried by every CONNECT packet
pub(crate) const MQTT_PROTOCOL_NAME : &str = "MQTT";

/// Largest value representable by an MQTT variable length integer
pub const MAXIMUM_VARIABLE_LENGTH_INTEGER: usize = (1 << 28) - 1;

/// MQTT 3.1.1 Suback failure return code
pub(crate) const SUBACK_FAILURE_RETURN_CODE_311 : u8 = 0x80;

pub(crate) const CONNACK_REASON_CODES : &[ReasonCode] = &[
    ReasonCode::Success,
    ReasonCode::UnspecifiedError,
    ReasonCode::MalformedPacket,
    ReasonCode::ProtocolError,
    ReasonCode::ImplementationSpecificError,
    ReasonCode::UnsupportedProtocolVersion,
    ReasonCode::ClientIdentifierNotValid,
    ReasonCode::BadUserNameOrPassword,
    ReasonCode::NotAuthorized,
    ReasonCode::ServerUnavailable,
    ReasonCode::ServerBusy,
    ReasonCode::Banned,
    ReasonCode::BadAuthenticationMethod,
    ReasonCode::TopicNameInvalid,
    ReasonCode::PacketTooLarge,
    ReasonCode::QuotaExceeded,
    ReasonCode::PayloadFormatInvalid,
    ReasonCode::RetainNotSupported,
    ReasonCode::QosNotSupported,
    ReasonCode::UseAnotherServer,
    ReasonCode::ServerMoved,
    ReasonCode::ConnectionRateExceeded,
];

pub(crate) const PUBACK_REASON_CODES : &[ReasonCode] = &[
    ReasonCode::Success,
    ReasonCode::NoMatchingSubscribers,
    ReasonCode::UnspecifiedError,
    ReasonCode::ImplementationSpecificError,
    ReasonCode::NotAuthorized,
    ReasonCode::TopicNameInvalid,
    ReasonCode::PacketIdentifierInUse,
    ReasonCode::QuotaExceeded,
    ReasonCode::PayloadFormatInvalid,
];

pub(crate) const PUBREC_REASON_CODES : &[ReasonCode] = PUBACK_REASON_CODES;

pub(crate) const PUBREL_REASON_CODES : &[ReasonCode] = &[
    ReasonCode::Success,
    ReasonCode::PacketIdentifierNotFound,
];

pub(crate) const PUBCOMP_REASON_CODES : &[ReasonCode] = PUBREL_REASON_CODES;

pub(crate) const SUBACK_REASON_CODES : &[ReasonCode] = &[
    ReasonCode::Success,
    ReasonCode::GrantedQos1,
    ReasonCode::GrantedQos2,
    ReasonCode::UnspecifiedError,
    ReasonCode::ImplementationSpecificError,
    ReasonCode::NotAuthorized,
    ReasonCode::TopicFilterInvalid,
    ReasonCode::PacketIdentifierInUse,
    ReasonCode::QuotaExceeded,
    ReasonCode::SharedSubscriptionsNotSupported,
    ReasonCode::SubscriptionIdentifiersNotSupported,
    ReasonCode::WildcardSubscriptionsNotSupported,
];

pub(crate) const UNSUBACK_REASON_CODES : &[ReasonCode] = &[
    ReasonCode::Success,
    ReasonCode::NoSubscriptionExisted,
    ReasonCode::UnspecifiedError,
    ReasonCode::ImplementationSpecificError,
    ReasonCode::NotAuthorized,
    ReasonCode::TopicFilterInvalid,
    ReasonCode::PacketIdentifierInUse,
];

pub(crate) const DISCONNECT_REASON_CODES : &[ReasonCode] = &[
    ReasonCode::Success,
    ReasonCode::DisconnectWithWillMessage,
    ReasonCode::UnspecifiedError,
    ReasonCode::MalformedPacket,
    ReasonCode::ProtocolError,
    ReasonCode::ImplementationSpecificError,
    ReasonCode::NotAuthorized,
    ReasonCode::ServerBusy,
    ReasonCode::ServerShuttingDown,
    ReasonCode::KeepAliveTimeout,
    ReasonCode::SessionTakenOver,
    ReasonCode::TopicFilterInvalid,
    ReasonCode::TopicNameInvalid,
    ReasonCode::ReceiveMaximumExceeded,
    ReasonCode::TopicAliasInvalid,
    ReasonCode::PacketTooLarge,
    ReasonCode::MessageRateTooHigh,
    ReasonCode::QuotaExceeded,
    ReasonCode::AdministrativeAction,
    ReasonCode::PayloadFormatInvalid,
    ReasonCode::RetainNotSupported,
    ReasonCode::QosNotSupported,
    ReasonCode::UseAnotherServer,
    ReasonCode::ServerMoved,
    ReasonCode::SharedSubscriptionsNotSupported,
    ReasonCode::ConnectionRateExceeded,
    ReasonCode::MaximumConnectTime,
    ReasonCode::SubscriptionIdentifiersNotSupported,
    ReasonCode::WildcardSubscriptionsNotSupported,
];

pub(crate) const AUTH_REASON_CODES : &[ReasonCode] = &[
    ReasonCode::Success,
    ReasonCode::ContinueAuthentication,
    ReasonCode::ReAuthenticate,
];

/// Fails with an invalid argument error if an outbound packet carries a reason code that
/// is not legal for its packet type.
pub(crate) fn validate_reason_code_outbound(reason_code: ReasonCode, valid_codes: &[ReasonCode], packet_type: PacketType) -> MqttResult<()> {
    if !valid_codes.contains(&reason_code) {
        let message = format!("validate_reason_code_outbound - {} is not a valid {} reason code", reason_code, packet_type);
        error!("{}", message);
        return Err(MqttError::new_invalid_argument(message));
    }

    Ok(())
}

/// Converts a reason code byte from an inbound packet, failing with a protocol error if the value
/// is unknown or not legal for the packet type.
pub(crate) fn convert_u8_to_reason_code_inbound(value: u8, valid_codes: &[ReasonCode], packet_type: PacketType) -> MqttResult<ReasonCode> {
    let reason_code = convert_u8_to_reason_code(value).map_err(|_| {
        let message = format!("convert_u8_to_reason_code_inbound - unknown {} reason code ({})", packet_type, value);
        error!("{}", message);
        MqttError::new_protocol_error(message)
    })?;

    if !valid_codes.contains(&reason_code) {
        let message = format!("convert_u8_to_reason_code_inbound - {} is not a valid {} reason code", reason_code, packet_type);
        error!("{}", message);
        return Err(MqttError::new_protocol_error(message));
    }

    Ok(reason_code)
}

/// Packet ids on outbound packets must be non-zero.
pub(crate) fn validate_packet_id_outbound(packet_id: u16, packet_type: PacketType) -> MqttResult<()> {
    if packet_id == 0 {
        let message = format!("validate_packet_id_outbound - {} packet id may not be zero", packet_type);
        error!("{}", message);
        return Err(MqttError::new_invalid_argument(message));
    }

    Ok(())
}

pub(crate) fn validate_packet_id_inbound(packet_id: u16, packet_type: PacketType) -> MqttResult<()> {
    if packet_id == 0 {
        let message = format!("validate_packet_id_inbound - {} packet id may not be zero", packet_type);
        error!("{}", message);
        return Err(MqttError::new_protocol_error(message));
    }

    Ok(())
}

pub(crate) fn convert_u8_to_reason_code(value: u8) -> MqttResult<ReasonCode> {
    match value {
        0x00 => { Ok(ReasonCode::Success) }
        0x01 => { Ok(ReasonCode::GrantedQos1) }
        0x02 => { Ok(ReasonCode::GrantedQos2) }
        0x04 => { Ok(ReasonCode::DisconnectWithWillMessage) }
        0x10 => { Ok(ReasonCode::NoMatchingSubscribers) }
        0x11 => { Ok(ReasonCode::NoSubscriptionExisted) }
        0x18 => { Ok(ReasonCode::ContinueAuthentication) }
        0x19 => { Ok(ReasonCode::ReAuthenticate) }
        0x80 => { Ok(ReasonCode::UnspecifiedError) }
        0x81 => { Ok(ReasonCode::MalformedPacket) }
        0x82 => { Ok(ReasonCode::ProtocolError) }
        0x83 => { Ok(ReasonCode::ImplementationSpecificError) }
        0x84 => { Ok(ReasonCode::UnsupportedProtocolVersion) }
        0x85 => { Ok(ReasonCode::ClientIdentifierNotValid) }
        0x86 => { Ok(ReasonCode::BadUserNameOrPassword) }
        0x87 => { Ok(ReasonCode::NotAuthorized) }
        0x88 => { Ok(ReasonCode::ServerUnavailable) }
        0x89 => { Ok(ReasonCode::ServerBusy) }
        0x8A => { Ok(ReasonCode::Banned) }
        0x8B => { Ok(ReasonCode::ServerShuttingDown) }
        0x8C => { Ok(ReasonCode::BadAuthenticationMethod) }
        0x8D => { Ok(ReasonCode::KeepAliveTimeout) }
        0x8E => { Ok(ReasonCode::SessionTakenOver) }
        0x8F => { Ok(ReasonCode::TopicFilterInvalid) }
        0x90 => { Ok(ReasonCode::TopicNameInvalid) }
        0x91 => { Ok(ReasonCode::PacketIdentifierInUse) }
        0x92 => { Ok(ReasonCode::PacketIdentifierNotFound) }
        0x93 => { Ok(ReasonCode::ReceiveMaximumExceeded) }
        0x94 => { Ok(ReasonCode::TopicAliasInvalid) }
        0x95 => { Ok(ReasonCode::PacketTooLarge) }
        0x96 => { Ok(ReasonCode::MessageRateTooHigh) }
        0x97 => { Ok(ReasonCode::QuotaExceeded) }
        0x98 => { Ok(ReasonCode::AdministrativeAction) }
        0x99 => { Ok(ReasonCode::PayloadFormatInvalid) }
        0x9A => { Ok(ReasonCode::RetainNotSupported) }
        0x9B => { Ok(ReasonCode::QosNotSupported) }
        0x9C => { Ok(ReasonCode::UseAnotherServer) }
        0x9D => { Ok(ReasonCode::ServerMoved) }
        0x9E => { Ok(ReasonCode::SharedSubscriptionsNotSupported) }
        0x9F => { Ok(ReasonCode::ConnectionRateExceeded) }
        0xA0 => { Ok(ReasonCode::MaximumConnectTime) }
        0xA1 => { Ok(ReasonCode::SubscriptionIdentifiersNotSupported) }
        0xA2 => { Ok(ReasonCode::WildcardSubscriptionsNotSupported) }
        _ => {
            let message = format!("convert_u8_to_reason_code - invalid reason code value ({})", value);
            error!("{}", message);
            Err(MqttError::new_protocol_error(message))
        }
    }
}

pub(crate) fn reason_code_to_str(reason_code: ReasonCode) -> &'static str {
    match reason_code {
        ReasonCode::Success => { "0 (Success)" }
        ReasonCode::GrantedQos1 => { "1 (GrantedQos1)" }
        ReasonCode::GrantedQos2 => { "2 (GrantedQos2)" }
        ReasonCode::DisconnectWithWillMessage => { "4 (DisconnectWithWillMessage)" }
        ReasonCode::NoMatchingSubscribers => { "16 (NoMatchingSubscribers)" }
        ReasonCode::NoSubscriptionExisted => { "17 (NoSubscriptionExisted)" }
        ReasonCode::ContinueAuthentication => { "24 (ContinueAuthentication)" }
        ReasonCode::ReAuthenticate => { "25 (ReAuthenticate)" }
        ReasonCode::UnspecifiedError => { "128 (UnspecifiedError)" }
        ReasonCode::MalformedPacket => { "129 (MalformedPacket)" }
        ReasonCode::ProtocolError => { "130 (ProtocolError)" }
        ReasonCode::ImplementationSpecificError => { "131 (ImplementationSpecificError)" }
        ReasonCode::UnsupportedProtocolVersion => { "132 (UnsupportedProtocolVersion)" }
        ReasonCode::ClientIdentifierNotValid => { "133 (ClientIdentifierNotValid)" }
        ReasonCode::BadUserNameOrPassword => { "134 (BadUserNameOrPassword)" }
        ReasonCode::NotAuthorized => { "135 (NotAuthorized)" }
        ReasonCode::ServerUnavailable => { "136 (ServerUnavailable)" }
        ReasonCode::ServerBusy => { "137 (ServerBusy)" }
        ReasonCode::Banned => { "138 (Banned)" }
        ReasonCode::ServerShuttingDown => { "139 (ServerShuttingDown)" }
        ReasonCode::BadAuthenticationMethod => { "140 (BadAuthenticationMethod)" }
        ReasonCode::KeepAliveTimeout => { "141 (KeepAliveTimeout)" }
        ReasonCode::SessionTakenOver => { "142 (SessionTakenOver)" }
        ReasonCode::TopicFilterInvalid => { "143 (TopicFilterInvalid)" }
        ReasonCode::TopicNameInvalid => { "144 (TopicNameInvalid)" }
        ReasonCode::PacketIdentifierInUse => { "145 (PacketIdentifierInUse)" }
        ReasonCode::PacketIdentifierNotFound => { "146 (PacketIdentifierNotFound)" }
        ReasonCode::ReceiveMaximumExceeded => { "147 (ReceiveMaximumExceeded)" }
        ReasonCode::TopicAliasInvalid => { "148 (TopicAliasInvalid)" }
        ReasonCode::PacketTooLarge => { "149 (PacketTooLarge)" }
        ReasonCode::MessageRateTooHigh => { "150 (MessageRateTooHigh)" }
        ReasonCode::QuotaExceeded => { "151 (QuotaExceeded)" }
        ReasonCode::AdministrativeAction => { "152 (AdministrativeAction)" }
        ReasonCode::PayloadFormatInvalid => { "153 (PayloadFormatInvalid)" }
        ReasonCode::RetainNotSupported => { "154 (RetainNotSupported)" }
        ReasonCode::QosNotSupported => { "155 (QosNotSupported)" }
        ReasonCode::UseAnotherServer => { "156 (UseAnotherServer)" }
        ReasonCode::ServerMoved => { "157 (ServerMoved)" }
        ReasonCode::SharedSubscriptionsNotSupported => { "158 (SharedSubscriptionsNotSupported)" }
        ReasonCode::ConnectionRateExceeded => { "159 (ConnectionRateExceeded)" }
        ReasonCode::MaximumConnectTime => { "160 (MaximumConnectTime)" }
        ReasonCode::SubscriptionIdentifiersNotSupported => { "161 (SubscriptionIdentifiersNotSupported)" }
        ReasonCode::WildcardSubscriptionsNotSupported => { "162 (WildcardSubscriptionsNotSupported)" }
    }
}

/// MQTT 3.1.1 Connack return codes, mapped onto reason codes
pub(crate) fn convert_connack_return_code_311(value: u8) -> MqttResult<ReasonCode> {
    match value {
        0 => { Ok(ReasonCode::Success) }
        1 => { Ok(ReasonCode::UnsupportedProtocolVersion) }
        2 => { Ok(ReasonCode::ClientIdentifierNotValid) }
        3 => { Ok(ReasonCode::ServerUnavailable) }
        4 => { Ok(ReasonCode::BadUserNameOrPassword) }
        5 => { Ok(ReasonCode::NotAuthorized) }
        _ => {
            let message = format!("convert_connack_return_code_311 - invalid return code ({})", value);
            error!("{}", message);
            Err(MqttError::new_protocol_error(message))
        }
    }
}

pub(crate) fn connack_reason_code_to_return_code_311(reason_code: ReasonCode) -> MqttResult<u8> {
    match reason_code {
        ReasonCode::Success => { Ok(0) }
        ReasonCode::UnsupportedProtocolVersion => { Ok(1) }
        ReasonCode::ClientIdentifierNotValid => { Ok(2) }
        ReasonCode::ServerUnavailable => { Ok(3) }
        ReasonCode::BadUserNameOrPassword => { Ok(4) }
        ReasonCode::NotAuthorized => { Ok(5) }
        _ => {
            let message = format!("connack_reason_code_to_return_code_311 - {} has no MQTT311 equivalent", reason_code);
            error!("{}", message);
            Err(MqttError::new_invalid_argument(message))
        }
    }
}

/// MQTT 3.1.1 Suback return codes, mapped onto reason codes
pub(crate) fn convert_suback_return_code_311(value: u8) -> MqttResult<ReasonCode> {
    match value {
        0 => { Ok(ReasonCode::Success) }
        1 => { Ok(ReasonCode::GrantedQos1) }
        2 => { Ok(ReasonCode::GrantedQos2) }
        SUBACK_FAILURE_RETURN_CODE_311 => { Ok(ReasonCode::UnspecifiedError) }
        _ => {
            let message = format!("convert_suback_return_code_311 - invalid return code ({})", value);
            error!("{}", message);
            Err(MqttError::new_protocol_error(message))
        }
    }
}

pub(crate) fn suback_reason_code_to_return_code_311(reason_code: ReasonCode) -> MqttResult<u8> {
    match reason_code {
        ReasonCode::Success => { Ok(0) }
        ReasonCode::GrantedQos1 => { Ok(1) }
        ReasonCode::GrantedQos2 => { Ok(2) }
        ReasonCode::UnspecifiedError => { Ok(SUBACK_FAILURE_RETURN_CODE_311) }
        _ => {
            let message = format!("suback_reason_code_to_return_code_311 - {} has no MQTT311 equivalent", reason_code);
            error!("{}", message);
            Err(MqttError::new_invalid_argument(message))
        }
    }
}

pub(crate) fn convert_u8_to_quality_of_service(value: u8) -> MqttResult<QualityOfService> {
    match value {
        0 => { Ok(QualityOfService::AtMostOnce) }
        1 => { Ok(QualityOfService::AtLeastOnce) }
        2 => { Ok(QualityOfService::ExactlyOnce) }
        _ => {
            let message = format!("convert_u8_to_quality_of_service - invalid qos value ({})", value);
            error!("{}", message);
            Err(MqttError::new_protocol_error(message))
        }
    }
}

pub(crate) fn convert_u8_to_payload_format_indicator(value: u8) -> MqttResult<PayloadFormatIndicator> {
    match value {
        0 => { Ok(PayloadFormatIndicator::Bytes) }
        1 => { Ok(PayloadFormatIndicator::Utf8) }
        _ => {
            let message = format!("convert_u8_to_payload_format_indicator - invalid payload format indicator value ({})", value);
            error!("{}", message);
            Err(MqttError::new_protocol_error(message))
        }
    }
}

pub(crate) fn convert_u8_to_retain_handling_type(value: u8) -> MqttResult<RetainHandlingType> {
    match value {
        0 => { Ok(RetainHandlingType::SendOnSubscribe) }
        1 => { Ok(RetainHandlingType::SendOnSubscribeIfNew) }
        2 => { Ok(RetainHandlingType::DontSend) }
        _ => {
            let message = format!("convert_u8_to_retain_handling_type - invalid retain handling type value ({})", value);
            error!("{}", message);
            Err(MqttError::new_protocol_error(message))
        }
    }
}

pub(crate) fn quality_of_service_to_str(qos: QualityOfService) -> &'static str {
    match qos {
        QualityOfService::AtMostOnce => { "0 (AtMostOnce)" }
        QualityOfService::AtLeastOnce => { "1 (AtLeastOnce)" }
        QualityOfService::ExactlyOnce => { "2 (ExactlyOnce)" }
    }
}

pub(crate) fn payload_format_indicator_to_str(indicator: PayloadFormatIndicator) -> &'static str {
    match indicator {
        PayloadFormatIndicator::Bytes => { "0 (Bytes)" }
        PayloadFormatIndicator::Utf8 => { "1 (Utf8)" }
    }
}

pub(crate) fn retain_handling_type_to_str(retain_handling_type: RetainHandlingType) -> &'static str {
    match retain_handling_type {
        RetainHandlingType::SendOnSubscribe => { "0 (SendOnSubscribe)" }
        RetainHandlingType::SendOnSubscribeIfNew => { "1 (SendOnSubscribeIfNew)" }
        RetainHandlingType::DontSend => { "2 (DontSend)" }
    }
}

pub(crate) fn mqtt_packet_to_packet_type(packet: &MqttPacket) -> PacketType {
    match packet {
        MqttPacket::Connect(_) => { PacketType::Connect }
        MqttPacket::Connack(_) => { PacketType::Connack }
        MqttPacket::Publish(_) => { PacketType::Publish }
        MqttPacket::Puback(_) => { PacketType::Puback }
        MqttPacket::Pubrec(_) => { PacketType::Pubrec }
        MqttPacket::Pubrel(_) => { PacketType::Pubrel }
        MqttPacket::Pubcomp(_) => { PacketType::Pubcomp }
        MqttPacket::Subscribe(_) => { PacketType::Subscribe }
        MqttPacket::Suback(_) => { PacketType::Suback }
        MqttPacket::Unsubscribe(_) => { PacketType::Unsubscribe }
        MqttPacket::Unsuback(_) => { PacketType::Unsuback }
        MqttPacket::Pingreq(_) => { PacketType::Pingreq }
        MqttPacket::Pingresp(_) => { PacketType::Pingresp }
        MqttPacket::Disconnect(_) => { PacketType::Disconnect }
        MqttPacket::Auth(_) => { PacketType::Auth }
    }
}

pub(crate) fn packet_type_to_str(packet_type: u8) -> &'static str {
    match packet_type {
        PACKET_TYPE_CONNECT => { "Connect" }
        PACKET_TYPE_CONNACK => { "Connack" }
        PACKET_TYPE_PUBLISH => { "Publish" }
        PACKET_TYPE_PUBACK => { "Puback" }
        PACKET_TYPE_PUBREC => { "Pubrec" }
        PACKET_TYPE_PUBREL => { "Pubrel" }
        PACKET_TYPE_PUBCOMP => { "Pubcomp" }
        PACKET_TYPE_SUBSCRIBE => { "Subscribe" }
        PACKET_TYPE_SUBACK => { "Suback" }
        PACKET_TYPE_UNSUBSCRIBE => { "Unsubscribe" }
        PACKET_TYPE_UNSUBACK => { "Unsuback" }
        PACKET_TYPE_PINGREQ => { "Pingreq" }
        PACKET_TYPE_PINGRESP => { "Pingresp" }
        PACKET_TYPE_DISCONNECT => { "Disconnect" }
        PACKET_TYPE_AUTH => { "Auth" }
        _ => {
            "Unknown"
        }
    }
}

pub(crate) fn mqtt_packet_to_str(packet: &MqttPacket) -> &'static str {
    match packet {
        MqttPacket::Connect(_) => { "CONNECT" }
        MqttPacket::Connack(_) => { "CONNACK" }
        MqttPacket::Publish(_) => { "PUBLISH" }
        MqttPacket::Puback(_) => { "PUBACK" }
        MqttPacket::Pubrec(_) => { "PUBREC" }
        MqttPacket::Pubrel(_) => { "PUBREL" }
        MqttPacket::Pubcomp(_) => { "PUBCOMP" }
        MqttPacket::Subscribe(_) => { "SUBSCRIBE" }
        MqttPacket::Suback(_) => { "SUBACK" }
        MqttPacket::Unsubscribe(_) => { "UNSUBSCRIBE" }
        MqttPacket::Unsuback(_) => { "UNSUBACK" }
        MqttPacket::Pingreq(_) => { "PINGREQ" }
        MqttPacket::Pingresp(_) => { "PINGRESP" }
        MqttPacket::Disconnect(_) => { "DISCONNECT" }
        MqttPacket::Auth(_) => { "AUTH" }
    }
}
