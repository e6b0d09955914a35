/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
Validation of outbound operations against the settings negotiated with the server, plus the topic
and topic filter rules they rely on.
 */

use crate::encode::utils::MAXIMUM_STRING_LENGTH;
use crate::error::{MqttError, MqttResult};
use crate::mqtt::*;
use crate::protocol::NegotiatedSettings;

use log::*;

pub(crate) fn is_valid_topic(topic: &str) -> bool {
    if topic.is_empty() || topic.len() > MAXIMUM_STRING_LENGTH {
        return false;
    }

    if topic.contains(['#', '+']) {
        return false;
    }

    true
}

// if the topic filter is not valid, then the other fields are not to be trusted
pub(crate) struct TopicFilterProperties {
    pub is_valid: bool,
    pub is_shared: bool,
    pub has_wildcard: bool
}

pub(crate) fn compute_topic_filter_properties(topic: &str) -> TopicFilterProperties {
    let mut properties = TopicFilterProperties {
        is_valid: true,
        is_shared: false,
        has_wildcard: false
    };

    if topic.is_empty() || topic.len() > MAXIMUM_STRING_LENGTH {
        properties.is_valid = false;
        return properties;
    }

    let mut has_share_prefix = false;
    let mut has_share_name = false;
    let mut seen_multi_level_wildcard = false;
    for (index, segment) in topic.split('/').enumerate() {
        if seen_multi_level_wildcard {
            properties.is_valid = false;
            break;
        }

        let has_wildcard = segment.contains(['#', '+']);
        properties.has_wildcard |= has_wildcard;

        if index == 0 && segment == "$share" {
            has_share_prefix = true;
        }

        if index == 1 && has_share_prefix && !segment.is_empty() && !has_wildcard {
            has_share_name = true;
        }

        if has_share_name && ((index == 2 && !segment.is_empty()) || index > 2) {
            properties.is_shared = true;
        }

        if segment.len() == 1 {
            if segment == "#" {
                seen_multi_level_wildcard = true;
            }
        } else if has_wildcard {
            properties.is_valid = false;
            break;
        }
    }

    // a share prefix must name a group and a filter
    if has_share_prefix && !properties.is_shared {
        properties.is_valid = false;
    }

    properties
}

pub(crate) fn validate_publish_outbound(packet: &PublishPacket, settings: &NegotiatedSettings) -> MqttResult<()> {
    if !is_valid_topic(&packet.topic) {
        error!("validate_publish_outbound - invalid topic \"{}\"", packet.topic);
        return Err(MqttError::new_invalid_argument("publish topic is not a valid topic"));
    }

    if packet.qos > settings.maximum_qos {
        error!("validate_publish_outbound - qos {} exceeds the server maximum of {}", packet.qos as u8, settings.maximum_qos as u8);
        return Err(MqttError::new_not_supported("publish qos exceeds the server's maximum qos"));
    }

    if packet.retain && !settings.retain_available {
        error!("validate_publish_outbound - server does not support retained messages");
        return Err(MqttError::new_not_supported("server does not support retained messages"));
    }

    Ok(())
}

pub(crate) fn validate_subscribe_outbound(packet: &SubscribePacket, settings: &NegotiatedSettings) -> MqttResult<()> {
    if packet.subscriptions.is_empty() {
        error!("validate_subscribe_outbound - empty subscription list");
        return Err(MqttError::new_invalid_argument("subscribe must contain at least one subscription"));
    }

    if !packet.properties.subscription_identifiers.is_empty() && !settings.subscription_identifiers_available {
        error!("validate_subscribe_outbound - server does not support subscription identifiers");
        return Err(MqttError::new_not_supported("server does not support subscription identifiers"));
    }

    for subscription in &packet.subscriptions {
        let filter_properties = compute_topic_filter_properties(&subscription.topic_filter);
        if !filter_properties.is_valid {
            error!("validate_subscribe_outbound - invalid topic filter \"{}\"", subscription.topic_filter);
            return Err(MqttError::new_invalid_argument("invalid subscription topic filter"));
        }

        if filter_properties.has_wildcard && !settings.wildcard_subscriptions_available {
            error!("validate_subscribe_outbound - server does not support wildcard subscriptions");
            return Err(MqttError::new_not_supported("server does not support wildcard subscriptions"));
        }

        if filter_properties.is_shared {
            if !settings.shared_subscriptions_available {
                error!("validate_subscribe_outbound - server does not support shared subscriptions");
                return Err(MqttError::new_not_supported("server does not support shared subscriptions"));
            }

            if subscription.no_local {
                error!("validate_subscribe_outbound - no_local set on a shared subscription");
                return Err(MqttError::new_invalid_argument("shared subscriptions cannot set no_local"));
            }
        }
    }

    Ok(())
}

pub(crate) fn validate_unsubscribe_outbound(packet: &UnsubscribePacket) -> MqttResult<()> {
    if packet.topic_filters.is_empty() {
        error!("validate_unsubscribe_outbound - empty topic filter list");
        return Err(MqttError::new_invalid_argument("unsubscribe must contain at least one topic filter"));
    }

    for topic_filter in &packet.topic_filters {
        if !compute_topic_filter_properties(topic_filter).is_valid {
            error!("validate_unsubscribe_outbound - invalid topic filter \"{}\"", topic_filter);
            return Err(MqttError::new_invalid_argument("invalid unsubscribe topic filter"));
        }
    }

    Ok(())
}

/// A client that asked for no problem information must not receive reason strings or user
/// properties on anything but Publish, Connack and Auth.
pub(crate) fn validate_problem_information_inbound(properties: &Properties, packet_type: PacketType) -> MqttResult<()> {
    if properties.reason_string.is_some() || !properties.user_properties.is_empty() {
        let message = format!("validate_problem_information_inbound - {} carries problem information that was not requested", packet_type);
        error!("{}", message);
        return Err(MqttError::new_protocol_error(message));
    }

    Ok(())
}
