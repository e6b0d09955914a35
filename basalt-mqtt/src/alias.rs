/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
Topic alias bookkeeping for MQTT5 connections.

Inbound, the engine keeps an [`InboundAliasResolver`] that maps aliases chosen by the server back
to topics.  Outbound, an [`OutboundAliasResolver`] decides, publish by publish, whether to bind or
reuse an alias.  Three outbound strategies are included; custom strategies may be supplied through
[`OutboundAliasResolverFactoryFn`].
*/

use crate::error::{MqttError, MqttResult};

use log::*;
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// How an outbound publish should be encoded with respect to topic aliasing.
#[derive(Default, Copy, Clone, Debug, Eq, PartialEq)]
pub struct OutboundAliasResolution {

    /// Encode the publish with an empty topic; the alias alone identifies it.
    pub skip_topic : bool,

    /// Alias to attach to the publish, if any.
    pub alias : Option<u16>,
}

/// Strategy for choosing topic aliases for outbound publishes.
pub trait OutboundAliasResolver : Send {

    /// Invoked on every successful Connack with the server's topic alias maximum.  Zero disables
    /// aliasing.  All previous bindings are forgotten.
    fn reset_for_new_connection(&mut self, maximum_alias_value : u16);

    /// Chooses the alias treatment for a publish to `topic`, where `alias` is the alias value
    /// requested by the publish itself, and records any new binding.
    fn resolve_and_apply_topic_alias(&mut self, alias: &Option<u16>, topic: &str) -> OutboundAliasResolution;
}

/// Factory signature used by client options to build a fresh resolver per client
pub type OutboundAliasResolverFactoryFn = Arc<dyn Fn() -> Box<dyn OutboundAliasResolver> + Send + Sync>;

/// Constructors for the built-in outbound resolver strategies
pub struct OutboundAliasResolverFactory {
}

impl OutboundAliasResolverFactory {

    /// Never alias.
    pub fn new_null_factory() -> OutboundAliasResolverFactoryFn {
        Arc::new(|| { Box::new(NullOutboundAliasResolver {}) })
    }

    /// Only use aliases that the publish itself requests, and only when they fall in the
    /// negotiated range.
    pub fn new_manual_factory() -> OutboundAliasResolverFactoryFn {
        Arc::new(|| { Box::new(ManualOutboundAliasResolver::new()) })
    }

    /// Choose aliases automatically, recycling the least recently used binding once the alias
    /// space (the smaller of `maximum_alias_value` and the server's limit) is full.
    pub fn new_lru_factory(maximum_alias_value : u16) -> OutboundAliasResolverFactoryFn {
        Arc::new(move || { Box::new(LruOutboundAliasResolver::new(maximum_alias_value)) })
    }
}

struct NullOutboundAliasResolver {
}

impl OutboundAliasResolver for NullOutboundAliasResolver {

    fn reset_for_new_connection(&mut self, _ : u16) {}

    fn resolve_and_apply_topic_alias(&mut self, _: &Option<u16>, _: &str) -> OutboundAliasResolution {
        OutboundAliasResolution::default()
    }
}

struct ManualOutboundAliasResolver {
    maximum_alias_value : u16,

    bindings : HashMap<u16, String>,
}

impl ManualOutboundAliasResolver {

    fn new() -> ManualOutboundAliasResolver {
        ManualOutboundAliasResolver {
            maximum_alias_value: 0,
            bindings : HashMap::new(),
        }
    }
}

impl OutboundAliasResolver for ManualOutboundAliasResolver {

    fn reset_for_new_connection(&mut self, maximum_alias_value : u16) {
        self.maximum_alias_value = maximum_alias_value;
        self.bindings.clear();
    }

    fn resolve_and_apply_topic_alias(&mut self, alias: &Option<u16>, topic: &str) -> OutboundAliasResolution {
        let Some(alias_value) = *alias else {
            return OutboundAliasResolution::default();
        };

        if alias_value == 0 || alias_value > self.maximum_alias_value {
            return OutboundAliasResolution::default();
        }

        let already_bound = self.bindings.get(&alias_value).map(|bound_topic| bound_topic == topic).unwrap_or(false);
        if !already_bound {
            self.bindings.insert(alias_value, topic.to_string());
        }

        OutboundAliasResolution {
            skip_topic: already_bound,
            alias: Some(alias_value),
        }
    }
}

struct LruOutboundAliasResolver {
    configured_maximum_alias_value : u16,
    negotiated_maximum_alias_value : u16,

    cache : LruCache<String, u16>
}

impl LruOutboundAliasResolver {

    fn new(maximum_alias_value : u16) -> LruOutboundAliasResolver {
        LruOutboundAliasResolver {
            configured_maximum_alias_value: maximum_alias_value,
            negotiated_maximum_alias_value: 0,
            cache : LruCache::unbounded(),
        }
    }

    fn next_unbound_alias(&mut self) -> Option<u16> {
        if self.cache.len() < self.negotiated_maximum_alias_value as usize {
            return Some(self.cache.len() as u16 + 1);
        }

        self.cache.pop_lru().map(|(_, recycled_alias)| recycled_alias)
    }
}

impl OutboundAliasResolver for LruOutboundAliasResolver {

    fn reset_for_new_connection(&mut self, maximum_alias_value : u16) {
        self.negotiated_maximum_alias_value = u16::min(self.configured_maximum_alias_value, maximum_alias_value);
        self.cache.clear();
        if let Some(capacity) = NonZeroUsize::new(self.negotiated_maximum_alias_value as usize) {
            self.cache.resize(capacity);
        }
    }

    fn resolve_and_apply_topic_alias(&mut self, _: &Option<u16>, topic: &str) -> OutboundAliasResolution {
        if self.negotiated_maximum_alias_value == 0 {
            return OutboundAliasResolution::default();
        }

        if let Some(existing_alias) = self.cache.get(topic) {
            return OutboundAliasResolution {
                skip_topic: true,
                alias: Some(*existing_alias),
            };
        }

        let alias = self.next_unbound_alias();
        if let Some(alias_value) = alias {
            self.cache.push(topic.to_string(), alias_value);
        }

        OutboundAliasResolution {
            skip_topic: false,
            alias,
        }
    }
}

/// Tracks the aliases the server has bound on the current connection
pub(crate) struct InboundAliasResolver {
    maximum_alias_value: u16,

    bindings : HashMap<u16, String>
}

impl InboundAliasResolver {

    pub(crate) fn new(maximum_alias_value: u16) -> InboundAliasResolver {
        InboundAliasResolver {
            maximum_alias_value,
            bindings : HashMap::new()
        }
    }

    pub(crate) fn reset_for_new_connection(&mut self, maximum_alias_value: u16) {
        self.maximum_alias_value = maximum_alias_value;
        self.bindings.clear();
    }

    /// Binds `alias` to a non-empty `topic`, or replaces an empty `topic` with the topic bound
    /// to `alias`.  Publishes without an alias pass through untouched.
    pub(crate) fn resolve_topic_alias(&mut self, alias: &Option<u16>, topic: &mut String) -> MqttResult<()> {
        let Some(alias_value) = *alias else {
            return Ok(());
        };

        if alias_value == 0 || alias_value > self.maximum_alias_value {
            let message = format!("resolve_topic_alias - inbound alias {} outside of the negotiated range (1..={})", alias_value, self.maximum_alias_value);
            error!("{}", message);
            return Err(MqttError::new_protocol_error(message));
        }

        if topic.is_empty() {
            match self.bindings.get(&alias_value) {
                Some(bound_topic) => {
                    *topic = bound_topic.clone();
                }
                None => {
                    let message = format!("resolve_topic_alias - no topic bound to inbound alias {}", alias_value);
                    error!("{}", message);
                    return Err(MqttError::new_protocol_error(message));
                }
            }
        } else {
            self.bindings.insert(alias_value, topic.clone());
        }

        Ok(())
    }
}
