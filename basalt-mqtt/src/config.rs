/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
Module containing types for configuring an MQTT connection.
 */

use crate::alias::OutboundAliasResolverFactoryFn;
use crate::encode::utils::{MAXIMUM_BINARY_LENGTH, MAXIMUM_STRING_LENGTH};
use crate::error::{MqttError, MqttResult};
use crate::mqtt::*;
use crate::validate::is_valid_topic;

use log::*;
use rand::Rng;
use rand::distributions::Alphanumeric;
use std::fmt::{Debug, Formatter};
use std::time::Duration;

const DEFAULT_KEEP_ALIVE_SECONDS : u32 = 60;
const DEFAULT_CONNACK_TIMEOUT : Duration = Duration::from_secs(30);
const DEFAULT_MAXIMUM_INCOMING_PACKET_SIZE : usize = 1024 * 1024;
const GENERATED_CLIENT_ID_PREFIX : &str = "basalt-";
const GENERATED_CLIENT_ID_RANDOM_LENGTH : usize = 16;

/// Receive maximum the client advertises when the Connect carries none.
pub(crate) const DEFAULT_RECEIVE_MAXIMUM : u16 = 65535;

/// Configuration options that determine the contents of the Connect packet sent when a
/// connection is established.
#[derive(Clone, Debug)]
pub struct ConnectOptions {

    pub(crate) keep_alive_interval_seconds: u32,

    pub(crate) clean_start: bool,

    pub(crate) client_id: Option<String>,

    pub(crate) username: Option<String>,

    pub(crate) password: Option<Vec<u8>>,

    pub(crate) will_topic: Option<String>,

    pub(crate) will_payload: Option<Vec<u8>>,

    pub(crate) will_qos: QualityOfService,

    pub(crate) will_retain: bool,

    pub(crate) will_properties: Properties,

    pub(crate) properties: Properties,
}

impl Default for ConnectOptions {

    /// Creates a ConnectOptions object with default values.
    ///
    /// Keep alive defaults to sixty seconds rather than zero, which would disable keep alive
    /// entirely.
    fn default() -> Self {
        ConnectOptions {
            keep_alive_interval_seconds: DEFAULT_KEEP_ALIVE_SECONDS,
            clean_start: true,
            client_id: None,
            username: None,
            password: None,
            will_topic: None,
            will_payload: None,
            will_qos: QualityOfService::AtMostOnce,
            will_retain: false,
            will_properties: Properties::default(),
            properties: Properties::default(),
        }
    }
}

fn generate_client_id() -> String {
    let suffix : String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_CLIENT_ID_RANDOM_LENGTH)
        .map(char::from)
        .collect();

    format!("{}{}", GENERATED_CLIENT_ID_PREFIX, suffix)
}

fn validate_string_length(value: &Option<String>, field: &str) -> MqttResult<()> {
    if let Some(value) = value {
        if value.len() > MAXIMUM_STRING_LENGTH {
            let message = format!("ConnectOptions::validate - {} is longer than {} bytes", field, MAXIMUM_STRING_LENGTH);
            error!("{}", message);
            return Err(MqttError::new_invalid_argument(message));
        }
    }

    Ok(())
}

fn validate_binary_length(value: &Option<Vec<u8>>, field: &str) -> MqttResult<()> {
    if let Some(value) = value {
        if value.len() > MAXIMUM_BINARY_LENGTH {
            let message = format!("ConnectOptions::validate - {} is longer than {} bytes", field, MAXIMUM_BINARY_LENGTH);
            error!("{}", message);
            return Err(MqttError::new_invalid_argument(message));
        }
    }

    Ok(())
}

impl ConnectOptions {

    /// Checks the options for values that cannot be turned into a legal Connect packet.
    pub(crate) fn validate(&self) -> MqttResult<()> {
        if self.keep_alive_interval_seconds > u16::MAX as u32 {
            error!("ConnectOptions::validate - keep alive interval of {} seconds does not fit in 16 bits", self.keep_alive_interval_seconds);
            return Err(MqttError::new_invalid_argument("keep alive interval must be at most 65535 seconds"));
        }

        match &self.will_topic {
            Some(will_topic) => {
                if !is_valid_topic(will_topic) {
                    error!("ConnectOptions::validate - invalid will topic \"{}\"", will_topic);
                    return Err(MqttError::new_invalid_argument("will topic is not a valid topic"));
                }
            }
            None => {
                if self.will_payload.is_some() || self.will_qos != QualityOfService::AtMostOnce || self.will_retain {
                    error!("ConnectOptions::validate - will payload, qos, or retain set without a will topic");
                    return Err(MqttError::new_invalid_argument("will settings require a will topic"));
                }
            }
        }

        if self.password.is_some() && self.username.is_none() {
            error!("ConnectOptions::validate - password set without a username");
            return Err(MqttError::new_invalid_argument("a password requires a username"));
        }

        validate_string_length(&self.client_id, "client id")?;
        validate_string_length(&self.username, "username")?;
        validate_binary_length(&self.password, "password")?;
        validate_binary_length(&self.will_payload, "will payload")?;

        Ok(())
    }

    /// Builds the Connect packet described by these options.  A random client id is generated
    /// if none was configured.
    pub(crate) fn to_connect_packet(&self) -> ConnectPacket {
        let will = self.will_topic.as_ref().map(|topic| {
            PublishPacket {
                topic: topic.clone(),
                qos: self.will_qos,
                retain: self.will_retain,
                payload: self.will_payload.clone().unwrap_or_default(),
                properties: self.will_properties.clone(),
                ..Default::default()
            }
        });

        ConnectPacket {
            keep_alive_interval_seconds: self.keep_alive_interval_seconds as u16,
            clean_start: self.clean_start,
            client_id: self.client_id.clone().unwrap_or_else(generate_client_id),
            username: self.username.clone(),
            password: self.password.clone(),
            will,
            properties: self.properties.clone(),
        }
    }

    /// Largest inbound packet the connection accepts: the advertised maximum packet size if set,
    /// one megabyte otherwise.
    pub(crate) fn maximum_incoming_packet_size(&self) -> usize {
        self.properties.maximum_packet_size.map(|size| size as usize).unwrap_or(DEFAULT_MAXIMUM_INCOMING_PACKET_SIZE)
    }

    /// Returns the MQTT client id currently configured in these options
    pub fn client_id(&self) -> &Option<String> { &self.client_id }
}

/// A builder for connection-related options.
///
/// These options determine packet field values for the Connect packet sent by the client.
#[derive(Debug, Default)]
pub struct ConnectOptionsBuilder {
    options: ConnectOptions
}

impl ConnectOptionsBuilder {

    /// Creates a new builder object for ConnectOptions
    pub fn new() -> Self {
        ConnectOptionsBuilder {
            ..Default::default()
        }
    }

    /// Sets the maximum time interval, in seconds, that is permitted to elapse between the point at which the client
    /// finishes transmitting one MQTT packet and the point it starts sending the next.  The client uses
    /// Pingreq packets to maintain this property.
    ///
    /// A server keep alive in the Connack overrides this value.  Zero disables keep alive.
    pub fn with_keep_alive_interval_seconds(&mut self, keep_alive: u32) -> &mut Self {
        self.options.keep_alive_interval_seconds = keep_alive;
        self
    }

    /// Sets whether the server should discard any existing session state for this client id.
    pub fn with_clean_start(&mut self, clean_start: bool) -> &mut Self {
        self.options.clean_start = clean_start;
        self
    }

    /// Sets a unique string identifying the client to the server.  Used to restore session state between connections.
    pub fn with_client_id(&mut self, client_id: &str) -> &mut Self {
        self.options.client_id = Some(client_id.to_string());
        self
    }

    /// Sets a string value that the server may use for client authentication and authorization.
    pub fn with_username(&mut self, username: &str) -> &mut Self {
        self.options.username = Some(username.to_string());
        self
    }

    /// Sets opaque binary data that the server may use for client authentication and authorization.
    pub fn with_password(&mut self, password: &[u8]) -> &mut Self {
        self.options.password = Some(password.to_vec());
        self
    }

    /// Sets the topic of the message the server publishes if the connection ends unexpectedly.
    pub fn with_will_topic(&mut self, will_topic: &str) -> &mut Self {
        self.options.will_topic = Some(will_topic.to_string());
        self
    }

    /// Sets the payload of the will message.
    pub fn with_will_payload(&mut self, will_payload: &[u8]) -> &mut Self {
        self.options.will_payload = Some(will_payload.to_vec());
        self
    }

    /// Sets the QoS of the will message.
    pub fn with_will_qos(&mut self, will_qos: QualityOfService) -> &mut Self {
        self.options.will_qos = will_qos;
        self
    }

    /// Sets whether the will message should be retained.
    pub fn with_will_retain(&mut self, will_retain: bool) -> &mut Self {
        self.options.will_retain = will_retain;
        self
    }

    /// Sets the MQTT5 properties of the will message.
    pub fn with_will_properties(&mut self, will_properties: Properties) -> &mut Self {
        self.options.will_properties = will_properties;
        self
    }

    /// Sets the MQTT5 properties of the Connect packet: session expiry, receive maximum,
    /// maximum packet size, topic alias maximum, problem and response information requests,
    /// enhanced authentication, and user properties.
    pub fn with_properties(&mut self, properties: Properties) -> &mut Self {
        self.options.properties = properties;
        self
    }

    /// Builds a new ConnectOptions object
    pub fn build(&self) -> ConnectOptions {
        self.options.clone()
    }
}

/// A structure that holds connection-level behavioral configuration
#[derive(Clone)]
pub struct MqttClientOptions {
    pub(crate) protocol_version: ProtocolVersion,

    pub(crate) connack_timeout: Duration,

    pub(crate) outbound_alias_resolver_factory: Option<OutboundAliasResolverFactoryFn>,
}

impl Debug for MqttClientOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "MqttClientOptions {{ ")?;
        write!(f, "protocol_version: {}, ", self.protocol_version)?;
        write!(f, "connack_timeout: {:?}, ", self.connack_timeout)?;
        if self.outbound_alias_resolver_factory.is_some() {
            write!(f, "outbound_alias_resolver_factory: Some(...), ")?;
        } else {
            write!(f, "outbound_alias_resolver_factory: None, ")?;
        };

        write!(f, "}}")
    }
}

impl Default for MqttClientOptions {
    fn default() -> Self {
        MqttClientOptions {
            protocol_version: ProtocolVersion::Mqtt5,
            connack_timeout: DEFAULT_CONNACK_TIMEOUT,
            outbound_alias_resolver_factory: None,
        }
    }
}

/// A builder for connection-level behavior configuration options
#[derive(Debug, Default)]
pub struct MqttClientOptionsBuilder {
    options: MqttClientOptions
}

impl MqttClientOptionsBuilder {

    /// Creates a new builder object for MqttClientOptions
    pub fn new() -> Self {
        MqttClientOptionsBuilder {
            options: MqttClientOptions {
                ..Default::default()
            }
        }
    }

    /// Sets the MQTT protocol version spoken on the connection.  Defaults to MQTT5.
    pub fn with_protocol_version(&mut self, protocol_version: ProtocolVersion) -> &mut Self {
        self.options.protocol_version = protocol_version;
        self
    }

    /// Sets how long to wait for a Connack before failing the connection.  Defaults to
    /// thirty seconds.
    pub fn with_connack_timeout(&mut self, connack_timeout: Duration) -> &mut Self {
        self.options.connack_timeout = connack_timeout;
        self
    }

    /// Sets the factory for the outbound topic alias strategy.  If unset, outbound publishes
    /// use the aliases they request, within the server's limit.
    pub fn with_outbound_alias_resolver_factory(&mut self, outbound_alias_resolver_factory: OutboundAliasResolverFactoryFn) -> &mut Self {
        self.options.outbound_alias_resolver_factory = Some(outbound_alias_resolver_factory);
        self
    }

    /// Builds a new set of client options
    pub fn build(&self) -> MqttClientOptions {
        self.options.clone()
    }
}
