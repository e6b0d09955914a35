/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use crate::alias::{InboundAliasResolver, OutboundAliasResolver};
use crate::config::{ConnectOptions, DEFAULT_RECEIVE_MAXIMUM};
use crate::encode::{encode_packet, EncodingContext};
use crate::error::{MqttError, MqttResult};
use crate::mqtt::*;
use crate::mqtt::utils::*;
use crate::validate::*;

use log::*;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::{Display, Formatter};
use std::time::{Duration, Instant};

/// Structure containing all of the variable MQTT protocol settings that get negotiated as part of
/// each new network connection's Connect <-> Connack handshake on establishment.
///
/// The default value reflects a server that advertised nothing, which under MQTT 3.1.1 is always
/// the case.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct NegotiatedSettings {

    /// The maximum QoS allowed between the server and client.
    pub maximum_qos : QualityOfService,

    /// The amount of time in seconds the server will retain the session after a disconnect.
    pub session_expiry_interval : u32,

    /// The number of QoS 1 and QoS2 publications the server is willing to process concurrently.
    pub receive_maximum_from_server : u16,

    /// The maximum packet size the server is willing to accept.
    pub maximum_packet_size_to_server : u32,

    /// The highest value that the server will accept as a Topic Alias sent by the client.
    pub topic_alias_maximum_to_server : u16,

    /// The keep alive interval, in seconds, used for ping and timeout checks.
    pub server_keep_alive : u16,

    /// Whether or not the server supports retained messages.
    pub retain_available : bool,

    /// Whether or not the server supports wildcard subscriptions.
    pub wildcard_subscriptions_available : bool,

    /// Whether or not the server supports subscription identifiers.
    pub subscription_identifiers_available : bool,

    /// Whether or not the server supports shared subscriptions.
    pub shared_subscriptions_available : bool,

    /// Whether or not the client has rejoined an existing session.
    pub rejoined_session : bool,

    /// Client id in use for the current connection
    pub client_id : String
}

impl Default for NegotiatedSettings {
    fn default() -> Self {
        NegotiatedSettings {
            maximum_qos: QualityOfService::ExactlyOnce,
            session_expiry_interval: 0,
            receive_maximum_from_server: 65535,
            maximum_packet_size_to_server: MAXIMUM_VARIABLE_LENGTH_INTEGER as u32,
            topic_alias_maximum_to_server: 0,
            server_keep_alive: 0,
            retain_available: true,
            wildcard_subscriptions_available: true,
            subscription_identifiers_available: true,
            shared_subscriptions_available: true,
            rejoined_session: false,
            client_id: String::new(),
        }
    }
}

impl Display for NegotiatedSettings {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "NegotiatedSettings {{")?;
        write!(f, " maximum_qos:{}", quality_of_service_to_str(self.maximum_qos))?;
        write!(f, " session_expiry_interval:{}", self.session_expiry_interval)?;
        write!(f, " receive_maximum_from_server:{}", self.receive_maximum_from_server)?;
        write!(f, " maximum_packet_size_to_server:{}", self.maximum_packet_size_to_server)?;
        write!(f, " topic_alias_maximum_to_server:{}", self.topic_alias_maximum_to_server)?;
        write!(f, " server_keep_alive:{}", self.server_keep_alive)?;
        write!(f, " retain_available:{}", self.retain_available)?;
        write!(f, " wildcard_subscriptions_available:{}", self.wildcard_subscriptions_available)?;
        write!(f, " subscription_identifiers_available:{}", self.subscription_identifiers_available)?;
        write!(f, " shared_subscriptions_available:{}", self.shared_subscriptions_available)?;
        write!(f, " rejoined_session:{}", self.rejoined_session)?;
        write!(f, " client_id:{}", self.client_id)?;
        write!(f, " }}")
    }
}

// Most received packets stay internal.  These are surfaced to the application by the client.
#[cfg_attr(test, derive(Eq, PartialEq, Debug))]
pub(crate) enum PacketEvent {
    Connack(ConnackPacket),
    Publish(PublishPacket),
    Suback(SubackPacket),
    Unsuback(UnsubackPacket),
    Disconnect(DisconnectPacket),
    AuthenticationChallenge(AuthPacket),
}

pub(crate) struct NetworkEventContext<'a> {
    pub(crate) current_time: Instant,

    // output field for all data that should be written to the transport
    pub(crate) to_socket: &'a mut Vec<u8>,

    // output field for packets that the client is interested in
    pub(crate) packet_events: &'a mut VecDeque<PacketEvent>,
}

pub(crate) struct ServiceContext<'a> {
    pub(crate) current_time: Instant,

    pub(crate) to_socket: &'a mut Vec<u8>,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum ProtocolStateType {
    Disconnected,
    PendingConnack,
    Connected,
}

impl Display for ProtocolStateType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolStateType::Disconnected => { write!(f, "Disconnected") }
            ProtocolStateType::PendingConnack => { write!(f, "PendingConnack") }
            ProtocolStateType::Connected => { write!(f, "Connected") }
        }
    }
}

pub(crate) struct ProtocolStateConfig {
    pub connect_options: ConnectOptions,

    pub protocol_version: ProtocolVersion,

    pub connack_timeout: Duration,

    pub base_timestamp: Instant,

    pub outbound_alias_resolver: Box<dyn OutboundAliasResolver>,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum PendingAcknowledgementKind {
    Qos1Publish,
    Qos2Publish,
    Pubrel,
}

// An outbound QoS 1 or 2 flow awaiting acknowledgement.  The packet is the publish until a
// Pubrec promotes it to the matching Pubrel.  Sequence preserves original send order.
struct PendingAcknowledgement {
    sequence: u64,

    packet: MqttPacket,
}

/// The session and QoS state machine for a single client.
///
/// Performs no I/O.  Every entry point takes the current time; packets to send are encoded onto
/// the context's output buffer and packets the application should see are pushed onto its event
/// queue.  Pending acknowledgements and the inbound QoS 2 set outlive individual connections so
/// that a resumed session can finish its in-flight flows.
pub(crate) struct ProtocolState {
    protocol_version: ProtocolVersion,

    connack_timeout: Duration,

    base_timestamp: Instant,

    elapsed_time_ms: u128,

    state: ProtocolStateType,

    connect: ConnectPacket,

    current_settings: Option<NegotiatedSettings>,

    next_packet_id: u16,

    next_sequence: u64,

    pending_acknowledgements: HashMap<u16, PendingAcknowledgement>,

    qos2_incomplete_incoming_publishes: HashSet<u16>,

    pending_subscribes: HashSet<u16>,

    pending_unsubscribes: HashSet<u16>,

    outbound_alias_resolver: Box<dyn OutboundAliasResolver>,

    inbound_alias_resolver: InboundAliasResolver,

    connection_start_time: Option<Instant>,

    // last write of anything other than a ping; drives the ping threshold
    last_send_time: Option<Instant>,

    // set while a ping is unanswered, cleared by any inbound packet
    ping_response_deadline: Option<Instant>,
}

impl ProtocolState {

    pub(crate) fn new(config: ProtocolStateConfig) -> ProtocolState {
        let connect = config.connect_options.to_connect_packet();
        let inbound_alias_maximum = compute_inbound_alias_maximum(&connect, config.protocol_version);

        ProtocolState {
            protocol_version: config.protocol_version,
            connack_timeout: config.connack_timeout,
            base_timestamp: config.base_timestamp,
            elapsed_time_ms: 0,
            state: ProtocolStateType::Disconnected,
            connect,
            current_settings: None,
            next_packet_id: 1,
            next_sequence: 0,
            pending_acknowledgements: HashMap::new(),
            qos2_incomplete_incoming_publishes: HashSet::new(),
            pending_subscribes: HashSet::new(),
            pending_unsubscribes: HashSet::new(),
            outbound_alias_resolver: config.outbound_alias_resolver,
            inbound_alias_resolver: InboundAliasResolver::new(inbound_alias_maximum),
            connection_start_time: None,
            last_send_time: None,
            ping_response_deadline: None,
        }
    }

    pub(crate) fn state(&self) -> ProtocolStateType {
        self.state
    }

    pub(crate) fn protocol_version(&self) -> ProtocolVersion {
        self.protocol_version
    }

    pub(crate) fn negotiated_settings(&self) -> Option<&NegotiatedSettings> {
        self.current_settings.as_ref()
    }

    /// Number of outbound QoS 1 and QoS 2 flows that have not completed
    pub(crate) fn pending_acknowledgement_count(&self) -> usize {
        self.pending_acknowledgements.len()
    }

    /// Begins a new connection by writing a Connect packet.  Pending acknowledgements are kept
    /// until the Connack reveals whether the session survived.
    pub(crate) fn start_connection(&mut self, context: &mut ServiceContext) -> MqttResult<()> {
        self.update_internal_clock(&context.current_time);

        if self.state != ProtocolStateType::Disconnected {
            error!("[{} ms] start_connection - connection already in progress in state {}", self.elapsed_time_ms, self.state);
            return Err(MqttError::new_internal_state_error("connection already in progress"));
        }

        info!("[{} ms] start_connection - sending CONNECT for client id \"{}\"", self.elapsed_time_ms, self.connect.client_id);

        self.current_settings = None;
        self.pending_subscribes.clear();
        self.pending_unsubscribes.clear();
        self.inbound_alias_resolver.reset_for_new_connection(compute_inbound_alias_maximum(&self.connect, self.protocol_version));
        self.ping_response_deadline = None;
        self.connection_start_time = Some(context.current_time);

        let connect = MqttPacket::Connect(self.connect.clone());
        self.write_packet(&connect, context.to_socket, context.current_time)?;

        self.change_state(ProtocolStateType::PendingConnack);

        Ok(())
    }

    pub(crate) fn handle_connection_closed(&mut self) {
        info!("[{} ms] handle_connection_closed - connection closed in state {}", self.elapsed_time_ms, self.state);

        self.change_state(ProtocolStateType::Disconnected);
        self.connection_start_time = None;
        self.last_send_time = None;
        self.ping_response_deadline = None;
    }

    /// Applies one decoded inbound packet
    pub(crate) fn handle_packet(&mut self, packet: MqttPacket, context: &mut NetworkEventContext) -> MqttResult<()> {
        self.update_internal_clock(&context.current_time);
        self.ping_response_deadline = None;

        match packet {
            MqttPacket::Connack(connack) => { self.handle_connack(connack, context) }
            MqttPacket::Publish(publish) => { self.handle_publish(publish, context) }
            MqttPacket::Puback(puback) => { self.handle_puback(puback) }
            MqttPacket::Pubrec(pubrec) => { self.handle_pubrec(pubrec, context) }
            MqttPacket::Pubrel(pubrel) => { self.handle_pubrel(pubrel, context) }
            MqttPacket::Pubcomp(pubcomp) => { self.handle_pubcomp(pubcomp) }
            MqttPacket::Suback(suback) => { self.handle_suback(suback, context) }
            MqttPacket::Unsuback(unsuback) => { self.handle_unsuback(unsuback, context) }
            MqttPacket::Pingresp(_) => { self.handle_pingresp() }
            MqttPacket::Disconnect(disconnect) => { self.handle_disconnect(disconnect, context) }
            MqttPacket::Auth(auth) => { self.handle_auth(auth, context) }
            _ => {
                let message = format!("[{} ms] handle_packet - {} packets are never sent to a client", self.elapsed_time_ms, mqtt_packet_to_str(&packet));
                error!("{}", message);
                Err(MqttError::new_protocol_error(message))
            }
        }
    }

    /// Performs time-based checks: the Connack deadline while connecting, keep alive pings and
    /// timeouts once connected.
    pub(crate) fn service(&mut self, context: &mut ServiceContext) -> MqttResult<()> {
        self.update_internal_clock(&context.current_time);

        match self.state {
            ProtocolStateType::Disconnected => { Ok(()) }
            ProtocolStateType::PendingConnack => { self.service_pending_connack(context) }
            ProtocolStateType::Connected => { self.service_keep_alive(context) }
        }
    }

    /// Sends a publish.  Returns the packet id bound to QoS 1 and 2 publishes.
    pub(crate) fn publish(&mut self, mut packet: PublishPacket, context: &mut ServiceContext) -> MqttResult<Option<u16>> {
        self.update_internal_clock(&context.current_time);
        self.check_connected("publish")?;

        let settings = self.settings()?;
        validate_publish_outbound(&packet, settings)?;

        if packet.qos == QualityOfService::AtMostOnce {
            packet.packet_id = 0;
            packet.duplicate = false;
            self.write_packet(&MqttPacket::Publish(packet), context.to_socket, context.current_time)?;
            return Ok(None);
        }

        let receive_maximum = settings.receive_maximum_from_server;
        if self.pending_acknowledgements.len() >= receive_maximum as usize {
            warn!("[{} ms] publish - server receive maximum of {} reached", self.elapsed_time_ms, receive_maximum);
            return Err(MqttError::new_quota_exceeded(receive_maximum));
        }

        let packet_id = self.acquire_free_packet_id()?;
        packet.packet_id = packet_id;
        packet.duplicate = false;

        let packet = MqttPacket::Publish(packet);
        self.write_packet(&packet, context.to_socket, context.current_time)?;
        self.add_pending_acknowledgement(packet_id, packet)?;

        Ok(Some(packet_id))
    }

    pub(crate) fn subscribe(&mut self, mut packet: SubscribePacket, context: &mut ServiceContext) -> MqttResult<u16> {
        self.update_internal_clock(&context.current_time);
        self.check_connected("subscribe")?;
        validate_subscribe_outbound(&packet, self.settings()?)?;

        let packet_id = self.acquire_free_packet_id()?;
        packet.packet_id = packet_id;

        self.write_packet(&MqttPacket::Subscribe(packet), context.to_socket, context.current_time)?;
        self.pending_subscribes.insert(packet_id);

        Ok(packet_id)
    }

    pub(crate) fn unsubscribe(&mut self, mut packet: UnsubscribePacket, context: &mut ServiceContext) -> MqttResult<u16> {
        self.update_internal_clock(&context.current_time);
        self.check_connected("unsubscribe")?;
        validate_unsubscribe_outbound(&packet)?;

        let packet_id = self.acquire_free_packet_id()?;
        packet.packet_id = packet_id;

        self.write_packet(&MqttPacket::Unsubscribe(packet), context.to_socket, context.current_time)?;
        self.pending_unsubscribes.insert(packet_id);

        Ok(packet_id)
    }

    /// Writes a Disconnect and moves to the disconnected state.  The caller closes the transport.
    pub(crate) fn disconnect(&mut self, packet: DisconnectPacket, context: &mut ServiceContext) -> MqttResult<()> {
        self.update_internal_clock(&context.current_time);
        validate_reason_code_outbound(packet.reason_code, DISCONNECT_REASON_CODES, PacketType::Disconnect)?;

        if self.state == ProtocolStateType::Disconnected {
            error!("[{} ms] disconnect - no connection to disconnect", self.elapsed_time_ms);
            return Err(MqttError::new_not_ready("disconnect requires a connection"));
        }

        info!("[{} ms] disconnect - sending DISCONNECT with reason {}", self.elapsed_time_ms, packet.reason_code);
        let result = self.write_packet(&MqttPacket::Disconnect(packet), context.to_socket, context.current_time);
        self.handle_connection_closed();

        result
    }

    /// Starts MQTT5 re-authentication on an established connection
    pub(crate) fn reauthenticate(&mut self, authentication_data: Vec<u8>, context: &mut ServiceContext) -> MqttResult<()> {
        self.update_internal_clock(&context.current_time);
        let authentication_method = self.get_authentication_method_for_outbound_auth("reauthenticate")?;
        self.check_connected("reauthenticate")?;

        info!("[{} ms] reauthenticate - sending AUTH to re-authenticate", self.elapsed_time_ms);
        self.write_auth(ReasonCode::ReAuthenticate, authentication_method, authentication_data, context)
    }

    /// Answers an authentication challenge from the server
    pub(crate) fn continue_authentication(&mut self, authentication_data: Vec<u8>, context: &mut ServiceContext) -> MqttResult<()> {
        self.update_internal_clock(&context.current_time);
        let authentication_method = self.get_authentication_method_for_outbound_auth("continue_authentication")?;
        if self.state == ProtocolStateType::Disconnected {
            error!("[{} ms] continue_authentication - no connection", self.elapsed_time_ms);
            return Err(MqttError::new_not_ready("authentication requires a connection"));
        }

        debug!("[{} ms] continue_authentication - answering authentication challenge", self.elapsed_time_ms);
        self.write_auth(ReasonCode::ContinueAuthentication, authentication_method, authentication_data, context)
    }

    fn write_auth(&mut self, reason_code: ReasonCode, authentication_method: String, authentication_data: Vec<u8>, context: &mut ServiceContext) -> MqttResult<()> {
        let auth = MqttPacket::Auth(AuthPacket {
            reason_code,
            properties: Properties {
                authentication_method: Some(authentication_method),
                authentication_data: Some(authentication_data),
                ..Default::default()
            },
        });

        self.write_packet(&auth, context.to_socket, context.current_time)
    }

    fn get_authentication_method_for_outbound_auth(&self, operation: &str) -> MqttResult<String> {
        if self.protocol_version != ProtocolVersion::Mqtt5 {
            error!("[{} ms] {} - authentication exchanges require MQTT5", self.elapsed_time_ms, operation);
            return Err(MqttError::new_invalid_argument("authentication exchanges require MQTT5"));
        }

        match &self.connect.properties.authentication_method {
            Some(method) => { Ok(method.clone()) }
            None => {
                error!("[{} ms] {} - no authentication method configured", self.elapsed_time_ms, operation);
                Err(MqttError::new_invalid_argument("connect options do not configure an authentication method"))
            }
        }
    }

    fn update_internal_clock(&mut self, current_time: &Instant) {
        self.elapsed_time_ms = current_time.saturating_duration_since(self.base_timestamp).as_millis();
    }

    fn change_state(&mut self, next_state: ProtocolStateType) {
        if self.state != next_state {
            debug!("[{} ms] change_state - transitioning from {} to {}", self.elapsed_time_ms, self.state, next_state);
            self.state = next_state;
        }
    }

    fn check_connected(&self, operation: &str) -> MqttResult<()> {
        if self.state != ProtocolStateType::Connected {
            error!("[{} ms] {} - not connected, current state is {}", self.elapsed_time_ms, operation, self.state);
            return Err(MqttError::new_not_ready(format!("{} requires an established connection", operation)));
        }

        Ok(())
    }

    fn check_inbound_state(&self, packet_type: PacketType) -> MqttResult<()> {
        if self.state != ProtocolStateType::Connected {
            let message = format!("[{} ms] invalid state {} to receive a {}", self.elapsed_time_ms, self.state, packet_type);
            error!("{}", message);
            return Err(MqttError::new_protocol_error(message));
        }

        Ok(())
    }

    fn check_problem_information(&self, properties: &Properties, packet_type: PacketType) -> MqttResult<()> {
        if self.protocol_version == ProtocolVersion::Mqtt5 && self.connect.properties.request_problem_information == Some(false) {
            validate_problem_information_inbound(properties, packet_type)?;
        }

        Ok(())
    }

    fn settings(&self) -> MqttResult<&NegotiatedSettings> {
        match &self.current_settings {
            Some(settings) => { Ok(settings) }
            None => {
                error!("[{} ms] settings - no negotiated settings in state {}", self.elapsed_time_ms, self.state);
                Err(MqttError::new_internal_state_error("no negotiated settings"))
            }
        }
    }

    fn write_packet(&mut self, packet: &MqttPacket, to_socket: &mut Vec<u8>, current_time: Instant) -> MqttResult<()> {
        let mut encoding_context = EncodingContext::default();
        if let MqttPacket::Publish(publish) = packet {
            if self.protocol_version == ProtocolVersion::Mqtt5 {
                encoding_context.outbound_alias_resolution = self.outbound_alias_resolver.resolve_and_apply_topic_alias(&publish.properties.topic_alias, &publish.topic);
            }
        }

        let encoding = encode_packet(packet, self.protocol_version, &encoding_context)?;
        if let Some(settings) = &self.current_settings {
            let maximum_packet_size = settings.maximum_packet_size_to_server as usize;
            if encoding.len() > maximum_packet_size {
                error!("[{} ms] write_packet - {} of {} bytes exceeds the server maximum packet size of {}", self.elapsed_time_ms, mqtt_packet_to_str(packet), encoding.len(), maximum_packet_size);
                return Err(MqttError::new_packet_too_large(encoding.len(), maximum_packet_size));
            }
        }

        to_socket.extend_from_slice(&encoding);

        if !matches!(packet, MqttPacket::Pingreq(_)) {
            self.last_send_time = Some(current_time);
        }

        Ok(())
    }

    fn is_packet_id_in_use(&self, packet_id: u16) -> bool {
        self.pending_acknowledgements.contains_key(&packet_id) ||
            self.qos2_incomplete_incoming_publishes.contains(&packet_id) ||
            self.pending_subscribes.contains(&packet_id) ||
            self.pending_unsubscribes.contains(&packet_id)
    }

    fn acquire_free_packet_id(&mut self) -> MqttResult<u16> {
        let start_id = self.next_packet_id;
        let mut check_id = start_id;

        loop {
            if self.next_packet_id == u16::MAX {
                self.next_packet_id = 1;
            } else {
                self.next_packet_id += 1;
            }

            if !self.is_packet_id_in_use(check_id) {
                return Ok(check_id);
            }

            if self.next_packet_id == start_id {
                error!("[{} ms] acquire_free_packet_id - could not find an unbound packet id", self.elapsed_time_ms);
                return Err(MqttError::new_internal_state_error("packet id space exhausted"));
            }

            check_id = self.next_packet_id;
        }
    }

    fn add_pending_acknowledgement(&mut self, packet_id: u16, packet: MqttPacket) -> MqttResult<()> {
        if self.pending_acknowledgements.contains_key(&packet_id) {
            error!("[{} ms] add_pending_acknowledgement - packet id {} is already bound", self.elapsed_time_ms, packet_id);
            return Err(MqttError::new_packet_identifier_in_use(packet_id));
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        self.pending_acknowledgements.insert(packet_id, PendingAcknowledgement {
            sequence,
            packet,
        });

        Ok(())
    }

    fn get_pending_acknowledgement_kind(&self, packet_id: u16) -> Option<PendingAcknowledgementKind> {
        match self.pending_acknowledgements.get(&packet_id).map(|pending| &pending.packet) {
            Some(MqttPacket::Publish(publish)) => {
                if publish.qos == QualityOfService::ExactlyOnce {
                    Some(PendingAcknowledgementKind::Qos2Publish)
                } else {
                    Some(PendingAcknowledgementKind::Qos1Publish)
                }
            }
            Some(_) => { Some(PendingAcknowledgementKind::Pubrel) }
            None => { None }
        }
    }

    fn service_pending_connack(&mut self, context: &mut ServiceContext) -> MqttResult<()> {
        if let Some(start_time) = &self.connection_start_time {
            if context.current_time.saturating_duration_since(*start_time) > self.connack_timeout {
                error!("[{} ms] service_pending_connack - no CONNACK received within {:?}", self.elapsed_time_ms, self.connack_timeout);
                return Err(MqttError::new_connack_timeout());
            }
        }

        Ok(())
    }

    // Pings go out once 90% of the keep alive interval has passed since the last send, no matter
    // how much inbound traffic arrives.  An unanswered ping fails the connection once the rest
    // of the interval has passed without any inbound packet.
    fn service_keep_alive(&mut self, context: &mut ServiceContext) -> MqttResult<()> {
        let keep_alive = Duration::from_secs(self.settings()?.server_keep_alive as u64);
        if keep_alive.is_zero() {
            return Ok(());
        }

        if let Some(deadline) = self.ping_response_deadline {
            if context.current_time > deadline {
                error!("[{} ms] service_keep_alive - no response to ping within the keep alive interval", self.elapsed_time_ms);
                return Err(MqttError::new_keep_alive_timeout());
            }

            return Ok(());
        }

        let Some(last_send_time) = self.last_send_time else {
            return Ok(());
        };

        let ping_threshold = keep_alive * 9 / 10;
        if context.current_time.saturating_duration_since(last_send_time) > ping_threshold {
            debug!("[{} ms] service_keep_alive - ping threshold reached, sending ping", self.elapsed_time_ms);
            self.write_packet(&MqttPacket::Pingreq(PingreqPacket {}), context.to_socket, context.current_time)?;
            self.last_send_time = Some(context.current_time);
            self.ping_response_deadline = Some(context.current_time + (keep_alive - ping_threshold));
        }

        Ok(())
    }

    fn apply_session_present_to_connection(&mut self, session_present: bool, context: &mut NetworkEventContext) -> MqttResult<()> {
        if !session_present {
            info!("[{} ms] apply_session_present_to_connection - no session present, discarding {} unacknowledged packets", self.elapsed_time_ms, self.pending_acknowledgements.len());
            self.pending_acknowledgements.clear();
            self.qos2_incomplete_incoming_publishes.clear();
            self.next_packet_id = 1;
            return Ok(());
        }

        info!("[{} ms] apply_session_present_to_connection - successfully rejoined a session, resubmitting {} unacknowledged packets", self.elapsed_time_ms, self.pending_acknowledgements.len());

        let mut resubmissions : Vec<(u64, MqttPacket)> = self.pending_acknowledgements.values_mut().map(|pending| {
            if let MqttPacket::Publish(publish) = &mut pending.packet {
                publish.duplicate = true;
            }

            (pending.sequence, pending.packet.clone())
        }).collect();

        // re-establish submission order
        resubmissions.sort_by_key(|(sequence, _)| *sequence);

        for (_, packet) in resubmissions {
            self.write_packet(&packet, context.to_socket, context.current_time)?;
        }

        Ok(())
    }

    fn handle_connack(&mut self, connack: ConnackPacket, context: &mut NetworkEventContext) -> MqttResult<()> {
        info!("[{} ms] handle_connack - processing CONNACK packet", self.elapsed_time_ms);

        if self.state != ProtocolStateType::PendingConnack {
            error!("[{} ms] handle_connack - invalid state to receive a connack", self.elapsed_time_ms);
            return Err(MqttError::new_protocol_error("invalid state for connack receipt"));
        }

        if !connack.reason_code.is_success() {
            error!("[{} ms] handle_connack - connection rejected with reason code {}", self.elapsed_time_ms, connack.reason_code);
            return Err(MqttError::new_connection_rejected(connack.reason_code));
        }

        if connack.session_present && self.connect.clean_start {
            error!("[{} ms] handle_connack - server reported a session present in response to a clean start", self.elapsed_time_ms);
            return Err(MqttError::new_protocol_error("session present in response to a clean start connect"));
        }

        let settings = build_negotiated_settings(&self.connect, &connack);
        debug!("[{} ms] handle_connack - negotiated settings: {}", self.elapsed_time_ms, &settings);

        // later connections must present the same client id to resume the session
        self.connect.client_id = settings.client_id.clone();
        self.outbound_alias_resolver.reset_for_new_connection(settings.topic_alias_maximum_to_server);
        self.current_settings = Some(settings);
        self.connection_start_time = None;

        self.change_state(ProtocolStateType::Connected);
        self.apply_session_present_to_connection(connack.session_present, context)?;

        context.packet_events.push_back(PacketEvent::Connack(connack));

        Ok(())
    }

    fn handle_publish(&mut self, mut publish: PublishPacket, context: &mut NetworkEventContext) -> MqttResult<()> {
        info!("[{} ms] handle_publish - processing PUBLISH packet", self.elapsed_time_ms);
        self.check_inbound_state(PacketType::Publish)?;

        let maximum_qos = self.settings()?.maximum_qos;
        if publish.qos > maximum_qos {
            error!("[{} ms] handle_publish - publish qos {} exceeds negotiated maximum {}", self.elapsed_time_ms, quality_of_service_to_str(publish.qos), quality_of_service_to_str(maximum_qos));
            return Err(MqttError::new_protocol_error("inbound publish exceeds the negotiated maximum qos"));
        }

        if self.protocol_version == ProtocolVersion::Mqtt5 {
            self.inbound_alias_resolver.resolve_topic_alias(&publish.properties.topic_alias, &mut publish.topic)?;
            if publish.topic.is_empty() {
                error!("[{} ms] handle_publish - publish has neither a topic nor a topic alias", self.elapsed_time_ms);
                return Err(MqttError::new_protocol_error("inbound publish has neither a topic nor a topic alias"));
            }
        }

        let packet_id = publish.packet_id;
        match publish.qos {
            QualityOfService::AtMostOnce => {
                context.packet_events.push_back(PacketEvent::Publish(publish));
                Ok(())
            }

            QualityOfService::AtLeastOnce => {
                context.packet_events.push_back(PacketEvent::Publish(publish));

                let puback = MqttPacket::Puback(PubackPacket {
                    packet_id,
                    ..Default::default()
                });

                self.write_packet(&puback, context.to_socket, context.current_time)
            }

            QualityOfService::ExactlyOnce => {
                if !self.qos2_incomplete_incoming_publishes.contains(&packet_id) {
                    let receive_maximum = compute_client_receive_maximum(&self.connect, self.protocol_version);
                    if self.qos2_incomplete_incoming_publishes.len() >= receive_maximum as usize {
                        error!("[{} ms] handle_publish - more than {} unreleased QoS 2 publishes", self.elapsed_time_ms, receive_maximum);
                        return Err(MqttError::new_receive_maximum_exceeded());
                    }

                    self.qos2_incomplete_incoming_publishes.insert(packet_id);
                    context.packet_events.push_back(PacketEvent::Publish(publish));
                } else {
                    debug!("[{} ms] handle_publish - duplicate QoS 2 publish with packet id {} not redelivered", self.elapsed_time_ms, packet_id);
                }

                let pubrec = MqttPacket::Pubrec(PubrecPacket {
                    packet_id,
                    ..Default::default()
                });

                self.write_packet(&pubrec, context.to_socket, context.current_time)
            }
        }
    }

    fn handle_puback(&mut self, puback: PubackPacket) -> MqttResult<()> {
        info!("[{} ms] handle_puback - processing PUBACK packet", self.elapsed_time_ms);
        self.check_inbound_state(PacketType::Puback)?;
        self.check_problem_information(&puback.properties, PacketType::Puback)?;

        let packet_id = puback.packet_id;
        match self.get_pending_acknowledgement_kind(packet_id) {
            Some(PendingAcknowledgementKind::Qos1Publish) => {
                if !puback.reason_code.is_success() {
                    warn!("[{} ms] handle_puback - publish with packet id {} rejected with reason code {}", self.elapsed_time_ms, packet_id, puback.reason_code);
                }

                self.pending_acknowledgements.remove(&packet_id);
                Ok(())
            }
            Some(_) => {
                error!("[{} ms] handle_puback - packet id {} does not belong to a QoS 1 publish", self.elapsed_time_ms, packet_id);
                Err(MqttError::new_protocol_error("puback received for a pending packet that is not a qos1 publish"))
            }
            None => {
                warn!("[{} ms] handle_puback - no pending publish for packet id {}, ignoring", self.elapsed_time_ms, packet_id);
                Ok(())
            }
        }
    }

    fn handle_pubrec(&mut self, pubrec: PubrecPacket, context: &mut NetworkEventContext) -> MqttResult<()> {
        info!("[{} ms] handle_pubrec - processing PUBREC packet", self.elapsed_time_ms);
        self.check_inbound_state(PacketType::Pubrec)?;
        self.check_problem_information(&pubrec.properties, PacketType::Pubrec)?;

        let packet_id = pubrec.packet_id;
        let pubrel = MqttPacket::Pubrel(PubrelPacket {
            packet_id,
            ..Default::default()
        });

        match self.get_pending_acknowledgement_kind(packet_id) {
            Some(PendingAcknowledgementKind::Qos2Publish) => {
                if !pubrec.reason_code.is_success() {
                    warn!("[{} ms] handle_pubrec - publish with packet id {} rejected with reason code {}", self.elapsed_time_ms, packet_id, pubrec.reason_code);
                    self.pending_acknowledgements.remove(&packet_id);
                    return Ok(());
                }

                if let Some(pending) = self.pending_acknowledgements.get_mut(&packet_id) {
                    pending.packet = pubrel.clone();
                }

                self.write_packet(&pubrel, context.to_socket, context.current_time)
            }
            Some(PendingAcknowledgementKind::Pubrel) => {
                debug!("[{} ms] handle_pubrec - duplicate PUBREC for packet id {}, resending PUBREL", self.elapsed_time_ms, packet_id);
                self.write_packet(&pubrel, context.to_socket, context.current_time)
            }
            Some(PendingAcknowledgementKind::Qos1Publish) => {
                error!("[{} ms] handle_pubrec - packet id {} does not belong to a QoS 2 publish", self.elapsed_time_ms, packet_id);
                Err(MqttError::new_protocol_error("pubrec received for a pending packet that is not a qos2 publish"))
            }
            None => {
                warn!("[{} ms] handle_pubrec - no pending publish for packet id {}, ignoring", self.elapsed_time_ms, packet_id);
                Ok(())
            }
        }
    }

    fn handle_pubrel(&mut self, pubrel: PubrelPacket, context: &mut NetworkEventContext) -> MqttResult<()> {
        info!("[{} ms] handle_pubrel - processing PUBREL packet", self.elapsed_time_ms);
        self.check_inbound_state(PacketType::Pubrel)?;
        self.check_problem_information(&pubrel.properties, PacketType::Pubrel)?;

        let packet_id = pubrel.packet_id;
        if !self.qos2_incomplete_incoming_publishes.remove(&packet_id) {
            error!("[{} ms] handle_pubrel - no unreleased QoS 2 publish with packet id {}", self.elapsed_time_ms, packet_id);
            return Err(MqttError::new_packet_identifier_not_found(packet_id));
        }

        let pubcomp = MqttPacket::Pubcomp(PubcompPacket {
            packet_id,
            ..Default::default()
        });

        self.write_packet(&pubcomp, context.to_socket, context.current_time)
    }

    fn handle_pubcomp(&mut self, pubcomp: PubcompPacket) -> MqttResult<()> {
        info!("[{} ms] handle_pubcomp - processing PUBCOMP packet", self.elapsed_time_ms);
        self.check_inbound_state(PacketType::Pubcomp)?;
        self.check_problem_information(&pubcomp.properties, PacketType::Pubcomp)?;

        let packet_id = pubcomp.packet_id;
        if self.get_pending_acknowledgement_kind(packet_id) != Some(PendingAcknowledgementKind::Pubrel) {
            error!("[{} ms] handle_pubcomp - no released QoS 2 publish with packet id {}", self.elapsed_time_ms, packet_id);
            return Err(MqttError::new_packet_identifier_not_found(packet_id));
        }

        if !pubcomp.reason_code.is_success() {
            warn!("[{} ms] handle_pubcomp - release of packet id {} completed with reason code {}", self.elapsed_time_ms, packet_id, pubcomp.reason_code);
        }

        self.pending_acknowledgements.remove(&packet_id);

        Ok(())
    }

    fn handle_suback(&mut self, suback: SubackPacket, context: &mut NetworkEventContext) -> MqttResult<()> {
        info!("[{} ms] handle_suback - processing SUBACK packet", self.elapsed_time_ms);
        self.check_inbound_state(PacketType::Suback)?;
        self.check_problem_information(&suback.properties, PacketType::Suback)?;

        if !self.pending_subscribes.remove(&suback.packet_id) {
            error!("[{} ms] handle_suback - no pending subscribe with packet id {}", self.elapsed_time_ms, suback.packet_id);
            return Err(MqttError::new_protocol_error("suback received for an unknown packet id"));
        }

        let rejection = suback.reason_codes.iter().find(|reason_code| !reason_code.is_success()).copied();
        context.packet_events.push_back(PacketEvent::Suback(suback));

        if let Some(reason_code) = rejection {
            error!("[{} ms] handle_suback - subscription rejected with reason code {}", self.elapsed_time_ms, reason_code);
            return Err(MqttError::new_subscription_rejected(reason_code));
        }

        Ok(())
    }

    fn handle_unsuback(&mut self, unsuback: UnsubackPacket, context: &mut NetworkEventContext) -> MqttResult<()> {
        info!("[{} ms] handle_unsuback - processing UNSUBACK packet", self.elapsed_time_ms);
        self.check_inbound_state(PacketType::Unsuback)?;
        self.check_problem_information(&unsuback.properties, PacketType::Unsuback)?;

        if !self.pending_unsubscribes.remove(&unsuback.packet_id) {
            error!("[{} ms] handle_unsuback - no pending unsubscribe with packet id {}", self.elapsed_time_ms, unsuback.packet_id);
            return Err(MqttError::new_protocol_error("unsuback received for an unknown packet id"));
        }

        context.packet_events.push_back(PacketEvent::Unsuback(unsuback));

        Ok(())
    }

    fn handle_pingresp(&mut self) -> MqttResult<()> {
        info!("[{} ms] handle_pingresp - processing PINGRESP packet", self.elapsed_time_ms);
        self.check_inbound_state(PacketType::Pingresp)
    }

    fn handle_disconnect(&mut self, disconnect: DisconnectPacket, context: &mut NetworkEventContext) -> MqttResult<()> {
        info!("[{} ms] handle_disconnect - processing DISCONNECT packet", self.elapsed_time_ms);
        self.check_inbound_state(PacketType::Disconnect)?;

        if self.protocol_version == ProtocolVersion::Mqtt311 {
            error!("[{} ms] handle_disconnect - MQTT311 forbids server-side disconnects", self.elapsed_time_ms);
            return Err(MqttError::new_protocol_error("MQTT311 forbids server-side disconnects"));
        }

        self.check_problem_information(&disconnect.properties, PacketType::Disconnect)?;

        match disconnect.reason_code {
            ReasonCode::UseAnotherServer | ReasonCode::ServerMoved => {
                warn!("[{} ms] handle_disconnect - server redirected the client to {:?}; redirection is not supported", self.elapsed_time_ms, disconnect.properties.server_reference);
            }
            _ => {
                info!("[{} ms] handle_disconnect - server disconnected with reason code {}", self.elapsed_time_ms, disconnect.reason_code);
            }
        }

        context.packet_events.push_back(PacketEvent::Disconnect(disconnect.clone()));

        Err(MqttError::new_server_disconnect(disconnect))
    }

    fn handle_auth(&mut self, auth: AuthPacket, context: &mut NetworkEventContext) -> MqttResult<()> {
        info!("[{} ms] handle_auth - processing AUTH packet", self.elapsed_time_ms);

        if self.state == ProtocolStateType::Disconnected {
            error!("[{} ms] handle_auth - invalid state to receive an AUTH", self.elapsed_time_ms);
            return Err(MqttError::new_protocol_error("invalid state to receive an auth"));
        }

        let configured_method = &self.connect.properties.authentication_method;
        if configured_method.is_none() || auth.properties.authentication_method != *configured_method {
            error!("[{} ms] handle_auth - authentication method {:?} does not match the configured method {:?}", self.elapsed_time_ms, auth.properties.authentication_method, configured_method);
            return Err(MqttError::new_protocol_error("auth packet authentication method mismatch"));
        }

        match auth.reason_code {
            ReasonCode::ContinueAuthentication => {
                context.packet_events.push_back(PacketEvent::AuthenticationChallenge(auth));
                Ok(())
            }
            ReasonCode::Success if self.state == ProtocolStateType::Connected => {
                info!("[{} ms] handle_auth - re-authentication complete", self.elapsed_time_ms);
                Ok(())
            }
            _ => {
                error!("[{} ms] handle_auth - unexpected AUTH reason code {} in state {}", self.elapsed_time_ms, auth.reason_code, self.state);
                Err(MqttError::new_protocol_error("unexpected auth reason code"))
            }
        }
    }
}

fn compute_inbound_alias_maximum(connect: &ConnectPacket, version: ProtocolVersion) -> u16 {
    match version {
        ProtocolVersion::Mqtt5 => { connect.properties.topic_alias_maximum.unwrap_or(0) }
        ProtocolVersion::Mqtt311 => { 0 }
    }
}

fn compute_client_receive_maximum(connect: &ConnectPacket, version: ProtocolVersion) -> u16 {
    match version {
        ProtocolVersion::Mqtt5 => { connect.properties.receive_maximum.unwrap_or(DEFAULT_RECEIVE_MAXIMUM) }
        ProtocolVersion::Mqtt311 => { DEFAULT_RECEIVE_MAXIMUM }
    }
}

fn build_negotiated_settings(connect: &ConnectPacket, connack: &ConnackPacket) -> NegotiatedSettings {
    let properties = &connack.properties;

    NegotiatedSettings {
        maximum_qos : properties.maximum_qos.unwrap_or(QualityOfService::ExactlyOnce),
        session_expiry_interval : properties.session_expiry_interval.unwrap_or(connect.properties.session_expiry_interval.unwrap_or(0)),
        receive_maximum_from_server : properties.receive_maximum.unwrap_or(65535),
        maximum_packet_size_to_server : properties.maximum_packet_size.unwrap_or(MAXIMUM_VARIABLE_LENGTH_INTEGER as u32),
        topic_alias_maximum_to_server : properties.topic_alias_maximum.unwrap_or(0),
        server_keep_alive : properties.server_keep_alive.unwrap_or(connect.keep_alive_interval_seconds),
        retain_available : properties.retain_available.unwrap_or(true),
        wildcard_subscriptions_available : properties.wildcard_subscriptions_available.unwrap_or(true),
        subscription_identifiers_available : properties.subscription_identifiers_available.unwrap_or(true),
        shared_subscriptions_available : properties.shared_subscriptions_available.unwrap_or(true),
        rejoined_session : connack.session_present,
        client_id : properties.assigned_client_identifier.clone().unwrap_or_else(|| connect.client_id.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alias::OutboundAliasResolverFactory;
    use crate::config::ConnectOptionsBuilder;
    use crate::testing::*;
    use assert_matches::assert_matches;

    struct ProtocolStateFixture {
        protocol_state: ProtocolState,

        base_timestamp: Instant,

        to_socket: Vec<u8>,

        packet_events: VecDeque<PacketEvent>,
    }

    impl ProtocolStateFixture {
        fn new(connect_options: ConnectOptions, protocol_version: ProtocolVersion) -> Self {
            let base_timestamp = Instant::now();
            let config = ProtocolStateConfig {
                connect_options,
                protocol_version,
                connack_timeout: Duration::from_secs(30),
                base_timestamp,
                outbound_alias_resolver: (OutboundAliasResolverFactory::new_manual_factory())(),
            };

            ProtocolStateFixture {
                protocol_state: ProtocolState::new(config),
                base_timestamp,
                to_socket: Vec::new(),
                packet_events: VecDeque::new(),
            }
        }

        fn new_mqtt5() -> Self {
            ProtocolStateFixture::new(ConnectOptionsBuilder::new().with_client_id("fixture").build(), ProtocolVersion::Mqtt5)
        }

        fn time(&self, elapsed_millis: u64) -> Instant {
            self.base_timestamp + Duration::from_millis(elapsed_millis)
        }

        fn start_connection(&mut self, elapsed_millis: u64) -> MqttResult<()> {
            let mut context = ServiceContext {
                current_time: self.time(elapsed_millis),
                to_socket: &mut self.to_socket,
            };

            self.protocol_state.start_connection(&mut context)
        }

        fn receive(&mut self, packet: MqttPacket, elapsed_millis: u64) -> MqttResult<()> {
            let mut context = NetworkEventContext {
                current_time: self.time(elapsed_millis),
                to_socket: &mut self.to_socket,
                packet_events: &mut self.packet_events,
            };

            self.protocol_state.handle_packet(packet, &mut context)
        }

        fn service(&mut self, elapsed_millis: u64) -> MqttResult<()> {
            let mut context = ServiceContext {
                current_time: self.time(elapsed_millis),
                to_socket: &mut self.to_socket,
            };

            self.protocol_state.service(&mut context)
        }

        fn publish(&mut self, packet: PublishPacket) -> MqttResult<Option<u16>> {
            self.publish_at(packet, 0)
        }

        fn publish_at(&mut self, packet: PublishPacket, elapsed_millis: u64) -> MqttResult<Option<u16>> {
            let mut context = ServiceContext {
                current_time: self.time(elapsed_millis),
                to_socket: &mut self.to_socket,
            };

            self.protocol_state.publish(packet, &mut context)
        }

        fn subscribe(&mut self, packet: SubscribePacket) -> MqttResult<u16> {
            let mut context = ServiceContext {
                current_time: self.time(0),
                to_socket: &mut self.to_socket,
            };

            self.protocol_state.subscribe(packet, &mut context)
        }

        fn connect_with_connack(&mut self, connack: ConnackPacket) {
            self.start_connection(0).unwrap();
            self.receive(MqttPacket::Connack(connack), 0).unwrap();
            self.take_sent_packets();
            self.packet_events.clear();
        }

        fn connect(&mut self) {
            self.connect_with_connack(ConnackPacket::default());
        }

        fn take_sent_packets(&mut self) -> Vec<MqttPacket> {
            let bytes = std::mem::take(&mut self.to_socket);
            decode_packets(&bytes, self.protocol_state.protocol_version())
        }
    }

    fn create_publish_sequence_number_test_state() -> ProtocolState {
        ProtocolStateFixture::new_mqtt5().protocol_state
    }

    #[test]
    fn acquire_free_packet_id_start() {
        let mut protocol_state = create_publish_sequence_number_test_state();

        assert_matches!(protocol_state.acquire_free_packet_id(), Ok(1));
        assert_matches!(protocol_state.acquire_free_packet_id(), Ok(2));
        assert_matches!(protocol_state.acquire_free_packet_id(), Ok(3));
    }

    #[test]
    fn acquire_free_packet_id_with_skips() {
        let mut protocol_state = create_publish_sequence_number_test_state();

        protocol_state.next_packet_id = 5;
        protocol_state.pending_subscribes.insert(5);
        protocol_state.pending_unsubscribes.insert(6);
        protocol_state.qos2_incomplete_incoming_publishes.insert(7);
        protocol_state.pending_subscribes.insert(9);
        protocol_state.pending_subscribes.insert(11);

        assert_matches!(protocol_state.acquire_free_packet_id(), Ok(8));
        assert_matches!(protocol_state.acquire_free_packet_id(), Ok(10));
        assert_matches!(protocol_state.acquire_free_packet_id(), Ok(12));
    }

    #[test]
    fn acquire_free_packet_id_with_wrap_around() {
        let mut protocol_state = create_publish_sequence_number_test_state();

        protocol_state.next_packet_id = 65534;

        assert_matches!(protocol_state.acquire_free_packet_id(), Ok(65534));
        assert_matches!(protocol_state.acquire_free_packet_id(), Ok(65535));
        assert_matches!(protocol_state.acquire_free_packet_id(), Ok(1));
        assert_matches!(protocol_state.acquire_free_packet_id(), Ok(2));
    }

    #[test]
    fn acquire_free_packet_id_with_wrap_around_with_skips() {
        let mut protocol_state = create_publish_sequence_number_test_state();

        protocol_state.next_packet_id = 65534;
        protocol_state.pending_subscribes.insert(65534);
        protocol_state.pending_subscribes.insert(65535);
        protocol_state.pending_subscribes.insert(1);
        protocol_state.pending_subscribes.insert(2);
        protocol_state.pending_subscribes.insert(4);

        assert_matches!(protocol_state.acquire_free_packet_id(), Ok(3));
        assert_matches!(protocol_state.acquire_free_packet_id(), Ok(5));
    }

    #[test]
    fn acquire_free_packet_id_no_space() {
        let mut protocol_state = create_publish_sequence_number_test_state();
        for i in 0..u16::MAX {
            protocol_state.pending_subscribes.insert(i + 1);
        }

        assert_matches!(protocol_state.acquire_free_packet_id(), Err(MqttError::InternalStateError(_)));
    }

    #[test]
    fn packet_ids_unique_across_publish_and_ack_sequence() {
        let mut fixture = ProtocolStateFixture::new_mqtt5();
        fixture.connect();

        let first = fixture.publish(PublishPacket::new("a", QualityOfService::AtLeastOnce, &[])).unwrap().unwrap();
        let second = fixture.publish(PublishPacket::new("a", QualityOfService::ExactlyOnce, &[])).unwrap().unwrap();
        assert_ne!(first, second);

        fixture.receive(MqttPacket::Puback(PubackPacket { packet_id: first, ..Default::default() }), 0).unwrap();
        assert_eq!(1, fixture.protocol_state.pending_acknowledgement_count());

        fixture.protocol_state.next_packet_id = second;
        let third = fixture.publish(PublishPacket::new("a", QualityOfService::AtLeastOnce, &[])).unwrap().unwrap();
        assert_ne!(second, third);

        fixture.protocol_state.next_packet_id = first;
        let fourth = fixture.publish(PublishPacket::new("a", QualityOfService::AtLeastOnce, &[])).unwrap().unwrap();
        assert_eq!(first, fourth);
    }

    #[test]
    fn pending_acknowledgement_rejects_bound_packet_id() {
        let mut protocol_state = create_publish_sequence_number_test_state();
        let publish = MqttPacket::Publish(PublishPacket::new("a", QualityOfService::AtLeastOnce, &[]));

        assert!(protocol_state.add_pending_acknowledgement(5, publish.clone()).is_ok());
        assert_matches!(protocol_state.add_pending_acknowledgement(5, publish), Err(MqttError::PacketIdentifierInUse(context)) if context.packet_id == 5);
        assert_eq!(1, protocol_state.pending_acknowledgement_count());
    }

    #[test]
    fn connect_sends_connect_packet() {
        let mut fixture = ProtocolStateFixture::new_mqtt5();
        fixture.start_connection(0).unwrap();

        assert_eq!(ProtocolStateType::PendingConnack, fixture.protocol_state.state());
        let sent = fixture.take_sent_packets();
        assert_eq!(1, sent.len());
        assert_matches!(&sent[0], MqttPacket::Connect(connect) if connect.client_id == "fixture" && connect.keep_alive_interval_seconds == 60);
    }

    #[test]
    fn pending_connack_rejects_other_packets() {
        let mut fixture = ProtocolStateFixture::new_mqtt5();
        fixture.start_connection(0).unwrap();

        let result = fixture.receive(MqttPacket::Publish(PublishPacket::new("a", QualityOfService::AtMostOnce, &[])), 0);
        assert_matches!(result, Err(MqttError::ProtocolError(_)));

        let mut fixture = ProtocolStateFixture::new_mqtt5();
        fixture.start_connection(0).unwrap();
        assert_matches!(fixture.receive(MqttPacket::Pingresp(PingrespPacket {}), 0), Err(MqttError::ProtocolError(_)));
    }

    #[test]
    fn connack_rejection_fails_connection() {
        let mut fixture = ProtocolStateFixture::new_mqtt5();
        fixture.start_connection(0).unwrap();

        let connack = ConnackPacket {
            reason_code: ReasonCode::NotAuthorized,
            ..Default::default()
        };

        let result = fixture.receive(MqttPacket::Connack(connack), 0);
        assert_matches!(result, Err(MqttError::ConnectionRejected(context)) if context.reason_code == ReasonCode::NotAuthorized);
        assert!(fixture.packet_events.is_empty());
    }

    #[test]
    fn connack_negotiated_settings() {
        let mut fixture = ProtocolStateFixture::new_mqtt5();
        fixture.connect_with_connack(ConnackPacket {
            properties: Properties {
                maximum_qos: Some(QualityOfService::AtLeastOnce),
                receive_maximum: Some(5),
                server_keep_alive: Some(20),
                assigned_client_identifier: Some("assigned".to_string()),
                retain_available: Some(false),
                ..Default::default()
            },
            ..Default::default()
        });

        let settings = fixture.protocol_state.negotiated_settings().unwrap();
        assert_eq!(QualityOfService::AtLeastOnce, settings.maximum_qos);
        assert_eq!(5, settings.receive_maximum_from_server);
        assert_eq!(20, settings.server_keep_alive);
        assert_eq!("assigned", settings.client_id);
        assert!(!settings.retain_available);
        assert!(settings.wildcard_subscriptions_available);
        assert_eq!("assigned", fixture.protocol_state.connect.client_id);
    }

    #[test]
    fn qos2_duplicate_publish_delivered_once() {
        let mut fixture = ProtocolStateFixture::new_mqtt5();
        fixture.connect();

        let publish = PublishPacket {
            packet_id: 7,
            ..PublishPacket::new("a/b", QualityOfService::ExactlyOnce, "hello".as_bytes())
        };

        fixture.receive(MqttPacket::Publish(publish.clone()), 0).unwrap();
        let duplicate = PublishPacket {
            duplicate: true,
            ..publish.clone()
        };
        fixture.receive(MqttPacket::Publish(duplicate), 0).unwrap();

        assert_eq!(1, fixture.packet_events.len());
        assert_eq!(Some(&PacketEvent::Publish(publish)), fixture.packet_events.front());

        let pubrec = MqttPacket::Pubrec(PubrecPacket {
            packet_id: 7,
            ..Default::default()
        });
        assert_eq!(vec!(pubrec.clone(), pubrec), fixture.take_sent_packets());

        fixture.receive(MqttPacket::Pubrel(PubrelPacket { packet_id: 7, ..Default::default() }), 0).unwrap();
        assert_eq!(vec!(MqttPacket::Pubcomp(PubcompPacket { packet_id: 7, ..Default::default() })), fixture.take_sent_packets());
    }

    #[test]
    fn qos1_publish_delivered_and_acknowledged() {
        let mut fixture = ProtocolStateFixture::new_mqtt5();
        fixture.connect();

        let publish = PublishPacket {
            packet_id: 3,
            ..PublishPacket::new("a/b", QualityOfService::AtLeastOnce, &[1, 2])
        };
        fixture.receive(MqttPacket::Publish(publish.clone()), 0).unwrap();

        assert_eq!(Some(PacketEvent::Publish(publish)), fixture.packet_events.pop_front());
        assert_eq!(vec!(MqttPacket::Puback(PubackPacket { packet_id: 3, ..Default::default() })), fixture.take_sent_packets());
    }

    #[test]
    fn inbound_publish_above_maximum_qos_is_protocol_error() {
        let mut fixture = ProtocolStateFixture::new_mqtt5();
        fixture.connect_with_connack(ConnackPacket {
            properties: Properties {
                maximum_qos: Some(QualityOfService::AtMostOnce),
                ..Default::default()
            },
            ..Default::default()
        });

        let publish = PublishPacket {
            packet_id: 3,
            ..PublishPacket::new("a/b", QualityOfService::AtLeastOnce, &[])
        };
        assert_matches!(fixture.receive(MqttPacket::Publish(publish), 0), Err(MqttError::ProtocolError(_)));
    }

    #[test]
    fn inbound_receive_maximum_exceeded() {
        let connect_options = ConnectOptionsBuilder::new()
            .with_properties(Properties {
                receive_maximum: Some(1),
                ..Default::default()
            })
            .build();
        let mut fixture = ProtocolStateFixture::new(connect_options, ProtocolVersion::Mqtt5);
        fixture.connect();

        let first = PublishPacket {
            packet_id: 1,
            ..PublishPacket::new("a", QualityOfService::ExactlyOnce, &[])
        };
        fixture.receive(MqttPacket::Publish(first.clone()), 0).unwrap();

        // a duplicate of an unreleased publish is not a new flow
        fixture.receive(MqttPacket::Publish(first), 0).unwrap();

        let second = PublishPacket {
            packet_id: 2,
            ..PublishPacket::new("a", QualityOfService::ExactlyOnce, &[])
        };
        assert_matches!(fixture.receive(MqttPacket::Publish(second), 0), Err(MqttError::ReceiveMaximumExceeded(_)));
    }

    #[test]
    fn pubrel_for_unknown_packet_id_fails() {
        let mut fixture = ProtocolStateFixture::new_mqtt5();
        fixture.connect();

        let result = fixture.receive(MqttPacket::Pubrel(PubrelPacket { packet_id: 9, ..Default::default() }), 0);
        assert_matches!(result, Err(MqttError::PacketIdentifierNotFound(context)) if context.packet_id == 9);
    }

    #[test]
    fn pubcomp_for_unknown_packet_id_fails() {
        let mut fixture = ProtocolStateFixture::new_mqtt5();
        fixture.connect();

        let result = fixture.receive(MqttPacket::Pubcomp(PubcompPacket { packet_id: 9, ..Default::default() }), 0);
        assert_matches!(result, Err(MqttError::PacketIdentifierNotFound(_)));
    }

    #[test]
    fn puback_and_pubrec_for_unknown_packet_id_are_ignored() {
        let mut fixture = ProtocolStateFixture::new_mqtt5();
        fixture.connect();

        assert!(fixture.receive(MqttPacket::Puback(PubackPacket { packet_id: 9, ..Default::default() }), 0).is_ok());
        assert!(fixture.receive(MqttPacket::Pubrec(PubrecPacket { packet_id: 9, ..Default::default() }), 0).is_ok());
        assert!(fixture.take_sent_packets().is_empty());
    }

    #[test]
    fn outbound_qos2_flow() {
        let mut fixture = ProtocolStateFixture::new_mqtt5();
        fixture.connect();

        let packet_id = fixture.publish(PublishPacket::new("a", QualityOfService::ExactlyOnce, &[5])).unwrap().unwrap();
        fixture.take_sent_packets();

        fixture.receive(MqttPacket::Pubrec(PubrecPacket { packet_id, ..Default::default() }), 0).unwrap();
        let pubrel = MqttPacket::Pubrel(PubrelPacket { packet_id, ..Default::default() });
        assert_eq!(vec!(pubrel.clone()), fixture.take_sent_packets());

        // duplicate pubrec resends the pubrel
        fixture.receive(MqttPacket::Pubrec(PubrecPacket { packet_id, ..Default::default() }), 0).unwrap();
        assert_eq!(vec!(pubrel), fixture.take_sent_packets());

        fixture.receive(MqttPacket::Pubcomp(PubcompPacket { packet_id, ..Default::default() }), 0).unwrap();
        assert_eq!(0, fixture.protocol_state.pending_acknowledgement_count());
    }

    #[test]
    fn pubrec_failure_ends_qos2_flow() {
        let mut fixture = ProtocolStateFixture::new_mqtt5();
        fixture.connect();

        let packet_id = fixture.publish(PublishPacket::new("a", QualityOfService::ExactlyOnce, &[5])).unwrap().unwrap();
        fixture.take_sent_packets();

        let pubrec = PubrecPacket {
            packet_id,
            reason_code: ReasonCode::QuotaExceeded,
            ..Default::default()
        };
        fixture.receive(MqttPacket::Pubrec(pubrec), 0).unwrap();

        assert!(fixture.take_sent_packets().is_empty());
        assert_eq!(0, fixture.protocol_state.pending_acknowledgement_count());
    }

    #[test]
    fn puback_for_qos2_publish_is_protocol_error() {
        let mut fixture = ProtocolStateFixture::new_mqtt5();
        fixture.connect();

        let packet_id = fixture.publish(PublishPacket::new("a", QualityOfService::ExactlyOnce, &[])).unwrap().unwrap();
        let result = fixture.receive(MqttPacket::Puback(PubackPacket { packet_id, ..Default::default() }), 0);
        assert_matches!(result, Err(MqttError::ProtocolError(_)));
    }

    fn build_resumable_session_fixture() -> (ProtocolStateFixture, Vec<MqttPacket>) {
        let connect_options = ConnectOptionsBuilder::new()
            .with_client_id("resumer")
            .with_clean_start(false)
            .build();
        let mut fixture = ProtocolStateFixture::new(connect_options, ProtocolVersion::Mqtt5);
        fixture.connect();

        let first = fixture.publish(PublishPacket::new("one", QualityOfService::AtLeastOnce, &[1])).unwrap().unwrap();
        let qos2 = fixture.publish(PublishPacket::new("two", QualityOfService::ExactlyOnce, &[2])).unwrap().unwrap();
        let second = fixture.publish(PublishPacket::new("three", QualityOfService::AtLeastOnce, &[3])).unwrap().unwrap();
        fixture.receive(MqttPacket::Pubrec(PubrecPacket { packet_id: qos2, ..Default::default() }), 0).unwrap();
        fixture.take_sent_packets();

        fixture.protocol_state.handle_connection_closed();

        let expected = vec!(
            MqttPacket::Publish(PublishPacket {
                packet_id: first,
                duplicate: true,
                ..PublishPacket::new("one", QualityOfService::AtLeastOnce, &[1])
            }),
            MqttPacket::Pubrel(PubrelPacket { packet_id: qos2, ..Default::default() }),
            MqttPacket::Publish(PublishPacket {
                packet_id: second,
                duplicate: true,
                ..PublishPacket::new("three", QualityOfService::AtLeastOnce, &[3])
            }),
        );

        (fixture, expected)
    }

    #[test]
    fn session_resumption_resubmits_pending_packets_in_order() {
        let (mut fixture, expected) = build_resumable_session_fixture();

        fixture.start_connection(1000).unwrap();
        let sent = fixture.take_sent_packets();
        assert_eq!(1, sent.len());
        assert_matches!(&sent[0], MqttPacket::Connect(connect) if !connect.clean_start && connect.client_id == "resumer");

        let connack = ConnackPacket {
            session_present: true,
            ..Default::default()
        };
        fixture.receive(MqttPacket::Connack(connack), 1000).unwrap();

        assert_eq!(expected, fixture.take_sent_packets());
        assert_eq!(3, fixture.protocol_state.pending_acknowledgement_count());
        assert!(fixture.protocol_state.negotiated_settings().unwrap().rejoined_session);
    }

    #[test]
    fn no_session_present_discards_pending_packets() {
        let (mut fixture, _) = build_resumable_session_fixture();

        fixture.start_connection(1000).unwrap();
        fixture.take_sent_packets();
        fixture.receive(MqttPacket::Connack(ConnackPacket::default()), 1000).unwrap();

        assert!(fixture.take_sent_packets().is_empty());
        assert_eq!(0, fixture.protocol_state.pending_acknowledgement_count());
        assert_eq!(1, fixture.protocol_state.next_packet_id);
    }

    #[test]
    fn session_present_after_clean_start_is_protocol_error() {
        let mut fixture = ProtocolStateFixture::new_mqtt5();
        fixture.connect();
        fixture.publish(PublishPacket::new("a", QualityOfService::AtLeastOnce, &[])).unwrap();
        fixture.take_sent_packets();
        fixture.protocol_state.handle_connection_closed();

        fixture.start_connection(0).unwrap();
        fixture.take_sent_packets();

        let connack = ConnackPacket {
            session_present: true,
            ..Default::default()
        };
        assert_matches!(fixture.receive(MqttPacket::Connack(connack), 0), Err(MqttError::ProtocolError(_)));
        assert!(fixture.take_sent_packets().is_empty());
    }

    #[test]
    fn publish_flow_control_quota() {
        let mut fixture = ProtocolStateFixture::new_mqtt5();
        fixture.connect_with_connack(ConnackPacket {
            properties: Properties {
                receive_maximum: Some(1),
                ..Default::default()
            },
            ..Default::default()
        });

        fixture.publish(PublishPacket::new("a", QualityOfService::AtLeastOnce, &[])).unwrap();
        assert_eq!(1, fixture.take_sent_packets().len());

        let result = fixture.publish(PublishPacket::new("a", QualityOfService::AtLeastOnce, &[]));
        assert_matches!(result, Err(MqttError::QuotaExceeded(context)) if context.receive_maximum == 1);
        assert!(fixture.take_sent_packets().is_empty());

        // qos 0 is not subject to flow control
        assert_matches!(fixture.publish(PublishPacket::new("a", QualityOfService::AtMostOnce, &[])), Ok(None));
    }

    #[test]
    fn publish_rejected_by_negotiated_settings() {
        let mut fixture = ProtocolStateFixture::new_mqtt5();
        fixture.connect_with_connack(ConnackPacket {
            properties: Properties {
                maximum_qos: Some(QualityOfService::AtLeastOnce),
                retain_available: Some(false),
                ..Default::default()
            },
            ..Default::default()
        });

        assert_matches!(fixture.publish(PublishPacket::new("a", QualityOfService::ExactlyOnce, &[])), Err(MqttError::NotSupported(_)));

        let mut retained = PublishPacket::new("a", QualityOfService::AtMostOnce, &[]);
        retained.retain = true;
        assert_matches!(fixture.publish(retained), Err(MqttError::NotSupported(_)));
        assert!(fixture.take_sent_packets().is_empty());
    }

    #[test]
    fn publish_too_large_is_not_sent() {
        let mut fixture = ProtocolStateFixture::new_mqtt5();
        fixture.connect_with_connack(ConnackPacket {
            properties: Properties {
                maximum_packet_size: Some(20),
                ..Default::default()
            },
            ..Default::default()
        });

        let result = fixture.publish(PublishPacket::new("a", QualityOfService::AtLeastOnce, &[0; 32]));
        assert_matches!(result, Err(MqttError::PacketTooLarge(_)));
        assert!(fixture.take_sent_packets().is_empty());
        assert_eq!(0, fixture.protocol_state.pending_acknowledgement_count());
    }

    #[test]
    fn operations_require_connection() {
        let mut fixture = ProtocolStateFixture::new_mqtt5();
        assert_matches!(fixture.publish(PublishPacket::new("a", QualityOfService::AtMostOnce, &[])), Err(MqttError::NotReady(_)));

        fixture.start_connection(0).unwrap();
        assert_matches!(fixture.publish(PublishPacket::new("a", QualityOfService::AtMostOnce, &[])), Err(MqttError::NotReady(_)));
        assert_matches!(fixture.subscribe(SubscribePacket {
            subscriptions: vec!(Subscription::new("a", QualityOfService::AtMostOnce)),
            ..Default::default()
        }), Err(MqttError::NotReady(_)));
    }

    #[test]
    fn keep_alive_ping_then_timeout() {
        let connect_options = ConnectOptionsBuilder::new().with_keep_alive_interval_seconds(10).build();
        let mut fixture = ProtocolStateFixture::new(connect_options, ProtocolVersion::Mqtt5);
        fixture.connect();

        fixture.service(8_000).unwrap();
        assert!(fixture.take_sent_packets().is_empty());

        fixture.service(9_500).unwrap();
        assert_eq!(vec!(MqttPacket::Pingreq(PingreqPacket {})), fixture.take_sent_packets());

        // one ping per window
        fixture.service(9_800).unwrap();
        assert!(fixture.take_sent_packets().is_empty());

        fixture.service(10_500).unwrap();
        assert_matches!(fixture.service(10_600), Err(MqttError::KeepAliveTimeout(_)));
    }

    #[test]
    fn keep_alive_thresholds_are_exclusive() {
        let connect_options = ConnectOptionsBuilder::new().with_keep_alive_interval_seconds(10).build();
        let mut fixture = ProtocolStateFixture::new(connect_options, ProtocolVersion::Mqtt5);
        fixture.connect();

        fixture.service(9_000).unwrap();
        assert!(fixture.take_sent_packets().is_empty());

        fixture.service(9_001).unwrap();
        assert_eq!(vec!(MqttPacket::Pingreq(PingreqPacket {})), fixture.take_sent_packets());

        fixture.service(10_001).unwrap();
        assert_matches!(fixture.service(10_002), Err(MqttError::KeepAliveTimeout(_)));
    }

    #[test]
    fn keep_alive_pings_during_inbound_only_traffic() {
        let connect_options = ConnectOptionsBuilder::new().with_keep_alive_interval_seconds(10).build();
        let mut fixture = ProtocolStateFixture::new(connect_options, ProtocolVersion::Mqtt5);
        fixture.connect();

        let mut pings = 0;
        for elapsed in (4_000..=24_000).step_by(4_000) {
            let publish = PublishPacket::new("sensors/temperature", QualityOfService::AtMostOnce, b"21");
            fixture.receive(MqttPacket::Publish(publish), elapsed).unwrap();
            fixture.service(elapsed + 500).unwrap();

            for packet in fixture.take_sent_packets() {
                assert_eq!(MqttPacket::Pingreq(PingreqPacket {}), packet);
                pings += 1;
            }
        }

        assert_eq!(2, pings);
    }

    #[test]
    fn keep_alive_inbound_traffic_answers_outstanding_ping() {
        let connect_options = ConnectOptionsBuilder::new().with_keep_alive_interval_seconds(10).build();
        let mut fixture = ProtocolStateFixture::new(connect_options, ProtocolVersion::Mqtt5);
        fixture.connect();

        fixture.service(9_500).unwrap();
        assert_eq!(vec!(MqttPacket::Pingreq(PingreqPacket {})), fixture.take_sent_packets());

        let publish = PublishPacket::new("a/b", QualityOfService::AtMostOnce, b"x");
        fixture.receive(MqttPacket::Publish(publish), 10_000).unwrap();
        fixture.service(12_000).unwrap();
        assert!(fixture.take_sent_packets().is_empty());
    }

    #[test]
    fn keep_alive_outbound_only_traffic_needs_no_pings() {
        let connect_options = ConnectOptionsBuilder::new().with_keep_alive_interval_seconds(10).build();
        let mut fixture = ProtocolStateFixture::new(connect_options, ProtocolVersion::Mqtt5);
        fixture.connect();

        for elapsed in (4_000..=40_000).step_by(4_000) {
            fixture.publish_at(PublishPacket::new("a/b", QualityOfService::AtMostOnce, b"x"), elapsed).unwrap();
            fixture.service(elapsed + 500).unwrap();

            let sent = fixture.take_sent_packets();
            assert_eq!(1, sent.len());
            assert_matches!(&sent[0], MqttPacket::Publish(_));
        }
    }

    #[test]
    fn keep_alive_reset_by_pingresp() {
        let connect_options = ConnectOptionsBuilder::new().with_keep_alive_interval_seconds(10).build();
        let mut fixture = ProtocolStateFixture::new(connect_options, ProtocolVersion::Mqtt311);
        fixture.connect();

        fixture.service(9_500).unwrap();
        assert_eq!(vec!(MqttPacket::Pingreq(PingreqPacket {})), fixture.take_sent_packets());

        fixture.receive(MqttPacket::Pingresp(PingrespPacket {}), 9_600).unwrap();
        fixture.service(10_500).unwrap();
        assert!(fixture.take_sent_packets().is_empty());

        fixture.service(18_700).unwrap();
        assert_eq!(vec!(MqttPacket::Pingreq(PingreqPacket {})), fixture.take_sent_packets());
    }

    #[test]
    fn server_keep_alive_overrides_client_keep_alive() {
        let mut fixture = ProtocolStateFixture::new_mqtt5();
        fixture.connect_with_connack(ConnackPacket {
            properties: Properties {
                server_keep_alive: Some(2),
                ..Default::default()
            },
            ..Default::default()
        });

        fixture.service(1_900).unwrap();
        assert_eq!(vec!(MqttPacket::Pingreq(PingreqPacket {})), fixture.take_sent_packets());
        assert_matches!(fixture.service(2_200), Err(MqttError::KeepAliveTimeout(_)));
    }

    #[test]
    fn keep_alive_zero_disables_pings() {
        let connect_options = ConnectOptionsBuilder::new().with_keep_alive_interval_seconds(0).build();
        let mut fixture = ProtocolStateFixture::new(connect_options, ProtocolVersion::Mqtt5);
        fixture.connect();

        fixture.service(1_000_000).unwrap();
        assert!(fixture.take_sent_packets().is_empty());
    }

    #[test]
    fn connack_timeout() {
        let mut fixture = ProtocolStateFixture::new_mqtt5();
        fixture.start_connection(0).unwrap();

        fixture.service(29_000).unwrap();
        fixture.service(30_000).unwrap();
        assert_matches!(fixture.service(30_001), Err(MqttError::ConnackTimeout(_)));
    }

    #[test]
    fn inbound_topic_alias_resolution() {
        let connect_options = ConnectOptionsBuilder::new()
            .with_properties(Properties {
                topic_alias_maximum: Some(10),
                ..Default::default()
            })
            .build();
        let mut fixture = ProtocolStateFixture::new(connect_options, ProtocolVersion::Mqtt5);
        fixture.connect();

        let mut aliased = PublishPacket::new("a/b", QualityOfService::AtMostOnce, &[]);
        aliased.properties.topic_alias = Some(5);
        fixture.receive(MqttPacket::Publish(aliased), 0).unwrap();

        let mut alias_only = PublishPacket::new("", QualityOfService::AtMostOnce, &[9]);
        alias_only.properties.topic_alias = Some(5);
        fixture.receive(MqttPacket::Publish(alias_only), 0).unwrap();

        fixture.packet_events.pop_front();
        assert_matches!(fixture.packet_events.pop_front(), Some(PacketEvent::Publish(publish)) if publish.topic == "a/b" && publish.payload == vec!(9));

        let mut unbound = PublishPacket::new("", QualityOfService::AtMostOnce, &[]);
        unbound.properties.topic_alias = Some(6);
        assert_matches!(fixture.receive(MqttPacket::Publish(unbound), 0), Err(MqttError::ProtocolError(_)));
    }

    #[test]
    fn inbound_topic_alias_unbound_before_mapping() {
        let connect_options = ConnectOptionsBuilder::new()
            .with_properties(Properties {
                topic_alias_maximum: Some(10),
                ..Default::default()
            })
            .build();
        let mut fixture = ProtocolStateFixture::new(connect_options, ProtocolVersion::Mqtt5);
        fixture.connect();

        let mut alias_only = PublishPacket::new("", QualityOfService::AtMostOnce, &[]);
        alias_only.properties.topic_alias = Some(5);
        assert_matches!(fixture.receive(MqttPacket::Publish(alias_only), 0), Err(MqttError::ProtocolError(_)));
    }

    #[test]
    fn outbound_topic_alias_applied() {
        let mut fixture = ProtocolStateFixture::new_mqtt5();
        fixture.connect_with_connack(ConnackPacket {
            properties: Properties {
                topic_alias_maximum: Some(2),
                ..Default::default()
            },
            ..Default::default()
        });

        let mut publish = PublishPacket::new("a/b", QualityOfService::AtMostOnce, &[]);
        publish.properties.topic_alias = Some(1);
        fixture.publish(publish.clone()).unwrap();
        fixture.publish(publish).unwrap();

        let sent = fixture.take_sent_packets();
        assert_matches!(&sent[0], MqttPacket::Publish(first) if first.topic == "a/b" && first.properties.topic_alias == Some(1));
        assert_matches!(&sent[1], MqttPacket::Publish(second) if second.topic.is_empty() && second.properties.topic_alias == Some(1));
    }

    #[test]
    fn suback_surfaced_then_rejection_fails() {
        let mut fixture = ProtocolStateFixture::new_mqtt5();
        fixture.connect();

        let subscribe = SubscribePacket {
            subscriptions: vec!(Subscription::new("a/+", QualityOfService::AtLeastOnce), Subscription::new("b", QualityOfService::AtMostOnce)),
            ..Default::default()
        };
        let packet_id = fixture.subscribe(subscribe.clone()).unwrap();
        assert_matches!(fixture.take_sent_packets().as_slice(), [MqttPacket::Subscribe(sent)] if sent.packet_id == packet_id);

        let suback = SubackPacket {
            packet_id,
            reason_codes: vec!(ReasonCode::GrantedQos1, ReasonCode::Success),
            ..Default::default()
        };
        fixture.receive(MqttPacket::Suback(suback.clone()), 0).unwrap();
        assert_eq!(Some(PacketEvent::Suback(suback)), fixture.packet_events.pop_front());

        let packet_id = fixture.subscribe(subscribe).unwrap();
        let rejected = SubackPacket {
            packet_id,
            reason_codes: vec!(ReasonCode::GrantedQos1, ReasonCode::NotAuthorized),
            ..Default::default()
        };
        let result = fixture.receive(MqttPacket::Suback(rejected), 0);
        assert_matches!(result, Err(MqttError::SubscriptionRejected(context)) if context.reason_code == ReasonCode::NotAuthorized);
        assert_eq!(1, fixture.packet_events.len());
    }

    #[test]
    fn suback_for_unknown_packet_id_is_protocol_error() {
        let mut fixture = ProtocolStateFixture::new_mqtt5();
        fixture.connect();

        let suback = SubackPacket {
            packet_id: 4,
            reason_codes: vec!(ReasonCode::Success),
            ..Default::default()
        };
        assert_matches!(fixture.receive(MqttPacket::Suback(suback), 0), Err(MqttError::ProtocolError(_)));

        let unsuback = UnsubackPacket {
            packet_id: 4,
            ..Default::default()
        };
        assert_matches!(fixture.receive(MqttPacket::Unsuback(unsuback), 0), Err(MqttError::ProtocolError(_)));
    }

    #[test]
    fn disconnect_by_protocol_version() {
        let mut fixture = ProtocolStateFixture::new(ConnectOptionsBuilder::new().build(), ProtocolVersion::Mqtt311);
        fixture.connect();
        assert_matches!(fixture.receive(MqttPacket::Disconnect(DisconnectPacket::default()), 0), Err(MqttError::ProtocolError(_)));

        let mut fixture = ProtocolStateFixture::new_mqtt5();
        fixture.connect();

        let disconnect = DisconnectPacket {
            reason_code: ReasonCode::ServerMoved,
            properties: Properties {
                server_reference: Some("elsewhere".to_string()),
                ..Default::default()
            },
        };
        let result = fixture.receive(MqttPacket::Disconnect(disconnect.clone()), 0);
        assert_matches!(result, Err(MqttError::ServerDisconnect(context)) if context.disconnect == disconnect);
        assert_eq!(Some(PacketEvent::Disconnect(disconnect)), fixture.packet_events.pop_front());
    }

    #[test]
    fn unrequested_problem_information_is_protocol_error() {
        let connect_options = ConnectOptionsBuilder::new()
            .with_properties(Properties {
                request_problem_information: Some(false),
                ..Default::default()
            })
            .build();
        let mut fixture = ProtocolStateFixture::new(connect_options, ProtocolVersion::Mqtt5);
        fixture.connect();

        let packet_id = fixture.publish(PublishPacket::new("a", QualityOfService::AtLeastOnce, &[])).unwrap().unwrap();
        let puback = PubackPacket {
            packet_id,
            properties: Properties {
                reason_string: Some("details".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        assert_matches!(fixture.receive(MqttPacket::Puback(puback), 0), Err(MqttError::ProtocolError(_)));
    }

    #[test]
    fn server_direction_packets_are_protocol_errors() {
        let mut fixture = ProtocolStateFixture::new_mqtt5();
        fixture.connect();

        assert_matches!(fixture.receive(MqttPacket::Pingreq(PingreqPacket {}), 0), Err(MqttError::ProtocolError(_)));
    }

    fn create_enhanced_auth_connect_options() -> ConnectOptions {
        ConnectOptionsBuilder::new()
            .with_properties(Properties {
                authentication_method: Some("SCRAM".to_string()),
                authentication_data: Some(vec!(1)),
                ..Default::default()
            })
            .build()
    }

    #[test]
    fn enhanced_authentication_challenge() {
        let mut fixture = ProtocolStateFixture::new(create_enhanced_auth_connect_options(), ProtocolVersion::Mqtt5);
        fixture.start_connection(0).unwrap();
        fixture.take_sent_packets();

        let challenge = AuthPacket {
            reason_code: ReasonCode::ContinueAuthentication,
            properties: Properties {
                authentication_method: Some("SCRAM".to_string()),
                authentication_data: Some(vec!(2)),
                ..Default::default()
            },
        };
        fixture.receive(MqttPacket::Auth(challenge.clone()), 0).unwrap();
        assert_eq!(Some(PacketEvent::AuthenticationChallenge(challenge)), fixture.packet_events.pop_front());

        let mut context = ServiceContext {
            current_time: fixture.time(0),
            to_socket: &mut fixture.to_socket,
        };
        fixture.protocol_state.continue_authentication(vec!(3), &mut context).unwrap();

        let expected = MqttPacket::Auth(AuthPacket {
            reason_code: ReasonCode::ContinueAuthentication,
            properties: Properties {
                authentication_method: Some("SCRAM".to_string()),
                authentication_data: Some(vec!(3)),
                ..Default::default()
            },
        });
        assert_eq!(vec!(expected), fixture.take_sent_packets());

        fixture.receive(MqttPacket::Connack(ConnackPacket::default()), 0).unwrap();
        assert_eq!(ProtocolStateType::Connected, fixture.protocol_state.state());
    }

    #[test]
    fn auth_with_wrong_method_is_protocol_error() {
        let mut fixture = ProtocolStateFixture::new(create_enhanced_auth_connect_options(), ProtocolVersion::Mqtt5);
        fixture.start_connection(0).unwrap();

        let challenge = AuthPacket {
            reason_code: ReasonCode::ContinueAuthentication,
            properties: Properties {
                authentication_method: Some("OTHER".to_string()),
                ..Default::default()
            },
        };
        assert_matches!(fixture.receive(MqttPacket::Auth(challenge), 0), Err(MqttError::ProtocolError(_)));
    }

    #[test]
    fn reauthenticate_requirements() {
        let mut fixture = ProtocolStateFixture::new_mqtt5();
        fixture.connect();
        let mut context = ServiceContext {
            current_time: fixture.time(0),
            to_socket: &mut fixture.to_socket,
        };
        assert_matches!(fixture.protocol_state.reauthenticate(vec!(1), &mut context), Err(MqttError::InvalidArgument(_)));

        let mut fixture = ProtocolStateFixture::new(create_enhanced_auth_connect_options(), ProtocolVersion::Mqtt5);
        let mut context = ServiceContext {
            current_time: fixture.time(0),
            to_socket: &mut fixture.to_socket,
        };
        assert_matches!(fixture.protocol_state.reauthenticate(vec!(1), &mut context), Err(MqttError::NotReady(_)));

        fixture.connect();
        let mut context = ServiceContext {
            current_time: fixture.time(0),
            to_socket: &mut fixture.to_socket,
        };
        fixture.protocol_state.reauthenticate(vec!(4), &mut context).unwrap();
        assert_matches!(fixture.take_sent_packets().as_slice(), [MqttPacket::Auth(auth)] if auth.reason_code == ReasonCode::ReAuthenticate && auth.properties.authentication_data == Some(vec!(4)));

        let success = AuthPacket {
            reason_code: ReasonCode::Success,
            properties: Properties {
                authentication_method: Some("SCRAM".to_string()),
                ..Default::default()
            },
        };
        assert!(fixture.receive(MqttPacket::Auth(success), 0).is_ok());
    }

    #[test]
    fn outbound_disconnect_validates_reason_code() {
        let mut fixture = ProtocolStateFixture::new_mqtt5();
        fixture.connect();

        let mut context = ServiceContext {
            current_time: fixture.time(0),
            to_socket: &mut fixture.to_socket,
        };
        let invalid = DisconnectPacket {
            reason_code: ReasonCode::GrantedQos1,
            ..Default::default()
        };
        assert_matches!(fixture.protocol_state.disconnect(invalid, &mut context), Err(MqttError::InvalidArgument(_)));

        let mut context = ServiceContext {
            current_time: fixture.time(0),
            to_socket: &mut fixture.to_socket,
        };
        fixture.protocol_state.disconnect(DisconnectPacket::default(), &mut context).unwrap();
        assert_eq!(ProtocolStateType::Disconnected, fixture.protocol_state.state());
        assert_eq!(vec!(MqttPacket::Disconnect(DisconnectPacket::default())), fixture.take_sent_packets());
    }
}
