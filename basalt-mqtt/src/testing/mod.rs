/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
In-memory transport and scripted broker used by the engine and driver tests.
 */

use crate::decode::FrameAssembler;
use crate::encode::*;
use crate::error::{MqttError, MqttResult};
use crate::mqtt::*;
use crate::mqtt::utils::*;
use crate::transport::Transport;

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

pub(crate) type PacketHandler = Box<dyn Fn(&MqttPacket, &mut VecDeque<MqttPacket>) -> MqttResult<()> + Send>;
pub(crate) type PacketHandlerSet = HashMap<PacketType, PacketHandler>;

/// Decodes a complete byte sequence into packets, panicking on any decode failure
pub(crate) fn decode_packets(bytes: &[u8], version: ProtocolVersion) -> Vec<MqttPacket> {
    let mut assembler = FrameAssembler::new(version, MAXIMUM_VARIABLE_LENGTH_INTEGER + 5);
    let packets : Vec<MqttPacket> = assembler.feed(bytes).map(|result| result.unwrap()).collect();

    packets
}

pub(crate) fn encode_packets(packets: &[MqttPacket], version: ProtocolVersion) -> Vec<u8> {
    let mut bytes = Vec::new();
    for packet in packets {
        bytes.extend_from_slice(&encode_packet(packet, version, &EncodingContext::default()).unwrap());
    }

    bytes
}

fn handle_connect_with_successful_connack(_: &MqttPacket, response_packets: &mut VecDeque<MqttPacket>) -> MqttResult<()> {
    response_packets.push_back(MqttPacket::Connack(ConnackPacket::default()));
    Ok(())
}

/// Answers a Connect with a successful Connack that reports an existing session
pub(crate) fn handle_connect_with_session_resumption(packet: &MqttPacket, response_packets: &mut VecDeque<MqttPacket>) -> MqttResult<()> {
    if let MqttPacket::Connect(connect) = packet {
        response_packets.push_back(MqttPacket::Connack(ConnackPacket {
            session_present: !connect.clean_start,
            ..Default::default()
        }));
        return Ok(());
    }

    Err(MqttError::new_protocol_error("unexpected packet in connect handler"))
}

fn handle_publish_with_acknowledgement(packet: &MqttPacket, response_packets: &mut VecDeque<MqttPacket>) -> MqttResult<()> {
    if let MqttPacket::Publish(publish) = packet {
        match publish.qos {
            QualityOfService::AtMostOnce => {}
            QualityOfService::AtLeastOnce => {
                response_packets.push_back(MqttPacket::Puback(PubackPacket {
                    packet_id: publish.packet_id,
                    ..Default::default()
                }));
            }
            QualityOfService::ExactlyOnce => {
                response_packets.push_back(MqttPacket::Pubrec(PubrecPacket {
                    packet_id: publish.packet_id,
                    ..Default::default()
                }));
            }
        }

        return Ok(());
    }

    Err(MqttError::new_protocol_error("unexpected packet in publish handler"))
}

fn handle_pubrel_with_pubcomp(packet: &MqttPacket, response_packets: &mut VecDeque<MqttPacket>) -> MqttResult<()> {
    if let MqttPacket::Pubrel(pubrel) = packet {
        response_packets.push_back(MqttPacket::Pubcomp(PubcompPacket {
            packet_id: pubrel.packet_id,
            ..Default::default()
        }));
        return Ok(());
    }

    Err(MqttError::new_protocol_error("unexpected packet in pubrel handler"))
}

fn handle_subscribe_with_granted_qos(packet: &MqttPacket, response_packets: &mut VecDeque<MqttPacket>) -> MqttResult<()> {
    if let MqttPacket::Subscribe(subscribe) = packet {
        let reason_codes = subscribe.subscriptions.iter().map(|subscription| {
            match subscription.qos {
                QualityOfService::AtMostOnce => { ReasonCode::Success }
                QualityOfService::AtLeastOnce => { ReasonCode::GrantedQos1 }
                QualityOfService::ExactlyOnce => { ReasonCode::GrantedQos2 }
            }
        }).collect();

        response_packets.push_back(MqttPacket::Suback(SubackPacket {
            packet_id: subscribe.packet_id,
            reason_codes,
            ..Default::default()
        }));
        return Ok(());
    }

    Err(MqttError::new_protocol_error("unexpected packet in subscribe handler"))
}

fn handle_unsubscribe_with_success(packet: &MqttPacket, response_packets: &mut VecDeque<MqttPacket>) -> MqttResult<()> {
    if let MqttPacket::Unsubscribe(unsubscribe) = packet {
        response_packets.push_back(MqttPacket::Unsuback(UnsubackPacket {
            packet_id: unsubscribe.packet_id,
            reason_codes: vec![ReasonCode::Success; unsubscribe.topic_filters.len()],
            ..Default::default()
        }));
        return Ok(());
    }

    Err(MqttError::new_protocol_error("unexpected packet in unsubscribe handler"))
}

fn handle_pingreq_with_pingresp(_: &MqttPacket, response_packets: &mut VecDeque<MqttPacket>) -> MqttResult<()> {
    response_packets.push_back(MqttPacket::Pingresp(PingrespPacket {}));
    Ok(())
}

/// Handlers for a well-behaved broker that accepts and acknowledges everything
pub(crate) fn create_default_packet_handlers() -> PacketHandlerSet {
    let mut handlers : PacketHandlerSet = HashMap::new();

    handlers.insert(PacketType::Connect, Box::new(handle_connect_with_successful_connack));
    handlers.insert(PacketType::Publish, Box::new(handle_publish_with_acknowledgement));
    handlers.insert(PacketType::Pubrel, Box::new(handle_pubrel_with_pubcomp));
    handlers.insert(PacketType::Subscribe, Box::new(handle_subscribe_with_granted_qos));
    handlers.insert(PacketType::Unsubscribe, Box::new(handle_unsubscribe_with_success));
    handlers.insert(PacketType::Pingreq, Box::new(handle_pingreq_with_pingresp));

    handlers
}

pub(crate) struct MockTransportState {
    version: ProtocolVersion,

    broker_assembler: FrameAssembler,

    packet_handlers: PacketHandlerSet,

    sent_packets: Vec<MqttPacket>,

    inbound_chunks: VecDeque<Vec<u8>>,

    send_failure: Option<MqttError>,

    read_failure: Option<MqttError>,

    close_count: usize,
}

impl MockTransportState {
    fn check_open(&self) -> MqttResult<()> {
        if self.close_count > 0 {
            return Err(MqttError::new_connection_closed("mock transport closed"));
        }

        Ok(())
    }
}

/// An in-memory transport.  Bytes the client sends are decoded by a broker-side assembler and
/// answered by the configured packet handlers; the answers become the client's inbound data.
pub(crate) struct MockTransport {
    state: Arc<Mutex<MockTransportState>>,
}

/// Test-side view of a [`MockTransport`] that has been handed to a client
#[derive(Clone)]
pub(crate) struct MockTransportHandle {
    state: Arc<Mutex<MockTransportState>>,
}

impl MockTransport {

    /// Creates a transport whose broker never answers
    pub(crate) fn new(version: ProtocolVersion) -> (MockTransport, MockTransportHandle) {
        MockTransport::new_with_handlers(version, HashMap::new())
    }

    pub(crate) fn new_with_handlers(version: ProtocolVersion, packet_handlers: PacketHandlerSet) -> (MockTransport, MockTransportHandle) {
        let state = Arc::new(Mutex::new(MockTransportState {
            version,
            broker_assembler: FrameAssembler::new(version, MAXIMUM_VARIABLE_LENGTH_INTEGER + 5),
            packet_handlers,
            sent_packets: Vec::new(),
            inbound_chunks: VecDeque::new(),
            send_failure: None,
            read_failure: None,
            close_count: 0,
        }));

        (MockTransport { state: state.clone() }, MockTransportHandle { state })
    }

    fn lock(&self) -> MutexGuard<'_, MockTransportState> {
        self.state.lock().unwrap()
    }
}

impl Transport for MockTransport {
    fn send(&mut self, bytes: &[u8]) -> MqttResult<()> {
        let mut guard = self.lock();
        let state = &mut *guard;
        state.check_open()?;

        if let Some(error) = state.send_failure.take() {
            return Err(error);
        }

        let received : Vec<MqttPacket> = state.broker_assembler.feed(bytes).map(|result| result.unwrap()).collect();

        let mut response_packets = VecDeque::new();
        for packet in received {
            if let Some(handler) = state.packet_handlers.get(&mqtt_packet_to_packet_type(&packet)) {
                (*handler)(&packet, &mut response_packets)?;
            }

            state.sent_packets.push(packet);
        }

        if !response_packets.is_empty() {
            let response_packets : Vec<MqttPacket> = response_packets.into_iter().collect();
            let response_bytes = encode_packets(&response_packets, state.version);
            state.inbound_chunks.push_back(response_bytes);
        }

        Ok(())
    }

    fn send_remaining(&mut self) -> MqttResult<()> {
        self.lock().check_open()
    }

    fn read(&mut self) -> MqttResult<Option<Vec<u8>>> {
        let mut state = self.lock();
        state.check_open()?;

        if let Some(error) = state.read_failure.take() {
            return Err(error);
        }

        Ok(state.inbound_chunks.pop_front())
    }

    fn close(&mut self) {
        self.lock().close_count += 1;
    }
}

impl MockTransportHandle {

    fn lock(&self) -> MutexGuard<'_, MockTransportState> {
        self.state.lock().unwrap()
    }

    /// Queues a packet for the client to read
    pub(crate) fn push_inbound_packet(&self, packet: MqttPacket) {
        let mut state = self.lock();
        let bytes = encode_packets(&[packet], state.version);
        state.inbound_chunks.push_back(bytes);
    }

    /// Queues raw bytes for the client to read, as a single chunk
    pub(crate) fn push_inbound_bytes(&self, bytes: &[u8]) {
        self.lock().inbound_chunks.push_back(bytes.to_vec());
    }

    pub(crate) fn set_packet_handler(&self, packet_type: PacketType, handler: PacketHandler) {
        self.lock().packet_handlers.insert(packet_type, handler);
    }

    pub(crate) fn fail_next_send(&self, error: MqttError) {
        self.lock().send_failure = Some(error);
    }

    pub(crate) fn fail_next_read(&self, error: MqttError) {
        self.lock().read_failure = Some(error);
    }

    /// Every packet the client has sent, in order
    pub(crate) fn sent_packets(&self) -> Vec<MqttPacket> {
        self.lock().sent_packets.clone()
    }

    /// Drains and returns the packets the client has sent since the last call
    pub(crate) fn take_sent_packets(&self) -> Vec<MqttPacket> {
        std::mem::take(&mut self.lock().sent_packets)
    }

    pub(crate) fn close_count(&self) -> usize {
        self.lock().close_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn mock_transport_broker_answers_connect() {
        let (mut transport, handle) = MockTransport::new_with_handlers(ProtocolVersion::Mqtt5, create_default_packet_handlers());

        let connect = MqttPacket::Connect(ConnectPacket {
            client_id: "mock".to_string(),
            ..Default::default()
        });
        transport.send(&encode_packets(&[connect.clone()], ProtocolVersion::Mqtt5)).unwrap();

        assert_eq!(vec!(connect), handle.sent_packets());

        let inbound = transport.read().unwrap().unwrap();
        assert_eq!(vec!(MqttPacket::Connack(ConnackPacket::default())), decode_packets(&inbound, ProtocolVersion::Mqtt5));
        assert_matches!(transport.read(), Ok(None));
    }

    #[test]
    fn mock_transport_failure_injection() {
        let (mut transport, handle) = MockTransport::new(ProtocolVersion::Mqtt311);

        handle.fail_next_read(MqttError::new_end_of_stream());
        assert_matches!(transport.read(), Err(MqttError::EndOfStream(_)));
        assert_matches!(transport.read(), Ok(None));

        handle.fail_next_send(MqttError::new_connection_closed("injected"));
        assert_matches!(transport.send(&[0xC0, 0]), Err(MqttError::ConnectionClosed(_)));

        transport.close();
        transport.close();
        assert_eq!(2, handle.close_count());
        assert_matches!(transport.read(), Err(MqttError::ConnectionClosed(_)));
    }
}
