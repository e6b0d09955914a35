/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
basalt-mqtt is a sans-io MQTT client core supporting both MQTT 3.1.1 and MQTT 5.

The crate is organized in layers:

* A packet model ([`mqtt`]) covering all fifteen control packets for both protocol versions.
* A codec that encodes packets ([`encode_mqtt_packet`]) and reassembles them from an arbitrarily
chunked byte stream ([`FrameAssembler`]).
* A session engine that owns packet id allocation, the QoS 1 and QoS 2 acknowledgement flows,
session resumption, topic aliasing, flow control, and keep alive.  The engine performs no I/O.
* A polling connection driver ([`MqttClient`]) that moves bytes between the engine and a
[`Transport`].

There are no background threads.  A client makes progress only when its owner calls
[`MqttClient::step`] or [`MqttClient::run`]; application callbacks are delivered synchronously
through a [`ClientListener`].

# Example

```no_run
use basalt_mqtt::*;
use std::time::Duration;

struct PrintingListener {}

impl ClientListener for PrintingListener {
    fn on_publish_received(&mut self, publish: &PublishPacket) {
        println!("Received a publish on topic {}", publish.topic);
    }
}

fn main() -> MqttResult<()> {
    let transport = TcpTransport::connect("127.0.0.1:1883", Duration::from_millis(100))?;
    let connect_options = ConnectOptionsBuilder::new().with_client_id("example").build();

    let mut client = MqttClient::new(transport, PrintingListener {}, MqttClientOptions::default(), connect_options)?;
    while !client.status().is_connack_received() {
        client.step()?;
    }

    client.subscribe(SubscribePacket {
        subscriptions: vec!(Subscription::new("hello/world", QualityOfService::AtLeastOnce)),
        ..Default::default()
    })?;

    client.run()
}
```
 */

pub mod alias;
pub mod client;
pub mod config;
mod decode;
mod encode;
pub mod error;
mod logging;
pub mod mqtt;
mod protocol;
pub mod transport;
mod validate;

#[cfg(test)]
pub(crate) mod testing;

pub use alias::{OutboundAliasResolver, OutboundAliasResolverFactory, OutboundAliasResolverFactoryFn};
pub use client::{ClientListener, ConnectionStatus, MqttClient};
pub use config::{ConnectOptions, ConnectOptionsBuilder, MqttClientOptions, MqttClientOptionsBuilder};
pub use decode::{DecodedPackets, FrameAssembler};
pub use encode::encode_mqtt_packet;
pub use error::{MqttError, MqttResult};
pub use mqtt::*;
pub use protocol::NegotiatedSettings;
pub use transport::{TcpTransport, Transport};
