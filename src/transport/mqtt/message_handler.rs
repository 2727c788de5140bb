//! Pure routing of `rumqttc` events
//!
//! The event-loop task only ever acts on a handful of packets; everything else
//! is classified as infrastructure noise and logged at debug level.

use crate::transport::InboundMessage;
use rumqttc::v5::mqttbytes::v5::{ConnectReturnCode, Packet, SubscribeReasonCode};
use rumqttc::v5::Event;
use rumqttc::Outgoing;

/// Routing decisions for MQTT events
#[derive(Debug, Clone, PartialEq)]
pub enum EventRoute {
    /// Broker accepted the connection
    ConnectionAcknowledged,
    /// Broker answered the connect with a failure code
    ConnectionRefused(String),
    /// Publish received on a subscribed topic
    MessageReceived(InboundMessage),
    /// Broker closed the session
    Disconnected,
    /// SUBSCRIBE written to the socket under `packet_id`
    SubscribeSent(u16),
    /// SUBACK received; `rejected` holds the first failure reason code
    SubscriptionAcknowledged {
        packet_id: u16,
        rejected: Option<String>,
    },
    /// Infrastructure event (PingResp, PubAck, ...)
    InfrastructureEvent(String),
    /// Outgoing event (handled automatically)
    OutgoingEvent,
}

/// Pure message routing decisions based on MQTT events
pub struct MessageHandler;

impl MessageHandler {
    /// Route MQTT event to the appropriate handler (pure routing decision)
    pub fn route_mqtt_event(event: &Event) -> EventRoute {
        match event {
            Event::Incoming(incoming) => match incoming {
                Packet::ConnAck(connack) => {
                    if matches!(connack.code, ConnectReturnCode::Success) {
                        EventRoute::ConnectionAcknowledged
                    } else {
                        EventRoute::ConnectionRefused(format!("{:?}", connack.code))
                    }
                }
                Packet::Publish(publish) => EventRoute::MessageReceived(InboundMessage {
                    topic: String::from_utf8_lossy(&publish.topic).to_string(),
                    payload: publish.payload.to_vec(),
                    retain: publish.retain,
                }),
                Packet::Disconnect(_) => EventRoute::Disconnected,
                Packet::SubAck(suback) => EventRoute::SubscriptionAcknowledged {
                    packet_id: suback.pkid,
                    rejected: suback
                        .return_codes
                        .iter()
                        .find(|code| !matches!(code, SubscribeReasonCode::Success(_)))
                        .map(|code| format!("{code:?}")),
                },
                other => EventRoute::InfrastructureEvent(format!("{other:?}")),
            },
            Event::Outgoing(Outgoing::Subscribe(packet_id)) => EventRoute::SubscribeSent(*packet_id),
            Event::Outgoing(_) => EventRoute::OutgoingEvent,
        }
    }
}
