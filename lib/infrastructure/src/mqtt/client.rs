use std::sync::Arc;

use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::mqttbytes::v5::ConnectProperties;
use rumqttc::v5::{AsyncClient, Event, EventLoop, MqttOptions};
use tokio::sync::mpsc;

use super::{MqttInMessage, MqttPublisher, MqttSubscription};

pub struct Mqtt {
    client: Arc<AsyncClient>,
    event_loop: EventLoop,
    routes: Vec<MqttRoute>,
}

struct MqttRoute {
    filter: String,
    tx: mpsc::Sender<MqttInMessage>,
}

impl Mqtt {
    pub fn connect(host: &str, port: u16, client_id: &str) -> Self {
        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(std::time::Duration::from_secs(5));
        options.set_clean_start(false);

        let mut connect_props = ConnectProperties::new();
        connect_props.session_expiry_interval = 60.into();
        connect_props.max_packet_size = Some(1024 * 1024);
        options.set_connect_properties(connect_props);

        let (client, event_loop) = AsyncClient::new(options, 10);

        Self {
            client: Arc::new(client),
            event_loop,
            routes: vec![],
        }
    }

    pub async fn subscribe(&mut self, filter: impl Into<String>) -> anyhow::Result<MqttSubscription> {
        let filter = filter.into();
        let (tx, rx) = mpsc::channel::<MqttInMessage>(32);

        tracing::info!("Subscribing to topic filter {}", filter);

        self.client.subscribe(filter.as_str(), QoS::AtLeastOnce).await?;
        self.routes.push(MqttRoute { filter, tx });

        Ok(MqttSubscription::new(rx))
    }

    pub fn publisher(&self) -> MqttPublisher {
        MqttPublisher::new(self.client.clone())
    }

    /// Drives the connection and fans inbound publishes out to matching
    /// subscriptions. Runs until the process shuts down.
    pub async fn process(mut self) {
        loop {
            match self.event_loop.poll().await {
                Ok(Event::Incoming(rumqttc::v5::mqttbytes::v5::Packet::Publish(publish))) => {
                    let msg: MqttInMessage = match (&publish).try_into() {
                        Ok(m) => m,
                        Err(e) => {
                            tracing::error!("Dropping non-UTF-8 MQTT message: {}", e);
                            continue;
                        }
                    };

                    for route in self.routes.iter() {
                        if !topic_matches(&route.filter, &msg.topic) {
                            continue;
                        }

                        if let Err(e) = route
                            .tx
                            .send_timeout(msg.clone(), tokio::time::Duration::from_secs(5))
                            .await
                        {
                            tracing::error!("Failed to forward MQTT message for {}: {}", route.filter, e);
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!("MQTT connection error: {}", e);
                    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                }
            }
        }
    }
}

impl TryInto<MqttInMessage> for &rumqttc::v5::mqttbytes::v5::Publish {
    type Error = std::str::Utf8Error;

    fn try_into(self) -> Result<MqttInMessage, Self::Error> {
        Ok(MqttInMessage {
            topic: std::str::from_utf8(&self.topic)?.to_string(),
            payload: std::str::from_utf8(&self.payload)?.to_string(),
        })
    }
}

/// Topic-filter match supporting `+` (one level) and a trailing `#`.
fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_parts = filter.split('/');
    let mut topic_parts = topic.split('/');

    loop {
        match (filter_parts.next(), topic_parts.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_topic_match() {
        assert!(topic_matches("udi/polyglot/ns/1", "udi/polyglot/ns/1"));
        assert!(!topic_matches("udi/polyglot/ns/1", "udi/polyglot/ns/2"));
    }

    #[test]
    fn test_single_level_wildcard() {
        assert!(topic_matches("udi/polyglot/+/1", "udi/polyglot/ns/1"));
        assert!(!topic_matches("udi/polyglot/+/1", "udi/polyglot/ns/deep/1"));
    }

    #[test]
    fn test_multi_level_wildcard() {
        assert!(topic_matches("udi/polyglot/#", "udi/polyglot/ns/1"));
        assert!(topic_matches("udi/polyglot/#", "udi/polyglot"));
        assert!(!topic_matches("udi/other/#", "udi/polyglot/ns/1"));
    }

    #[test]
    fn test_filter_longer_than_topic() {
        assert!(!topic_matches("udi/polyglot/ns/1", "udi/polyglot/ns"));
    }
}
