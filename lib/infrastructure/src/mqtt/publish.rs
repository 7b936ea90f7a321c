use std::sync::Arc;

use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::AsyncClient;

#[derive(Clone)]
pub struct MqttPublisher {
    client: Arc<AsyncClient>,
}

impl MqttPublisher {
    pub(super) fn new(client: Arc<AsyncClient>) -> Self {
        Self { client }
    }

    #[tracing::instrument(skip_all, fields(topic = %topic))]
    pub async fn publish_json(&self, topic: &str, payload: &serde_json::Value) -> anyhow::Result<()> {
        let body = serde_json::to_string(payload)?;

        tracing::debug!("Publishing MQTT message to {}: {}", topic, body);

        self.client
            .publish(topic, QoS::AtLeastOnce, false, body)
            .await
            .map_err(|e| {
                tracing::error!("Error publishing MQTT message to {}: {}", topic, e);
                e.into()
            })
    }
}
