mod http;
mod monitoring;
mod mqtt;

pub use monitoring::MonitoringConfig;

pub use http::client::new_tracing_client;
pub use mqtt::{Mqtt, MqttConfig, MqttInMessage, MqttPublisher, MqttSubscription};
