//! Controller transport: Polyglot-style JSON over MQTT.
//!
//! The bridge publishes node and driver updates on the node server's topic
//! (`<base>/ns/<profile>`) and receives controller commands on
//! `<base>/ns/<profile>/input`.

use infrastructure::{Mqtt, MqttPublisher, MqttSubscription};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use crate::port::NodeServer;
use crate::station::catalog::ModuleKind;
use crate::station::registry::NodeDescriptor;

#[derive(Debug, Deserialize, Clone)]
pub struct PolyglotConfig {
    pub profile_num: u16,
    #[serde(default = "default_base_topic")]
    pub base_topic: String,
}

fn default_base_topic() -> String {
    "udi/polyglot".to_owned()
}

impl PolyglotConfig {
    fn ns_topic(&self) -> String {
        format!("{}/ns/{}", self.base_topic, self.profile_num)
    }

    pub fn command_topic(&self) -> String {
        format!("{}/input", self.ns_topic())
    }

    pub fn new_node_server(&self, mqtt: &Mqtt) -> PolyglotMqtt {
        PolyglotMqtt {
            publisher: mqtt.publisher(),
            topic: self.ns_topic(),
        }
    }
}

/// Address of the node server's own top-level node. Station-status nodes
/// hang directly off it.
const CONTROLLER_ADDRESS: &str = "controller";

pub struct PolyglotMqtt {
    publisher: MqttPublisher,
    topic: String,
}

impl NodeServer for PolyglotMqtt {
    async fn add_node(&self, node: &NodeDescriptor) -> anyhow::Result<()> {
        self.publisher.publish_json(&self.topic, &add_node_message(node)).await
    }

    async fn set_slot(&self, address: &str, slot: &str, value: f64) -> anyhow::Result<()> {
        self.publisher
            .publish_json(&self.topic, &set_slot_message(address, slot, value))
            .await
    }

    async fn report_all_slots(&self, address: &str, slots: &[(&'static str, f64)]) -> anyhow::Result<()> {
        self.publisher
            .publish_json(&self.topic, &report_message(address, slots))
            .await
    }

    async fn add_notice(&self, key: &str, message: &str) -> anyhow::Result<()> {
        self.publisher
            .publish_json(&self.topic, &json!({ "addnotice": { "key": key, "value": message } }))
            .await
    }

    async fn remove_all_notices(&self) -> anyhow::Result<()> {
        self.publisher
            .publish_json(&self.topic, &json!({ "removenotices": {} }))
            .await
    }
}

fn add_node_message(node: &NodeDescriptor) -> Value {
    json!({
        "addnode": {
            "address": node.address,
            "name": node.name,
            "nodedef": node_def_id(node.kind),
            "primary": node.parent.as_deref().unwrap_or(CONTROLLER_ADDRESS),
        }
    })
}

fn set_slot_message(address: &str, slot: &str, value: f64) -> Value {
    json!({
        "status": { "address": address, "driver": slot, "value": value }
    })
}

fn report_message(address: &str, slots: &[(&'static str, f64)]) -> Value {
    let drivers: Vec<Value> = slots
        .iter()
        .map(|(driver, value)| json!({ "driver": driver, "value": value }))
        .collect();

    json!({
        "report": { "address": address, "drivers": drivers }
    })
}

/// Node definition ids from the controller profile. Indexed sensors share
/// one definition and differ only by address.
fn node_def_id(kind: ModuleKind) -> &'static str {
    match kind {
        ModuleKind::MainStatus => "pws",
        ModuleKind::BatteryInside => "battin",
        ModuleKind::BatteryOutside => "battout",
        ModuleKind::TempOutside => "tempout",
        ModuleKind::TempInside => "tempin",
        ModuleKind::FeelsLikeOutside => "flout",
        ModuleKind::FeelsLikeInside => "flin",
        ModuleKind::DewPointOutside => "dpout",
        ModuleKind::DewPointInside => "dpin",
        ModuleKind::HumidityOutside => "humout",
        ModuleKind::HumidityInside => "humin",
        ModuleKind::Pressure => "pressure",
        ModuleKind::RainHour => "rainhr",
        ModuleKind::RainDay => "rainday",
        ModuleKind::RainWeek => "rainwk",
        ModuleKind::RainMonth => "rainmo",
        ModuleKind::RainYear => "rainyr",
        ModuleKind::RainTotal => "raintot",
        ModuleKind::RainEvent => "rainevt",
        ModuleKind::Solar => "solar",
        ModuleKind::Wind => "wind",
        ModuleKind::AuxTempHumidity(_) => "auxth",
        ModuleKind::SoilMoisture(_) => "soil",
    }
}

/// Inbound controller commands. Anything else on the input topic is
/// ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "command")]
pub enum ControllerCommand {
    #[serde(rename = "DISCOVER")]
    Discover,
    #[serde(rename = "QUERY")]
    Query,
    #[serde(rename = "UPDATE_PROFILE")]
    UpdateProfile,
    #[serde(rename = "REMOVE_NOTICES")]
    RemoveNotices,
}

/// Parses inbound controller messages and hands the supported commands to
/// the update cycle, one at a time.
pub async fn forward_commands(mut subscription: MqttSubscription, tx: mpsc::Sender<ControllerCommand>) {
    while let Some(msg) = subscription.recv().await {
        match serde_json::from_str::<ControllerCommand>(&msg.payload) {
            Ok(command) => {
                tracing::info!("Received controller command {:?}", command);
                if tx.send(command).await.is_err() {
                    return;
                }
            }
            Err(e) => {
                tracing::debug!("Ignoring unsupported controller message on {}: {}", msg.topic, e);
            }
        }
    }
}
