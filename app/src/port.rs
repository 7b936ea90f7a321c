#![allow(async_fn_in_trait)]

//! The seams to both external systems: the vendor cloud API delivering
//! telemetry, and the controller that materializes the node tree.

use serde::Deserialize;

use crate::adapter::ambient::AmbientError;
use crate::station::registry::NodeDescriptor;

/// One station's state as the vendor API delivers it: gateway MAC,
/// metadata, and the latest telemetry keyed by vendor field name.
#[derive(Debug, Clone, Deserialize)]
pub struct StationSnapshot {
    #[serde(rename = "macAddress")]
    pub mac_address: String,
    #[serde(default)]
    pub info: StationInfo,
    #[serde(rename = "lastData", default)]
    pub last_data: serde_json::Map<String, serde_json::Value>,
}

impl StationSnapshot {
    /// Observation timestamp the vendor stamps into the telemetry
    /// (`dateutc`, epoch milliseconds), when present.
    pub fn observed_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.last_data
            .get("dateutc")
            .and_then(|value| value.as_i64())
            .and_then(chrono::DateTime::from_timestamp_millis)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StationInfo {
    #[serde(default)]
    pub name: String,
}

/// Events of the vendor push channel, in delivery order.
#[derive(Debug, Clone)]
pub enum AmbientEvent {
    Connected,
    Subscribed { devices: Vec<StationSnapshot> },
    Data { snapshot: StationSnapshot },
    Disconnected,
}

pub trait AmbientApi {
    async fn fetch_devices(&self) -> Result<Vec<StationSnapshot>, AmbientError>;
}

pub trait AmbientEventSource {
    /// Next event; `None` when the source is exhausted for good.
    async fn recv(&mut self) -> Option<AmbientEvent>;

    /// Called after a `Disconnected` event. Failures are reported by the
    /// cycle but never fatal.
    async fn reconnect(&mut self) -> anyhow::Result<()>;
}

/// Write operations of the controller's node protocol. The bridge only
/// ever creates nodes and pushes values; node deletion stays with the
/// controller.
pub trait NodeServer {
    async fn add_node(&self, node: &NodeDescriptor) -> anyhow::Result<()>;
    async fn set_slot(&self, address: &str, slot: &str, value: f64) -> anyhow::Result<()>;
    async fn report_all_slots(&self, address: &str, slots: &[(&'static str, f64)]) -> anyhow::Result<()>;
    async fn add_notice(&self, key: &str, message: &str) -> anyhow::Result<()>;
    async fn remove_all_notices(&self) -> anyhow::Result<()>;
}
