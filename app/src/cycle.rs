//! The update cycle: the only place the node registry is mutated.
//!
//! Both run modes process one unit of work at a time (a poll tick, a push
//! event or an inbound controller command), so routing never observes a
//! half-built topology. No error escapes a single tick or event.

use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::adapter::polyglot::ControllerCommand;
use crate::port::{AmbientApi, AmbientEvent, AmbientEventSource, NodeServer, StationSnapshot};
use crate::station::catalog::ModuleKind;
use crate::station::registry::StationRegistry;
use crate::station::routing;
use crate::station::topology::{self, StationIdentity};

pub struct UpdateCycle<P: NodeServer> {
    registry: StationRegistry,
    node_server: P,
    commands: mpsc::Receiver<ControllerCommand>,
}

impl<P: NodeServer> UpdateCycle<P> {
    pub fn new(node_server: P, commands: mpsc::Receiver<ControllerCommand>) -> Self {
        Self {
            registry: StationRegistry::new(),
            node_server,
            commands,
        }
    }

    /// Timer-driven mode: every tick fetches the device list and runs a
    /// discovery pass followed by routing, per station. A failed fetch
    /// skips the whole tick without touching the registry.
    pub async fn run_poll<A: AmbientApi>(&mut self, api: &A, poll_interval: Duration, cancel: CancellationToken) {
        tracing::info!("Starting update cycle, polling every {:?}", poll_interval);

        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select!(
                _ = cancel.cancelled() => {
                    tracing::info!("Update cycle stopped");
                    return;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.poll_tick(api).await {
                        tracing::error!("Skipping poll tick: {:?}", e);
                    }
                }
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command, api).await,
                    None => {
                        tracing::info!("Controller command stream closed");
                        return;
                    }
                }
            );
        }
    }

    /// Event-driven mode: the subscription event carries the full device
    /// list and triggers discovery; data events route only. Disconnects
    /// trigger a reconnect attempt and are never fatal.
    pub async fn run_push<A: AmbientApi, S: AmbientEventSource>(
        &mut self,
        api: &A,
        mut events: S,
        cancel: CancellationToken,
    ) {
        tracing::info!("Starting update cycle, consuming push events");

        loop {
            tokio::select!(
                _ = cancel.cancelled() => {
                    tracing::info!("Update cycle stopped");
                    return;
                }
                event = events.recv() => match event {
                    Some(AmbientEvent::Connected) => {
                        tracing::info!("Connected to the vendor event stream");
                    }
                    Some(AmbientEvent::Subscribed { devices }) => {
                        tracing::info!("Subscribed; received {} stations", devices.len());
                        for snapshot in devices {
                            self.process_snapshot(&snapshot, true).await;
                        }
                    }
                    Some(AmbientEvent::Data { snapshot }) => {
                        self.process_snapshot(&snapshot, false).await;
                    }
                    Some(AmbientEvent::Disconnected) => {
                        tracing::warn!("Vendor event stream disconnected, reconnecting");
                        if let Err(e) = events.reconnect().await {
                            tracing::error!("Reconnect attempt failed: {:?}", e);
                        }
                    }
                    None => {
                        tracing::info!("Vendor event stream ended");
                        return;
                    }
                },
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command, api).await,
                    None => {
                        tracing::info!("Controller command stream closed");
                        return;
                    }
                }
            );
        }
    }

    async fn poll_tick<A: AmbientApi>(&mut self, api: &A) -> anyhow::Result<()> {
        let devices = api.fetch_devices().await?;

        for snapshot in devices {
            self.process_snapshot(&snapshot, true).await;
        }

        Ok(())
    }

    async fn process_snapshot(&mut self, snapshot: &StationSnapshot, discover: bool) {
        let identity = StationIdentity::from_snapshot(snapshot);

        if discover {
            if let Err(e) = self.discover_station(&identity, &snapshot.last_data).await {
                //do not route against a half-built topology; the next
                //pass re-runs discovery from scratch
                tracing::error!("Discovery failed for station {}: {:?}", identity.station_id, e);
                return;
            }
        } else if !self.registry.knows_station(&identity.station_id) {
            tracing::debug!("Dropping data for unknown station {}", identity.station_id);
            return;
        }

        self.route_station(&identity, &snapshot.last_data).await;
    }

    /// Creates every node the snapshot implies. Nothing is registered
    /// until the controller accepted all of them, so the registry never
    /// holds a partially discovered station.
    async fn discover_station(&mut self, identity: &StationIdentity, data: &Map<String, Value>) -> anyhow::Result<()> {
        let descriptors = topology::discover(identity, data, &self.registry);
        if descriptors.is_empty() {
            return Ok(());
        }

        tracing::info!(
            "Discovered {} new nodes for station {} ({})",
            descriptors.len(),
            identity.station_id,
            identity.class.label(),
        );

        for descriptor in &descriptors {
            self.node_server.add_node(descriptor).await?;
        }

        for descriptor in descriptors {
            let (node, created) = self.registry.register_if_absent(descriptor);

            if created {
                tracing::debug!("Registered node {} ({})", node.address, node.name);
            }

            if created && node.kind == ModuleKind::MainStatus {
                node.set_slot("ST", 1.0);
                let address = node.address.clone();

                if let Err(e) = self.node_server.set_slot(&address, "ST", 1.0).await {
                    tracing::error!("Error reporting online status for {}: {:?}", address, e);
                }
            }
        }

        Ok(())
    }

    async fn route_station(&mut self, identity: &StationIdentity, data: &Map<String, Value>) {
        let writes = routing::route_snapshot(&identity.station_id, data, &mut self.registry);

        for write in writes.iter().filter(|w| w.changed) {
            if let Err(e) = self.node_server.set_slot(&write.address, write.slot, write.value).await {
                tracing::error!("Error reporting {}/{}: {:?}", write.address, write.slot, e);
            }
        }

        tracing::debug!(
            "Applied {} slot updates for station {}",
            writes.len(),
            identity.station_id
        );
    }

    async fn handle_command<A: AmbientApi>(&mut self, command: ControllerCommand, api: &A) {
        tracing::info!("Handling controller command {:?}", command);

        match command {
            ControllerCommand::Discover => match api.fetch_devices().await {
                Ok(devices) => {
                    for snapshot in devices {
                        let identity = StationIdentity::from_snapshot(&snapshot);
                        if let Err(e) = self.discover_station(&identity, &snapshot.last_data).await {
                            tracing::error!("Discovery failed for station {}: {:?}", identity.station_id, e);
                        }
                    }
                }
                Err(e) => tracing::error!("Discovery fetch failed: {:?}", e),
            },

            ControllerCommand::Query => self.report_all().await,

            ControllerCommand::RemoveNotices => {
                if let Err(e) = self.node_server.remove_all_notices().await {
                    tracing::error!("Error removing controller notices: {:?}", e);
                }
            }

            ControllerCommand::UpdateProfile => {
                //profile upload is the controller's own operation
                tracing::info!("Profile update acknowledged");
            }
        }
    }

    async fn report_all(&mut self) {
        for node in self.registry.all_nodes() {
            let slots = node.slot_values();

            if let Err(e) = self.node_server.report_all_slots(&node.address, &slots).await {
                tracing::error!("Error reporting slots for {}: {:?}", node.address, e);
            }
        }
    }
}
