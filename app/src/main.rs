use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::adapter::ambient::{PollingEventSource, UpdateMode};
use crate::adapter::polyglot::{self, ControllerCommand};
use crate::cycle::UpdateCycle;
use crate::port::NodeServer;
use crate::settings::Settings;

mod adapter;
mod cycle;
mod port;
mod settings;
mod station;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let settings = Settings::new().expect("Error reading configuration");
    settings.monitoring.init().expect("Error initializing monitoring");

    let mut mqtt_client = settings.mqtt.new_client();

    let node_server = settings.polyglot.new_node_server(&mqtt_client);
    let command_subscription = mqtt_client
        .subscribe(settings.polyglot.command_topic())
        .await
        .expect("Error subscribing to controller commands");

    let (command_tx, command_rx) = mpsc::channel(16);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown requested");
                cancel.cancel();
            }
        });
    }

    if let Err(e) = node_server.remove_all_notices().await {
        tracing::warn!("Error clearing controller notices: {:?}", e);
    }

    tokio::select!(
        _ = mqtt_client.process() => {},
        _ = polyglot::forward_commands(command_subscription, command_tx) => {},
        _ = run_cycle(&settings, node_server, command_rx, cancel) => {},
    );
}

async fn run_cycle<P: NodeServer>(
    settings: &Settings,
    node_server: P,
    commands: mpsc::Receiver<ControllerCommand>,
    cancel: CancellationToken,
) {
    //a misconfigured key set must be visible in the controller UI, and
    //the cycle must not start until it is fixed
    if let Err(notice) = settings.ambient.check_keys() {
        tracing::error!("Vendor API keys not configured: {}", notice);

        if let Err(e) = node_server.add_notice("config", &notice).await {
            tracing::error!("Error publishing configuration notice: {:?}", e);
        }

        serve_unconfigured(node_server, commands, cancel).await;
        return;
    }

    let api = settings
        .ambient
        .new_api_client()
        .expect("Error creating vendor API client");

    let mut cycle = UpdateCycle::new(node_server, commands);

    match settings.ambient.mode {
        UpdateMode::Poll => {
            cycle.run_poll(&api, settings.ambient.poll_interval(), cancel).await;
        }
        UpdateMode::Push => {
            let events = PollingEventSource::new(api.clone(), settings.ambient.poll_interval());
            cycle.run_push(&api, events, cancel).await;
        }
    }
}

/// With no usable keys there is nothing to poll, but the controller can
/// still clear the configuration notice.
async fn serve_unconfigured<P: NodeServer>(
    node_server: P,
    mut commands: mpsc::Receiver<ControllerCommand>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select!(
            _ = cancel.cancelled() => return,
            command = commands.recv() => match command {
                Some(ControllerCommand::RemoveNotices) => {
                    if let Err(e) = node_server.remove_all_notices().await {
                        tracing::error!("Error removing controller notices: {:?}", e);
                    }
                }
                Some(command) => {
                    tracing::warn!("Ignoring {:?}: vendor API keys are not configured", command);
                }
                None => return,
            }
        );
    }
}
