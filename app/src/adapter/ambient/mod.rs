//! Ambient Weather cloud access: the REST device listing and the polling
//! adapter that delivers it in the shape of the push channel.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};

use derive_more::derive::{Display, Error, From};
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;

use crate::port::{AmbientApi, AmbientEvent, AmbientEventSource, StationSnapshot};

#[derive(Debug, Deserialize, Clone)]
pub struct AmbientConfig {
    pub application_key: String,
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default)]
    pub mode: UpdateMode,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMode {
    #[default]
    Poll,
    Push,
}

fn default_base_url() -> String {
    "https://api.ambientweather.net/v1".to_owned()
}

fn default_poll_interval_secs() -> u64 {
    60
}

/// Values the hosting platform pre-fills before the user configured
/// anything real.
const PLACEHOLDER_KEYS: &[&str] = &["", "Your_API_Key", "Your_Application_Key"];

impl AmbientConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Both keys must be configured before the update cycle may start.
    /// The message is user-facing (it becomes a controller notice).
    pub fn check_keys(&self) -> Result<(), String> {
        if PLACEHOLDER_KEYS.contains(&self.api_key.as_str()) {
            return Err(
                "Please set a proper API key in the configuration and restart this node server".to_owned(),
            );
        }

        if PLACEHOLDER_KEYS.contains(&self.application_key.as_str()) {
            return Err(
                "Please set a proper application key in the configuration and restart this node server"
                    .to_owned(),
            );
        }

        Ok(())
    }

    pub fn new_api_client(&self) -> anyhow::Result<AmbientHttpApi> {
        Ok(AmbientHttpApi {
            client: infrastructure::new_tracing_client()?,
            base_url: self.base_url.trim_end_matches('/').to_owned(),
            application_key: self.application_key.clone(),
            api_key: self.api_key.clone(),
        })
    }
}

#[derive(Debug, Display, Error, From)]
pub enum AmbientError {
    #[display("vendor API request failed")]
    Transport(reqwest_middleware::Error),

    #[display("vendor API returned an unexpected payload")]
    Payload(reqwest::Error),

    #[display("vendor API rejected the configured keys")]
    Unauthorized,
}

#[derive(Debug, Clone)]
pub struct AmbientHttpApi {
    client: ClientWithMiddleware,
    base_url: String,
    application_key: String,
    api_key: String,
}

impl AmbientApi for AmbientHttpApi {
    async fn fetch_devices(&self) -> Result<Vec<StationSnapshot>, AmbientError> {
        let response = self
            .client
            .get(format!("{}/devices", self.base_url))
            .query(&[
                ("applicationKey", self.application_key.as_str()),
                ("apiKey", self.api_key.as_str()),
            ])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AmbientError::Unauthorized);
        }

        let response = response.error_for_status()?;
        Ok(response.json().await?)
    }
}

/// Derives the push-channel event stream from REST polling: one
/// `Subscribed` with the full device list, then `Data` per station per
/// poll, `Disconnected` on fetch failures. The vendor's realtime socket
/// delivers the same sequence; this adapter is the transport the bridge
/// ships.
pub struct PollingEventSource<A: AmbientApi> {
    api: A,
    poll_interval: Duration,
    connected: bool,
    subscribed: bool,
    pending: VecDeque<StationSnapshot>,
    last_observed: HashMap<String, DateTime<Utc>>,
}

impl<A: AmbientApi> PollingEventSource<A> {
    pub fn new(api: A, poll_interval: Duration) -> Self {
        Self {
            api,
            poll_interval,
            connected: false,
            subscribed: false,
            pending: VecDeque::new(),
            last_observed: HashMap::new(),
        }
    }

    fn drop_connection(&mut self) {
        self.connected = false;
        self.subscribed = false;
        self.pending.clear();
    }

    /// Drops stations whose observation timestamp has not moved since the
    /// previous poll, so a slow station does not produce a data event per
    /// poll. Stations without a timestamp always pass.
    fn fresh_only(&mut self, devices: Vec<StationSnapshot>) -> Vec<StationSnapshot> {
        devices
            .into_iter()
            .filter(|snapshot| {
                let Some(observed) = snapshot.observed_at() else {
                    return true;
                };

                let previous = self.last_observed.insert(snapshot.mac_address.clone(), observed);
                previous != Some(observed)
            })
            .collect()
    }
}

impl<A: AmbientApi> AmbientEventSource for PollingEventSource<A> {
    async fn recv(&mut self) -> Option<AmbientEvent> {
        loop {
            if !self.connected {
                self.connected = true;
                return Some(AmbientEvent::Connected);
            }

            if !self.subscribed {
                match self.api.fetch_devices().await {
                    Ok(devices) => {
                        self.subscribed = true;
                        for snapshot in &devices {
                            if let Some(observed) = snapshot.observed_at() {
                                self.last_observed.insert(snapshot.mac_address.clone(), observed);
                            }
                        }
                        return Some(AmbientEvent::Subscribed { devices });
                    }
                    Err(e) => {
                        tracing::warn!("Device listing failed: {}", e);
                        self.drop_connection();
                        return Some(AmbientEvent::Disconnected);
                    }
                }
            }

            if let Some(snapshot) = self.pending.pop_front() {
                return Some(AmbientEvent::Data { snapshot });
            }

            tokio::time::sleep(self.poll_interval).await;

            match self.api.fetch_devices().await {
                Ok(devices) => {
                    let fresh = self.fresh_only(devices);
                    self.pending.extend(fresh);
                }
                Err(e) => {
                    tracing::warn!("Device polling failed: {}", e);
                    self.drop_connection();
                    return Some(AmbientEvent::Disconnected);
                }
            }
        }
    }

    async fn reconnect(&mut self) -> anyhow::Result<()> {
        //pace retries, then probe so failures surface to the caller
        tokio::time::sleep(self.poll_interval).await;
        self.api.fetch_devices().await?;
        Ok(())
    }
}
