use config::{Config, ConfigError, Environment, File};
use infrastructure::{MonitoringConfig, MqttConfig};
use serde::Deserialize;

use crate::adapter::ambient::AmbientConfig;
use crate::adapter::polyglot::PolyglotConfig;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub mqtt: MqttConfig,
    pub monitoring: MonitoringConfig,
    pub ambient: AmbientConfig,
    pub polyglot: PolyglotConfig,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name("ambient-bridge.toml"))
            .add_source(Environment::default().separator("_").list_separator(","));

        builder.build()?.try_deserialize()
    }
}
