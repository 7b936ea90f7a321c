use std::error::Error;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::prelude::*;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct MonitoringConfig {
    pub service_name: String,
    pub logs: EnvFilterConfig,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct EnvFilterConfig {
    pub default_level: String,
    pub filters: Vec<String>,
}

impl TryInto<EnvFilter> for EnvFilterConfig {
    type Error = tracing_subscriber::filter::ParseError;

    fn try_into(self) -> Result<EnvFilter, Self::Error> {
        EnvFilter::builder()
            .with_default_directive(self.default_level.parse()?)
            .parse(self.filters.join(","))
    }
}

impl MonitoringConfig {
    pub fn init(&self) -> Result<(), Box<dyn Error>> {
        let logging_filter: EnvFilter = self.logs.clone().try_into()?;
        let fmt_layer = tracing_subscriber::fmt::layer();

        tracing_subscriber::registry()
            .with(fmt_layer)
            .with(logging_filter)
            .init();

        tracing::debug!("Logging initialized for {}", self.service_name);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_config_parses() {
        let config = EnvFilterConfig {
            default_level: "info".to_owned(),
            filters: vec!["rumqttc=warn".to_owned(), "hyper=warn".to_owned()],
        };

        let filter: Result<EnvFilter, _> = config.try_into();
        assert!(filter.is_ok());
    }

    #[test]
    fn test_invalid_level_is_rejected() {
        let config = EnvFilterConfig {
            default_level: "not-a-level".to_owned(),
            filters: vec![],
        };

        let filter: Result<EnvFilter, _> = config.try_into();
        assert!(filter.is_err());
    }
}
