//! Prometheus metrics.
//!
//! A sweep is a short-lived process, so instead of serving a scrape endpoint
//! the recorder is rendered once at shutdown, to a file or to stderr.

use crate::config::MetricsSettings;
use crate::{Error, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::path::PathBuf;

/// Metrics configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsConfig {
    /// Whether metrics are recorded.
    pub enabled: bool,
    /// Exposition file. Stderr when `None`.
    pub file: Option<PathBuf>,
}

impl MetricsConfig {
    /// Builds metrics configuration from config settings with env overrides.
    #[must_use]
    pub fn from_settings(settings: Option<&MetricsSettings>) -> Self {
        let mut config = Self {
            enabled: settings.and_then(|s| s.enabled).unwrap_or(false),
            file: settings.and_then(|s| s.file.clone()),
        };

        if let Some(enabled) = parse_bool_env("MEMSWEEP_METRICS_ENABLED") {
            config.enabled = enabled;
        }
        if let Some(file) = std::env::var("MEMSWEEP_METRICS_FILE")
            .ok()
            .filter(|f| !f.trim().is_empty())
        {
            config.file = Some(PathBuf::from(file));
        }

        config
    }
}

/// Installed recorder.
#[derive(Debug)]
pub struct MetricsHandle {
    prometheus: PrometheusHandle,
    file: Option<PathBuf>,
}

impl MetricsHandle {
    /// Renders the current metrics in Prometheus text format.
    #[must_use]
    pub fn render(&self) -> String {
        self.prometheus.render()
    }
}

/// Installs the Prometheus recorder if metrics are enabled.
///
/// # Errors
///
/// Returns an error if a global recorder is already installed.
pub fn install_prometheus(config: &MetricsConfig) -> Result<Option<MetricsHandle>> {
    if !config.enabled {
        return Ok(None);
    }

    let prometheus = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| Error::OperationFailed {
            operation: "metrics_recorder_install".to_string(),
            cause: e.to_string(),
        })?;

    Ok(Some(MetricsHandle {
        prometheus,
        file: config.file.clone(),
    }))
}

/// Writes the rendered metrics to the configured destination.
pub fn flush(handle: &MetricsHandle) {
    let payload = handle.render();
    match &handle.file {
        Some(path) => {
            if let Err(e) = std::fs::write(path, payload) {
                tracing::warn!(path = %path.display(), error = %e, "Failed to write metrics file");
            }
        },
        None => eprint!("{payload}"),
    }
}

fn parse_bool_env(key: &str) -> Option<bool> {
    std::env::var(key).ok().and_then(|v| parse_bool(&v))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" on "), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_disabled_installs_nothing() {
        let config = MetricsConfig::default();
        assert!(install_prometheus(&config).expect("install").is_none());
    }
}
