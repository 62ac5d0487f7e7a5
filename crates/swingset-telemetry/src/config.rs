//! Telemetry configuration from environment variables.

use serde::{Deserialize, Serialize};
use std::env;

/// Configuration for the node's structured logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Service name attached to every log line
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error) or a full
    /// `EnvFilter` directive such as `swingset_exports=debug,info`
    pub log_level: String,

    /// Whether to enable console output
    pub console_output: bool,

    /// Whether to emit JSON formatted logs instead of the pretty format
    pub json_logs: bool,

    /// Whether to include source file and line in each event
    pub with_source_location: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "swingset-node".to_string(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
            with_source_location: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SWINGSET_SERVICE_NAME`: Service name (default: swingset-node)
    /// - `SWINGSET_LOG_LEVEL` or `RUST_LOG`: Log filter (default: info)
    /// - `SWINGSET_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `SWINGSET_JSON_LOGS`: Enable JSON logs (default: false outside containers)
    /// - `SWINGSET_LOG_SOURCE`: Include file/line in events (default: false)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("SWINGSET_SERVICE_NAME")
                .unwrap_or_else(|_| "swingset-node".to_string()),

            log_level: env::var("SWINGSET_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            console_output: env::var("SWINGSET_CONSOLE_OUTPUT")
                .map(|v| parse_flag(&v))
                .unwrap_or(true),

            json_logs: env::var("SWINGSET_JSON_LOGS")
                .map(|v| parse_flag(&v))
                .unwrap_or(is_container),

            with_source_location: env::var("SWINGSET_LOG_SOURCE")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
        }
    }

    /// Configuration suited to unit and integration tests.
    pub fn for_testing() -> Self {
        Self {
            service_name: "swingset-test".to_string(),
            log_level: "debug".to_string(),
            console_output: true,
            json_logs: false,
            with_source_location: true,
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
