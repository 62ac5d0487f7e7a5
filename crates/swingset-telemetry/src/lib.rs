//! # Swingset Telemetry
//!
//! Structured logging bootstrap for the swingset state-sync node.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use swingset_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     let _guard = init_telemetry(TelemetryConfig::from_env()).expect("telemetry");
//!     // subsystems now log through `tracing`
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SWINGSET_SERVICE_NAME` | `swingset-node` | Service name in logs |
//! | `SWINGSET_LOG_LEVEL` | `info` | Log filter (`RUST_LOG` takes precedence) |
//! | `SWINGSET_JSON_LOGS` | `false` | JSON output (default on in containers) |
//! | `SWINGSET_CONSOLE_OUTPUT` | `true` | Write events to stdout |
//! | `SWINGSET_LOG_SOURCE` | `false` | Include file/line in events |

#![warn(missing_docs)]

mod config;
mod logging;

pub use config::TelemetryConfig;
pub use logging::init_test_logging;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The log filter directive could not be parsed.
    #[error("Invalid log filter: {0}")]
    InvalidFilter(String),

    /// A global subscriber was already installed.
    #[error("Global subscriber already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Initialize structured logging for the process.
///
/// Returns a guard that should be held for the lifetime of the application.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    logging::init_logging(&config)?;
    Ok(TelemetryGuard {
        service_name: config.service_name,
    })
}

/// Guard that keeps telemetry active. Logs on shutdown when dropped.
pub struct TelemetryGuard {
    service_name: String,
}

impl TelemetryGuard {
    /// Service name the subscriber was configured with.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry...");
    }
}

/// Convenience macro for creating a span with subsystem context.
///
/// # Example
///
/// ```rust,ignore
/// use swingset_telemetry::subsystem_span;
///
/// let span = subsystem_span!("swing_store_export", subsystem = "swingset", height = 42);
/// ```
#[macro_export]
macro_rules! subsystem_span {
    ($name:expr, $($field:tt)*) => {
        $crate::__private::tracing::info_span!($name, $($field)*)
    };
}

#[doc(hidden)]
pub mod __private {
    pub use tracing;
}
