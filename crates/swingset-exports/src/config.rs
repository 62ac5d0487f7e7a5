//! # Swing-Store Exports Configuration
//!
//! Configuration for the swing-store exports handler.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default prefix of restore staging directories.
pub const DEFAULT_RESTORE_DIR_PREFIX: &str = "agd-swing-store-restore";

/// Environment variable overriding the staging root directory.
pub const STAGING_DIR_ENV: &str = "SWINGSET_EXPORT_STAGING_DIR";

/// Environment variable enabling the strict artifact check.
pub const STRICT_ARTIFACTS_ENV: &str = "SWINGSET_EXPORT_STRICT_ARTIFACTS";

/// Swing-store exports handler configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportsHandlerConfig {
    /// Directory under which restore staging directories are created.
    /// `None` uses the system temporary directory.
    pub staging_root: Option<PathBuf>,

    /// Prefix of restore staging directories; the block height follows it.
    pub restore_dir_prefix: String,

    /// Fail a retrieval whose consumer returned without reading every
    /// artifact listed in the manifest.
    pub require_all_artifacts_read: bool,
}

impl Default for ExportsHandlerConfig {
    fn default() -> Self {
        Self {
            staging_root: None,
            restore_dir_prefix: DEFAULT_RESTORE_DIR_PREFIX.to_string(),
            require_all_artifacts_read: false,
        }
    }
}

impl ExportsHandlerConfig {
    /// Create a config for testing (strict artifact consumption).
    pub fn for_testing() -> Self {
        Self {
            require_all_artifacts_read: true,
            ..Self::default()
        }
    }

    /// Defaults overridden by `SWINGSET_EXPORT_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(dir) = std::env::var_os(STAGING_DIR_ENV).filter(|dir| !dir.is_empty()) {
            config.staging_root = Some(PathBuf::from(dir));
        }
        if let Ok(value) = std::env::var(STRICT_ARTIFACTS_ENV) {
            config.require_all_artifacts_read = parse_flag(&value);
        }
        config
    }

    /// Staging root in effect.
    pub fn staging_root(&self) -> PathBuf {
        self.staging_root
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
