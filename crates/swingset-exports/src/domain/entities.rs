//! # Domain Entities
//!
//! Export data entries, artifacts and the options accepted by the engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One key/value record of the engine's store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataEntry {
    /// Store key path.
    pub path: String,
    /// Value stored under `path`.
    pub value: String,
}

impl DataEntry {
    /// Create an entry.
    pub fn new(path: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            value: value.into(),
        }
    }
}

/// A named, opaque binary blob inside an export.
///
/// The name is engine-defined and not necessarily filesystem-safe.
#[derive(Clone, PartialEq, Eq)]
pub struct SwingStoreArtifact {
    /// Engine-defined artifact name.
    pub name: String,
    /// Raw artifact content.
    pub data: Vec<u8>,
}

impl SwingStoreArtifact {
    /// Create an artifact.
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

impl fmt::Debug for SwingStoreArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwingStoreArtifact")
            .field("name", &self.name)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Which historical content the engine includes in an export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportMode {
    /// Only the artifacts needed to rebuild the current state.
    #[default]
    Current,
    /// All historical artifacts the store still holds.
    Archival,
    /// Everything, including content that cannot be verified on import.
    Debug,
}

/// Options sent with the `initiate` request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportOptions {
    /// Export mode.
    pub export_mode: ExportMode,
    /// Whether the export carries its export data. When false the retrieved
    /// provider reports no export data.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub include_export_data: bool,
}

impl ExportOptions {
    /// Options for a state-sync snapshot: current mode without export data.
    pub fn current() -> Self {
        Self::default()
    }

    /// Set the export mode.
    pub fn with_mode(mut self, export_mode: ExportMode) -> Self {
        self.export_mode = export_mode;
        self
    }

    /// Request the export data alongside the artifacts.
    pub fn with_export_data(mut self) -> Self {
        self.include_export_data = true;
        self
    }
}

/// Options for restoring an export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreOptions {
    /// Whether the import should load every historical artifact the
    /// provider offers.
    pub include_historical: bool,
}
