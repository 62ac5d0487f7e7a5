//! # Swing-Store Export Action
//!
//! The single message envelope exchanged with the engine:
//!
//! ```json
//! { "type": "SWING_STORE_EXPORT", "blockHeight": 42, "request": "initiate", "args": [ ... ] }
//! ```
//!
//! `blockHeight` is omitted for "latest" (0) and `args` when empty.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::domain::{ExportOptions, SwingStoreExportError};

/// Action type understood by the engine.
pub const SWING_STORE_EXPORT_ACTION_TYPE: &str = "SWING_STORE_EXPORT";

/// Request carried by a swing-store export action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportRequest {
    /// Start generating an export.
    Initiate,
    /// Drop an export that was never retrieved.
    Discard,
    /// Hand over a generated export directory.
    Retrieve,
    /// Import an export directory into the store.
    Restore,
}

impl fmt::Display for ExportRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExportRequest::Initiate => "initiate",
            ExportRequest::Discard => "discard",
            ExportRequest::Retrieve => "retrieve",
            ExportRequest::Restore => "restore",
        };
        f.write_str(name)
    }
}

/// Options of the `restore` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOptions {
    /// Staged export directory.
    pub export_dir: String,
    /// Whether to load all historical artifacts.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub include_historical: bool,
}

/// Swing-store export message sent through the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwingStoreExportAction {
    /// Always [`SWING_STORE_EXPORT_ACTION_TYPE`].
    #[serde(rename = "type")]
    pub action_type: String,

    /// Block height of the operation, 0 for latest.
    #[serde(rename = "blockHeight", default, skip_serializing_if = "is_zero")]
    pub block_height: u64,

    /// Request kind.
    pub request: ExportRequest,

    /// Request arguments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<serde_json::Value>,
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

fn encode_arg<T: Serialize>(arg: &T) -> Result<serde_json::Value, SwingStoreExportError> {
    serde_json::to_value(arg).map_err(|e| {
        SwingStoreExportError::Protocol(format!("failed to encode action argument: {}", e))
    })
}

impl SwingStoreExportAction {
    fn new(block_height: u64, request: ExportRequest, args: Vec<serde_json::Value>) -> Self {
        Self {
            action_type: SWING_STORE_EXPORT_ACTION_TYPE.to_string(),
            block_height,
            request,
            args,
        }
    }

    /// `initiate` with the export options.
    pub fn initiate(
        block_height: u64,
        options: &ExportOptions,
    ) -> Result<Self, SwingStoreExportError> {
        Ok(Self::new(
            block_height,
            ExportRequest::Initiate,
            vec![encode_arg(options)?],
        ))
    }

    /// `discard`, no arguments.
    pub fn discard(block_height: u64) -> Self {
        Self::new(block_height, ExportRequest::Discard, Vec::new())
    }

    /// `retrieve`, no arguments.
    pub fn retrieve(block_height: u64) -> Self {
        Self::new(block_height, ExportRequest::Retrieve, Vec::new())
    }

    /// `restore` of a staged export directory.
    pub fn restore(
        block_height: u64,
        export_dir: &Path,
        include_historical: bool,
    ) -> Result<Self, SwingStoreExportError> {
        let export_dir = export_dir.to_str().ok_or_else(|| {
            SwingStoreExportError::Protocol(format!(
                "export directory {} is not valid UTF-8",
                export_dir.display()
            ))
        })?;
        let options = ImportOptions {
            export_dir: export_dir.to_string(),
            include_historical,
        };
        Ok(Self::new(
            block_height,
            ExportRequest::Restore,
            vec![encode_arg(&options)?],
        ))
    }

    /// Encode as a JSON string for the bridge.
    pub fn encode(&self) -> Result<String, SwingStoreExportError> {
        serde_json::to_string(self)
            .map_err(|e| SwingStoreExportError::Protocol(format!("failed to encode action: {}", e)))
    }

    /// Decode an action received on the engine side of a bridge.
    pub fn decode(raw: &str) -> Result<Self, SwingStoreExportError> {
        let action: Self = serde_json::from_str(raw)
            .map_err(|e| SwingStoreExportError::Protocol(format!("malformed action: {}", e)))?;
        if action.action_type != SWING_STORE_EXPORT_ACTION_TYPE {
            return Err(SwingStoreExportError::Protocol(format!(
                "unexpected action type {}",
                action.action_type
            )));
        }
        Ok(action)
    }
}

/// Decode the `retrieve` response: a JSON string holding the export directory.
pub fn decode_export_dir(response: &str) -> Result<PathBuf, SwingStoreExportError> {
    let dir: String = serde_json::from_str(response).map_err(|e| {
        SwingStoreExportError::Protocol(format!("malformed retrieve response: {}", e))
    })?;
    if dir.is_empty() {
        return Err(SwingStoreExportError::Protocol(
            "retrieve response holds an empty export directory".to_string(),
        ));
    }
    Ok(PathBuf::from(dir))
}
