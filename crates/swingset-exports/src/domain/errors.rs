//! # Domain Errors
//!
//! Error types for swing-store export and restore operations.
//!
//! Every variant is `Clone`: a failed `initiate` request is delivered to
//! both the started and the done signal of the same operation.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

/// Kind of swing-store operation holding the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Export generated by the engine and retrieved by the node.
    Export,
    /// Restore of a previously produced export into the engine.
    Restore,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Export => write!(f, "export"),
            OperationKind::Restore => write!(f, "restore"),
        }
    }
}

/// Errors raised by the bridge to the execution engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The engine reported a failure while handling the request.
    #[error("engine request failed: {0}")]
    Failed(String),

    /// A request that must run before controller initialization arrived too late.
    #[error("engine controller already initialized, refusing exclusive request")]
    AlreadyInitialized,

    /// The bridge task is gone.
    #[error("engine bridge disconnected")]
    Disconnected,
}

/// Swing-store export/restore error types.
#[derive(Debug, Clone, Error)]
pub enum SwingStoreExportError {
    /// Another export or restore holds the gate.
    #[error("{kind} operation already in progress for height {block_height}")]
    OperationInProgress {
        /// Kind of the conflicting operation
        kind: OperationKind,
        /// Block height of the conflicting operation
        block_height: u64,
    },

    /// The bridge call to the engine failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The export manifest is malformed.
    #[error("invalid export manifest: {0}")]
    Manifest(String),

    /// The manifest describes a different block than the one requested.
    #[error("export manifest blockHeight ({found}) doesn't match ({expected})")]
    BlockHeightMismatch {
        /// Requested height
        expected: u64,
        /// Height found in the manifest
        found: u64,
    },

    /// An export violated the interchange protocol.
    #[error("swing-store export protocol error: {0}")]
    Protocol(String),

    /// The retrieve handle no longer refers to a live operation.
    #[error("export operation no longer active")]
    OperationNotActive,

    /// The worker task ended without reporting a result.
    #[error("swing-store export worker terminated unexpectedly")]
    WorkerTerminated,

    /// Filesystem failure while staging or reading an export.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File or directory involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: Arc<io::Error>,
    },

    /// The event handler or provider consumer failed.
    #[error("export consumer failed: {0}")]
    Consumer(String),

    /// Discarding the export failed after the operation had already failed.
    #[error("failed to discard swing-store export after failing to process export: {discard} (primary: {primary})")]
    DiscardFailed {
        /// The error that made the operation fail
        #[source]
        primary: Box<SwingStoreExportError>,
        /// The error returned by the discard request
        discard: Box<SwingStoreExportError>,
    },
}

impl SwingStoreExportError {
    /// Wrap a filesystem error with the path it occurred on.
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source: Arc::new(source),
        }
    }

    /// Wrap any consumer-side failure.
    pub fn consumer(err: impl fmt::Display) -> Self {
        Self::Consumer(err.to_string())
    }

    /// Combine a primary failure with a failed discard.
    pub fn with_discard_failure(primary: Self, discard: Self) -> Self {
        Self::DiscardFailed {
            primary: Box::new(primary),
            discard: Box::new(discard),
        }
    }

    /// The error that caused the operation to fail, looking through a
    /// discard aggregate.
    pub fn primary(&self) -> &Self {
        match self {
            Self::DiscardFailed { primary, .. } => primary,
            other => other,
        }
    }

    /// The discard failure, if this error carries one.
    pub fn discard(&self) -> Option<&Self> {
        match self {
            Self::DiscardFailed { discard, .. } => Some(discard),
            _ => None,
        }
    }

    /// Whether the gate was held by another operation.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::OperationInProgress { .. })
    }
}
