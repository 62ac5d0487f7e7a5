//! # Swing-Store Exports
//!
//! Node-side coordination of swing-store exports and restores with the
//! external execution engine.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! State-sync snapshots must contain the engine's swing-store exactly as of
//! a committed block. The engine produces the export, the node consumes it:
//! - the export is *initiated* before the next block commits, then
//!   *retrieved* off the main context while blocks keep flowing;
//! - an export nobody retrieved is *discarded* so the engine can free it;
//! - a snapshot received over state-sync is staged on disk and *restored*
//!   into the engine before its controller is initialized.
//!
//! ## Guarantees
//!
//! | Guarantee | Mechanism |
//! |-----------|-----------|
//! | One operation at a time | Gate checked by `initiate_export` / `restore_export` |
//! | Commit boundary | `wait_until_started` returns only after `initiate` completed |
//! | Single retrieval | `RetrieveExport` is consumed by `retrieve()` |
//! | No leaked exports | Unretrieved exports are discarded, directories removed on drop |
//!
//! ## Module Structure
//!
//! ```text
//! swingset-exports/
//! ├── domain/          # Entities, errors, manifest codec, operation state machine
//! ├── ipc/             # SWING_STORE_EXPORT action envelope
//! ├── ports/           # API trait (inbound) + transport/provider/handler traits (outbound)
//! ├── application/     # SwingStoreExportsHandler, RetrieveExport, restore staging
//! ├── adapters/        # Directory/memory providers, channel transport, state-sync collector
//! └── config.rs        # ExportsHandlerConfig
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ipc;
pub mod ports;

// Re-exports
pub use adapters::{
    BridgeRequest, ChannelTransport, CollectedSnapshot, DirectoryExportProvider,
    MemoryExportProvider, StateSyncSnapshotCollector,
};
pub use application::{stage_export, RetrieveExport, SwingStoreExportsHandler};
pub use config::ExportsHandlerConfig;
pub use domain::{
    DataEntry, ExportManifest, ExportMode, ExportOptions, OperationKind, OperationPhase,
    RestoreOptions, SwingStoreArtifact, SwingStoreExportError, TransportError,
    EXPORT_DATA_FILENAME, EXPORT_MANIFEST_FILENAME, UNTRUSTED_EXPORT_DATA_ARTIFACT_NAME,
    UNTRUSTED_EXPORT_DATA_FILENAME,
};
pub use ipc::{ExportRequest, SwingStoreExportAction};
pub use ports::{
    ActiveOperationInfo, SwingStoreExportEventHandler, SwingStoreExportProvider,
    SwingStoreExportsApi, SwingStoreTransport,
    MockExport, MockTransport,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
