//! # Adapters
//!
//! Concrete providers, transports and event handlers.

pub mod channel_transport;
pub mod directory_provider;
pub mod memory_provider;
pub mod state_sync;

pub use channel_transport::{BridgeRequest, ChannelTransport};
pub use directory_provider::{DirectoryExportProvider, ExportDirGuard};
pub use memory_provider::MemoryExportProvider;
pub use state_sync::{CollectedSnapshot, StateSyncSnapshotCollector};
