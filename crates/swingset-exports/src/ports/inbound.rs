//! # Inbound Ports
//!
//! API trait defining what the swing-store exports subsystem offers the node.

use async_trait::async_trait;
use std::sync::Arc;

use super::outbound::{SwingStoreExportEventHandler, SwingStoreExportProvider};
use crate::domain::{ExportOptions, OperationKind, RestoreOptions, SwingStoreExportError};

/// Kind and height of the operation currently holding the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveOperationInfo {
    /// Export or restore.
    pub kind: OperationKind,
    /// Block height, 0 for a "latest" export.
    pub block_height: u64,
}

/// Swing-store exports API - inbound port.
///
/// All methods are meant to be called from the node's main execution
/// context, which `&mut self` enforces.
#[async_trait]
pub trait SwingStoreExportsApi: Send {
    /// Verify no operation is in progress and start an export in the
    /// background. Returns without waiting on the engine.
    fn initiate_export(
        &mut self,
        block_height: u64,
        event_handler: Arc<dyn SwingStoreExportEventHandler>,
        options: ExportOptions,
    ) -> Result<(), SwingStoreExportError>;

    /// Wait until the engine has started the export in progress, if any.
    ///
    /// Must be called before the engine commits the next block. Reports an
    /// `initiate` failure to the first caller only.
    async fn wait_until_started(&mut self) -> Result<(), SwingStoreExportError>;

    /// Wait until the operation in progress, if any, has fully completed,
    /// and release the gate.
    async fn wait_until_done(&mut self) -> Result<(), SwingStoreExportError>;

    /// Restore the engine's store from `provider`, blocking until the engine
    /// finished the import.
    async fn restore_export(
        &mut self,
        provider: &mut dyn SwingStoreExportProvider,
        options: RestoreOptions,
    ) -> Result<(), SwingStoreExportError>;

    /// Operation currently holding the gate, if it has not been released.
    fn active_operation(&self) -> Option<ActiveOperationInfo>;
}
