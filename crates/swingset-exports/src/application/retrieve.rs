//! # Retrieve Handle
//!
//! Single-use handle lent to the event handler to fetch an initiated export
//! from the engine.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::adapters::{DirectoryExportProvider, ExportDirGuard};
use crate::domain::{OperationPhase, OperationState, SwingStoreExportError};
use crate::ipc::{decode_export_dir, SwingStoreExportAction};
use crate::ports::{SwingStoreExportEventHandler, SwingStoreExportProvider, SwingStoreTransport};

/// Retrieves the export of the operation it was created for.
///
/// Consumed by [`retrieve`](Self::retrieve), so it is used at most once. A
/// handle kept past the return of `export_initiated` is rejected with
/// `OperationNotActive`.
pub struct RetrieveExport {
    operation: Arc<OperationState>,
    transport: Arc<dyn SwingStoreTransport>,
    event_handler: Arc<dyn SwingStoreExportEventHandler>,
    require_all_artifacts_read: bool,
}

impl RetrieveExport {
    pub(crate) fn new(
        operation: Arc<OperationState>,
        transport: Arc<dyn SwingStoreTransport>,
        event_handler: Arc<dyn SwingStoreExportEventHandler>,
        require_all_artifacts_read: bool,
    ) -> Self {
        Self {
            operation,
            transport,
            event_handler,
            require_all_artifacts_read,
        }
    }

    /// Requested block height, 0 for "latest".
    pub fn block_height(&self) -> u64 {
        self.operation.block_height()
    }

    /// Wait for the export to be ready, then hand it to the event handler's
    /// `export_retrieved`.
    ///
    /// Failures after the operation was claimed are also reported as the
    /// operation's result, even if the caller drops them.
    pub async fn retrieve(self) -> Result<(), SwingStoreExportError> {
        self.operation.begin_retrieve()?;

        let result = self.fetch_and_consume().await;
        if let Err(err) = &result {
            self.operation.record_retrieve_error(err.clone());
        }
        result
    }

    async fn fetch_and_consume(&self) -> Result<(), SwingStoreExportError> {
        let block_height = self.operation.block_height();
        let action = SwingStoreExportAction::retrieve(block_height);

        let out = match self.transport.blocking_send(&action, false).await {
            Ok(out) => out,
            Err(err) => {
                // The engine still owns the export.
                if let Err(phase_err) = self.operation.transition(OperationPhase::DiscardPending) {
                    debug!(err = %phase_err, "discard already scheduled");
                }
                return Err(err.into());
            }
        };
        let marked = self.operation.transition(OperationPhase::Retrieved);

        let export_dir = decode_export_dir(&out)?;
        let guard = ExportDirGuard::new(export_dir);
        marked?;

        // Reading artifacts and the consumer callback block; keep them off
        // the runtime threads the main context shares.
        let event_handler = self.event_handler.clone();
        let require_all_artifacts_read = self.require_all_artifacts_read;
        let span = tracing::Span::current();
        let consumed = tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            consume_export(
                guard,
                block_height,
                event_handler.as_ref(),
                require_all_artifacts_read,
            )
        })
        .await;

        consumed.unwrap_or_else(|join_err| {
            warn!(err = %join_err, "swing-store export consumer aborted");
            Err(SwingStoreExportError::WorkerTerminated)
        })
    }
}

/// Open the retrieved export and hand it to the consumer. The directory is
/// removed when `guard` drops, including on unwind.
fn consume_export(
    guard: ExportDirGuard,
    block_height: u64,
    event_handler: &dyn SwingStoreExportEventHandler,
    require_all_artifacts_read: bool,
) -> Result<(), SwingStoreExportError> {
    let mut provider = DirectoryExportProvider::open(guard.path(), block_height)?;
    event_handler.export_retrieved(&mut provider)?;

    let remaining = provider.remaining_artifacts();
    if require_all_artifacts_read && remaining > 0 {
        return Err(SwingStoreExportError::Protocol(format!(
            "not all export artifacts were retrieved ({remaining} left)"
        )));
    }

    info!(
        export_dir = %guard.path().display(),
        artifacts = provider.manifest().artifacts.len(),
        "retrieved swing-store export"
    );
    Ok(())
}

impl std::fmt::Debug for RetrieveExport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrieveExport")
            .field("block_height", &self.operation.block_height())
            .field("phase", &self.operation.phase())
            .finish()
    }
}
