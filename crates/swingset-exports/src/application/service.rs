//! # Swing-Store Exports Service
//!
//! Coordinates exports and restores of the engine's swing-store with the
//! node's block commits.
//!
//! The handler is owned by the node's main context. An export runs in a
//! spawned worker task that talks to the main context only through two
//! oneshot signals:
//!
//! ```text
//! main context                         export worker
//! ────────────                         ─────────────
//! initiate_export ──spawn──────────→   send `initiate`
//! wait_until_started ←──started─────   export_initiated(retrieve)
//!   (commit block)                       └→ send `retrieve` → export_retrieved
//! wait_until_done ←─────done────────   send `discard` if never retrieved
//! ```
//!
//! At most one operation holds the gate at a time. A finished export frees
//! it at the next `wait_until_done`, or lazily at the next gate check.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::oneshot::{self, error::TryRecvError};
use swingset_telemetry::subsystem_span;
use tracing::{debug, error, warn, Instrument};

use super::restore;
use super::retrieve::RetrieveExport;
use crate::config::ExportsHandlerConfig;
use crate::domain::{
    ExportOptions, OperationKind, OperationPhase, OperationState, RestoreOptions,
    SwingStoreExportError,
};
use crate::ipc::SwingStoreExportAction;
use crate::ports::{
    ActiveOperationInfo, SwingStoreExportEventHandler, SwingStoreExportProvider,
    SwingStoreExportsApi, SwingStoreTransport,
};

type Signal = oneshot::Receiver<Result<(), SwingStoreExportError>>;

/// The operation holding the gate, as seen from the main context.
#[derive(Debug)]
struct ActiveOperation {
    kind: OperationKind,
    block_height: u64,
    /// Cleared once a waiter observed it.
    started: Option<Signal>,
    /// `None` for a restore, which completes in the caller's task.
    done: Option<Signal>,
}

impl ActiveOperation {
    /// The terminal result, if the worker already reported it.
    fn try_done(&mut self) -> Option<Result<(), SwingStoreExportError>> {
        let done = self.done.as_mut()?;
        match done.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(SwingStoreExportError::WorkerTerminated)),
        }
    }

    fn info(&self) -> ActiveOperationInfo {
        ActiveOperationInfo {
            kind: self.kind,
            block_height: self.block_height,
        }
    }
}

/// Holds the gate for the duration of a restore, even if the restore
/// future is dropped.
struct RestoreGate<'a> {
    active: &'a mut Option<ActiveOperation>,
}

impl<'a> RestoreGate<'a> {
    fn acquire(active: &'a mut Option<ActiveOperation>, block_height: u64) -> Self {
        *active = Some(ActiveOperation {
            kind: OperationKind::Restore,
            block_height,
            started: None,
            done: None,
        });
        Self { active }
    }
}

impl Drop for RestoreGate<'_> {
    fn drop(&mut self) {
        *self.active = None;
    }
}

/// Swing-store exports handler - exclusively manages export and restore
/// requests to the engine.
pub struct SwingStoreExportsHandler<T: SwingStoreTransport + 'static> {
    /// Configuration.
    config: ExportsHandlerConfig,
    /// Bridge to the engine.
    transport: Arc<T>,
    /// Operation holding the gate.
    active: Option<ActiveOperation>,
}

impl<T: SwingStoreTransport + 'static> SwingStoreExportsHandler<T> {
    /// Create a handler sending requests through `transport`.
    pub fn new(config: ExportsHandlerConfig, transport: Arc<T>) -> Self {
        Self {
            config,
            transport,
            active: None,
        }
    }

    /// The engine bridge.
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Configuration in effect.
    pub fn config(&self) -> &ExportsHandlerConfig {
        &self.config
    }

    /// Fail if an unfinished operation holds the gate; release a finished one.
    fn check_not_active(&mut self) -> Result<(), SwingStoreExportError> {
        let Some(operation) = self.active.as_mut() else {
            return Ok(());
        };
        match operation.try_done() {
            Some(result) => {
                if let Err(err) = result {
                    warn!(height = operation.block_height, err = %err, "unobserved swing-store export failure");
                }
                self.active = None;
                Ok(())
            }
            None => Err(SwingStoreExportError::OperationInProgress {
                kind: operation.kind,
                block_height: operation.block_height,
            }),
        }
    }
}

#[async_trait]
impl<T: SwingStoreTransport + 'static> SwingStoreExportsApi for SwingStoreExportsHandler<T> {
    fn initiate_export(
        &mut self,
        block_height: u64,
        event_handler: Arc<dyn SwingStoreExportEventHandler>,
        options: ExportOptions,
    ) -> Result<(), SwingStoreExportError> {
        self.check_not_active()?;

        let runtime = Handle::try_current().map_err(|e| {
            SwingStoreExportError::Protocol(format!("swing-store export needs a Tokio runtime: {}", e))
        })?;
        let initiate = SwingStoreExportAction::initiate(block_height, &options)?;

        let (started_tx, started_rx) = oneshot::channel();
        let (done_tx, done_rx) = oneshot::channel();
        let operation = Arc::new(OperationState::export(block_height));
        let kind = operation.kind();
        let worker = ExportWorker {
            operation,
            transport: self.transport.clone(),
            event_handler,
            initiate,
            require_all_artifacts_read: self.config.require_all_artifacts_read,
        };

        let height = if block_height == 0 {
            "latest".to_string()
        } else {
            block_height.to_string()
        };
        let span = subsystem_span!("swing_store_export", height = %height, kind = %kind);
        runtime.spawn(worker.run(started_tx, done_tx).instrument(span));

        self.active = Some(ActiveOperation {
            kind,
            block_height,
            started: Some(started_rx),
            done: Some(done_rx),
        });
        Ok(())
    }

    async fn wait_until_started(&mut self) -> Result<(), SwingStoreExportError> {
        let Some(operation) = self.active.as_mut() else {
            return Ok(());
        };

        let result = match operation.started.as_mut() {
            Some(started) => {
                let result = started
                    .await
                    .unwrap_or(Err(SwingStoreExportError::WorkerTerminated));
                operation.started = None;
                result
            }
            None => Ok(()),
        };

        if let Some(done) = operation.try_done() {
            if let Err(err) = done {
                debug!(err = %err, "swing-store export finished before being waited on");
            }
            self.active = None;
        }
        result
    }

    async fn wait_until_done(&mut self) -> Result<(), SwingStoreExportError> {
        let Some(operation) = self.active.as_mut() else {
            return Ok(());
        };

        let result = match operation.done.as_mut() {
            Some(done) => done
                .await
                .unwrap_or(Err(SwingStoreExportError::WorkerTerminated)),
            None => Ok(()),
        };
        self.active = None;
        result
    }

    async fn restore_export(
        &mut self,
        provider: &mut dyn SwingStoreExportProvider,
        options: RestoreOptions,
    ) -> Result<(), SwingStoreExportError> {
        self.check_not_active()?;

        let _gate = RestoreGate::acquire(&mut self.active, provider.block_height());
        restore::restore_export(self.transport.as_ref(), &self.config, provider, options).await
    }

    fn active_operation(&self) -> Option<ActiveOperationInfo> {
        self.active.as_ref().map(ActiveOperation::info)
    }
}

/// Runs one export in its own task.
struct ExportWorker {
    operation: Arc<OperationState>,
    transport: Arc<dyn SwingStoreTransport>,
    event_handler: Arc<dyn SwingStoreExportEventHandler>,
    initiate: SwingStoreExportAction,
    require_all_artifacts_read: bool,
}

impl ExportWorker {
    async fn run(
        self,
        started: oneshot::Sender<Result<(), SwingStoreExportError>>,
        done: oneshot::Sender<Result<(), SwingStoreExportError>>,
    ) {
        let result = self.execute(started).await;
        self.operation.finish();
        if done.send(result).is_err() {
            debug!("swing-store exports handler dropped before export completed");
        }
    }

    async fn execute(
        &self,
        started: oneshot::Sender<Result<(), SwingStoreExportError>>,
    ) -> Result<(), SwingStoreExportError> {
        let block_height = self.operation.block_height();
        self.operation.transition(OperationPhase::Initiating)?;

        if let Err(err) = self.transport.blocking_send(&self.initiate, false).await {
            let err = SwingStoreExportError::from(err);
            self.operation.transition(OperationPhase::InitiateFailed)?;
            error!(err = %err, "failed to initiate swing-store export");
            let _ = started.send(Err(err.clone()));
            return Err(err);
        }
        self.operation.transition(OperationPhase::Started)?;
        let _ = started.send(Ok(()));

        let retrieve = RetrieveExport::new(
            self.operation.clone(),
            self.transport.clone(),
            self.event_handler.clone(),
            self.require_all_artifacts_read,
        );
        let mut result = self.event_handler.export_initiated(block_height, retrieve).await;

        // A retrieve failure the handler swallowed.
        if let Some(retrieve_err) = self.operation.take_retrieve_error() {
            if result.is_ok() {
                result = Err(retrieve_err);
            }
        }
        if let Err(err) = &result {
            error!(err = %err, "failed to process swing-store export");
        }

        if !self.operation.schedule_discard() {
            return result;
        }

        let discard = SwingStoreExportAction::discard(block_height);
        match (result, self.transport.blocking_send(&discard, false).await) {
            (result, Ok(_)) => {
                debug!("discarded swing-store export");
                result
            }
            (result, Err(discard_err)) => {
                let discard_err = SwingStoreExportError::from(discard_err);
                error!(err = %discard_err, "failed to discard swing-store export");
                match result {
                    Ok(()) => Err(discard_err),
                    Err(primary) => Err(SwingStoreExportError::with_discard_failure(
                        primary,
                        discard_err,
                    )),
                }
            }
        }
    }
}
