//! # Outbound Ports
//!
//! Traits for the subsystem's collaborators: the engine bridge, the export
//! consumer, and the export content itself.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::oneshot;

use crate::application::RetrieveExport;
use crate::domain::{
    artifact_filename, write_export_data, DataEntry, ExportManifest, SwingStoreArtifact,
    SwingStoreExportError, TransportError, EXPORT_DATA_FILENAME,
};
use crate::ipc::{ExportRequest, ImportOptions, SwingStoreExportAction};

/// Bridge to the execution engine - outbound port.
///
/// Requests may be sent from any task. When `must_not_be_inited` is set the
/// request mutates the engine's store and must be refused once the engine
/// controller has been initialized.
#[async_trait]
pub trait SwingStoreTransport: Send + Sync {
    /// Send `action` and wait for the engine's response.
    async fn blocking_send(
        &self,
        action: &SwingStoreExportAction,
        must_not_be_inited: bool,
    ) -> Result<String, TransportError>;
}

/// Single-pass access to the content of one swing-store export.
///
/// Unlike the engine's own exporter there is no listing and no random
/// access: export data is read at most once and artifacts are read forward
/// in manifest order.
pub trait SwingStoreExportProvider: Send {
    /// Block height of the export.
    fn block_height(&self) -> u64;

    /// The export data, or `None` if the export carries none.
    ///
    /// May be called once.
    fn get_export_data(&mut self) -> Result<Option<Vec<DataEntry>>, SwingStoreExportError>;

    /// The next unread artifact, or `None` once all were read. Calling again
    /// after `None` is an error.
    fn read_artifact(&mut self) -> Result<Option<SwingStoreArtifact>, SwingStoreExportError>;

    /// Number of artifacts not read yet.
    fn remaining_artifacts(&self) -> usize;
}

/// Consumer of a swing-store export - outbound port, supplied by the
/// component requesting the export.
#[async_trait]
pub trait SwingStoreExportEventHandler: Send + Sync {
    /// Called from the export task once the engine has started the export.
    ///
    /// This is where the component does its own off-main-context work. It
    /// must call `retrieve.retrieve()` before returning, which in turn calls
    /// [`export_retrieved`](Self::export_retrieved) once the export is ready.
    /// If the export is never retrieved the engine is told to discard it.
    async fn export_initiated(
        &self,
        block_height: u64,
        retrieve: RetrieveExport,
    ) -> Result<(), SwingStoreExportError>;

    /// Called during `retrieve()` with the retrieved export.
    ///
    /// The provider must be consumed synchronously; it is invalid once this
    /// method returns. Errors are reported both from `retrieve()` and as the
    /// operation's result, so components that cannot propagate errors out of
    /// `export_initiated` are still heard.
    fn export_retrieved(
        &self,
        provider: &mut dyn SwingStoreExportProvider,
    ) -> Result<(), SwingStoreExportError>;
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// Content the mock engine serves on `retrieve`.
#[derive(Debug, Clone, Default)]
pub struct MockExport {
    /// Height written to the manifest.
    pub block_height: u64,
    /// Export data; `None` writes no data file.
    pub entries: Option<Vec<DataEntry>>,
    /// Artifacts in manifest order.
    pub artifacts: Vec<SwingStoreArtifact>,
}

impl MockExport {
    /// Write the export into a fresh directory and return its path.
    fn materialize(&self) -> Result<PathBuf, TransportError> {
        static NEXT_DIR: AtomicU64 = AtomicU64::new(0);
        let dir = std::env::temp_dir().join(format!(
            "mock-swing-store-export-{}-{}",
            std::process::id(),
            NEXT_DIR.fetch_add(1, Ordering::Relaxed)
        ));
        let fail = |e: std::io::Error| TransportError::Failed(e.to_string());
        fs::create_dir_all(&dir).map_err(fail)?;

        let mut manifest = ExportManifest::new(self.block_height);
        if let Some(entries) = &self.entries {
            let mut raw = Vec::new();
            write_export_data(&mut raw, entries)
                .map_err(|e| TransportError::Failed(e.to_string()))?;
            fs::write(dir.join(EXPORT_DATA_FILENAME), raw).map_err(fail)?;
            manifest.data = Some(EXPORT_DATA_FILENAME.to_string());
        }
        for (ordinal, artifact) in self.artifacts.iter().enumerate() {
            let filename = artifact_filename(ordinal, &artifact.name);
            fs::write(dir.join(&filename), &artifact.data).map_err(fail)?;
            manifest.push_artifact(artifact.name.clone(), filename);
        }
        let raw = manifest
            .to_pretty_json()
            .map_err(|e| TransportError::Failed(e.to_string()))?;
        fs::write(dir.join(crate::domain::EXPORT_MANIFEST_FILENAME), raw).map_err(fail)?;
        Ok(dir)
    }
}

/// A request recorded by [`MockTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedAction {
    /// The action as sent.
    pub action: SwingStoreExportAction,
    /// The exclusivity flag it was sent with.
    pub must_not_be_inited: bool,
}

/// Files of a restore directory captured by [`MockTransport`] while it
/// still existed.
pub type RestoredFiles = BTreeMap<String, Vec<u8>>;

/// Scripted mock engine.
///
/// - `initiate`, `discard` and `restore` succeed unless a failure is queued;
/// - `retrieve` writes the configured [`MockExport`] to a new directory and
///   returns its path;
/// - `restore` captures every file of the staged directory;
/// - `initiate` can be held until released, to observe the commit boundary.
#[derive(Default)]
pub struct MockTransport {
    actions: Mutex<Vec<RecordedAction>>,
    failures: Mutex<HashMap<ExportRequest, VecDeque<TransportError>>>,
    export: Mutex<Option<MockExport>>,
    retrieve_response: Mutex<Option<String>>,
    restored: Mutex<Vec<RestoredFiles>>,
    initiate_gate: Mutex<Option<oneshot::Receiver<()>>>,
}

impl MockTransport {
    /// Mock engine serving no export.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock engine serving `export` on `retrieve`.
    pub fn with_export(export: MockExport) -> Self {
        let transport = Self::default();
        *transport.export.lock() = Some(export);
        transport
    }

    /// Fail the next request of kind `request`.
    pub fn fail_next(&self, request: ExportRequest, err: TransportError) {
        self.failures
            .lock()
            .entry(request)
            .or_default()
            .push_back(err);
    }

    /// Answer `retrieve` with `response` verbatim instead of a directory.
    pub fn set_retrieve_response(&self, response: impl Into<String>) {
        *self.retrieve_response.lock() = Some(response.into());
    }

    /// Hold the next `initiate` until the returned sender fires or drops.
    pub fn hold_initiate(&self) -> oneshot::Sender<()> {
        let (release, gate) = oneshot::channel();
        *self.initiate_gate.lock() = Some(gate);
        release
    }

    /// All actions sent so far.
    pub fn actions(&self) -> Vec<RecordedAction> {
        self.actions.lock().clone()
    }

    /// Request kinds sent so far, in order.
    pub fn requests(&self) -> Vec<ExportRequest> {
        self.actions
            .lock()
            .iter()
            .map(|recorded| recorded.action.request)
            .collect()
    }

    /// Directories captured by `restore` requests.
    pub fn restored(&self) -> Vec<RestoredFiles> {
        self.restored.lock().clone()
    }

    fn capture_restore(&self, action: &SwingStoreExportAction) -> Result<(), TransportError> {
        let options: ImportOptions = action
            .args
            .first()
            .cloned()
            .ok_or_else(|| TransportError::Failed("restore without options".to_string()))
            .and_then(|arg| {
                serde_json::from_value(arg).map_err(|e| TransportError::Failed(e.to_string()))
            })?;

        let mut files = RestoredFiles::new();
        let entries =
            fs::read_dir(&options.export_dir).map_err(|e| TransportError::Failed(e.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|e| TransportError::Failed(e.to_string()))?;
            let data = fs::read(entry.path()).map_err(|e| TransportError::Failed(e.to_string()))?;
            files.insert(entry.file_name().to_string_lossy().into_owned(), data);
        }
        self.restored.lock().push(files);
        Ok(())
    }
}

#[async_trait]
impl SwingStoreTransport for MockTransport {
    async fn blocking_send(
        &self,
        action: &SwingStoreExportAction,
        must_not_be_inited: bool,
    ) -> Result<String, TransportError> {
        self.actions.lock().push(RecordedAction {
            action: action.clone(),
            must_not_be_inited,
        });

        if action.request == ExportRequest::Initiate {
            let gate = self.initiate_gate.lock().take();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
        }

        let queued = self
            .failures
            .lock()
            .get_mut(&action.request)
            .and_then(|queue| queue.pop_front());
        if let Some(err) = queued {
            return Err(err);
        }

        match action.request {
            ExportRequest::Retrieve => {
                if let Some(response) = self.retrieve_response.lock().clone() {
                    return Ok(response);
                }
                let export = self
                    .export
                    .lock()
                    .clone()
                    .ok_or_else(|| TransportError::Failed("no export to retrieve".to_string()))?;
                let dir = export.materialize()?;
                serde_json::to_string(&dir.to_string_lossy())
                    .map_err(|e| TransportError::Failed(e.to_string()))
            }
            ExportRequest::Restore => {
                self.capture_restore(action)?;
                Ok("true".to_string())
            }
            ExportRequest::Initiate | ExportRequest::Discard => Ok("true".to_string()),
        }
    }
}
