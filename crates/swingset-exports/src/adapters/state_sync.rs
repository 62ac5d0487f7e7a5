//! # State-Sync Snapshot Collector
//!
//! Event handler turning a swing-store export into ordered snapshot
//! payloads, and those payloads back into a provider for restore.
//!
//! Export data received over state-sync cannot be trusted, so it travels as
//! the reserved `UNTRUSTED-EXPORT-DATA` artifact after all other artifacts.

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use super::memory_provider::MemoryExportProvider;
use crate::application::RetrieveExport;
use crate::domain::{
    write_export_data, SwingStoreArtifact, SwingStoreExportError,
    UNTRUSTED_EXPORT_DATA_ARTIFACT_NAME,
};
use crate::ports::{SwingStoreExportEventHandler, SwingStoreExportProvider};

/// Payloads of one snapshot, in restore order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedSnapshot {
    /// Height reported by the export.
    pub block_height: u64,
    /// Artifacts followed by the untrusted export data, if any.
    pub artifacts: Vec<SwingStoreArtifact>,
}

impl CollectedSnapshot {
    /// Provider replaying the payloads for `restore_export`.
    pub fn into_provider(self) -> MemoryExportProvider {
        MemoryExportProvider::new(self.block_height, None, self.artifacts)
    }
}

/// Collects the export of a state-sync snapshot.
#[derive(Debug, Default)]
pub struct StateSyncSnapshotCollector {
    snapshot: Mutex<Option<CollectedSnapshot>>,
}

impl StateSyncSnapshotCollector {
    /// New collector with nothing collected.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the collected snapshot, if the export was retrieved.
    pub fn take_snapshot(&self) -> Option<CollectedSnapshot> {
        self.snapshot.lock().take()
    }
}

#[async_trait]
impl SwingStoreExportEventHandler for StateSyncSnapshotCollector {
    async fn export_initiated(
        &self,
        block_height: u64,
        retrieve: RetrieveExport,
    ) -> Result<(), SwingStoreExportError> {
        debug!(height = block_height, "collecting swing-store export for snapshot");
        retrieve.retrieve().await
    }

    fn export_retrieved(
        &self,
        provider: &mut dyn SwingStoreExportProvider,
    ) -> Result<(), SwingStoreExportError> {
        let block_height = provider.block_height();
        let mut artifacts = Vec::with_capacity(provider.remaining_artifacts() + 1);
        while let Some(artifact) = provider.read_artifact()? {
            artifacts.push(artifact);
        }

        if let Some(entries) = provider.get_export_data()? {
            let mut data = Vec::new();
            write_export_data(&mut data, &entries).map_err(SwingStoreExportError::consumer)?;
            artifacts.push(SwingStoreArtifact::new(
                UNTRUSTED_EXPORT_DATA_ARTIFACT_NAME,
                data,
            ));
        }

        debug!(
            height = block_height,
            artifacts = artifacts.len(),
            "collected swing-store snapshot payloads"
        );
        *self.snapshot.lock() = Some(CollectedSnapshot {
            block_height,
            artifacts,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DataEntry;

    #[test]
    fn test_collects_artifacts_then_untrusted_data() {
        let collector = StateSyncSnapshotCollector::new();
        let mut provider = MemoryExportProvider::new(
            30,
            Some(vec![DataEntry::new("a", "1")]),
            vec![
                SwingStoreArtifact::new("transcript.1", b"t".to_vec()),
                SwingStoreArtifact::new("snapshot.1", b"s".to_vec()),
            ],
        );

        collector.export_retrieved(&mut provider).unwrap();
        let snapshot = collector.take_snapshot().unwrap();
        assert_eq!(snapshot.block_height, 30);

        let names: Vec<_> = snapshot.artifacts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["transcript.1", "snapshot.1", UNTRUSTED_EXPORT_DATA_ARTIFACT_NAME]
        );
        assert_eq!(snapshot.artifacts[2].data, b"[\"a\",\"1\"]\n".to_vec());
        assert!(collector.take_snapshot().is_none());
    }

    #[test]
    fn test_no_sidecar_without_export_data() {
        let collector = StateSyncSnapshotCollector::new();
        let mut provider =
            MemoryExportProvider::new(2, None, vec![SwingStoreArtifact::new("x", b"1".to_vec())]);

        collector.export_retrieved(&mut provider).unwrap();
        let snapshot = collector.take_snapshot().unwrap();
        assert_eq!(snapshot.artifacts.len(), 1);
    }

    #[test]
    fn test_into_provider_replays_payloads() {
        let snapshot = CollectedSnapshot {
            block_height: 8,
            artifacts: vec![SwingStoreArtifact::new("x", b"1".to_vec())],
        };
        let mut provider = snapshot.into_provider();
        assert_eq!(provider.block_height(), 8);
        assert!(provider.get_export_data().unwrap().is_none());
        assert_eq!(provider.read_artifact().unwrap().unwrap().name, "x");
        assert!(provider.read_artifact().unwrap().is_none());
    }
}
