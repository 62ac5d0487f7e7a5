//! # Memory Export Provider
//!
//! Provider over export content held in memory, e.g. reassembled from
//! state-sync snapshot payloads before a restore.

use std::collections::VecDeque;

use crate::domain::{DataEntry, SwingStoreArtifact, SwingStoreExportError};
use crate::ports::SwingStoreExportProvider;

/// In-memory, single-pass export provider.
#[derive(Debug, Default)]
pub struct MemoryExportProvider {
    block_height: u64,
    export_data: Option<Vec<DataEntry>>,
    export_data_read: bool,
    artifacts: VecDeque<SwingStoreArtifact>,
    artifacts_exhausted: bool,
}

impl MemoryExportProvider {
    /// Provider for `block_height` with the given content.
    pub fn new(
        block_height: u64,
        export_data: Option<Vec<DataEntry>>,
        artifacts: Vec<SwingStoreArtifact>,
    ) -> Self {
        Self {
            block_height,
            export_data,
            export_data_read: false,
            artifacts: artifacts.into(),
            artifacts_exhausted: false,
        }
    }
}

impl SwingStoreExportProvider for MemoryExportProvider {
    fn block_height(&self) -> u64 {
        self.block_height
    }

    fn get_export_data(&mut self) -> Result<Option<Vec<DataEntry>>, SwingStoreExportError> {
        if self.export_data_read {
            return Err(SwingStoreExportError::Protocol(
                "export data already read".to_string(),
            ));
        }
        self.export_data_read = true;
        Ok(self.export_data.take())
    }

    fn read_artifact(&mut self) -> Result<Option<SwingStoreArtifact>, SwingStoreExportError> {
        if self.artifacts_exhausted {
            return Err(SwingStoreExportError::Protocol(
                "exceeded expected artifact count".to_string(),
            ));
        }
        let next = self.artifacts.pop_front();
        if next.is_none() {
            self.artifacts_exhausted = true;
        }
        Ok(next)
    }

    fn remaining_artifacts(&self) -> usize {
        self.artifacts.len()
    }
}
