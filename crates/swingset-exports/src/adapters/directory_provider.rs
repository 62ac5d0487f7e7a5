//! # Directory Export Provider
//!
//! Provider over an export directory handed over by the engine on
//! `retrieve`, plus the guard that removes that directory.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::domain::{
    read_export_data, DataEntry, ExportManifest, SwingStoreArtifact, SwingStoreExportError,
};
use crate::ports::SwingStoreExportProvider;

/// Reads an export directory described by its manifest.
#[derive(Debug)]
pub struct DirectoryExportProvider {
    export_dir: PathBuf,
    manifest: ExportManifest,
    next_artifact: usize,
    artifacts_exhausted: bool,
    export_data_read: bool,
}

impl DirectoryExportProvider {
    /// Parse the manifest of `export_dir`, checking it against
    /// `requested_height` (0 accepts any height).
    pub fn open(export_dir: &Path, requested_height: u64) -> Result<Self, SwingStoreExportError> {
        let manifest = ExportManifest::read_from_dir(export_dir, requested_height)?;
        Ok(Self {
            export_dir: export_dir.to_path_buf(),
            manifest,
            next_artifact: 0,
            artifacts_exhausted: false,
            export_data_read: false,
        })
    }

    /// The parsed manifest.
    pub fn manifest(&self) -> &ExportManifest {
        &self.manifest
    }
}

impl SwingStoreExportProvider for DirectoryExportProvider {
    fn block_height(&self) -> u64 {
        self.manifest.block_height
    }

    fn get_export_data(&mut self) -> Result<Option<Vec<DataEntry>>, SwingStoreExportError> {
        if self.export_data_read {
            return Err(SwingStoreExportError::Protocol(
                "export data already read".to_string(),
            ));
        }
        self.export_data_read = true;

        let Some(data) = &self.manifest.data else {
            return Ok(None);
        };
        let path = self.export_dir.join(data);
        let file = File::open(&path).map_err(|e| SwingStoreExportError::io(&path, e))?;
        read_export_data(BufReader::new(file)).map(Some)
    }

    fn read_artifact(&mut self) -> Result<Option<SwingStoreArtifact>, SwingStoreExportError> {
        let total = self.manifest.artifacts.len();
        if self.artifacts_exhausted {
            return Err(SwingStoreExportError::Protocol(format!(
                "exceeded expected artifact count: {} > {}",
                total + 1,
                total
            )));
        }
        let Some((name, filename)) = self.manifest.artifacts.get(self.next_artifact) else {
            self.artifacts_exhausted = true;
            return Ok(None);
        };
        self.next_artifact += 1;

        let path = self.export_dir.join(filename);
        let data = fs::read(&path).map_err(|e| SwingStoreExportError::io(&path, e))?;
        Ok(Some(SwingStoreArtifact {
            name: name.clone(),
            data,
        }))
    }

    fn remaining_artifacts(&self) -> usize {
        self.manifest.artifacts.len() - self.next_artifact
    }
}

/// Removes a retrieved export directory when dropped.
#[derive(Debug)]
pub struct ExportDirGuard {
    path: PathBuf,
}

impl ExportDirGuard {
    /// Take ownership of `path`.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// The guarded directory.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ExportDirGuard {
    fn drop(&mut self) {
        match fs::remove_dir_all(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                export_dir = %self.path.display(),
                err = %e,
                "failed to remove swing-store export directory"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EXPORT_DATA_FILENAME, EXPORT_MANIFEST_FILENAME};

    fn write_export(dir: &Path, manifest: &str, files: &[(&str, &[u8])]) {
        fs::write(dir.join(EXPORT_MANIFEST_FILENAME), manifest).unwrap();
        for (name, data) in files {
            fs::write(dir.join(name), data).unwrap();
        }
    }

    #[test]
    fn test_no_export_data() {
        let dir = tempfile::tempdir().unwrap();
        write_export(dir.path(), r#"{"blockHeight": 4, "artifacts": []}"#, &[]);

        let mut provider = DirectoryExportProvider::open(dir.path(), 4).unwrap();
        assert_eq!(provider.block_height(), 4);
        assert!(provider.get_export_data().unwrap().is_none());
    }

    #[test]
    fn test_export_data_in_file_order() {
        let dir = tempfile::tempdir().unwrap();
        write_export(
            dir.path(),
            r#"{"blockHeight": 4, "data": "export-data.jsonl", "artifacts": []}"#,
            &[(EXPORT_DATA_FILENAME, b"[\"z\",\"26\"]\n[\"a\",\"1\"]\n[\"m\",\"13\"]\n")],
        );

        let mut provider = DirectoryExportProvider::open(dir.path(), 0).unwrap();
        let entries = provider.get_export_data().unwrap().unwrap();
        let paths: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_export_data_read_once() {
        let dir = tempfile::tempdir().unwrap();
        write_export(dir.path(), r#"{"blockHeight": 4, "artifacts": []}"#, &[]);

        let mut provider = DirectoryExportProvider::open(dir.path(), 4).unwrap();
        provider.get_export_data().unwrap();
        assert!(matches!(
            provider.get_export_data(),
            Err(SwingStoreExportError::Protocol(_))
        ));
    }

    #[test]
    fn test_artifacts_in_manifest_order_then_end() {
        let dir = tempfile::tempdir().unwrap();
        write_export(
            dir.path(),
            r#"{"blockHeight": 9, "artifacts": [["second", "f2"], ["first", "f1"]]}"#,
            &[("f1", b"one"), ("f2", b"two")],
        );

        let mut provider = DirectoryExportProvider::open(dir.path(), 9).unwrap();
        assert_eq!(provider.remaining_artifacts(), 2);

        let a = provider.read_artifact().unwrap().unwrap();
        assert_eq!((a.name.as_str(), a.data.as_slice()), ("second", &b"two"[..]));
        let b = provider.read_artifact().unwrap().unwrap();
        assert_eq!((b.name.as_str(), b.data.as_slice()), ("first", &b"one"[..]));
        assert_eq!(provider.remaining_artifacts(), 0);

        assert!(provider.read_artifact().unwrap().is_none());
        assert!(matches!(
            provider.read_artifact(),
            Err(SwingStoreExportError::Protocol(_))
        ));
    }

    #[test]
    fn test_missing_artifact_file() {
        let dir = tempfile::tempdir().unwrap();
        write_export(
            dir.path(),
            r#"{"blockHeight": 9, "artifacts": [["gone", "missing.bin"]]}"#,
            &[],
        );

        let mut provider = DirectoryExportProvider::open(dir.path(), 9).unwrap();
        assert!(matches!(
            provider.read_artifact(),
            Err(SwingStoreExportError::Io { .. })
        ));
    }

    #[test]
    fn test_open_height_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        write_export(dir.path(), r#"{"blockHeight": 9, "artifacts": []}"#, &[]);
        assert!(matches!(
            DirectoryExportProvider::open(dir.path(), 10),
            Err(SwingStoreExportError::BlockHeightMismatch { .. })
        ));
    }

    #[test]
    fn test_open_missing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            DirectoryExportProvider::open(dir.path(), 0),
            Err(SwingStoreExportError::Io { .. })
        ));
    }

    #[test]
    fn test_guard_removes_directory() {
        let parent = tempfile::tempdir().unwrap();
        let export_dir = parent.path().join("export-1");
        fs::create_dir(&export_dir).unwrap();
        fs::write(export_dir.join("file"), b"x").unwrap();

        drop(ExportDirGuard::new(export_dir.clone()));
        assert!(!export_dir.exists());

        // Already gone is not an error.
        drop(ExportDirGuard::new(export_dir));
    }
}
