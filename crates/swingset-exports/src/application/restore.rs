//! # Restore Path
//!
//! Stages an export provider's content as an export directory and asks the
//! engine to import it.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

use crate::config::ExportsHandlerConfig;
use crate::domain::{
    artifact_filename, write_export_data, ExportManifest, RestoreOptions, SwingStoreExportError,
    EXPORT_DATA_FILENAME, EXPORT_MANIFEST_FILENAME, UNTRUSTED_EXPORT_DATA_ARTIFACT_NAME,
    UNTRUSTED_EXPORT_DATA_FILENAME,
};
use crate::ipc::SwingStoreExportAction;
use crate::ports::{SwingStoreExportProvider, SwingStoreTransport};

/// Drain `provider` into `dir` and write the manifest describing it.
///
/// Artifacts are renamed `{ordinal}-{sanitized name}`; the untrusted export
/// data sidecar is written aside and left out of the manifest.
pub fn stage_export(
    provider: &mut dyn SwingStoreExportProvider,
    dir: &Path,
) -> Result<ExportManifest, SwingStoreExportError> {
    let mut manifest = ExportManifest::new(provider.block_height());

    if let Some(entries) = provider.get_export_data()? {
        let path = dir.join(EXPORT_DATA_FILENAME);
        let mut writer = BufWriter::new(create_export_file(&path)?);
        write_export_data(&mut writer, &entries)
            .map_err(|e| SwingStoreExportError::io(&path, e.into()))?;
        let file = writer
            .into_inner()
            .map_err(|e| SwingStoreExportError::io(&path, e.into_error()))?;
        file.sync_all()
            .map_err(|e| SwingStoreExportError::io(&path, e))?;
        manifest.data = Some(EXPORT_DATA_FILENAME.to_string());
    }

    while let Some(artifact) = provider.read_artifact()? {
        if artifact.name == UNTRUSTED_EXPORT_DATA_ARTIFACT_NAME {
            write_export_file(&dir.join(UNTRUSTED_EXPORT_DATA_FILENAME), &artifact.data)?;
            continue;
        }
        let filename = artifact_filename(manifest.artifacts.len(), &artifact.name);
        write_export_file(&dir.join(&filename), &artifact.data)?;
        manifest.push_artifact(artifact.name, filename);
    }

    write_export_file(
        &dir.join(EXPORT_MANIFEST_FILENAME),
        &manifest.to_pretty_json()?,
    )?;
    Ok(manifest)
}

/// Stage `provider` in a private directory and send `restore`, which the
/// engine only accepts before its controller is initialized.
pub(crate) async fn restore_export(
    transport: &dyn SwingStoreTransport,
    config: &ExportsHandlerConfig,
    provider: &mut dyn SwingStoreExportProvider,
    options: RestoreOptions,
) -> Result<(), SwingStoreExportError> {
    let block_height = provider.block_height();
    let staging_root = config.staging_root();
    let staging = tempfile::Builder::new()
        .prefix(&format!("{}-{}-", config.restore_dir_prefix, block_height))
        .tempdir_in(&staging_root)
        .map_err(|e| SwingStoreExportError::io(&staging_root, e))?;
    let export_dir = staging.path().to_path_buf();

    let manifest = stage_export(provider, &export_dir)?;

    let action =
        SwingStoreExportAction::restore(block_height, &export_dir, options.include_historical)?;
    transport.blocking_send(&action, true).await?;

    info!(
        export_dir = %export_dir.display(),
        height = block_height,
        artifacts = manifest.artifacts.len(),
        "restored swing-store export"
    );

    if let Err(err) = staging.close() {
        warn!(export_dir = %export_dir.display(), err = %err, "failed to remove restore staging directory");
    }
    Ok(())
}

fn create_export_file(path: &Path) -> Result<File, SwingStoreExportError> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o644);
    }
    options
        .open(path)
        .map_err(|e| SwingStoreExportError::io(path, e))
}

fn write_export_file(path: &Path, data: &[u8]) -> Result<(), SwingStoreExportError> {
    let mut file = create_export_file(path)?;
    file.write_all(data)
        .map_err(|e| SwingStoreExportError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{DirectoryExportProvider, MemoryExportProvider};
    use crate::domain::{DataEntry, SwingStoreArtifact, TransportError};
    use crate::ipc::ExportRequest;
    use crate::ports::MockTransport;
    use std::fs;

    fn sample_provider() -> MemoryExportProvider {
        MemoryExportProvider::new(
            42,
            Some(vec![DataEntry::new("a", "1"), DataEntry::new("b", "2")]),
            vec![
                SwingStoreArtifact::new("x", b"X".to_vec()),
                SwingStoreArtifact::new("y", b"Y".to_vec()),
            ],
        )
    }

    #[test]
    fn test_stage_export_layout() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = stage_export(&mut sample_provider(), dir.path()).unwrap();

        assert_eq!(manifest.block_height, 42);
        assert_eq!(manifest.data.as_deref(), Some(EXPORT_DATA_FILENAME));
        assert_eq!(
            manifest.artifacts,
            vec![
                ("x".to_string(), "0-x".to_string()),
                ("y".to_string(), "1-y".to_string()),
            ]
        );
        assert_eq!(
            fs::read_to_string(dir.path().join(EXPORT_DATA_FILENAME)).unwrap(),
            "[\"a\",\"1\"]\n[\"b\",\"2\"]\n"
        );
        assert_eq!(fs::read(dir.path().join("1-y")).unwrap(), b"Y");
    }

    #[test]
    fn test_staged_export_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        stage_export(&mut sample_provider(), dir.path()).unwrap();

        let mut provider = DirectoryExportProvider::open(dir.path(), 42).unwrap();
        assert_eq!(provider.get_export_data().unwrap().unwrap().len(), 2);
        assert_eq!(provider.read_artifact().unwrap().unwrap().data, b"X");
    }

    #[test]
    fn test_stage_without_export_data() {
        let dir = tempfile::tempdir().unwrap();
        let mut provider = MemoryExportProvider::new(3, None, Vec::new());
        let manifest = stage_export(&mut provider, dir.path()).unwrap();

        assert!(manifest.data.is_none());
        assert!(!dir.path().join(EXPORT_DATA_FILENAME).exists());
        let raw = fs::read_to_string(dir.path().join(EXPORT_MANIFEST_FILENAME)).unwrap();
        assert!(!raw.contains("\"data\""));
    }

    #[test]
    fn test_untrusted_sidecar_not_listed() {
        let dir = tempfile::tempdir().unwrap();
        let mut provider = MemoryExportProvider::new(
            3,
            None,
            vec![
                SwingStoreArtifact::new("a/b c", b"1".to_vec()),
                SwingStoreArtifact::new(UNTRUSTED_EXPORT_DATA_ARTIFACT_NAME, b"raw".to_vec()),
                SwingStoreArtifact::new("d", b"2".to_vec()),
            ],
        );
        let manifest = stage_export(&mut provider, dir.path()).unwrap();

        assert_eq!(
            manifest.artifacts,
            vec![
                ("a/b c".to_string(), "0-a-b-c".to_string()),
                ("d".to_string(), "1-d".to_string()),
            ]
        );
        assert_eq!(
            fs::read(dir.path().join(UNTRUSTED_EXPORT_DATA_FILENAME)).unwrap(),
            b"raw"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_export_files_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact");
        write_export_file(&path, b"data").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        // The process umask can only clear bits.
        assert_eq!(mode & !0o644, 0);
    }

    #[tokio::test]
    async fn test_restore_sends_exclusive_request_and_cleans_up() {
        let staging_root = tempfile::tempdir().unwrap();
        let config = ExportsHandlerConfig {
            staging_root: Some(staging_root.path().to_path_buf()),
            ..ExportsHandlerConfig::default()
        };
        let transport = MockTransport::new();

        restore_export(&transport, &config, &mut sample_provider(), RestoreOptions::default())
            .await
            .unwrap();

        let actions = transport.actions();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action.request, ExportRequest::Restore);
        assert_eq!(actions[0].action.block_height, 42);
        assert!(actions[0].must_not_be_inited);

        let restored = transport.restored();
        assert_eq!(
            restored[0].keys().cloned().collect::<Vec<_>>(),
            vec!["0-x", "1-y", EXPORT_DATA_FILENAME, EXPORT_MANIFEST_FILENAME]
        );
        assert_eq!(fs::read_dir(staging_root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_restore_failure_cleans_up() {
        let staging_root = tempfile::tempdir().unwrap();
        let config = ExportsHandlerConfig {
            staging_root: Some(staging_root.path().to_path_buf()),
            ..ExportsHandlerConfig::default()
        };
        let transport = MockTransport::new();
        transport.fail_next(ExportRequest::Restore, TransportError::AlreadyInitialized);

        let result =
            restore_export(&transport, &config, &mut sample_provider(), RestoreOptions::default())
                .await;
        assert!(matches!(
            result,
            Err(SwingStoreExportError::Transport(TransportError::AlreadyInitialized))
        ));
        assert_eq!(fs::read_dir(staging_root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_staging_dir_prefix() {
        let staging_root = tempfile::tempdir().unwrap();
        let config = ExportsHandlerConfig {
            staging_root: Some(staging_root.path().to_path_buf()),
            ..ExportsHandlerConfig::default()
        };
        let transport = MockTransport::new();
        restore_export(&transport, &config, &mut sample_provider(), RestoreOptions::default())
            .await
            .unwrap();

        let options = &transport.actions()[0].action.args[0];
        let export_dir = options["exportDir"].as_str().unwrap();
        let name = Path::new(export_dir).file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("agd-swing-store-restore-42-"));
    }
}
