//! # Export Manifest Codec
//!
//! On-disk interchange format shared with the engine's export and import
//! tooling, used in both directions (retrieve and restore):
//!
//! ```text
//! <export dir>/
//! ├── export-manifest.json         { "blockHeight", "data"?, "artifacts": [[name, file], ...] }
//! ├── export-data.jsonl            one ["path","value"] array per line, each line '\n'-terminated
//! ├── 0-<sanitized artifact name>  raw artifact bytes
//! ├── ...
//! └── untrusted-export-data.jsonl  optional sidecar, never listed in the manifest
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io::{BufRead, Write};
use std::path::Path;

use super::entities::DataEntry;
use super::errors::SwingStoreExportError;

/// Manifest filename, fixed by the engine's export/import tooling.
pub const EXPORT_MANIFEST_FILENAME: &str = "export-manifest.json";

/// Reserved artifact name for a synthetic artifact holding untrusted export
/// data. It must never be listed in a manifest handed to the engine's import.
pub const UNTRUSTED_EXPORT_DATA_ARTIFACT_NAME: &str = "UNTRUSTED-EXPORT-DATA";

/// Export data filename used when staging a restore.
pub const EXPORT_DATA_FILENAME: &str = "export-data.jsonl";

/// Sidecar filename for the untrusted export data artifact.
pub const UNTRUSTED_EXPORT_DATA_FILENAME: &str = "untrusted-export-data.jsonl";

/// Descriptor tying a block height to a data file and an ordered artifact list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportManifest {
    /// Block height of the export.
    #[serde(rename = "blockHeight", default, skip_serializing_if = "is_zero")]
    pub block_height: u64,

    /// Filename of the export data, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,

    /// `[artifact name, file name]` pairs in read order.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub artifacts: Vec<(String, String)>,
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<(String, String)>>::deserialize(deserializer)?.unwrap_or_default())
}

impl ExportManifest {
    /// Empty manifest for `block_height`.
    pub fn new(block_height: u64) -> Self {
        Self {
            block_height,
            ..Self::default()
        }
    }

    /// Parse and validate raw manifest bytes.
    ///
    /// `requested_height` of 0 accepts any height.
    pub fn parse(raw: &[u8], requested_height: u64) -> Result<Self, SwingStoreExportError> {
        let mut manifest: ExportManifest = serde_json::from_slice(raw)
            .map_err(|e| SwingStoreExportError::Manifest(e.to_string()))?;

        // An empty data filename means no export data.
        if manifest.data.as_deref() == Some("") {
            manifest.data = None;
        }

        manifest.validate(requested_height)?;
        Ok(manifest)
    }

    /// Read and validate the manifest of an export directory.
    pub fn read_from_dir(
        export_dir: &Path,
        requested_height: u64,
    ) -> Result<Self, SwingStoreExportError> {
        let path = export_dir.join(EXPORT_MANIFEST_FILENAME);
        let raw = fs::read(&path).map_err(|e| SwingStoreExportError::io(&path, e))?;
        Self::parse(&raw, requested_height)
    }

    /// Check the manifest invariants.
    pub fn validate(&self, requested_height: u64) -> Result<(), SwingStoreExportError> {
        if requested_height != 0 && self.block_height != requested_height {
            return Err(SwingStoreExportError::BlockHeightMismatch {
                expected: requested_height,
                found: self.block_height,
            });
        }

        let mut filenames = HashSet::with_capacity(self.artifacts.len() + 1);
        if let Some(data) = &self.data {
            check_plain_filename(data)?;
            filenames.insert(data.as_str());
        }

        for (name, filename) in &self.artifacts {
            if name == UNTRUSTED_EXPORT_DATA_ARTIFACT_NAME {
                return Err(SwingStoreExportError::Protocol(format!(
                    "unexpected export artifact name {}",
                    name
                )));
            }
            check_plain_filename(filename)?;
            if !filenames.insert(filename.as_str()) {
                return Err(SwingStoreExportError::Manifest(format!(
                    "duplicate filename {} in export manifest",
                    filename
                )));
            }
        }

        Ok(())
    }

    /// Append an artifact entry.
    pub fn push_artifact(&mut self, name: impl Into<String>, filename: impl Into<String>) {
        self.artifacts.push((name.into(), filename.into()));
    }

    /// Serialize as pretty-printed JSON (two-space indent).
    pub fn to_pretty_json(&self) -> Result<Vec<u8>, SwingStoreExportError> {
        serde_json::to_vec_pretty(self).map_err(|e| SwingStoreExportError::Manifest(e.to_string()))
    }
}

/// Filenames are resolved inside the export directory, so they must be a
/// single plain path component.
fn check_plain_filename(filename: &str) -> Result<(), SwingStoreExportError> {
    let plain = !filename.is_empty()
        && filename != "."
        && filename != ".."
        && !filename.contains('/')
        && !filename.contains('\\')
        && !filename.contains('\0');
    if plain {
        Ok(())
    } else {
        Err(SwingStoreExportError::Manifest(format!(
            "invalid filename {:?} in export manifest",
            filename
        )))
    }
}

/// Replace every character other than ASCII alphanumerics, `-`, `_` and `.`
/// with a hyphen.
pub fn sanitize_artifact_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Safe and unique filename for the `ordinal`-th listed artifact.
pub fn artifact_filename(ordinal: usize, name: &str) -> String {
    format!("{}-{}", ordinal, sanitize_artifact_name(name))
}

/// Write entries as newline-terminated `[path, value]` JSON arrays.
pub fn write_export_data<W: Write>(
    writer: &mut W,
    entries: &[DataEntry],
) -> Result<(), serde_json::Error> {
    for entry in entries {
        serde_json::to_writer(&mut *writer, &[&entry.path, &entry.value])?;
        writer.write_all(b"\n").map_err(serde_json::Error::io)?;
    }
    Ok(())
}

/// Read `[path, value]` JSON arrays in file order.
///
/// Any whitespace between arrays is accepted, so both newline-terminated and
/// newline-separated files parse.
pub fn read_export_data<R: BufRead>(reader: R) -> Result<Vec<DataEntry>, SwingStoreExportError> {
    let stream = serde_json::Deserializer::from_reader(reader).into_iter::<Vec<String>>();

    let mut entries = Vec::new();
    for item in stream {
        let mut pair = item.map_err(|e| {
            SwingStoreExportError::Protocol(format!("malformed export data entry: {}", e))
        })?;
        if pair.len() != 2 {
            return Err(SwingStoreExportError::Protocol(format!(
                "invalid export data entry (length {})",
                pair.len()
            )));
        }
        let value = pair.pop().unwrap_or_default();
        let path = pair.pop().unwrap_or_default();
        entries.push(DataEntry { path, value });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    #[test]
    fn test_sanitize_artifact_name() {
        assert_eq!(sanitize_artifact_name("weird/name:1"), "weird-name-1");
        assert_eq!(sanitize_artifact_name("bundle.b0-abc_1"), "bundle.b0-abc_1");
        assert_eq!(sanitize_artifact_name("snapshot v1:héllo"), "snapshot-v1-h-llo");
    }

    #[test]
    fn test_artifact_filename_prefix_keeps_collisions_apart() {
        let a = artifact_filename(0, "a/b");
        let b = artifact_filename(1, "a:b");
        assert_eq!(a, "0-a-b");
        assert_eq!(b, "1-a-b");
        assert_ne!(a, b);
    }

    #[test]
    fn test_parse_manifest() {
        let raw = br#"{
            "blockHeight": 42,
            "data": "export-data.jsonl",
            "artifacts": [["bundle.b0-1", "bundle.b0-1.bin"], ["transcript.v1.1", "t1.gz"]]
        }"#;
        let manifest = ExportManifest::parse(raw, 42).unwrap();
        assert_eq!(manifest.block_height, 42);
        assert_eq!(manifest.data.as_deref(), Some("export-data.jsonl"));
        assert_eq!(manifest.artifacts.len(), 2);
        assert_eq!(manifest.artifacts[1].0, "transcript.v1.1");
    }

    #[test]
    fn test_parse_latest_accepts_any_height() {
        let raw = br#"{"blockHeight": 77, "artifacts": []}"#;
        assert_eq!(ExportManifest::parse(raw, 0).unwrap().block_height, 77);
    }

    #[test]
    fn test_parse_height_mismatch() {
        let raw = br#"{"blockHeight": 10, "artifacts": []}"#;
        let result = ExportManifest::parse(raw, 11);
        assert!(matches!(
            result,
            Err(SwingStoreExportError::BlockHeightMismatch {
                expected: 11,
                found: 10
            })
        ));
    }

    #[test]
    fn test_parse_null_artifacts_and_empty_data() {
        let raw = br#"{"blockHeight": 3, "data": "", "artifacts": null}"#;
        let manifest = ExportManifest::parse(raw, 3).unwrap();
        assert!(manifest.data.is_none());
        assert!(manifest.artifacts.is_empty());
    }

    #[test]
    fn test_parse_rejects_reserved_artifact() {
        let raw = br#"{"blockHeight": 3, "artifacts": [["UNTRUSTED-EXPORT-DATA", "x"]]}"#;
        assert!(matches!(
            ExportManifest::parse(raw, 3),
            Err(SwingStoreExportError::Protocol(_))
        ));
    }

    #[test]
    fn test_parse_rejects_duplicate_filenames() {
        let raw = br#"{"blockHeight": 3, "data": "a", "artifacts": [["x", "a"]]}"#;
        assert!(matches!(
            ExportManifest::parse(raw, 3),
            Err(SwingStoreExportError::Manifest(_))
        ));
    }

    #[test]
    fn test_parse_rejects_escaping_filename() {
        let raw = br#"{"blockHeight": 3, "artifacts": [["x", "../outside"]]}"#;
        assert!(ExportManifest::parse(raw, 3).is_err());
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(
            ExportManifest::parse(b"not json", 0),
            Err(SwingStoreExportError::Manifest(_))
        ));
    }

    #[test]
    fn test_pretty_json_layout() {
        let mut manifest = ExportManifest::new(5);
        manifest.push_artifact("x", "0-x");
        let json = String::from_utf8(manifest.to_pretty_json().unwrap()).unwrap();
        assert!(json.contains("\n  \"blockHeight\": 5"));
        assert!(!json.contains("\"data\""));
        let reparsed = ExportManifest::parse(json.as_bytes(), 5).unwrap();
        assert_eq!(reparsed, manifest);
    }

    #[test]
    fn test_empty_manifest_writes_artifact_array() {
        let json = String::from_utf8(ExportManifest::new(0).to_pretty_json().unwrap()).unwrap();
        assert!(json.contains("\"artifacts\": []"));
        assert!(!json.contains("blockHeight"));
    }

    #[test]
    fn test_export_data_lines_are_terminated() {
        let entries = vec![DataEntry::new("a", "1"), DataEntry::new("b", "2")];
        let mut out = Vec::new();
        write_export_data(&mut out, &entries).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "[\"a\",\"1\"]\n[\"b\",\"2\"]\n");
    }

    #[test]
    fn test_export_data_does_not_escape_html() {
        let mut out = Vec::new();
        write_export_data(&mut out, &[DataEntry::new("k", "<a&b>")]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "[\"k\",\"<a&b>\"]\n");
    }

    #[test]
    fn test_read_export_data_in_file_order() {
        let raw = "[\"b\",\"2\"]\n[\"a\",\"1\"]\n\n";
        let entries = read_export_data(Cursor::new(raw)).unwrap();
        assert_eq!(
            entries,
            vec![DataEntry::new("b", "2"), DataEntry::new("a", "1")]
        );
    }

    #[test]
    fn test_read_export_data_empty() {
        assert!(read_export_data(Cursor::new("")).unwrap().is_empty());
    }

    #[test]
    fn test_read_export_data_bad_arity() {
        let result = read_export_data(Cursor::new("[\"a\",\"1\",\"extra\"]\n"));
        match result {
            Err(SwingStoreExportError::Protocol(msg)) => assert!(msg.contains("length 3")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_read_export_data_truncated() {
        let result = read_export_data(Cursor::new("[\"a\",\"1\"]\n[\"b\","));
        assert!(matches!(result, Err(SwingStoreExportError::Protocol(_))));
    }

    proptest! {
        #[test]
        fn prop_sanitized_names_are_filesystem_safe(name in ".*") {
            let sanitized = sanitize_artifact_name(&name);
            prop_assert_eq!(sanitized.chars().count(), name.chars().count());
            prop_assert!(sanitized
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')));
        }

        #[test]
        fn prop_prefixed_filenames_are_plain(ordinal in 0usize..10_000, name in ".*") {
            let filename = artifact_filename(ordinal, &name);
            prop_assert!(check_plain_filename(&filename).is_ok());
        }
    }
}
