// 💾 Flat JSON persistence
//
// Datasets land in data/raw/ as <name>.json (pretty, UTF-8, non-ASCII kept
// verbatim) next to a <name>.manifest.json sidecar describing the run.
// Files are written to a temporary sibling and renamed into place.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::model::Origin;

const DATA_EXT: &str = "json";
const MANIFEST_SUFFIX: &str = ".manifest.json";

// ============================================================================
// LOW-LEVEL WRITE / READ
// ============================================================================

pub fn ensure_directory(dir: &Path) -> Result<()> {
    if dir.exists() && !dir.is_dir() {
        anyhow::bail!("Path exists but is not a directory: {}", dir.display());
    }
    fs::create_dir_all(dir).with_context(|| format!("Failed to create directory: {}", dir.display()))
}

/// Write bytes to `path` via a temporary sibling + rename
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_directory(parent)?;
        }
    }

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Invalid output path: {}", path.display()))?;
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));

    fs::write(&tmp, bytes).with_context(|| format!("Failed to write {}", tmp.display()))?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e).with_context(|| format!("Failed to move output into place: {}", path.display()));
    }
    Ok(())
}

fn to_pretty_json<T: Serialize + ?Sized>(records: &T) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(records).context("Failed to serialize records")?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Serialize `records` as indented JSON and replace whatever is at `path`
pub fn persist<T: Serialize + ?Sized>(records: &T, path: &Path) -> Result<()> {
    let bytes = to_pretty_json(records)?;
    write_atomic(path, &bytes)?;
    debug!(path = %path.display(), bytes = bytes.len(), "persisted");
    Ok(())
}

/// Read back a file written by `persist`
pub fn load<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("Malformed JSON in {}", path.display()))
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// DATASETS
// ============================================================================

/// Sidecar describing one collection run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetManifest {
    pub run_id: String,
    pub dataset: String,
    pub source: String,
    pub origin: Origin,
    pub fetched_at: DateTime<Utc>,
    pub record_count: usize,
    /// SHA-256 of the data file contents
    pub digest: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    Written { path: PathBuf, manifest: DatasetManifest },
    /// Same payload and origin as the previous run; nothing rewritten
    Unchanged { path: PathBuf, manifest: DatasetManifest },
    /// Run produced nothing worth keeping; whatever was at `path` stays
    Skipped { path: PathBuf, previous: Option<DatasetManifest> },
}

impl WriteOutcome {
    pub fn path(&self) -> &Path {
        match self {
            WriteOutcome::Written { path, .. }
            | WriteOutcome::Unchanged { path, .. }
            | WriteOutcome::Skipped { path, .. } => path,
        }
    }

    /// Manifest describing the file now on disk, if there is one
    pub fn manifest(&self) -> Option<&DatasetManifest> {
        match self {
            WriteOutcome::Written { manifest, .. } | WriteOutcome::Unchanged { manifest, .. } => Some(manifest),
            WriteOutcome::Skipped { previous, .. } => previous.as_ref(),
        }
    }

    pub fn is_written(&self) -> bool {
        matches!(self, WriteOutcome::Written { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, WriteOutcome::Skipped { .. })
    }
}

/// Lowercase slug usable as a file stem: "Emilia Romagna" → "emilia_romagna"
pub fn dataset_name(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|part| {
            part.trim()
                .to_lowercase()
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
                .collect::<String>()
        })
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Only [A-Za-z0-9_-], so a name can never escape the data directory
pub fn is_valid_dataset_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

pub fn dataset_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.{}", name, DATA_EXT))
}

pub fn manifest_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}{}", name, MANIFEST_SUFFIX))
}

/// Manifest of a stored dataset; None when the dataset or its sidecar is missing or unreadable
pub fn read_manifest(dir: &Path, name: &str) -> Option<DatasetManifest> {
    if !dataset_path(dir, name).exists() {
        return None;
    }
    load(&manifest_path(dir, name)).ok()
}

/// Persist a dataset and its manifest, skipping the write when nothing changed
pub fn write_dataset<T: Serialize + ?Sized>(
    dir: &Path,
    name: &str,
    records: &T,
    record_count: usize,
    source: &str,
    origin: &Origin,
) -> Result<WriteOutcome> {
    if !is_valid_dataset_name(name) {
        anyhow::bail!("Invalid dataset name: {:?}", name);
    }

    let path = dataset_path(dir, name);
    let manifest_file = manifest_path(dir, name);
    let bytes = to_pretty_json(records)?;
    let digest = sha256_hex(&bytes);

    if let Some(previous) = read_manifest(dir, name) {
        if previous.digest == digest && previous.origin == *origin {
            info!(dataset = name, "dataset unchanged, skipping write");
            return Ok(WriteOutcome::Unchanged { path, manifest: previous });
        }
    }

    let manifest = DatasetManifest {
        run_id: uuid::Uuid::new_v4().to_string(),
        dataset: name.to_string(),
        source: source.to_string(),
        origin: origin.clone(),
        fetched_at: Utc::now(),
        record_count,
        digest,
    };

    write_atomic(&path, &bytes)?;
    persist(&manifest, &manifest_file)?;

    info!(dataset = name, records = record_count, path = %path.display(), "dataset written");
    Ok(WriteOutcome::Written { path, manifest })
}

/// Names of the datasets present in `dir`, sorted; empty when `dir` is missing
pub fn list_datasets(dir: &Path) -> Result<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut names = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))? {
        let file_name = entry?.file_name();
        let Some(file_name) = file_name.to_str() else { continue };

        if file_name.starts_with('.') || file_name.ends_with(MANIFEST_SUFFIX) {
            continue;
        }
        if let Some(stem) = file_name.strip_suffix(".json") {
            if is_valid_dataset_name(stem) {
                names.push(stem.to_string());
            }
        }
    }

    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Municipality;
    use tempfile::tempdir;

    fn comuni() -> Vec<Municipality> {
        vec![
            Municipality::new("058091", "Roma", "Roma", "Lazio", 2_872_800),
            Municipality::new("040012", "Forlì", "Forlì-Cesena", "Emilia-Romagna", 117_000),
            Municipality::new("007003", "Città di Castello", "Perugia", "Umbria", 39_000),
        ]
    }

    #[test]
    fn test_persist_round_trip_preserves_accents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/raw/comuni.json");

        persist(&comuni(), &path).unwrap();
        let back: Vec<Municipality> = load(&path).unwrap();

        assert_eq!(back, comuni());
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("Forlì"), "non-ASCII must be written verbatim");
        assert!(!text.contains("\\u00ec"));
        assert!(text.contains("\n  {"), "output should be indented");
    }

    #[test]
    fn test_persist_overwrites_and_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("comuni.json");

        persist(&comuni(), &path).unwrap();
        persist(&comuni()[..1], &path).unwrap();

        let back: Vec<Municipality> = load(&path).unwrap();
        assert_eq!(back.len(), 1);

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_persist_rejects_file_as_directory() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("raw");
        fs::write(&blocker, "not a dir").unwrap();

        assert!(persist(&comuni(), &blocker.join("comuni.json")).is_err());
    }

    #[test]
    fn test_write_dataset_is_idempotent() {
        let dir = tempdir().unwrap();

        let first = write_dataset(dir.path(), "comuni_istat_lazio", &comuni(), 3, "istat", &Origin::Live).unwrap();
        assert!(first.is_written());
        assert_eq!(first.manifest().unwrap().record_count, 3);
        assert_eq!(first.manifest().unwrap().digest.len(), 64);

        let second = write_dataset(dir.path(), "comuni_istat_lazio", &comuni(), 3, "istat", &Origin::Live).unwrap();
        assert!(!second.is_written());
        assert_eq!(second.manifest().unwrap().run_id, first.manifest().unwrap().run_id);

        let degraded = Origin::Backup { reason: "timeout".into() };
        let third = write_dataset(dir.path(), "comuni_istat_lazio", &comuni(), 3, "istat", &degraded).unwrap();
        assert!(third.is_written());
        assert_ne!(third.manifest().unwrap().run_id, first.manifest().unwrap().run_id);

        let manifest: DatasetManifest = load(&manifest_path(dir.path(), "comuni_istat_lazio")).unwrap();
        assert_eq!(manifest.origin, degraded);
    }

    #[test]
    fn test_read_manifest_requires_data_file() {
        let dir = tempdir().unwrap();
        assert!(read_manifest(dir.path(), "comuni_bdap_lazio").is_none());

        write_dataset(dir.path(), "comuni_bdap_lazio", &comuni(), 3, "bdap", &Origin::Live).unwrap();
        assert_eq!(read_manifest(dir.path(), "comuni_bdap_lazio").unwrap().record_count, 3);

        fs::remove_file(dataset_path(dir.path(), "comuni_bdap_lazio")).unwrap();
        assert!(read_manifest(dir.path(), "comuni_bdap_lazio").is_none());
    }

    #[test]
    fn test_write_dataset_rejects_path_like_names() {
        let dir = tempdir().unwrap();
        assert!(write_dataset(dir.path(), "../escape", &comuni(), 3, "istat", &Origin::Live).is_err());
    }

    #[test]
    fn test_dataset_name_slug() {
        assert_eq!(dataset_name(&["comuni", "istat", "Emilia Romagna"]), "comuni_istat_emilia_romagna");
        assert_eq!(dataset_name(&["bilancio", "058091", "2022"]), "bilancio_058091_2022");
        assert!(is_valid_dataset_name(&dataset_name(&["comuni", "Valle d'Aosta"])));
    }

    #[test]
    fn test_list_datasets_skips_manifests() {
        let dir = tempdir().unwrap();
        write_dataset(dir.path(), "bilanci_sample", &comuni(), 3, "sample", &Origin::Live).unwrap();
        write_dataset(dir.path(), "comuni_bdap_lazio", &comuni(), 3, "bdap", &Origin::Live).unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let names = list_datasets(dir.path()).unwrap();
        assert_eq!(names, vec!["bilanci_sample", "comuni_bdap_lazio"]);

        assert!(list_datasets(&dir.path().join("missing")).unwrap().is_empty());
    }
}
