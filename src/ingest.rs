use crate::db::Database;
use crate::models::{mime_for_path, normalize_folder, MediaItem};
use crate::thumbnail;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Outcome of a batch ingest: "added N of M". One bad file never aborts the
/// batch; its reason lands in `failures` for the caller to report.
#[derive(Debug, Serialize)]
pub struct IngestReport {
    pub added: usize,
    pub failed: usize,
    pub total: usize,
    pub failures: Vec<String>,
}

/// Folds over the input paths, storing each file as one item. Thumbnail and
/// duration derivation run here, once per file; their failure degrades the
/// item, a read or write failure skips it.
pub fn ingest_files(db: &Database, paths: &[PathBuf], folder: &str, tags: &[String]) -> IngestReport {
    let folder = normalize_folder(folder);
    let total = paths.len();
    let mut added = 0;
    let mut failures = Vec::new();

    for path in paths {
        match ingest_one(db, path, &folder, tags) {
            Ok(_) => added += 1,
            Err(e) => failures.push(format!("{}: {:#}", path.display(), e)),
        }
    }

    IngestReport {
        added,
        failed: failures.len(),
        total,
        failures,
    }
}

/// Metadata and payload are written together in a single put; a failed file
/// leaves no partial record behind.
fn ingest_one(db: &Database, path: &Path, folder: &str, tags: &[String]) -> Result<MediaItem> {
    let payload = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "untitled".to_string());
    let mime = mime_for_path(path);

    let mut item = MediaItem::new(name, folder, tags.to_vec(), mime, payload);

    let derived = thumbnail::derive(item.kind, path, &item.payload);
    item.thumbnail = derived.thumbnail;
    item.duration = derived.duration;

    db.put(&item).context("store item")?;
    Ok(item)
}
