use crate::db::Database;
use crate::error::BackupError;
use crate::models::{normalize_folder, MediaItem, MediaKind, FALLBACK_MIME};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

pub const BACKUP_VERSION: u32 = 1;
const DEFAULT_NAME: &str = "untitled";

/// The portable envelope. `items` is the one required field; a document
/// without it is not a backup and the whole import aborts before any write.
#[derive(Debug, Serialize, Deserialize)]
pub struct BackupDocument {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(rename = "exportedAt", default)]
    pub exported_at: String,
    pub items: Vec<PackedItem>,
}

fn default_version() -> u32 {
    BACKUP_VERSION
}

/// One item with its binary content transcoded to base64. Every metadata
/// field defaults so documents from older envelope versions still import.
#[derive(Debug, Serialize, Deserialize)]
pub struct PackedItem {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub folder: String,
    #[serde(default)]
    pub mime: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub size: Option<i64>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
    #[serde(rename = "fav", default)]
    pub favorite: bool,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(rename = "thumb", default, skip_serializing_if = "Option::is_none")]
    pub thumb: Option<String>,
}

/// How an import went: structurally valid documents never abort on a bad
/// item, they skip it and keep counting.
#[derive(Debug, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
    pub total: usize,
}

pub fn export_document(items: &[MediaItem]) -> BackupDocument {
    BackupDocument {
        version: BACKUP_VERSION,
        exported_at: Utc::now().to_rfc3339(),
        items: items.iter().map(pack_item).collect(),
    }
}

/// Serializes the full store to `dest`. Returns the number of exported items.
pub fn export_to_path(db: &Database, dest: &Path) -> Result<usize, BackupError> {
    let items = db.get_all()?;
    let doc = export_document(&items);
    let json = serde_json::to_vec_pretty(&doc).map_err(BackupError::Format)?;
    std::fs::write(dest, json).map_err(BackupError::Io)?;
    Ok(items.len())
}

fn pack_item(item: &MediaItem) -> PackedItem {
    PackedItem {
        id: item.id.clone(),
        name: item.name.clone(),
        folder: item.folder.clone(),
        mime: item.mime.clone(),
        kind: Some(item.kind.as_str().to_string()),
        size: Some(item.size),
        created_at: Some(item.created_at.clone()),
        favorite: item.favorite,
        duration: item.duration,
        tags: item.tags.clone(),
        data: Some(BASE64.encode(&item.payload)),
        thumb: item.thumbnail.as_ref().map(|t| BASE64.encode(t)),
    }
}

/// Validates the document structure. Bad JSON or a missing `items` list is a
/// format error; nothing has been written at this point.
pub fn parse_document(text: &str) -> Result<BackupDocument, BackupError> {
    serde_json::from_str(text).map_err(BackupError::Format)
}

/// Unpacks and persists every item, substituting fresh-ingest defaults for
/// absent fields. Per-item decode or write failures are skipped and counted.
pub fn import_document(db: &Database, doc: BackupDocument) -> ImportReport {
    let total = doc.items.len();
    let mut imported = 0;
    let mut skipped = 0;

    for packed in doc.items {
        let stored = unpack_item(packed).and_then(|item| {
            db.put(&item)?;
            Ok(())
        });
        match stored {
            Ok(()) => imported += 1,
            Err(_) => skipped += 1,
        }
    }

    ImportReport {
        imported,
        skipped,
        total,
    }
}

/// Reads, validates and imports a backup file.
pub fn import_from_path(db: &Database, src: &Path) -> Result<ImportReport, BackupError> {
    let text = std::fs::read_to_string(src).map_err(BackupError::Io)?;
    let doc = parse_document(&text)?;
    Ok(import_document(db, doc))
}

fn unpack_item(packed: PackedItem) -> Result<MediaItem, BackupError> {
    let data = packed.data.ok_or(BackupError::MissingPayload)?;
    let payload = BASE64.decode(data.trim()).map_err(BackupError::ItemDecode)?;
    let thumbnail = match packed.thumb {
        Some(t) if !t.is_empty() => Some(BASE64.decode(t.trim()).map_err(BackupError::ItemDecode)?),
        _ => None,
    };

    let id = if packed.id.is_empty() {
        Uuid::new_v4().to_string()
    } else {
        packed.id
    };
    let name = if packed.name.is_empty() {
        DEFAULT_NAME.to_string()
    } else {
        packed.name
    };
    let mime = if packed.mime.is_empty() {
        FALLBACK_MIME.to_string()
    } else {
        packed.mime
    };
    let kind = match packed.kind.as_deref() {
        Some(k) if !k.is_empty() => MediaKind::parse(k),
        _ => MediaKind::from_mime(&mime),
    };
    let size = packed.size.unwrap_or(payload.len() as i64);
    let created_at = packed
        .created_at
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| Utc::now().to_rfc3339());

    Ok(MediaItem {
        id,
        name_lower: name.to_lowercase(),
        name,
        folder: normalize_folder(&packed.folder),
        tags: packed.tags,
        mime,
        kind,
        size,
        created_at,
        favorite: packed.favorite,
        duration: packed.duration,
        payload,
        thumbnail,
    })
}
