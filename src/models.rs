use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// Sentinel folder substituted whenever the user gives no folder (or only
/// whitespace). Stored items never carry an empty folder string.
pub const NO_FOLDER: &str = "No folder";

pub const FALLBACK_MIME: &str = "application/octet-stream";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Other,
}

impl MediaKind {
    /// Pure derivation from the mime string, evaluated exactly once at ingest.
    /// Never recomputed afterwards, even if the stored value looks wrong.
    pub fn from_mime(mime: &str) -> Self {
        if mime.starts_with("image/") {
            MediaKind::Image
        } else if mime.starts_with("video/") {
            MediaKind::Video
        } else {
            MediaKind::Other
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Other => "other",
        }
    }

    /// Lenient parse for DB columns and backup documents.
    pub fn parse(s: &str) -> Self {
        match s {
            "image" => MediaKind::Image,
            "video" => MediaKind::Video,
            _ => MediaKind::Other,
        }
    }
}

/// One stored media asset: metadata, original payload, optional thumbnail.
#[derive(Debug, Clone)]
pub struct MediaItem {
    pub id: String,
    pub name: String,
    /// Lowercased search key, rewritten whenever `name` changes.
    pub name_lower: String,
    pub folder: String,
    pub tags: Vec<String>,
    pub mime: String,
    pub kind: MediaKind,
    pub size: i64,
    /// RFC 3339, assigned at ingest, immutable.
    pub created_at: String,
    pub favorite: bool,
    /// Seconds, probed once at ingest for videos. Absent when the probe
    /// failed or reported a non-finite value.
    pub duration: Option<f64>,
    pub payload: Vec<u8>,
    pub thumbnail: Option<Vec<u8>>,
}

impl MediaItem {
    /// Creates a fresh item the way the ingest path does: new id, kind derived
    /// from the mime, folder normalized, timestamp assigned now. Thumbnail
    /// and duration start absent and are filled in by the derivation step.
    pub fn new(name: String, folder: &str, tags: Vec<String>, mime: String, payload: Vec<u8>) -> Self {
        let name_lower = name.to_lowercase();
        let kind = MediaKind::from_mime(&mime);
        let size = payload.len() as i64;
        MediaItem {
            id: Uuid::new_v4().to_string(),
            name,
            name_lower,
            folder: normalize_folder(folder),
            tags,
            mime,
            kind,
            size,
            created_at: Utc::now().to_rfc3339(),
            favorite: false,
            duration: None,
            payload,
            thumbnail: None,
        }
    }

    /// Renames the item, keeping the derived search key in sync.
    pub fn set_name(&mut self, name: String) {
        self.name_lower = name.to_lowercase();
        self.name = name;
    }
}

/// Empty or whitespace-only folder labels normalize to the sentinel.
pub fn normalize_folder(folder: &str) -> String {
    let trimmed = folder.trim();
    if trimmed.is_empty() {
        NO_FOLDER.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Mime guess from the file extension, captured once at ingest.
pub fn mime_for_path(path: &Path) -> String {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "mp4" => "video/mp4",
        "m4v" => "video/x-m4v",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        _ => FALLBACK_MIME,
    }
    .to_string()
}

/// File extension for a materialized payload, so the webview can sniff it.
pub fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => ".jpg",
        "image/png" => ".png",
        "image/gif" => ".gif",
        "image/webp" => ".webp",
        "image/bmp" => ".bmp",
        "image/svg+xml" => ".svg",
        "video/mp4" => ".mp4",
        "video/x-m4v" => ".m4v",
        "video/quicktime" => ".mov",
        "video/webm" => ".webm",
        "video/x-matroska" => ".mkv",
        "video/x-msvideo" => ".avi",
        _ => ".bin",
    }
}

/// Visible-set criteria. `None` filters mean "all".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryCriteria {
    #[serde(default)]
    pub text_query: String,
    #[serde(default)]
    pub folder_filter: Option<String>,
    #[serde(default)]
    pub kind_filter: Option<MediaKind>,
    #[serde(default)]
    pub sort_mode: SortMode,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    /// Descending created_at.
    #[default]
    Newest,
    /// Case-insensitive, numeric-aware compare on name.
    Name,
    /// Descending byte size.
    Size,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_derivation_follows_mime_prefix() {
        assert_eq!(MediaKind::from_mime("image/png"), MediaKind::Image);
        assert_eq!(MediaKind::from_mime("video/mp4"), MediaKind::Video);
        assert_eq!(MediaKind::from_mime("application/pdf"), MediaKind::Other);
        assert_eq!(MediaKind::from_mime(""), MediaKind::Other);
    }

    #[test]
    fn empty_folder_normalizes_to_sentinel() {
        assert_eq!(normalize_folder(""), NO_FOLDER);
        assert_eq!(normalize_folder("   "), NO_FOLDER);
        assert_eq!(normalize_folder(" Pets "), "Pets");
    }

    #[test]
    fn new_item_never_stores_empty_folder() {
        let item = MediaItem::new("cat.png".into(), "  ", vec![], "image/png".into(), vec![1, 2]);
        assert_eq!(item.folder, NO_FOLDER);
        assert_eq!(item.kind, MediaKind::Image);
        assert_eq!(item.size, 2);
        assert!(item.thumbnail.is_none());
    }

    #[test]
    fn rename_keeps_search_key_in_sync() {
        let mut item = MediaItem::new("A.png".into(), "x", vec![], "image/png".into(), vec![0]);
        item.set_name("Holiday IMG".into());
        assert_eq!(item.name_lower, "holiday img");
    }

    #[test]
    fn mime_guess_from_extension() {
        assert_eq!(mime_for_path(Path::new("/a/cat.PNG")), "image/png");
        assert_eq!(mime_for_path(Path::new("clip.mp4")), "video/mp4");
        assert_eq!(mime_for_path(Path::new("notes.txt")), FALLBACK_MIME);
        assert_eq!(mime_for_path(Path::new("noext")), FALLBACK_MIME);
    }
}
