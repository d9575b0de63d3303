use crate::backup::{self, ImportReport};
use crate::db::{Database, FolderCount, StoreStats};
use crate::ingest::{self, IngestReport};
use crate::models::{normalize_folder, MediaItem, QueryCriteria};
use crate::payload_cache::PayloadCache;
use crate::query;
use std::path::PathBuf;
use std::sync::Mutex;
use tauri::{Manager, State};

pub struct AppState {
    pub db: Mutex<Database>,
    pub payloads: Mutex<PayloadCache>,
}

/// What the gallery grid needs per item. Payload bytes never cross the IPC
/// boundary here; the frontend asks for a handle or the thumbnail instead.
#[derive(Debug, serde::Serialize)]
pub struct ItemSummary {
    pub id: String,
    pub name: String,
    pub folder: String,
    pub tags: Vec<String>,
    pub mime: String,
    pub kind: String,
    pub size: i64,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(rename = "fav")]
    pub favorite: bool,
    pub duration: Option<f64>,
    #[serde(rename = "hasThumb")]
    pub has_thumbnail: bool,
}

impl ItemSummary {
    fn from_item(item: &MediaItem) -> Self {
        Self {
            id: item.id.clone(),
            name: item.name.clone(),
            folder: item.folder.clone(),
            tags: item.tags.clone(),
            mime: item.mime.clone(),
            kind: item.kind.as_str().to_string(),
            size: item.size,
            created_at: item.created_at.clone(),
            favorite: item.favorite,
            duration: item.duration,
            has_thumbnail: item.thumbnail.is_some(),
        }
    }
}

/// A handle the webview can load through the asset protocol.
#[derive(Debug, serde::Serialize)]
pub struct HandleInfo {
    pub id: String,
    pub path: String,
    pub mime: String,
}

fn log(app: &tauri::AppHandle, level: &str, message: &str) {
    app.state::<crate::logging::LogState>()
        .add_log(level, message, app);
}

/// Storage errors cross the IPC boundary as strings; a full disk gets a
/// message the frontend can show as-is.
fn storage_err(e: crate::error::StorageError) -> String {
    if e.is_quota_exceeded() {
        "Storage is full; free up disk space and try again".to_string()
    } else {
        e.to_string()
    }
}

#[tauri::command]
pub async fn add_files(
    app: tauri::AppHandle,
    paths: Vec<String>,
    folder: String,
    tags: Vec<String>,
    state: State<'_, AppState>,
) -> Result<IngestReport, String> {
    let db = state.db.lock().map_err(|_| "Failed to lock DB")?;
    let paths: Vec<PathBuf> = paths.into_iter().map(PathBuf::from).collect();

    let report = ingest::ingest_files(&db, &paths, &folder, &tags);
    log(
        &app,
        "INFO",
        &format!("Added {} of {} files", report.added, report.total),
    );
    for failure in &report.failures {
        log(&app, "ERROR", &format!("Add failed: {}", failure));
    }
    Ok(report)
}

#[tauri::command]
pub async fn list_items(
    criteria: QueryCriteria,
    state: State<'_, AppState>,
) -> Result<Vec<ItemSummary>, String> {
    let db = state.db.lock().map_err(|_| "Failed to lock DB")?;
    let items = db.get_all().map_err(|e| e.to_string())?;
    Ok(query::visible(&items, &criteria)
        .into_iter()
        .map(ItemSummary::from_item)
        .collect())
}

#[tauri::command]
pub async fn get_item(id: String, state: State<'_, AppState>) -> Result<Option<ItemSummary>, String> {
    let db = state.db.lock().map_err(|_| "Failed to lock DB")?;
    let item = db.get(&id).map_err(|e| e.to_string())?;
    Ok(item.as_ref().map(ItemSummary::from_item))
}

#[tauri::command]
pub async fn get_thumbnail(id: String, state: State<'_, AppState>) -> Result<Option<Vec<u8>>, String> {
    let db = state.db.lock().map_err(|_| "Failed to lock DB")?;
    db.get_thumbnail(&id).map_err(|e| e.to_string())
}

/// Materializes the item's payload and returns a handle to it. Repeated calls
/// for the same id return the same handle until it is released.
#[tauri::command]
pub async fn open_item(id: String, state: State<'_, AppState>) -> Result<HandleInfo, String> {
    let db = state.db.lock().map_err(|_| "Failed to lock DB")?;
    let item = db
        .get(&id)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("Item not found: {}", id))?;

    let mut payloads = state.payloads.lock().map_err(|_| "Failed to lock payload cache")?;
    let handle = payloads.handle_for(&item).map_err(|e| e.to_string())?;
    Ok(HandleInfo {
        id: handle.id,
        path: handle.path.to_string_lossy().to_string(),
        mime: handle.mime,
    })
}

#[tauri::command]
pub async fn release_item(id: String, state: State<'_, AppState>) -> Result<(), String> {
    let mut payloads = state.payloads.lock().map_err(|_| "Failed to lock payload cache")?;
    payloads.release(&id);
    Ok(())
}

/// Frees every live handle. The frontend calls this before a full grid reload.
#[tauri::command]
pub async fn release_all_handles(state: State<'_, AppState>) -> Result<(), String> {
    let mut payloads = state.payloads.lock().map_err(|_| "Failed to lock payload cache")?;
    payloads.release_all();
    Ok(())
}

#[tauri::command]
pub async fn rename_item(
    id: String,
    name: String,
    state: State<'_, AppState>,
) -> Result<(), String> {
    let db = state.db.lock().map_err(|_| "Failed to lock DB")?;
    let mut item = db
        .get(&id)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("Item not found: {}", id))?;
    item.set_name(name);
    db.put(&item).map_err(storage_err)
}

#[tauri::command]
pub async fn move_item(
    id: String,
    folder: String,
    state: State<'_, AppState>,
) -> Result<(), String> {
    let db = state.db.lock().map_err(|_| "Failed to lock DB")?;
    let mut item = db
        .get(&id)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("Item not found: {}", id))?;
    item.folder = normalize_folder(&folder);
    db.put(&item).map_err(storage_err)
}

#[tauri::command]
pub async fn set_favorite(
    id: String,
    favorite: bool,
    state: State<'_, AppState>,
) -> Result<(), String> {
    let db = state.db.lock().map_err(|_| "Failed to lock DB")?;
    let mut item = db
        .get(&id)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("Item not found: {}", id))?;
    item.favorite = favorite;
    db.put(&item).map_err(storage_err)
}

#[tauri::command]
pub async fn set_tags(id: String, tags: Vec<String>, state: State<'_, AppState>) -> Result<(), String> {
    let db = state.db.lock().map_err(|_| "Failed to lock DB")?;
    let mut item = db
        .get(&id)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("Item not found: {}", id))?;
    item.tags = tags
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    db.put(&item).map_err(storage_err)
}

/// Deleting twice is fine; the second call finds nothing and does nothing.
#[tauri::command]
pub async fn delete_item(
    app: tauri::AppHandle,
    id: String,
    state: State<'_, AppState>,
) -> Result<(), String> {
    let db = state.db.lock().map_err(|_| "Failed to lock DB")?;
    db.delete(&id).map_err(|e| e.to_string())?;

    let mut payloads = state.payloads.lock().map_err(|_| "Failed to lock payload cache")?;
    payloads.release(&id);

    log(&app, "INFO", &format!("Deleted item {}", id));
    Ok(())
}

#[tauri::command]
pub async fn clear_all(app: tauri::AppHandle, state: State<'_, AppState>) -> Result<(), String> {
    let db = state.db.lock().map_err(|_| "Failed to lock DB")?;
    db.clear().map_err(|e| e.to_string())?;

    let mut payloads = state.payloads.lock().map_err(|_| "Failed to lock payload cache")?;
    payloads.release_all();

    log(&app, "WARN", "Cleared all items");
    Ok(())
}

#[tauri::command]
pub async fn folder_counts(state: State<'_, AppState>) -> Result<Vec<FolderCount>, String> {
    let db = state.db.lock().map_err(|_| "Failed to lock DB")?;
    db.folder_counts().map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn library_stats(state: State<'_, AppState>) -> Result<StoreStats, String> {
    let db = state.db.lock().map_err(|_| "Failed to lock DB")?;
    db.stats().map_err(|e| e.to_string())
}

/// Writes the item's original bytes to `dest`, untouched.
#[tauri::command]
pub async fn download_original(
    id: String,
    dest: String,
    state: State<'_, AppState>,
) -> Result<(), String> {
    let db = state.db.lock().map_err(|_| "Failed to lock DB")?;
    let item = db
        .get(&id)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("Item not found: {}", id))?;
    std::fs::write(&dest, &item.payload).map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn export_backup(
    app: tauri::AppHandle,
    dest: String,
    state: State<'_, AppState>,
) -> Result<usize, String> {
    let db = state.db.lock().map_err(|_| "Failed to lock DB")?;
    let count = backup::export_to_path(&db, PathBuf::from(&dest).as_path()).map_err(|e| {
        let msg = format!("Backup export failed: {}", e);
        log(&app, "ERROR", &msg);
        e.to_string()
    })?;
    log(&app, "INFO", &format!("Exported {} items to {}", count, dest));
    Ok(count)
}

#[tauri::command]
pub async fn import_backup(
    app: tauri::AppHandle,
    src: String,
    state: State<'_, AppState>,
) -> Result<ImportReport, String> {
    let db = state.db.lock().map_err(|_| "Failed to lock DB")?;
    let report = backup::import_from_path(&db, PathBuf::from(&src).as_path()).map_err(|e| {
        let msg = format!("Backup import failed: {}", e);
        log(&app, "ERROR", &msg);
        e.to_string()
    })?;
    log(
        &app,
        "INFO",
        &format!(
            "Imported {} of {} items ({} skipped) from {}",
            report.imported, report.total, report.skipped, src
        ),
    );
    Ok(report)
}

#[tauri::command]
pub async fn get_setting(key: String, state: State<'_, AppState>) -> Result<Option<String>, String> {
    let db = state.db.lock().map_err(|_| "Failed to lock DB")?;
    db.get_setting(&key).map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn set_setting(key: String, value: String, state: State<'_, AppState>) -> Result<(), String> {
    let db = state.db.lock().map_err(|_| "Failed to lock DB")?;
    db.set_setting(&key, &value).map_err(|e| e.to_string())
}
