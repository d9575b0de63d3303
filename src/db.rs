use crate::error::StorageError;
use crate::models::{MediaItem, MediaKind};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Bump when the schema gains tables or indexes. Opening an older store at a
/// newer version is non-destructive: tables and indexes are created with
/// IF NOT EXISTS (SQLite backfills new indexes over existing rows) and column
/// additions go through tolerated ALTER TABLE calls below.
const SCHEMA_VERSION: i64 = 1;

const DB_SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS items (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        name_lower TEXT NOT NULL,
        folder TEXT NOT NULL,
        tags TEXT NOT NULL DEFAULT '[]',
        mime TEXT NOT NULL,
        kind TEXT NOT NULL,
        size INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        favorite INTEGER NOT NULL DEFAULT 0,
        duration REAL,
        payload BLOB NOT NULL,
        thumbnail BLOB
    );

    CREATE INDEX IF NOT EXISTS idx_items_folder ON items(folder);
    CREATE INDEX IF NOT EXISTS idx_items_name_lower ON items(name_lower);
    CREATE INDEX IF NOT EXISTS idx_items_kind ON items(kind);
    CREATE INDEX IF NOT EXISTS idx_items_created_at ON items(created_at);

    CREATE TABLE IF NOT EXISTS settings (
        name TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
"#;

#[derive(Debug, serde::Serialize)]
pub struct FolderCount {
    pub folder: String,
    pub count: i64,
}

#[derive(Debug, serde::Serialize)]
pub struct StoreStats {
    pub items: i64,
    pub total_bytes: i64,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(StorageError::Unavailable)?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )
        .map_err(StorageError::Unavailable)?;

        conn.execute_batch(DB_SCHEMA)
            .map_err(StorageError::Unavailable)?;

        // Migration: columns added after the first release. Fails with
        // "duplicate column" on up-to-date stores, which is fine.
        let _ = conn.execute("ALTER TABLE items ADD COLUMN favorite INTEGER NOT NULL DEFAULT 0", []);
        let _ = conn.execute("ALTER TABLE items ADD COLUMN duration REAL", []);

        let version: i64 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .map_err(StorageError::Unavailable)?;
        if version < SCHEMA_VERSION {
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)
                .map_err(StorageError::Unavailable)?;
        }

        Ok(Self { conn })
    }

    /// Upserts by id, rewriting every field in one statement so no partial
    /// write is ever observable.
    pub fn put(&self, item: &MediaItem) -> Result<(), StorageError> {
        let tags_json = serde_json::to_string(&item.tags).unwrap_or_else(|_| "[]".to_string());
        self.conn
            .execute(
                "INSERT INTO items (
                    id, name, name_lower, folder, tags, mime, kind,
                    size, created_at, favorite, duration, payload, thumbnail
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                ON CONFLICT(id) DO UPDATE SET
                    name=excluded.name,
                    name_lower=excluded.name_lower,
                    folder=excluded.folder,
                    tags=excluded.tags,
                    mime=excluded.mime,
                    kind=excluded.kind,
                    size=excluded.size,
                    created_at=excluded.created_at,
                    favorite=excluded.favorite,
                    duration=excluded.duration,
                    payload=excluded.payload,
                    thumbnail=excluded.thumbnail
                ",
                params![
                    item.id,
                    item.name,
                    item.name_lower,
                    item.folder,
                    tags_json,
                    item.mime,
                    item.kind.as_str(),
                    item.size,
                    item.created_at,
                    item.favorite,
                    item.duration,
                    item.payload,
                    item.thumbnail,
                ],
            )
            .map_err(StorageError::Write)?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<MediaItem>, StorageError> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM items WHERE id = ?1", ITEM_COLUMNS),
                params![id],
                row_to_item,
            )
            .optional()
            .map_err(StorageError::Read)
    }

    /// Thumbnail column only, so grid refreshes never pull the payload BLOB.
    /// Missing id and stored-without-thumbnail both come back as `None`.
    pub fn get_thumbnail(&self, id: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.conn
            .query_row(
                "SELECT thumbnail FROM items WHERE id = ?1",
                params![id],
                |row| row.get::<_, Option<Vec<u8>>>(0),
            )
            .optional()
            .map(|found| found.flatten())
            .map_err(StorageError::Read)
    }

    /// Every persisted item, in unspecified order. Ordering belongs to the
    /// query engine.
    pub fn get_all(&self) -> Result<Vec<MediaItem>, StorageError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM items", ITEM_COLUMNS))
            .map_err(StorageError::Read)?;
        let rows = stmt
            .query_map([], row_to_item)
            .map_err(StorageError::Read)?;

        let mut items = Vec::new();
        for item in rows {
            items.push(item.map_err(StorageError::Read)?);
        }
        Ok(items)
    }

    /// Idempotent: deleting a missing id is a no-op success.
    pub fn delete(&self, id: &str) -> Result<(), StorageError> {
        self.conn
            .execute("DELETE FROM items WHERE id = ?1", params![id])
            .map_err(StorageError::Write)?;
        Ok(())
    }

    /// Removes every item. Irreversible; the UI owns the confirmation prompt.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.conn
            .execute("DELETE FROM items", [])
            .map_err(StorageError::Write)?;
        Ok(())
    }

    /// Distinct folders with their item counts, sorted by folder name.
    pub fn folder_counts(&self) -> Result<Vec<FolderCount>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT folder, COUNT(*) FROM items GROUP BY folder ORDER BY folder ASC")
            .map_err(StorageError::Read)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(FolderCount {
                    folder: row.get(0)?,
                    count: row.get(1)?,
                })
            })
            .map_err(StorageError::Read)?;
        rows.collect::<Result<Vec<_>, rusqlite::Error>>()
            .map_err(StorageError::Read)
    }

    /// Item count and total stored payload bytes, for the status bar.
    pub fn stats(&self) -> Result<StoreStats, StorageError> {
        self.conn
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(size), 0) FROM items",
                [],
                |row| {
                    Ok(StoreStats {
                        items: row.get(0)?,
                        total_bytes: row.get(1)?,
                    })
                },
            )
            .map_err(StorageError::Read)
    }

    pub fn get_setting(&self, name: &str) -> Result<Option<String>, StorageError> {
        self.conn
            .query_row(
                "SELECT value FROM settings WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()
            .map_err(StorageError::Read)
    }

    /// Direct connection access so tests can inject storage faults
    /// (triggers, dropped tables) the public API cannot produce.
    #[cfg(test)]
    pub fn raw_conn(&self) -> &Connection {
        &self.conn
    }

    pub fn set_setting(&self, name: &str, value: &str) -> Result<(), StorageError> {
        self.conn
            .execute(
                "INSERT INTO settings (name, value) VALUES (?1, ?2)
                 ON CONFLICT(name) DO UPDATE SET value=excluded.value",
                params![name, value],
            )
            .map_err(StorageError::Write)?;
        Ok(())
    }
}

const ITEM_COLUMNS: &str = "id, name, name_lower, folder, tags, mime, kind, \
     size, created_at, favorite, duration, payload, thumbnail";

fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<MediaItem> {
    let tags_json: String = row.get(4)?;
    let kind_str: String = row.get(6)?;
    Ok(MediaItem {
        id: row.get(0)?,
        name: row.get(1)?,
        name_lower: row.get(2)?,
        folder: row.get(3)?,
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        mime: row.get(5)?,
        kind: MediaKind::parse(&kind_str),
        size: row.get(7)?,
        created_at: row.get(8)?,
        favorite: row.get(9)?,
        duration: row.get(10)?,
        payload: row.get(11)?,
        thumbnail: row.get(12)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaItem;
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, Database) {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path().join("galeria.db")).unwrap();
        (dir, db)
    }

    fn sample(name: &str, folder: &str, mime: &str, payload: Vec<u8>) -> MediaItem {
        MediaItem::new(name.to_string(), folder, vec![], mime.to_string(), payload)
    }

    #[test]
    fn put_then_get_round_trips_payload_and_kind() {
        let (_dir, db) = open_temp();
        let bytes: Vec<u8> = (0..255).collect();
        let mut item = sample("cat.png", "Pets", "image/png", bytes.clone());
        item.thumbnail = Some(vec![9, 9, 9]);
        db.put(&item).unwrap();

        let loaded = db.get(&item.id).unwrap().expect("item should exist");
        assert_eq!(loaded.payload, bytes);
        assert_eq!(loaded.kind, MediaKind::Image);
        assert_eq!(loaded.thumbnail.as_deref(), Some(&[9u8, 9, 9][..]));
        assert_eq!(loaded.folder, "Pets");
        assert_eq!(loaded.created_at, item.created_at);
    }

    #[test]
    fn get_missing_id_is_none_not_error() {
        let (_dir, db) = open_temp();
        assert!(db.get("nope").unwrap().is_none());
    }

    #[test]
    fn thumbnail_lookup_covers_all_three_cases() {
        let (_dir, db) = open_temp();
        let mut with_thumb = sample("a.png", "x", "image/png", vec![1]);
        with_thumb.thumbnail = Some(vec![4, 5, 6]);
        let without_thumb = sample("b.png", "x", "image/png", vec![2]);
        db.put(&with_thumb).unwrap();
        db.put(&without_thumb).unwrap();

        assert_eq!(db.get_thumbnail(&with_thumb.id).unwrap(), Some(vec![4, 5, 6]));
        assert!(db.get_thumbnail(&without_thumb.id).unwrap().is_none());
        assert!(db.get_thumbnail("nope").unwrap().is_none());
    }

    #[test]
    fn put_overwrites_all_fields() {
        let (_dir, db) = open_temp();
        let mut item = sample("a.png", "x", "image/png", vec![1]);
        db.put(&item).unwrap();

        item.set_name("B.png".into());
        item.folder = "Moved".into();
        item.favorite = true;
        db.put(&item).unwrap();

        let loaded = db.get(&item.id).unwrap().unwrap();
        assert_eq!(loaded.name, "B.png");
        assert_eq!(loaded.name_lower, "b.png");
        assert_eq!(loaded.folder, "Moved");
        assert!(loaded.favorite);
        assert_eq!(db.get_all().unwrap().len(), 1);
    }

    #[test]
    fn delete_is_idempotent() {
        let (_dir, db) = open_temp();
        let item = sample("a.png", "x", "image/png", vec![1]);
        db.put(&item).unwrap();

        db.delete(&item.id).unwrap();
        assert!(db.get(&item.id).unwrap().is_none());
        // Deleting again (and deleting a never-existing id) still succeeds.
        db.delete(&item.id).unwrap();
        db.delete("never-existed").unwrap();
        assert!(db.get_all().unwrap().is_empty());
    }

    #[test]
    fn clear_removes_everything() {
        let (_dir, db) = open_temp();
        db.put(&sample("a.png", "x", "image/png", vec![1])).unwrap();
        db.put(&sample("b.mp4", "y", "video/mp4", vec![2])).unwrap();
        db.clear().unwrap();
        assert!(db.get_all().unwrap().is_empty());
    }

    #[test]
    fn reopening_preserves_existing_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("galeria.db");
        let item = sample("keep.png", "x", "image/png", vec![7, 7]);
        {
            let db = Database::new(&path).unwrap();
            db.put(&item).unwrap();
        }
        let db = Database::new(&path).unwrap();
        let loaded = db.get(&item.id).unwrap().expect("row must survive reopen");
        assert_eq!(loaded.payload, vec![7, 7]);
    }

    #[test]
    fn folder_counts_and_stats() {
        let (_dir, db) = open_temp();
        db.put(&sample("a.png", "Pets", "image/png", vec![0; 10])).unwrap();
        db.put(&sample("b.png", "Pets", "image/png", vec![0; 20])).unwrap();
        db.put(&sample("c.png", "Art", "image/png", vec![0; 5])).unwrap();

        let counts = db.folder_counts().unwrap();
        assert_eq!(counts.len(), 2);
        assert_eq!((counts[0].folder.as_str(), counts[0].count), ("Art", 1));
        assert_eq!((counts[1].folder.as_str(), counts[1].count), ("Pets", 2));

        let stats = db.stats().unwrap();
        assert_eq!(stats.items, 3);
        assert_eq!(stats.total_bytes, 35);
    }

    #[test]
    fn settings_round_trip() {
        let (_dir, db) = open_temp();
        assert!(db.get_setting("theme").unwrap().is_none());
        db.set_setting("theme", "dark").unwrap();
        db.set_setting("theme", "light").unwrap();
        assert_eq!(db.get_setting("theme").unwrap().as_deref(), Some("light"));
    }
}
