use thiserror::Error;

/// Failures of the local store. Callers branch on the variant: `Unavailable`
/// is fatal at open time, `Read` aborts the in-progress read, `Write` is
/// recoverable per operation (batch loops count it and continue).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(#[source] rusqlite::Error),

    #[error("storage read failed: {0}")]
    Read(#[source] rusqlite::Error),

    #[error("storage write failed: {0}")]
    Write(#[source] rusqlite::Error),
}

impl StorageError {
    /// True when a write was rejected because the database or disk is full.
    pub fn is_quota_exceeded(&self) -> bool {
        match self {
            StorageError::Write(rusqlite::Error::SqliteFailure(err, _)) => {
                err.code == rusqlite::ErrorCode::DiskFull
            }
            _ => false,
        }
    }
}

/// Failures of the backup codec.
#[derive(Debug, Error)]
pub enum BackupError {
    /// The document is not a backup at all (bad JSON, or no `items` list).
    /// The whole import aborts before any write.
    #[error("not a valid backup document: {0}")]
    Format(#[source] serde_json::Error),

    #[error("failed to read backup file: {0}")]
    Io(#[source] std::io::Error),

    /// A single packed item could not be transcoded back to bytes.
    /// Policy: skip the item, count it, continue with the rest.
    #[error("packed item carries invalid base64: {0}")]
    ItemDecode(#[source] base64::DecodeError),

    #[error("packed item is missing its payload")]
    MissingPayload,

    #[error(transparent)]
    Storage(#[from] StorageError),
}
