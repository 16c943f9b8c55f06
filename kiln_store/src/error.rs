use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("migration to schema v{version} failed: {source}")]
    Migration {
        version: i32,
        #[source]
        source: rusqlite::Error,
    },
    #[error("database schema v{found} is newer than supported v{supported}")]
    SchemaTooNew { found: i32, supported: i32 },
    #[error("unknown session outcome '{0}'")]
    InvalidOutcome(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
