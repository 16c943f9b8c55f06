//! Schema migrations, tracked in `PRAGMA user_version`.

use crate::error::{Result, StoreError};
use rusqlite::{Connection, Transaction};
use std::time::Instant;

pub const CURRENT_SCHEMA_VERSION: i32 = 2;

pub fn schema_version(conn: &Connection) -> Result<i32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Bring the schema up to `CURRENT_SCHEMA_VERSION` in one transaction.
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let mut version = schema_version(conn)?;
    if version > CURRENT_SCHEMA_VERSION {
        return Err(StoreError::SchemaTooNew {
            found: version,
            supported: CURRENT_SCHEMA_VERSION,
        });
    }
    if version == CURRENT_SCHEMA_VERSION {
        return Ok(());
    }

    let start = Instant::now();
    tracing::info!(from = version, to = CURRENT_SCHEMA_VERSION, "migrating database schema");
    let tx = conn.transaction()?;
    while version < CURRENT_SCHEMA_VERSION {
        let next = version + 1;
        apply_migration(&tx, next).map_err(|source| StoreError::Migration {
            version: next,
            source,
        })?;
        version = next;
    }
    tx.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)?;
    tx.commit()?;
    tracing::info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        "database migrations complete"
    );
    Ok(())
}

fn apply_migration(tx: &Transaction<'_>, version: i32) -> rusqlite::Result<()> {
    tracing::debug!(version, "applying migration");
    match version {
        1 => tx.execute_batch(include_str!("schemas/schema_v1.sql")),
        2 => tx.execute_batch(include_str!("schemas/schema_v2.sql")),
        _ => Err(rusqlite::Error::InvalidParameterName(format!(
            "no migration for schema v{version}"
        ))),
    }
}
