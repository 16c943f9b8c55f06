//! SQLite session store.
//!
//! A single connection behind a mutex. Writes are short single statements, so
//! the control loop never waits on anything longer than one of them (bounded
//! by the busy timeout).

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use kiln_core::recorder::{Outcome, SessionRecorder};
use kiln_core::state::StateSnapshot;
use kiln_traits::BoxError;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Result;
use crate::migrations::{run_migrations, schema_version};
use crate::models::{SampleRecord, SessionRecord};

/// Upper bound on rows returned by one `list_session_samples` call.
pub const MAX_SAMPLE_PAGE: usize = 10_000;

/// Longest a locked database can stall a write. Sample writes run on the
/// control thread, so this is also the worst-case delay they add to a cycle.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn to_i64(v: usize) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

pub struct KilnStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for KilnStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KilnStore").field("path", &self.path).finish()
    }
}

impl KilnStore {
    /// Open (creating parent directories) and migrate. A migration failure is fatal.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self::init(conn, Some(path.to_path_buf()))?;
        tracing::info!(path = %path.display(), "session store ready");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(mut conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        configure(&conn)?;
        run_migrations(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn schema_version(&self) -> Result<i32> {
        schema_version(&self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Write side ───────────────────────────────────────────────────────────

    /// Insert a session with a fresh UUID v4 id. `created_at` defaults to now.
    pub fn create_session(
        &self,
        profile_name: Option<&str>,
        created_at: Option<i64>,
        started_at: Option<i64>,
        outcome: Outcome,
    ) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let created_at = created_at.unwrap_or_else(unix_now);
        self.lock().execute(
            "INSERT INTO sessions (id, created_at, started_at, profile_name, outcome)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, created_at, started_at, profile_name, outcome.as_str()],
        )?;
        tracing::debug!(session_id = %id, profile = ?profile_name, "session created");
        Ok(id)
    }

    /// End a session once. Returns false when it is unknown or already ended.
    pub fn stop_session(
        &self,
        session_id: &str,
        ended_at: Option<i64>,
        outcome: Outcome,
    ) -> Result<bool> {
        let ended_at = ended_at.unwrap_or_else(unix_now);
        let changed = self.lock().execute(
            "UPDATE sessions SET ended_at = ?1, outcome = ?2
             WHERE id = ?3 AND ended_at IS NULL",
            params![ended_at, outcome.as_str(), session_id],
        )?;
        Ok(changed > 0)
    }

    /// Upsert on `(session_id, t)`; the last write for a second wins. `t` defaults to now.
    pub fn add_session_sample<S: Serialize + ?Sized>(
        &self,
        session_id: &str,
        state: &S,
        t: Option<i64>,
    ) -> Result<()> {
        let json = serde_json::to_string(state)?;
        let t = t.unwrap_or_else(unix_now);
        self.lock().execute(
            "INSERT INTO session_samples (session_id, t, state_json) VALUES (?1, ?2, ?3)
             ON CONFLICT(session_id, t) DO UPDATE SET state_json = excluded.state_json",
            params![session_id, t, json],
        )?;
        Ok(())
    }

    /// Replace the notes of a session, ended or not. Returns false if unknown.
    pub fn update_notes(&self, session_id: &str, notes: Option<&str>) -> Result<bool> {
        let changed = self.lock().execute(
            "UPDATE sessions SET notes = ?1 WHERE id = ?2",
            params![notes, session_id],
        )?;
        Ok(changed > 0)
    }

    // ── Read side ────────────────────────────────────────────────────────────

    /// Newest first by `created_at`.
    pub fn list_sessions(&self, limit: usize, offset: usize) -> Result<Vec<SessionRecord>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, created_at, started_at, ended_at, profile_name, outcome, notes, meta_json
             FROM sessions
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?1 OFFSET ?2",
        )?;
        let rows = stmt
            .query_map(params![to_i64(limit), to_i64(offset)], SessionRecord::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, created_at, started_at, ended_at, profile_name, outcome, notes, meta_json
             FROM sessions WHERE id = ?1",
        )?;
        Ok(stmt
            .query_row(params![session_id], SessionRecord::from_row)
            .optional()?)
    }

    /// Samples with `from_t <= t <= to_t`, ascending, at most
    /// `min(limit, MAX_SAMPLE_PAGE)` rows.
    pub fn list_session_samples(
        &self,
        session_id: &str,
        from_t: Option<i64>,
        to_t: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<SampleRecord>> {
        let limit = limit.map_or(MAX_SAMPLE_PAGE, |l| l.min(MAX_SAMPLE_PAGE));
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT t, state_json FROM session_samples
             WHERE session_id = ?1
               AND (?2 IS NULL OR t >= ?2)
               AND (?3 IS NULL OR t <= ?3)
             ORDER BY t ASC
             LIMIT ?4",
        )?;
        let raw = stmt
            .query_map(params![session_id, from_t, to_t, to_i64(limit)], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        raw.into_iter()
            .map(|(t, json)| {
                Ok(SampleRecord {
                    t,
                    state: serde_json::from_str(&json)?,
                })
            })
            .collect()
    }

    // ── Settings ─────────────────────────────────────────────────────────────

    pub fn get_setting<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let json: Option<String> = self
            .lock()
            .query_row(
                "SELECT value_json FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        json.map(|j| serde_json::from_str(&j).map_err(Into::into))
            .transpose()
    }

    pub fn put_setting<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.lock().execute(
            "INSERT INTO settings (key, value_json, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
               value_json = excluded.value_json,
               updated_at = excluded.updated_at",
            params![key, json, unix_now()],
        )?;
        Ok(())
    }
}

fn configure(conn: &Connection) -> Result<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    if !mode.eq_ignore_ascii_case("wal") {
        tracing::debug!(mode = %mode, "WAL journal not available");
    }
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    Ok(())
}

impl SessionRecorder for KilnStore {
    fn create_session(
        &self,
        profile_name: Option<&str>,
        created_at: Option<i64>,
        started_at: Option<i64>,
        outcome: Outcome,
    ) -> std::result::Result<String, BoxError> {
        Ok(Self::create_session(
            self,
            profile_name,
            created_at,
            started_at,
            outcome,
        )?)
    }

    fn stop_session(
        &self,
        session_id: &str,
        ended_at: Option<i64>,
        outcome: Outcome,
    ) -> std::result::Result<bool, BoxError> {
        Ok(Self::stop_session(self, session_id, ended_at, outcome)?)
    }

    fn add_session_sample(
        &self,
        session_id: &str,
        state: &StateSnapshot,
        t: Option<i64>,
    ) -> std::result::Result<(), BoxError> {
        Ok(Self::add_session_sample(self, session_id, state, t)?)
    }
}
