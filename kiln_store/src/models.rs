use kiln_core::Outcome;
use rusqlite::Row;
use serde::Serialize;

use crate::error::{Result, StoreError};

/// One row of `sessions`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionRecord {
    pub id: String,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub ended_at: Option<i64>,
    pub profile_name: Option<String>,
    pub outcome: Option<String>,
    pub notes: Option<String>,
    pub meta_json: Option<String>,
}

impl SessionRecord {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            created_at: row.get("created_at")?,
            started_at: row.get("started_at")?,
            ended_at: row.get("ended_at")?,
            profile_name: row.get("profile_name")?,
            outcome: row.get("outcome")?,
            notes: row.get("notes")?,
            meta_json: row.get("meta_json")?,
        })
    }

    /// Typed outcome; `None` when the column is NULL.
    pub fn outcome(&self) -> Result<Option<Outcome>> {
        self.outcome
            .as_deref()
            .map(|s| {
                s.parse::<Outcome>()
                    .map_err(|_| StoreError::InvalidOutcome(s.to_string()))
            })
            .transpose()
    }

    pub fn is_ended(&self) -> bool {
        self.ended_at.is_some()
    }
}

/// One stored sample, with its state decoded from JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleRecord {
    pub t: i64,
    pub state: serde_json::Value,
}
