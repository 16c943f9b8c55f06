//! Persistence contract for sessions and samples, and the best-effort wrapper
//! the controller calls it through.
//!
//! Recorder failures never change controller transitions: every call goes
//! through `BestEffortRecorder`, which logs the error and carries on.

use crate::state::StateSnapshot;
use kiln_traits::BoxError;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Running,
    Completed,
    Aborted,
    Error,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Aborted => "ABORTED",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RUNNING" => Ok(Self::Running),
            "COMPLETED" => Ok(Self::Completed),
            "ABORTED" => Ok(Self::Aborted),
            "ERROR" => Ok(Self::Error),
            other => Err(format!("unknown outcome '{other}'")),
        }
    }
}

/// Session storage used by the controller. Timestamps are whole Unix seconds;
/// `None` means "now" as seen by the implementation.
pub trait SessionRecorder: Send + Sync {
    /// Open a session and return its fresh id.
    fn create_session(
        &self,
        profile_name: Option<&str>,
        created_at: Option<i64>,
        started_at: Option<i64>,
        outcome: Outcome,
    ) -> Result<String, BoxError>;

    /// End a session. Returns false if it was unknown or already ended.
    fn stop_session(
        &self,
        session_id: &str,
        ended_at: Option<i64>,
        outcome: Outcome,
    ) -> Result<bool, BoxError>;

    /// Store a sample; a second write for the same `(session_id, t)` replaces the first.
    fn add_session_sample(
        &self,
        session_id: &str,
        state: &StateSnapshot,
        t: Option<i64>,
    ) -> Result<(), BoxError>;
}

/// Optional recorder whose errors are logged and swallowed.
#[derive(Clone, Default)]
pub struct BestEffortRecorder {
    inner: Option<Arc<dyn SessionRecorder>>,
}

impl fmt::Debug for BestEffortRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BestEffortRecorder")
            .field("enabled", &self.inner.is_some())
            .finish()
    }
}

impl BestEffortRecorder {
    pub fn new(inner: Option<Arc<dyn SessionRecorder>>) -> Self {
        Self { inner }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    pub fn create(&self, profile_name: &str, now: i64) -> Option<String> {
        let rec = self.inner.as_ref()?;
        match rec.create_session(Some(profile_name), Some(now), Some(now), Outcome::Running) {
            Ok(id) => {
                tracing::info!(session_id = %id, profile = profile_name, "session started");
                Some(id)
            }
            Err(e) => {
                tracing::error!(error = %e, "session start failed");
                None
            }
        }
    }

    pub fn stop(&self, session_id: &str, now: i64, outcome: Outcome) -> bool {
        let Some(rec) = self.inner.as_ref() else {
            return false;
        };
        match rec.stop_session(session_id, Some(now), outcome) {
            Ok(stopped) => {
                tracing::info!(session_id, %outcome, stopped, "session ended");
                stopped
            }
            Err(e) => {
                tracing::error!(session_id, error = %e, "session stop failed");
                false
            }
        }
    }

    pub fn sample(&self, session_id: &str, state: &StateSnapshot, t: i64) {
        let Some(rec) = self.inner.as_ref() else {
            return;
        };
        if let Err(e) = rec.add_session_sample(session_id, state, Some(t)) {
            tracing::error!(session_id, t, error = %e, "sample persist failed");
        }
    }
}
