//! Restart-recovery snapshot on disk.

use crate::atomic::write_atomic;
use crate::config::RestartCfg;
use crate::error::{KilnError, Result};
use crate::state::{RunState, StateSnapshot};
use eyre::WrapErr;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Why a resume is not possible right now.
#[derive(Debug, Clone, PartialEq)]
pub enum NoResume {
    Disabled,
    Missing,
    TooOld { minutes: f64 },
    NotRunning(RunState),
    NoProfile,
}

impl std::fmt::Display for NoResume {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disabled => f.write_str("automatic restarts disabled"),
            Self::Missing => f.write_str("state file does not exist"),
            Self::TooOld { minutes } => write!(f, "state file is {minutes:.1} minutes old"),
            Self::NotRunning(s) => write!(f, "state = {}", s.as_str()),
            Self::NoProfile => f.write_str("state file names no profile"),
        }
    }
}

/// A run that can be resumed, with the profile it was firing.
#[derive(Debug, Clone, PartialEq)]
pub struct Resume {
    pub profile: String,
    pub snapshot: StateSnapshot,
}

#[derive(Debug, Clone)]
pub struct RestartFile {
    enabled: bool,
    path: PathBuf,
    window_minutes: f64,
}

impl RestartFile {
    pub fn new(cfg: &RestartCfg) -> Self {
        Self {
            enabled: cfg.enabled,
            path: cfg.state_file.clone(),
            window_minutes: cfg.window_minutes,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the snapshot when restarts are enabled; no-op otherwise.
    pub fn save(&self, snap: &StateSnapshot) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let bytes = serde_json::to_vec_pretty(snap)
            .map_err(|e| eyre::Report::new(KilnError::Io(e.to_string())))?;
        write_atomic(&self.path, &bytes)
            .map_err(|e| eyre::Report::new(KilnError::Io(e.to_string())))
            .wrap_err_with(|| format!("write restart state {:?}", self.path))
    }

    /// File age in minutes relative to `now` (Unix seconds), from its mtime.
    pub fn age_minutes(&self, now: f64) -> Option<f64> {
        let modified = std::fs::metadata(&self.path).ok()?.modified().ok()?;
        let mtime = modified.duration_since(UNIX_EPOCH).ok()?.as_secs_f64();
        Some((now - mtime) / 60.0)
    }

    /// Load the snapshot if it describes a run that should be resumed.
    pub fn resumable(&self, now: f64) -> std::result::Result<Resume, NoResume> {
        if !self.enabled {
            return Err(NoResume::Disabled);
        }
        let minutes = self.age_minutes(now).ok_or(NoResume::Missing)?;
        if minutes > self.window_minutes {
            return Err(NoResume::TooOld { minutes });
        }
        let text = std::fs::read_to_string(&self.path).map_err(|_| NoResume::Missing)?;
        let snap: StateSnapshot = serde_json::from_str(&text).map_err(|e| {
            tracing::warn!(error = %e, path = ?self.path, "unreadable restart state");
            NoResume::Missing
        })?;
        if snap.state != RunState::Running {
            return Err(NoResume::NotRunning(snap.state));
        }
        let Some(profile) = snap.profile.clone() else {
            return Err(NoResume::NoProfile);
        };
        Ok(Resume {
            profile,
            snapshot: snap,
        })
    }
}
