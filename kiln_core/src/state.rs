//! Queryable view of the controller, persisted as samples and restart snapshots.

use crate::pid::PidStats;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunState {
    #[default]
    Idle,
    Running,
}

impl RunState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Running => "RUNNING",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateSnapshot {
    pub cost: f64,
    /// Schedule-relative seconds (shifted by catch-up and warmup skip).
    pub runtime: f64,
    /// Wall seconds since the run started.
    pub elapsed: f64,
    /// Corrected temperature.
    pub temperature: f64,
    pub target: f64,
    pub state: RunState,
    /// Seconds the element was energized during the last cycle.
    pub heat: f64,
    pub totaltime: f64,
    pub kwh_rate: f64,
    pub currency_type: String,
    pub profile: Option<String>,
    pub pidstats: PidStats,
    pub cooldown_capture: bool,
    pub cooldown_elapsed: Option<f64>,
    pub cooldown_session_id: Option<String>,
}
