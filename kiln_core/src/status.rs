//! Outcome of one control loop iteration.

use crate::error::AbortReason;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleStatus {
    /// Nothing to do.
    Idle,
    /// A cooldown sample was taken for a completed session.
    CoolingDown { final_sample: bool },
    /// Schedule in progress; one heat/cool interval elapsed.
    Running,
    /// Schedule ended; heater off and cooldown capture started when a session existed.
    Completed { session_id: Option<String> },
    /// Run stopped with outcome ERROR; heater has been asked to turn off.
    Aborted(AbortReason),
}

impl CycleStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Aborted(_))
    }
}
