//! Post-completion sampling of a finished session while the kiln cools.
//!
//! All fields sit behind one mutex. `tick` holds it across the decision and
//! the sample write, so a concurrent `cancel`/`stop` either lands before the
//! tick (no sample) or after it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, PartialEq)]
struct CaptureState {
    session_id: String,
    started_at: f64,
    deadline: f64,
}

/// What a single `tick` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CooldownTick {
    /// No capture active.
    Inactive,
    /// Deadline reached; capture canceled without a sample.
    Expired,
    /// One sample written; `final_sample` when the kiln crossed below threshold.
    Sampled { final_sample: bool },
}

/// Read-only view handed to the sample writer.
#[derive(Debug, Clone, Copy)]
pub struct CooldownView<'a> {
    pub session_id: &'a str,
    pub elapsed: f64,
}

#[derive(Debug, Clone, Default)]
pub struct CooldownCapture {
    inner: Arc<Mutex<Option<CaptureState>>>,
}

impl CooldownCapture {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<CaptureState>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Begin capturing for `session_id`, replacing any previous capture.
    pub fn start(&self, session_id: &str, now: f64, max_duration_s: f64) {
        *self.lock() = Some(CaptureState {
            session_id: session_id.to_string(),
            started_at: now,
            deadline: now + max_duration_s,
        });
        tracing::info!(session_id, max_duration_s, "cooldown capture started");
    }

    pub fn cancel(&self) {
        if let Some(s) = self.lock().take() {
            tracing::info!(session_id = %s.session_id, "cooldown capture canceled");
        }
    }

    /// Manual stop. With `Some(id)`, only stops a capture for that session.
    /// Returns whether a capture was stopped.
    pub fn stop(&self, session_id: Option<&str>) -> bool {
        let mut guard = self.lock();
        let matches = match (guard.as_ref(), session_id) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(s), Some(id)) => s.session_id == id,
        };
        if matches {
            *guard = None;
            tracing::info!(session_id, "cooldown capture stopped");
        }
        matches
    }

    pub fn is_active(&self) -> bool {
        self.lock().is_some()
    }

    pub fn session_id(&self) -> Option<String> {
        self.lock().as_ref().map(|s| s.session_id.clone())
    }

    /// `(session_id, seconds since capture start)` while active.
    pub fn status(&self, now: f64) -> Option<(String, f64)> {
        self.lock()
            .as_ref()
            .map(|s| (s.session_id.clone(), (now - s.started_at).max(0.0)))
    }

    /// Advance the capture: expire at the deadline, otherwise write one sample
    /// through `persist` and finish once `temperature < threshold`.
    ///
    /// `persist` runs under the capture lock, so a concurrent `stop` waits for
    /// at most one store write (bounded by the store's busy timeout).
    pub fn tick<F>(&self, now: f64, temperature: f64, threshold: f64, persist: F) -> CooldownTick
    where
        F: FnOnce(CooldownView<'_>),
    {
        let mut guard = self.lock();
        let Some(state) = guard.as_ref() else {
            return CooldownTick::Inactive;
        };
        if now >= state.deadline {
            tracing::info!(session_id = %state.session_id, "cooldown capture reached its time cap");
            *guard = None;
            return CooldownTick::Expired;
        }
        persist(CooldownView {
            session_id: &state.session_id,
            elapsed: (now - state.started_at).max(0.0),
        });
        let final_sample = temperature < threshold;
        if final_sample {
            tracing::info!(
                session_id = %state.session_id,
                temperature,
                threshold,
                "kiln cooled below threshold, cooldown capture finished"
            );
            *guard = None;
        }
        CooldownTick::Sampled { final_sample }
    }
}
