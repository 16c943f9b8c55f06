//! Test and helper mocks for kiln_core.

use crate::recorder::{Outcome, SessionRecorder};
use crate::state::StateSnapshot;
use kiln_traits::clock::Clock;
use kiln_traits::{BoxError, HeatingElement, Thermocouple, ThermocoupleReading};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct MemSession {
    pub id: String,
    pub profile_name: Option<String>,
    pub started_at: Option<i64>,
    pub ended_at: Option<i64>,
    pub outcome: Outcome,
}

/// In-memory `SessionRecorder` with the same upsert and stop-once semantics as the store.
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    sessions: Mutex<Vec<MemSession>>,
    samples: Mutex<BTreeMap<(String, i64), StateSnapshot>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sessions(&self) -> Vec<MemSession> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn session(&self, id: &str) -> Option<MemSession> {
        self.sessions().into_iter().find(|s| s.id == id)
    }

    /// Samples for one session, ascending by timestamp.
    pub fn samples(&self, id: &str) -> Vec<(i64, StateSnapshot)> {
        self.samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|((sid, _), _)| sid == id)
            .map(|((_, t), s)| (*t, s.clone()))
            .collect()
    }
}

impl SessionRecorder for MemoryRecorder {
    fn create_session(
        &self,
        profile_name: Option<&str>,
        _created_at: Option<i64>,
        started_at: Option<i64>,
        outcome: Outcome,
    ) -> Result<String, BoxError> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let id = format!("mem-{}", sessions.len() + 1);
        sessions.push(MemSession {
            id: id.clone(),
            profile_name: profile_name.map(str::to_string),
            started_at,
            ended_at: None,
            outcome,
        });
        Ok(id)
    }

    fn stop_session(
        &self,
        session_id: &str,
        ended_at: Option<i64>,
        outcome: Outcome,
    ) -> Result<bool, BoxError> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        match sessions
            .iter_mut()
            .find(|s| s.id == session_id && s.ended_at.is_none())
        {
            Some(s) => {
                s.ended_at = Some(ended_at.unwrap_or_default());
                s.outcome = outcome;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn add_session_sample(
        &self,
        session_id: &str,
        state: &StateSnapshot,
        t: Option<i64>,
    ) -> Result<(), BoxError> {
        self.samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((session_id.to_string(), t.unwrap_or_default()), state.clone());
        Ok(())
    }
}

/// Recorder whose every call fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingRecorder;

impl SessionRecorder for FailingRecorder {
    fn create_session(
        &self,
        _profile_name: Option<&str>,
        _created_at: Option<i64>,
        _started_at: Option<i64>,
        _outcome: Outcome,
    ) -> Result<String, BoxError> {
        Err(Box::new(std::io::Error::other("database is locked")))
    }

    fn stop_session(
        &self,
        _session_id: &str,
        _ended_at: Option<i64>,
        _outcome: Outcome,
    ) -> Result<bool, BoxError> {
        Err(Box::new(std::io::Error::other("database is locked")))
    }

    fn add_session_sample(
        &self,
        _session_id: &str,
        _state: &StateSnapshot,
        _t: Option<i64>,
    ) -> Result<(), BoxError> {
        Err(Box::new(std::io::Error::other("database is locked")))
    }
}

/// Heating element that records every command. Without a clock it never
/// blocks; with one it sleeps the full interval on that clock.
#[derive(Clone, Default)]
pub struct FakeElement {
    duties: Arc<Mutex<Vec<f64>>>,
    offs: Arc<Mutex<usize>>,
    fail: bool,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
}

impl std::fmt::Debug for FakeElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeElement")
            .field("fail", &self.fail)
            .field("paced", &self.clock.is_some())
            .finish()
    }
}

impl FakeElement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep each actuation interval on `clock` (a test clock just advances).
    pub fn paced<C: Clock + Send + Sync + 'static>(clock: C) -> Self {
        Self {
            clock: Some(Arc::new(clock)),
            ..Self::default()
        }
    }

    /// An element whose `actuate` always errors.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn duties(&self) -> Vec<f64> {
        self.duties
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn off_count(&self) -> usize {
        *self.offs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl HeatingElement for FakeElement {
    fn actuate(&mut self, duty: f64, interval: Duration) -> Result<(), BoxError> {
        if self.fail {
            return Err(Box::new(std::io::Error::other("relay driver not responding")));
        }
        self.duties
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(duty);
        if let Some(clock) = &self.clock {
            clock.sleep(interval);
        }
        Ok(())
    }

    fn off(&mut self) -> Result<(), BoxError> {
        *self.offs.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(())
    }
}

/// Thermocouple returning queued readings, then repeating the last one.
#[derive(Debug, Clone, Default)]
pub struct ScriptedThermocouple {
    queue: VecDeque<ThermocoupleReading>,
    last: ThermocoupleReading,
}

impl ScriptedThermocouple {
    pub fn new(readings: impl IntoIterator<Item = ThermocoupleReading>) -> Self {
        Self {
            queue: readings.into_iter().collect(),
            last: ThermocoupleReading::default(),
        }
    }

    /// Always reads `t` with no faults.
    pub fn constant(t: f64) -> Self {
        Self::new([ThermocoupleReading::ok(t)])
    }
}

impl Thermocouple for ScriptedThermocouple {
    fn read(&mut self) -> Result<ThermocoupleReading, BoxError> {
        if let Some(r) = self.queue.pop_front() {
            self.last = r;
        }
        Ok(self.last)
    }
}
