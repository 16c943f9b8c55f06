//! Type-state builder for the boxed `Oven` controller.
//!
//! The builder enforces at compile time that a heating element and a sensor
//! cell are provided before `build()` is available. `try_build()` is always
//! available for dynamic checks.

use std::marker::PhantomData;
use std::sync::Arc;

use kiln_traits::HeatingElement;
use kiln_traits::clock::{Clock, MonotonicClock};

use crate::calibration::Calibration;
use crate::config::OvenConfig;
use crate::error::{BuildError, Result};
use crate::oven::OvenController;
use crate::profile::ProfileLoader;
use crate::recorder::{BestEffortRecorder, SessionRecorder};
use crate::sensor::SensorCell;

/// Controller over a boxed heating element, selected at construction.
pub type Oven = OvenController<Box<dyn HeatingElement + Send>>;

impl OvenController<Box<dyn HeatingElement + Send>> {
    /// Start building an Oven.
    pub fn builder() -> OvenBuilder<Missing, Missing> {
        OvenBuilder::default()
    }
}

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `Oven`. All fields are validated on `build()`.
pub struct OvenBuilder<E, S> {
    element: Option<Box<dyn HeatingElement + Send>>,
    sensor: Option<Arc<SensorCell>>,
    config: OvenConfig,
    calibration: Calibration,
    recorder: Option<Arc<dyn SessionRecorder>>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    profile_loader: Option<Box<dyn ProfileLoader>>,
    _e: PhantomData<E>,
    _s: PhantomData<S>,
}

impl Default for OvenBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            element: None,
            sensor: None,
            config: OvenConfig::default(),
            calibration: Calibration::default(),
            recorder: None,
            clock: None,
            profile_loader: None,
            _e: PhantomData,
            _s: PhantomData,
        }
    }
}

fn invalid(msg: &'static str) -> eyre::Report {
    eyre::Report::new(BuildError::InvalidConfig(msg))
}

/// Single source of truth for controller config validation.
fn validate(cfg: &OvenConfig, calibration: &Calibration) -> Result<()> {
    let s = &cfg.sensor;
    if !(s.time_step_s.is_finite() && s.time_step_s > 0.0) {
        return Err(invalid("time_step_s must be > 0"));
    }
    if s.average_samples == 0 {
        return Err(invalid("average_samples must be >= 1"));
    }
    let p = &cfg.pid;
    if ![p.kp, p.ki, p.kd].iter().all(|v| v.is_finite() && *v >= 0.0) {
        return Err(invalid("pid gains must be finite and >= 0"));
    }
    if p.ki <= 0.0 {
        return Err(invalid("pid ki must be > 0"));
    }
    if !(p.control_window.is_finite() && p.control_window > 0.0) {
        return Err(invalid("pid control_window must be > 0"));
    }
    if !(cfg.cooldown.max_hours.is_finite() && cfg.cooldown.max_hours > 0.0) {
        return Err(invalid("cooldown max_hours must be > 0"));
    }
    if cfg.cost.kwh_rate < 0.0 || cfg.cost.kw_elements < 0.0 {
        return Err(invalid("cost rates must be >= 0"));
    }
    if cfg.schedule.warmup_skip_threshold < 0.0 {
        return Err(invalid("warmup_skip_threshold must be >= 0"));
    }
    if let Calibration::Table(rows) = calibration
        && rows.windows(2).any(|w| w[1].0 <= w[0].0)
    {
        return Err(invalid("calibration table temps must be strictly increasing"));
    }
    Ok(())
}

impl<E, S> OvenBuilder<E, S> {
    fn retype<E2, S2>(self) -> OvenBuilder<E2, S2> {
        OvenBuilder {
            element: self.element,
            sensor: self.sensor,
            config: self.config,
            calibration: self.calibration,
            recorder: self.recorder,
            clock: self.clock,
            profile_loader: self.profile_loader,
            _e: PhantomData,
            _s: PhantomData,
        }
    }

    pub fn with_element<H: HeatingElement + Send + 'static>(mut self, element: H) -> OvenBuilder<Set, S> {
        self.element = Some(Box::new(element));
        self.retype()
    }

    /// Cell published by a `TemperatureSensor` (or driven directly in tests).
    pub fn with_sensor(mut self, cell: Arc<SensorCell>) -> OvenBuilder<E, Set> {
        self.sensor = Some(cell);
        self.retype()
    }

    pub fn with_config(mut self, config: OvenConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_calibration(mut self, calibration: Calibration) -> Self {
        self.calibration = calibration;
        self
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn SessionRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn with_clock<C: Clock + Send + Sync + 'static>(mut self, clock: C) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Used to resolve the profile named in the restart snapshot.
    pub fn with_profile_loader<L: ProfileLoader + 'static>(mut self, loader: L) -> Self {
        self.profile_loader = Some(Box::new(loader));
        self
    }

    /// Validate and build regardless of type state.
    pub fn try_build(self) -> Result<Oven> {
        let element = self
            .element
            .ok_or_else(|| eyre::Report::new(BuildError::MissingElement))?;
        let sensor = self
            .sensor
            .ok_or_else(|| eyre::Report::new(BuildError::MissingSensor))?;
        validate(&self.config, &self.calibration)?;
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(MonotonicClock::new()));
        Ok(OvenController::from_parts(
            self.config,
            self.calibration,
            sensor,
            element,
            BestEffortRecorder::new(self.recorder),
            clock,
            self.profile_loader,
        ))
    }
}

impl OvenBuilder<Set, Set> {
    pub fn build(self) -> Result<Oven> {
        self.try_build()
    }
}
