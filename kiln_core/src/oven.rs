//! Kiln control loop and run state machine.
//!
//! `OvenController::cycle` is called repeatedly by the runner thread. While
//! RUNNING each call is one control interval: cost, schedule corrections,
//! PID, actuation (which blocks for `time_step`), one persisted sample, the
//! emergency checks and the end-of-schedule check. While IDLE a call tries an
//! automatic restart and otherwise advances the cooldown capture.

use std::sync::Arc;

use kiln_traits::HeatingElement;
use kiln_traits::clock::Clock;

use crate::calibration::Calibration;
use crate::config::OvenConfig;
use crate::cooldown::{CooldownCapture, CooldownTick};
use crate::error::{AbortReason, KilnError, Result};
use crate::hw_error::map_hw_error;
use crate::logger::LogOnce;
use crate::pid::Pid;
use crate::profile::{ProfileLoader, ScheduleProfile};
use crate::recorder::{BestEffortRecorder, Outcome};
use crate::restart::{RestartFile, Resume};
use crate::sensor::{SensorCell, SensorSnapshot};
use crate::state::{RunState, StateSnapshot};
use crate::status::CycleStatus;
use crate::util::unix_secs;

/// Per-run bookkeeping, cleared by `reset_run`.
#[derive(Debug, Default)]
struct RunData {
    state: RunState,
    profile: Option<ScheduleProfile>,
    cost: f64,
    runtime: f64,
    totaltime: f64,
    target: f64,
    heat: f64,
    /// Unix time the schedule is measured from; shifted by catch-up and warmup skip.
    start_ref: f64,
    /// Unix time the run actually started.
    wall_start: Option<f64>,
}

pub struct OvenController<E: HeatingElement> {
    cfg: OvenConfig,
    calibration: Calibration,
    sensor: Arc<SensorCell>,
    element: E,
    recorder: BestEffortRecorder,
    clock: Arc<dyn Clock + Send + Sync>,
    restart: RestartFile,
    profile_loader: Option<Box<dyn ProfileLoader>>,
    cooldown: CooldownCapture,
    log_once: LogOnce,
    pid: Pid,
    run: RunData,
    session_id: Option<String>,
}

impl<E: HeatingElement> core::fmt::Debug for OvenController<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OvenController")
            .field("state", &self.run.state)
            .field("profile", &self.run.profile.as_ref().map(ScheduleProfile::name))
            .field("runtime", &self.run.runtime)
            .field("session_id", &self.session_id)
            .finish()
    }
}

/// First set fault flag, in the order they are reported to the operator.
fn refusal_reason(s: &SensorSnapshot) -> Option<&'static str> {
    if s.no_connection {
        Some("thermocouple not connected")
    } else if s.short_to_ground {
        Some("thermocouple short to ground")
    } else if s.short_to_vcc {
        Some("thermocouple short to VCC")
    } else if s.unknown_error {
        Some("thermocouple unknown error")
    } else {
        None
    }
}

impl<E: HeatingElement> OvenController<E> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        cfg: OvenConfig,
        calibration: Calibration,
        sensor: Arc<SensorCell>,
        element: E,
        recorder: BestEffortRecorder,
        clock: Arc<dyn Clock + Send + Sync>,
        profile_loader: Option<Box<dyn ProfileLoader>>,
    ) -> Self {
        let pid = Pid::new(cfg.pid, cfg.sensor.time_step_s);
        let restart = RestartFile::new(&cfg.restart);
        Self {
            cfg,
            calibration,
            sensor,
            element,
            recorder,
            clock,
            restart,
            profile_loader,
            cooldown: CooldownCapture::new(),
            log_once: LogOnce::new(),
            pid,
            run: RunData::default(),
            session_id: None,
        }
    }

    pub fn state(&self) -> RunState {
        self.run.state
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn runtime(&self) -> f64 {
        self.run.runtime
    }

    pub fn target(&self) -> f64 {
        self.run.target
    }

    pub fn cost(&self) -> f64 {
        self.run.cost
    }

    pub fn profile(&self) -> Option<&ScheduleProfile> {
        self.run.profile.as_ref()
    }

    pub fn config(&self) -> &OvenConfig {
        &self.cfg
    }

    /// Shared handle to the cooldown capture, usable from other threads.
    pub fn cooldown(&self) -> CooldownCapture {
        self.cooldown.clone()
    }

    /// Corrected temperature as currently published by the sensor.
    pub fn temperature(&self) -> f64 {
        self.calibration.corrected(self.sensor.temperature())
    }

    /// Start `profile` at `start_at_minutes` into the schedule.
    ///
    /// Any active session is first finalized as ABORTED. The run is refused,
    /// leaving the controller IDLE, while any thermocouple fault flag is set.
    pub fn start_run(&mut self, profile: ScheduleProfile, start_at_minutes: f64) -> Result<()> {
        let now = self.clock.unix_time();
        if let Some(id) = self.session_id.take() {
            tracing::warn!(session_id = %id, "new run requested while a session is active");
            self.recorder.stop(&id, unix_secs(now), Outcome::Aborted);
        }
        self.reset_run();

        if let Some(reason) = refusal_reason(&self.sensor.snapshot()) {
            tracing::warn!(profile = profile.name(), reason, "refusing to start profile");
            return Err(eyre::Report::new(KilnError::StartRefused(
                reason.to_string(),
            )));
        }

        let start_at = if start_at_minutes.is_finite() {
            start_at_minutes.max(0.0)
        } else {
            0.0
        };
        self.run.runtime = start_at * 60.0;
        self.run.start_ref = now - self.run.runtime;
        self.run.wall_start = Some(now);
        self.run.totaltime = profile.duration();
        self.run.state = RunState::Running;
        self.cooldown.cancel();
        tracing::info!(
            profile = profile.name(),
            start_at_minutes = start_at,
            totaltime = self.run.totaltime,
            "running schedule"
        );
        self.session_id = self.recorder.create(profile.name(), unix_secs(now));
        self.run.profile = Some(profile);
        Ok(())
    }

    /// One loop iteration; see the module docs.
    pub fn cycle(&mut self) -> CycleStatus {
        match self.run.state {
            RunState::Running => self.running_cycle(),
            RunState::Idle => self.idle_cycle(),
        }
    }

    /// Stop the current run (if any) with `outcome`, cancel cooldown capture
    /// and turn the heater off.
    pub fn abort_run(&mut self, outcome: Outcome) {
        let now = self.clock.unix_time();
        self.cooldown.cancel();
        if let Some(id) = self.session_id.take() {
            self.recorder.stop(&id, unix_secs(now), outcome);
        }
        self.reset_run();
        self.save_restart_state();
    }

    /// Manual stop of cooldown capture; see `CooldownCapture::stop`.
    pub fn stop_cooldown_capture(&self, session_id: Option<&str>) -> bool {
        self.cooldown.stop(session_id)
    }

    /// Process shutdown: an active run ends as ABORTED, the heater is turned off.
    pub fn shutdown(&mut self) {
        if self.run.state == RunState::Running {
            tracing::warn!("shutting down with a run in progress");
            self.abort_run(Outcome::Aborted);
        } else {
            self.heater_off();
        }
    }

    pub fn snapshot(&self) -> StateSnapshot {
        let now = self.clock.unix_time();
        let mut s = self.snapshot_base(now, self.temperature());
        if let Some((id, elapsed)) = self.cooldown.status(now) {
            s.cooldown_capture = true;
            s.cooldown_elapsed = Some(elapsed);
            s.cooldown_session_id = Some(id);
        }
        s
    }

    fn snapshot_base(&self, now: f64, temperature: f64) -> StateSnapshot {
        StateSnapshot {
            cost: self.run.cost,
            runtime: self.run.runtime,
            elapsed: self.run.wall_start.map_or(0.0, |w| (now - w).max(0.0)),
            temperature,
            target: self.run.target,
            state: self.run.state,
            heat: self.run.heat,
            totaltime: self.run.totaltime,
            kwh_rate: self.cfg.cost.kwh_rate,
            currency_type: self.cfg.cost.currency.clone(),
            profile: self.run.profile.as_ref().map(|p| p.name().to_string()),
            pidstats: self.pid.stats(),
            cooldown_capture: false,
            cooldown_elapsed: None,
            cooldown_session_id: None,
        }
    }

    fn running_cycle(&mut self) -> CycleStatus {
        let now = self.clock.unix_time();
        self.update_cost();

        let temp = self.temperature();
        if self.cfg.schedule.kiln_must_catch_up {
            self.catch_up(now, temp);
        }
        self.run.runtime = (now - self.run.start_ref).max(0.0);
        let Some(profile) = self.run.profile.as_ref() else {
            tracing::error!("running without a profile, returning to idle");
            self.abort_run(Outcome::Error);
            return CycleStatus::Idle;
        };
        self.run.target = profile.target_temperature(self.run.runtime);

        let time_step = self.cfg.sensor.time_step_s;
        let duty = self.pid.compute(self.run.target, temp, now);
        self.run.heat = duty * time_step;
        tracing::info!(
            temp,
            target = self.run.target,
            error = self.pid.stats().err,
            duty,
            heat_on = self.run.heat,
            heat_off = time_step - self.run.heat,
            runtime = self.run.runtime,
            totaltime = self.run.totaltime,
            time_left = self.run.totaltime - self.run.runtime,
            "control cycle"
        );

        if let Err(e) = self.element.actuate(duty, self.cfg.sensor.time_step()) {
            let err = map_hw_error(&*e);
            tracing::error!(error = %err, "heating element failed, aborting run");
            self.abort_run(Outcome::Error);
            return CycleStatus::Aborted(AbortReason::Actuator(err.to_string()));
        }

        let after = self.clock.unix_time();
        if let Some(id) = self.session_id.as_deref() {
            self.recorder
                .sample(id, &self.snapshot(), unix_secs(after));
        }

        if let Some(reason) = self.emergency() {
            self.abort_run(Outcome::Error);
            return CycleStatus::Aborted(reason);
        }

        if self.run.runtime > self.run.totaltime {
            return self.complete_run(after);
        }

        self.save_restart_state();
        CycleStatus::Running
    }

    fn update_cost(&mut self) {
        if self.run.heat > 0.0 {
            let c = &self.cfg.cost;
            self.run.cost += c.kwh_rate * c.kw_elements * (self.run.heat / 3600.0);
        }
    }

    /// Hold the schedule while the kiln is outside the control window, or
    /// jump ahead (warmup skip) when it is already warmer than the schedule.
    fn catch_up(&mut self, now: f64, temp: f64) {
        let window = self.cfg.pid.control_window;
        let target = self.run.target;
        let runtime = self.run.runtime;

        if target - temp > window {
            tracing::info!(temp, target, "kiln must catch up, too cold, shifting schedule");
            self.run.start_ref = now - runtime;
        }
        if temp - target > window {
            let threshold = self.cfg.schedule.warmup_skip_threshold;
            if threshold > 0.0 && temp < threshold && target < threshold {
                let skip_to = self
                    .run
                    .profile
                    .as_ref()
                    .and_then(|p| p.find_time_for_temperature(temp, runtime));
                if let Some(skip_to) = skip_to
                    && skip_to > runtime
                {
                    tracing::info!(
                        from = runtime,
                        to = skip_to,
                        temp,
                        old_target = target,
                        "warmup skip"
                    );
                    self.run.start_ref = now - skip_to;
                    self.pid.reset_integral();
                    return;
                }
            }
            tracing::info!(temp, target, "kiln must catch up, too hot, shifting schedule");
            self.run.start_ref = now - runtime;
        }
    }

    /// Every tripped condition is logged; the first one not ignored aborts.
    fn emergency(&self) -> Option<AbortReason> {
        let s = self.sensor.snapshot();
        let temp = self.calibration.corrected(s.temperature);
        let safety = &self.cfg.safety;
        let mut fatal = None;
        let mut check = |hit: bool, ignored: bool, reason: AbortReason| {
            if hit {
                tracing::error!(%reason, ignored, temp, bad_percent = s.bad_percent, "emergency");
                if !ignored && fatal.is_none() {
                    fatal = Some(reason);
                }
            }
        };
        check(
            temp >= safety.emergency_shutoff_temp,
            safety.ignore_temp_too_high,
            AbortReason::TempTooHigh,
        );
        check(
            s.no_connection,
            safety.ignore_lost_connection,
            AbortReason::LostConnection,
        );
        check(
            s.unknown_error,
            safety.ignore_unknown_error,
            AbortReason::UnknownError,
        );
        check(
            s.bad_percent > safety.max_bad_percent,
            safety.ignore_too_many_errors,
            AbortReason::TooManyErrors,
        );
        fatal
    }

    fn complete_run(&mut self, now: f64) -> CycleStatus {
        tracing::info!(
            cost = self.run.cost,
            currency = %self.cfg.cost.currency,
            "schedule ended, shutting down"
        );
        let session_id = self.session_id.take();
        if let Some(id) = session_id.as_deref() {
            self.recorder.stop(id, unix_secs(now), Outcome::Completed);
            self.cooldown
                .start(id, now, self.cfg.cooldown.max_duration_s());
        }
        self.reset_run();
        self.save_restart_state();
        CycleStatus::Completed { session_id }
    }

    fn idle_cycle(&mut self) -> CycleStatus {
        let now = self.clock.unix_time();
        if self.try_automatic_restart(now) {
            return CycleStatus::Running;
        }

        let temp = self.temperature();
        let threshold = self.cfg.temp_scale.cooldown_threshold();
        let base = self.snapshot_base(now, temp);
        let recorder = &self.recorder;
        let tick = self.cooldown.tick(now, temp, threshold, |view| {
            let mut snap = base;
            snap.cooldown_capture = true;
            snap.cooldown_elapsed = Some(view.elapsed);
            snap.cooldown_session_id = Some(view.session_id.to_string());
            recorder.sample(view.session_id, &snap, unix_secs(now));
        });
        match tick {
            CooldownTick::Inactive | CooldownTick::Expired => CycleStatus::Idle,
            CooldownTick::Sampled { final_sample } => CycleStatus::CoolingDown { final_sample },
        }
    }

    /// Resume a run recorded in the restart file, restoring its cost.
    fn try_automatic_restart(&mut self, now: f64) -> bool {
        if !self.restart.is_enabled() {
            return false;
        }
        let Resume {
            profile: name,
            snapshot: snap,
        } = match self.restart.resumable(now) {
            Ok(r) => {
                self.log_once.clear("restart.unavailable");
                r
            }
            Err(reason) => {
                if self.log_once.first("restart.unavailable") {
                    tracing::info!(%reason, "automatic restart not possible");
                }
                return false;
            }
        };
        let Some(loader) = self.profile_loader.as_ref() else {
            if self.log_once.first("restart.no_loader") {
                tracing::warn!("automatic restart requested but no profile loader is configured");
            }
            return false;
        };
        let profile = match loader.load(&name) {
            Ok(p) => p,
            Err(e) => {
                if self.log_once.first("restart.profile") {
                    tracing::error!(profile = %name, error = %e, "automatic restart failed to load profile");
                }
                return false;
            }
        };
        let start_at = snap.runtime / 60.0;
        tracing::info!(profile = %name, start_at_minutes = start_at, "automatically restarting profile");
        match self.start_run(profile, start_at) {
            Ok(()) => {
                self.run.cost = snap.cost;
                self.log_once.clear("restart.refused");
                true
            }
            Err(e) => {
                if self.log_once.first("restart.refused") {
                    tracing::warn!(error = %e, "automatic restart refused");
                }
                false
            }
        }
    }

    fn reset_run(&mut self) {
        self.run = RunData::default();
        self.pid.reset();
        self.heater_off();
    }

    fn heater_off(&mut self) {
        if let Err(e) = self.element.off() {
            tracing::warn!(error = %map_hw_error(&*e), "heater off failed");
        }
    }

    fn save_restart_state(&self) {
        match self.restart.save(&self.snapshot()) {
            Ok(()) => self.log_once.clear("restart.save"),
            Err(e) => {
                if self.log_once.first("restart.save") {
                    tracing::error!(error = %e, "saving restart state failed");
                }
            }
        }
    }
}
