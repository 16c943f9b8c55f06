//! Firing: controller assembly from config and the `run` loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use kiln_core::error::{AbortReason, KilnError, Result as CoreResult};
use kiln_core::{
    Calibration, CycleStatus, DirProfileLoader, Oven, OvenConfig, OvenRunner, ProfileLoader,
    RunState, TemperatureSensor,
};
use kiln_store::KilnStore;

use crate::backend::Backend;
use crate::cli::LAST_SHUTOFF;

/// How often the run loop wakes up to check for Ctrl-C.
const POLL: Duration = Duration::from_millis(100);

pub struct FireParams<'a> {
    pub profile: Option<&'a str>,
    pub start_at_minutes: f64,
    pub max_cycles: Option<u64>,
    pub follow_cooldown: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FiringSummary {
    pub outcome: &'static str,
    pub session_id: Option<String>,
    pub profile: Option<String>,
    pub cycles: u64,
    pub runtime_s: f64,
    pub cost: f64,
    pub currency: String,
    pub temperature: f64,
}

impl FiringSummary {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "outcome": self.outcome,
            "session_id": self.session_id,
            "profile": self.profile,
            "cycles": self.cycles,
            "runtime_s": self.runtime_s,
            "cost": self.cost,
            "currency": self.currency,
            "temperature": self.temperature,
        })
    }
}

/// Wire the backend, sensor thread, store and profile loader into an `Oven`.
pub fn build_oven(
    cfg: &kiln_config::Config,
    calibration: Calibration,
    store: Arc<KilnStore>,
    backend: Backend,
) -> CoreResult<(Oven, TemperatureSensor)> {
    let oven_cfg = OvenConfig::from(cfg);
    let _ = LAST_SHUTOFF.set(oven_cfg.safety.emergency_shutoff_temp);
    let sensor = TemperatureSensor::spawn(backend.thermocouple, &oven_cfg.sensor, backend.clock);
    let oven = Oven::builder()
        .with_element(backend.element)
        .with_sensor(sensor.cell())
        .with_config(oven_cfg)
        .with_calibration(calibration)
        .with_recorder(store)
        .with_clock(backend.clock)
        .with_profile_loader(DirProfileLoader::new(cfg.restart.profiles_dir.clone()))
        .build()?;
    Ok((oven, sensor))
}

/// Run the control loop until the schedule ends, aborts, `max_cycles` is
/// reached or `shutdown` is raised.
pub fn run_firing(
    cfg: &kiln_config::Config,
    oven: Oven,
    params: &FireParams<'_>,
    shutdown: &AtomicBool,
) -> CoreResult<FiringSummary> {
    let profile = params
        .profile
        .map(|name| DirProfileLoader::new(cfg.restart.profiles_dir.clone()).load(name))
        .transpose()?;

    let handle = OvenRunner::spawn(oven);
    if let Some(p) = profile {
        tracing::info!(profile = p.name(), start_at = params.start_at_minutes, "fire start");
        handle.start(p, params.start_at_minutes)?;
    } else {
        tracing::info!("no profile given, waiting for an interrupted run to resume");
    }

    let mut summary = FiringSummary::default();
    let mut completed = false;
    loop {
        if shutdown.load(Ordering::Relaxed) {
            if completed {
                handle.stop_cooldown_capture(summary.session_id.as_deref());
                break;
            }
            tracing::warn!("interrupted, aborting run");
            handle.abort()?;
            return Err(KilnError::Abort(AbortReason::Operator).into());
        }

        let status = match handle.statuses().recv_timeout(POLL) {
            Ok(s) => s,
            Err(e) if e.is_timeout() => continue,
            Err(_) => {
                return Err(KilnError::State("control thread exited".into()).into());
            }
        };

        match status {
            CycleStatus::Running => {
                summary.cycles += 1;
                let snap = handle.snapshot();
                // the run data is reset once the schedule ends
                if snap.state == RunState::Running {
                    fill(&mut summary, &snap);
                }
                if params.max_cycles.is_some_and(|n| summary.cycles >= n) {
                    tracing::info!(cycles = summary.cycles, "cycle limit reached, stopping run");
                    handle.abort()?;
                    summary.outcome = "ABORTED";
                    return Ok(summary);
                }
            }
            CycleStatus::Completed { session_id } => {
                summary.cycles += 1;
                summary.temperature = handle.snapshot().temperature;
                summary.outcome = "COMPLETED";
                summary.session_id = session_id;
                tracing::info!(session_id = ?summary.session_id, "firing complete");
                if !(params.follow_cooldown && summary.session_id.is_some()) {
                    break;
                }
                completed = true;
            }
            CycleStatus::CoolingDown { final_sample } => {
                if final_sample {
                    tracing::info!("cooldown capture finished");
                    break;
                }
            }
            CycleStatus::Aborted(reason) => {
                tracing::error!(error = %reason, "firing aborted");
                return Err(KilnError::Abort(reason).into());
            }
            CycleStatus::Idle => {}
        }
    }
    Ok(summary)
}

fn fill(summary: &mut FiringSummary, snap: &kiln_core::StateSnapshot) {
    summary.profile.clone_from(&snap.profile);
    summary.runtime_s = snap.runtime;
    summary.cost = snap.cost;
    summary.currency.clone_from(&snap.currency_type);
    summary.temperature = snap.temperature;
}
