//! `From` implementations bridging `kiln_config` types to `kiln_core` types.

use crate::calibration::Calibration;
use crate::config::{
    CooldownCfg, CostCfg, OvenConfig, PidCfg, RestartCfg, SafetyCfg, ScheduleCfg, SensorCfg,
    TempScale,
};

// ── TempScale ────────────────────────────────────────────────────────────────

impl From<kiln_config::TempScale> for TempScale {
    fn from(s: kiln_config::TempScale) -> Self {
        match s {
            kiln_config::TempScale::Fahrenheit => Self::Fahrenheit,
            kiln_config::TempScale::Celsius => Self::Celsius,
        }
    }
}

// ── SensorCfg ────────────────────────────────────────────────────────────────

impl From<&kiln_config::SensorCfg> for SensorCfg {
    fn from(c: &kiln_config::SensorCfg) -> Self {
        Self {
            time_step_s: c.time_step_s,
            average_samples: c.average_samples,
            ignore_short_errors: c.ignore_short_errors,
        }
    }
}

// ── PidCfg ───────────────────────────────────────────────────────────────────

impl From<&kiln_config::PidCfg> for PidCfg {
    fn from(c: &kiln_config::PidCfg) -> Self {
        Self {
            kp: c.kp,
            ki: c.ki,
            kd: c.kd,
            control_window: c.control_window,
        }
    }
}

// ── SafetyCfg ────────────────────────────────────────────────────────────────

impl From<&kiln_config::Safety> for SafetyCfg {
    fn from(c: &kiln_config::Safety) -> Self {
        Self {
            emergency_shutoff_temp: c.emergency_shutoff_temp,
            ignore_temp_too_high: c.ignore_temp_too_high,
            ignore_lost_connection: c.ignore_lost_connection,
            ignore_unknown_error: c.ignore_unknown_error,
            ignore_too_many_errors: c.ignore_too_many_errors,
            max_bad_percent: c.max_bad_percent,
        }
    }
}

// ── ScheduleCfg ──────────────────────────────────────────────────────────────

impl From<&kiln_config::ScheduleCfg> for ScheduleCfg {
    fn from(c: &kiln_config::ScheduleCfg) -> Self {
        Self {
            kiln_must_catch_up: c.kiln_must_catch_up,
            warmup_skip_threshold: c.warmup_skip_threshold,
        }
    }
}

// ── CostCfg ──────────────────────────────────────────────────────────────────

impl From<&kiln_config::CostCfg> for CostCfg {
    fn from(c: &kiln_config::CostCfg) -> Self {
        Self {
            kwh_rate: c.kwh_rate,
            kw_elements: c.kw_elements,
            currency: c.currency.clone(),
        }
    }
}

// ── RestartCfg / CooldownCfg ─────────────────────────────────────────────────

impl From<&kiln_config::RestartCfg> for RestartCfg {
    fn from(c: &kiln_config::RestartCfg) -> Self {
        Self {
            enabled: c.enabled,
            state_file: c.state_file.clone(),
            window_minutes: c.window_minutes,
        }
    }
}

impl From<&kiln_config::CooldownCfg> for CooldownCfg {
    fn from(c: &kiln_config::CooldownCfg) -> Self {
        Self {
            max_hours: c.max_hours,
        }
    }
}

// ── OvenConfig ───────────────────────────────────────────────────────────────

impl From<&kiln_config::Config> for OvenConfig {
    fn from(c: &kiln_config::Config) -> Self {
        Self {
            temp_scale: c.temp_scale.into(),
            sensor: (&c.sensor).into(),
            pid: (&c.pid).into(),
            safety: (&c.safety).into(),
            schedule: (&c.schedule).into(),
            cost: (&c.cost).into(),
            restart: (&c.restart).into(),
            cooldown: (&c.cooldown).into(),
        }
    }
}

// ── Calibration ──────────────────────────────────────────────────────────────

impl From<&kiln_config::CalibrationCfg> for Calibration {
    fn from(c: &kiln_config::CalibrationCfg) -> Self {
        if c.table.is_empty() {
            Self::Flat(c.offset)
        } else {
            Self::Table(c.table.clone())
        }
    }
}
