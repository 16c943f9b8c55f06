//! Configuration types for the kiln controller.
//!
//! These are the runtime configuration structs used by `OvenController`.
//! They are separate from the TOML-deserialized config in `kiln_config`.

use std::path::PathBuf;
use std::time::Duration;

/// Temperature scale of every reading, setpoint and threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TempScale {
    #[default]
    Fahrenheit,
    Celsius,
}

impl TempScale {
    /// Corrected temperature below which cooldown capture stops.
    pub fn cooldown_threshold(self) -> f64 {
        match self {
            Self::Fahrenheit => 200.0,
            Self::Celsius => 93.0,
        }
    }

    /// Convert a Celsius value (thermocouple native unit) into this scale.
    pub fn from_celsius(self, c: f64) -> f64 {
        match self {
            Self::Fahrenheit => c * 9.0 / 5.0 + 32.0,
            Self::Celsius => c,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Fahrenheit => "F",
            Self::Celsius => "C",
        }
    }
}

/// Sensor sampling configuration.
#[derive(Debug, Clone)]
pub struct SensorCfg {
    /// Control cycle length in seconds.
    pub time_step_s: f64,
    /// Reads per control cycle; also the averaging window length.
    pub average_samples: usize,
    /// Short-to-ground / short-to-VCC readings count as good.
    pub ignore_short_errors: bool,
}

impl SensorCfg {
    pub fn time_step(&self) -> Duration {
        crate::util::secs(self.time_step_s)
    }
}

impl Default for SensorCfg {
    fn default() -> Self {
        Self {
            time_step_s: 2.0,
            average_samples: 10,
            ignore_short_errors: false,
        }
    }
}

/// PID gains and the error band in which they apply.
#[derive(Debug, Clone, Copy)]
pub struct PidCfg {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Outside `±control_window` degrees the output is forced to 0 or 1.
    pub control_window: f64,
}

impl Default for PidCfg {
    fn default() -> Self {
        Self {
            kp: 25.0,
            ki: 10.0,
            kd: 200.0,
            control_window: 10.0,
        }
    }
}

/// Emergency shutoff and per-fault ignore switches.
#[derive(Debug, Clone, Copy)]
pub struct SafetyCfg {
    pub emergency_shutoff_temp: f64,
    pub ignore_temp_too_high: bool,
    pub ignore_lost_connection: bool,
    pub ignore_unknown_error: bool,
    pub ignore_too_many_errors: bool,
    /// Abort once more than this percentage of reads in a window are bad.
    pub max_bad_percent: f64,
}

impl Default for SafetyCfg {
    fn default() -> Self {
        Self {
            emergency_shutoff_temp: 2264.0,
            ignore_temp_too_high: false,
            ignore_lost_connection: false,
            ignore_unknown_error: false,
            ignore_too_many_errors: false,
            max_bad_percent: 30.0,
        }
    }
}

/// Schedule corrections applied while running.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleCfg {
    pub kiln_must_catch_up: bool,
    /// 0 disables warmup skip.
    pub warmup_skip_threshold: f64,
}

impl Default for ScheduleCfg {
    fn default() -> Self {
        Self {
            kiln_must_catch_up: true,
            warmup_skip_threshold: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CostCfg {
    pub kwh_rate: f64,
    pub kw_elements: f64,
    pub currency: String,
}

impl Default for CostCfg {
    fn default() -> Self {
        Self {
            kwh_rate: 0.1319,
            kw_elements: 9.460,
            currency: "$".to_string(),
        }
    }
}

/// Automatic restart after an unexpected process exit.
#[derive(Debug, Clone)]
pub struct RestartCfg {
    pub enabled: bool,
    pub state_file: PathBuf,
    pub window_minutes: f64,
}

impl Default for RestartCfg {
    fn default() -> Self {
        Self {
            enabled: false,
            state_file: PathBuf::from("storage/state.json"),
            window_minutes: 15.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CooldownCfg {
    pub max_hours: f64,
}

impl CooldownCfg {
    pub fn max_duration_s(&self) -> f64 {
        self.max_hours * 3600.0
    }
}

impl Default for CooldownCfg {
    fn default() -> Self {
        Self { max_hours: 48.0 }
    }
}

/// Everything the controller needs, fixed at construction.
#[derive(Debug, Clone, Default)]
pub struct OvenConfig {
    pub temp_scale: TempScale,
    pub sensor: SensorCfg,
    pub pid: PidCfg,
    pub safety: SafetyCfg,
    pub schedule: ScheduleCfg,
    pub cost: CostCfg,
    pub restart: RestartCfg,
    pub cooldown: CooldownCfg,
}
