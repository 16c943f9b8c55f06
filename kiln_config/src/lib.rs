#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas, calibration table parsing and profile loading for the kiln controller.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Calibration CSV loader enforces headers and a strictly increasing temperature column.
//! - Firing profiles are JSON documents `{ "name": ..., "data": [[seconds, temp], ...] }`.
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Calibration CSV schema.
///
/// Expected headers:
/// temp,offset
///
/// Example:
/// temp,offset
/// 0,0.0
/// 1000,4.5
/// 2300,12.0
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct CalibrationRow {
    pub temp: f64,
    pub offset: f64,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub enum TempScale {
    #[default]
    #[serde(rename = "f", alias = "F")]
    Fahrenheit,
    #[serde(rename = "c", alias = "C")]
    Celsius,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Pins {
    pub sensor_cs: Option<u8>,
    pub sensor_clock: Option<u8>,
    pub sensor_data: Option<u8>,
    pub heat: Option<u8>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SensorCfg {
    /// Control cycle length in seconds; the sensor takes `average_samples` reads per cycle.
    pub time_step_s: f64,
    pub average_samples: usize,
    /// Treat short-to-ground / short-to-VCC as good readings.
    pub ignore_short_errors: bool,
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

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PidCfg {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Error magnitude (degrees) inside which PID math applies.
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

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Safety {
    pub emergency_shutoff_temp: f64,
    pub ignore_temp_too_high: bool,
    pub ignore_lost_connection: bool,
    pub ignore_unknown_error: bool,
    pub ignore_too_many_errors: bool,
    /// Bad-read percentage over the last two time steps that aborts a run.
    pub max_bad_percent: f64,
}

impl Default for Safety {
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

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct CalibrationCfg {
    /// Flat offset added to every reading when no table is configured.
    pub offset: f64,
    /// Optional correction table of `[temp, offset]` pairs, interpolated linearly.
    pub table: Vec<(f64, f64)>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ScheduleCfg {
    /// Hold schedule time while the kiln is outside the control window.
    pub kiln_must_catch_up: bool,
    /// Below this temperature an overshooting kiln jumps the schedule forward
    /// instead of waiting to cool. 0 disables.
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

#[derive(Debug, Deserialize)]
#[serde(default)]
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

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RestartCfg {
    pub enabled: bool,
    pub state_file: PathBuf,
    /// Maximum state file age (minutes) for a resume to be attempted.
    pub window_minutes: f64,
    /// Directory holding `<profile name>.json` files for resumed runs.
    pub profiles_dir: PathBuf,
}

impl Default for RestartCfg {
    fn default() -> Self {
        Self {
            enabled: true,
            state_file: PathBuf::from("storage/state.json"),
            window_minutes: 15.0,
            profiles_dir: PathBuf::from("storage/profiles"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CooldownCfg {
    /// Safety cap on post-run sampling.
    pub max_hours: f64,
}

impl Default for CooldownCfg {
    fn default() -> Self {
        Self { max_hours: 48.0 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageCfg {
    pub db_path: PathBuf,
}

impl Default for StorageCfg {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("storage/kiln.sqlite3"),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

/// Parameters of the two-node thermal model used when no hardware is present.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SimulationCfg {
    pub enabled: bool,
    /// Environment temperature (°C).
    pub t_env: f64,
    /// Heat capacity of the element (J/K).
    pub c_heat: f64,
    /// Heat capacity of the oven chamber (J/K).
    pub c_oven: f64,
    /// Element power (W).
    pub p_heat: f64,
    /// Thermal resistance oven → environment (K/W).
    pub r_o_nocool: f64,
    /// Thermal resistance element → oven (K/W).
    pub r_ho_noair: f64,
    /// Wall-clock speedup; 1.0 runs in real time.
    pub speedup: f64,
}

impl Default for SimulationCfg {
    fn default() -> Self {
        Self {
            enabled: true,
            t_env: 65.0,
            c_heat: 500.0,
            c_oven: 5000.0,
            p_heat: 5450.0,
            r_o_nocool: 0.5,
            r_ho_noair: 0.1,
            speedup: 1.0,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub temp_scale: TempScale,
    #[serde(default)]
    pub pins: Pins,
    #[serde(default)]
    pub sensor: SensorCfg,
    #[serde(default)]
    pub pid: PidCfg,
    #[serde(default)]
    pub safety: Safety,
    #[serde(default)]
    pub calibration: CalibrationCfg,
    #[serde(default)]
    pub schedule: ScheduleCfg,
    #[serde(default)]
    pub cost: CostCfg,
    #[serde(default)]
    pub restart: RestartCfg,
    #[serde(default)]
    pub cooldown: CooldownCfg,
    #[serde(default)]
    pub storage: StorageCfg,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub simulation: SimulationCfg,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read and parse a TOML config file.
pub fn load_file(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {:?}: {}", path, e))?;
    load_toml(&text).map_err(|e| eyre::eyre!("parse config {:?}: {}", path, e))
}

/// Check that correction-table temperatures are finite and strictly increasing.
pub fn check_calibration_table(table: &[(f64, f64)]) -> eyre::Result<()> {
    for (i, (t, o)) in table.iter().enumerate() {
        if !t.is_finite() || !o.is_finite() {
            eyre::bail!("calibration table row {} is not finite", i);
        }
    }
    for i in 1..table.len() {
        if table[i].0 <= table[i - 1].0 {
            eyre::bail!(
                "calibration temps must be strictly increasing (rows {} and {})",
                i - 1,
                i
            );
        }
    }
    Ok(())
}

pub fn load_calibration_csv(path: &Path) -> eyre::Result<Vec<(f64, f64)>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open calibration CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["temp", "offset"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "calibration CSV must have headers 'temp,offset', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<CalibrationRow>().enumerate() {
        match rec {
            Ok(row) => rows.push((row.temp, row.offset)),
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }
    if rows.is_empty() {
        eyre::bail!("calibration CSV {:?} has no rows", path);
    }
    check_calibration_table(&rows)?;
    Ok(rows)
}

/// Firing profile as stored on disk.
#[derive(Debug, Deserialize, Clone)]
pub struct ProfileFile {
    pub name: String,
    /// `[seconds, temperature]` pairs, any order.
    pub data: Vec<(f64, f64)>,
}

pub fn parse_profile_json(s: &str) -> eyre::Result<ProfileFile> {
    let p: ProfileFile =
        serde_json::from_str(s).map_err(|e| eyre::eyre!("invalid profile JSON: {}", e))?;
    if p.data.len() < 2 {
        eyre::bail!(
            "profile '{}' needs at least two points, got {}",
            p.name,
            p.data.len()
        );
    }
    Ok(p)
}

pub fn load_profile_file(path: &Path) -> eyre::Result<ProfileFile> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read profile {:?}: {}", path, e))?;
    parse_profile_json(&text)
}

/// Resolve `<dir>/<name>.json` and load it.
pub fn load_profile_by_name(dir: &Path, name: &str) -> eyre::Result<ProfileFile> {
    if name.is_empty() || name.contains(['/', '\\']) || name == ".." {
        eyre::bail!("invalid profile name '{}'", name);
    }
    load_profile_file(&dir.join(format!("{name}.json")))
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Sensor
        if !(self.sensor.time_step_s.is_finite() && self.sensor.time_step_s > 0.0) {
            eyre::bail!("sensor.time_step_s must be > 0");
        }
        if self.sensor.average_samples == 0 {
            eyre::bail!("sensor.average_samples must be >= 1");
        }
        if self.sensor.average_samples > 1000 {
            eyre::bail!("sensor.average_samples is unreasonably large (>1000)");
        }

        // PID
        for (name, v) in [
            ("pid.kp", self.pid.kp),
            ("pid.ki", self.pid.ki),
            ("pid.kd", self.pid.kd),
        ] {
            if !v.is_finite() || v.is_sign_negative() {
                eyre::bail!("{name} must be a finite value >= 0");
            }
        }
        if self.pid.ki == 0.0 {
            eyre::bail!("pid.ki must be > 0 (integral term divides by ki)");
        }
        if !(self.pid.control_window.is_finite() && self.pid.control_window > 0.0) {
            eyre::bail!("pid.control_window must be > 0");
        }

        // Safety
        if !self.safety.emergency_shutoff_temp.is_finite() {
            eyre::bail!("safety.emergency_shutoff_temp must be finite");
        }
        if !(0.0..=100.0).contains(&self.safety.max_bad_percent) {
            eyre::bail!("safety.max_bad_percent must be between 0 and 100");
        }

        // Calibration
        if !self.calibration.offset.is_finite() {
            eyre::bail!("calibration.offset must be finite");
        }
        check_calibration_table(&self.calibration.table)?;

        // Schedule
        if self.schedule.warmup_skip_threshold < 0.0 {
            eyre::bail!("schedule.warmup_skip_threshold must be >= 0");
        }

        // Cost
        if self.cost.kwh_rate < 0.0 || self.cost.kw_elements < 0.0 {
            eyre::bail!("cost.kwh_rate and cost.kw_elements must be >= 0");
        }

        // Restart
        if self.restart.window_minutes < 0.0 {
            eyre::bail!("restart.window_minutes must be >= 0");
        }

        // Cooldown
        if !(self.cooldown.max_hours.is_finite() && self.cooldown.max_hours > 0.0) {
            eyre::bail!("cooldown.max_hours must be > 0");
        }

        // Simulation
        if self.simulation.enabled {
            let s = &self.simulation;
            if s.c_heat <= 0.0 || s.c_oven <= 0.0 {
                eyre::bail!("simulation heat capacities must be > 0");
            }
            if s.r_o_nocool <= 0.0 || s.r_ho_noair <= 0.0 {
                eyre::bail!("simulation thermal resistances must be > 0");
            }
            if !(s.speedup.is_finite() && s.speedup > 0.0) {
                eyre::bail!("simulation.speedup must be > 0");
            }
        }

        Ok(())
    }
}
