#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core kiln control logic (hardware-agnostic).
//!
//! All hardware interactions go through the `kiln_traits::Thermocouple` and
//! `kiln_traits::HeatingElement` traits; persistence goes through
//! `recorder::SessionRecorder`.
//!
//! ## Architecture
//!
//! - **Sensor**: background sampling thread with trimmed averaging and fault flags (`sensor`)
//! - **Schedule**: piecewise-linear firing profile (`profile`)
//! - **Control**: windowed PID producing an on/off duty (`pid`)
//! - **State machine**: idle → running → completed → cooldown capture (`oven`)
//! - **Persistence**: best-effort session recording (`recorder`) and restart snapshot (`restart`)
//! - **Threading**: control loop thread with a command channel (`runner`)

pub mod atomic;
pub mod builder;
pub mod calibration;
pub mod config;
pub mod conversions;
pub mod cooldown;
pub mod error;
pub mod hw_error;
pub mod logger;
pub mod mocks;
pub mod oven;
pub mod pid;
pub mod profile;
pub mod recorder;
pub mod restart;
pub mod runner;
pub mod sensor;
pub mod state;
pub mod status;
pub mod util;

pub use builder::{Oven, OvenBuilder};
pub use calibration::Calibration;
pub use config::{
    CooldownCfg, CostCfg, OvenConfig, PidCfg, RestartCfg, SafetyCfg, ScheduleCfg, SensorCfg,
    TempScale,
};
pub use error::{AbortReason, BuildError, KilnError};
pub use oven::OvenController;
pub use profile::{DirProfileLoader, ProfileLoader, ScheduleProfile};
pub use recorder::{Outcome, SessionRecorder};
pub use runner::{OvenHandle, OvenRunner, STATUS_CAPACITY};
pub use sensor::{SensorCell, TemperatureSensor};
pub use state::{RunState, StateSnapshot};
pub use status::CycleStatus;
