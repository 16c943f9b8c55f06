#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Thermocouple and heating element implementations.
//!
//! - `sim`: two-node thermal model standing in for a real kiln
//! - `clock`: wall clock that runs faster than real time for simulations
//! - `max31855`: frame decoding, plus a bit-banged GPIO driver behind `hardware`
//! - `gpio`: relay-driven heating element behind `hardware`

pub mod clock;
pub mod error;
#[cfg(feature = "hardware")]
pub mod gpio;
pub mod max31855;
pub mod sim;

pub use clock::ScaledClock;
pub use error::HwError;
pub use sim::{SimElement, SimParams, SimThermocouple, SimulatedKiln};

#[cfg(feature = "hardware")]
pub use gpio::GpioElement;
#[cfg(feature = "hardware")]
pub use max31855::Max31855;
