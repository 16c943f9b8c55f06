//! Simulated kiln: heating element and chamber as two thermal masses.
//!
//! Each actuation interval the element gains `p_heat × duty × dt` joules,
//! passes heat to the chamber through `r_ho_noair`, and the chamber loses
//! heat to the environment through `r_o_nocool`. Temperatures use whatever
//! scale the parameters are expressed in.

use kiln_traits::clock::Clock;
use kiln_traits::{BoxError, HeatingElement, Thermocouple, ThermocoupleReading};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimParams {
    /// Environment temperature; both masses start here.
    pub t_env: f64,
    /// Heat capacity of the element.
    pub c_heat: f64,
    /// Heat capacity of the chamber.
    pub c_oven: f64,
    /// Element power in watts.
    pub p_heat: f64,
    /// Thermal resistance chamber → environment.
    pub r_o_nocool: f64,
    /// Thermal resistance element → chamber.
    pub r_ho_noair: f64,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            t_env: 65.0,
            c_heat: 500.0,
            c_oven: 5000.0,
            p_heat: 5450.0,
            r_o_nocool: 0.5,
            r_ho_noair: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Temps {
    chamber: f64,
    element: f64,
}

/// Shared model state; clone to hand the same kiln to a sensor and an element.
#[derive(Debug, Clone)]
pub struct SimulatedKiln {
    params: SimParams,
    temps: Arc<Mutex<Temps>>,
}

impl SimulatedKiln {
    pub fn new(params: SimParams) -> Self {
        Self {
            params,
            temps: Arc::new(Mutex::new(Temps {
                chamber: params.t_env,
                element: params.t_env,
            })),
        }
    }

    pub fn params(&self) -> SimParams {
        self.params
    }

    /// Chamber temperature, which is what the thermocouple sees.
    pub fn temperature(&self) -> f64 {
        self.lock().chamber
    }

    pub fn element_temperature(&self) -> f64 {
        self.lock().element
    }

    /// Advance the model by `dt` seconds with the element on for `duty` of it.
    pub fn step(&self, duty: f64, dt: f64) {
        let p = &self.params;
        let duty = duty.clamp(0.0, 1.0);
        let mut t = self.lock();

        t.element += p.p_heat * dt * duty / p.c_heat;
        let p_ho = (t.element - t.chamber) / p.r_ho_noair;
        t.chamber += p_ho * dt / p.c_oven;
        t.element -= p_ho * dt / p.c_heat;
        let p_env = (t.chamber - p.t_env) / p.r_o_nocool;
        t.chamber -= p_env * dt / p.c_oven;

        tracing::debug!(
            heater_w = p.p_heat * duty,
            element = t.element,
            to_oven_w = p_ho,
            chamber = t.chamber,
            to_env_w = p_env,
            "simulation step"
        );
    }

    pub fn thermocouple(&self) -> SimThermocouple {
        SimThermocouple { kiln: self.clone() }
    }

    /// Element that sleeps each interval on `clock`.
    pub fn element<C: Clock + Send + Sync + 'static>(&self, clock: C) -> SimElement {
        SimElement {
            kiln: self.clone(),
            clock: Arc::new(clock),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Temps> {
        self.temps.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Reads the chamber temperature; never reports a fault.
#[derive(Debug, Clone)]
pub struct SimThermocouple {
    kiln: SimulatedKiln,
}

impl Thermocouple for SimThermocouple {
    fn read(&mut self) -> Result<ThermocoupleReading, BoxError> {
        Ok(ThermocoupleReading::ok(self.kiln.temperature()))
    }
}

pub struct SimElement {
    kiln: SimulatedKiln,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl std::fmt::Debug for SimElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimElement").field("kiln", &self.kiln).finish()
    }
}

impl HeatingElement for SimElement {
    fn actuate(&mut self, duty: f64, interval: Duration) -> Result<(), BoxError> {
        self.kiln.step(duty, interval.as_secs_f64());
        self.clock.sleep(interval);
        Ok(())
    }

    fn off(&mut self) -> Result<(), BoxError> {
        Ok(())
    }
}
