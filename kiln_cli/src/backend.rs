//! Hardware assembly: simulated kiln or real MAX31855 + relay.

use eyre::Result;
use kiln_config::Config;
use kiln_hardware::{ScaledClock, SimParams, SimulatedKiln};
use kiln_traits::{HeatingElement, Thermocouple};

/// Thermocouple, element and the clock everything must share.
pub struct Backend {
    pub thermocouple: Box<dyn Thermocouple + Send>,
    pub element: Box<dyn HeatingElement + Send>,
    pub clock: ScaledClock,
    pub kind: &'static str,
}

pub fn sim_params(cfg: &kiln_config::SimulationCfg) -> SimParams {
    SimParams {
        t_env: cfg.t_env,
        c_heat: cfg.c_heat,
        c_oven: cfg.c_oven,
        p_heat: cfg.p_heat,
        r_o_nocool: cfg.r_o_nocool,
        r_ho_noair: cfg.r_ho_noair,
    }
}

pub fn build(cfg: &Config) -> Result<Backend> {
    if cfg.simulation.enabled {
        let clock = ScaledClock::new(cfg.simulation.speedup);
        let kiln = SimulatedKiln::new(sim_params(&cfg.simulation));
        tracing::info!(speedup = clock.factor(), "using simulated kiln");
        return Ok(Backend {
            thermocouple: Box::new(kiln.thermocouple()),
            element: Box::new(kiln.element(clock)),
            clock,
            kind: "simulation",
        });
    }
    hardware(cfg)
}

#[cfg(feature = "hardware")]
fn hardware(cfg: &Config) -> Result<Backend> {
    use kiln_hardware::{GpioElement, Max31855};

    let pin = |v: Option<u8>, name: &str| {
        v.ok_or_else(|| eyre::eyre!("pin {name} missing in [pins]"))
    };
    let cs = pin(cfg.pins.sensor_cs, "sensor_cs")?;
    let clk = pin(cfg.pins.sensor_clock, "sensor_clock")?;
    let data = pin(cfg.pins.sensor_data, "sensor_data")?;
    let heat = pin(cfg.pins.heat, "heat")?;
    let fahrenheit = cfg.temp_scale == kiln_config::TempScale::Fahrenheit;

    let thermocouple = Max31855::new(cs, clk, data, fahrenheit)
        .map_err(|e| eyre::Report::new(e).wrap_err("open MAX31855 pins"))?;
    let element =
        GpioElement::new(heat).map_err(|e| eyre::Report::new(e).wrap_err("open heat pin"))?;
    tracing::info!(cs, clk, data, heat, "using MAX31855 and relay element");
    Ok(Backend {
        thermocouple: Box::new(thermocouple),
        element: Box::new(element),
        clock: ScaledClock::new(1.0),
        kind: "hardware",
    })
}

#[cfg(not(feature = "hardware"))]
fn hardware(_cfg: &Config) -> Result<Backend> {
    eyre::bail!(
        "simulation.enabled is false but this build has no hardware backend; rebuild with --features hardware"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_backend_reads_environment_temperature() {
        let cfg = kiln_config::load_toml("[simulation]\nt_env = 70.0\nspeedup = 50.0\n")
            .expect("config");
        let mut b = build(&cfg).expect("backend");
        assert_eq!(b.kind, "simulation");
        assert_eq!(b.clock.factor(), 50.0);
        let r = b.thermocouple.read().expect("read");
        assert_eq!(r.temperature, 70.0);
        assert!(!r.any_fault());
    }

    #[cfg(not(feature = "hardware"))]
    #[test]
    fn disabled_simulation_needs_hardware_feature() {
        let cfg = kiln_config::load_toml("[simulation]\nenabled = false\n").expect("config");
        let err = build(&cfg).err().expect("no backend");
        assert!(err.to_string().contains("--features hardware"));
    }
}
