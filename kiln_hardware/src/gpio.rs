//! Relay-driven heating element on one GPIO line.

use crate::error::{HwError, Result};
use kiln_traits::{BoxError, HeatingElement};
use rppal::gpio::{Gpio, OutputPin};
use std::time::Duration;

/// Heats by holding the output high for `duty × interval`, then low for the rest.
pub struct GpioElement {
    pin: OutputPin,
}

impl GpioElement {
    pub fn new(heat_pin: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let mut pin = gpio
            .get(heat_pin)
            .map_err(|e| HwError::Gpio(format!("pin {heat_pin}: {e}")))?
            .into_output();
        pin.set_low();
        Ok(Self { pin })
    }
}

impl HeatingElement for GpioElement {
    fn actuate(&mut self, duty: f64, interval: Duration) -> std::result::Result<(), BoxError> {
        let on = interval.mul_f64(duty.clamp(0.0, 1.0));
        let off = interval.saturating_sub(on);
        if !on.is_zero() {
            self.pin.set_high();
            tracing::trace!(on_s = on.as_secs_f64(), "heat on");
            std::thread::sleep(on);
        }
        self.pin.set_low();
        if !off.is_zero() {
            std::thread::sleep(off);
        }
        Ok(())
    }

    fn off(&mut self) -> std::result::Result<(), BoxError> {
        self.pin.set_low();
        Ok(())
    }
}

impl Drop for GpioElement {
    fn drop(&mut self) {
        self.pin.set_low();
    }
}
