pub mod clock;

pub use clock::{Clock, MonotonicClock};

use std::time::Duration;

/// Boxed error used at hardware trait boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// One raw thermocouple conversion, including the converter's fault bits.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ThermocoupleReading {
    pub temperature: f64,
    pub no_connection: bool,
    pub short_to_ground: bool,
    pub short_to_vcc: bool,
    pub unknown_error: bool,
}

impl ThermocoupleReading {
    pub fn ok(temperature: f64) -> Self {
        Self {
            temperature,
            ..Self::default()
        }
    }

    /// True if any of the four fault bits is set.
    pub fn any_fault(&self) -> bool {
        self.no_connection || self.short_to_ground || self.short_to_vcc || self.unknown_error
    }
}

pub trait Thermocouple {
    fn read(&mut self) -> Result<ThermocoupleReading, BoxError>;
}

/// On/off heating element driven by a duty fraction.
pub trait HeatingElement {
    /// Energize for `duty × interval`, then de-energize for the remainder.
    /// Implementations block for the whole interval (or simulate doing so).
    fn actuate(&mut self, duty: f64, interval: Duration) -> Result<(), BoxError>;
    /// De-energize immediately.
    fn off(&mut self) -> Result<(), BoxError>;
}

impl<T: Thermocouple + ?Sized> Thermocouple for Box<T> {
    fn read(&mut self) -> Result<ThermocoupleReading, BoxError> {
        (**self).read()
    }
}

impl<T: HeatingElement + ?Sized> HeatingElement for Box<T> {
    fn actuate(&mut self, duty: f64, interval: Duration) -> Result<(), BoxError> {
        (**self).actuate(duty, interval)
    }
    fn off(&mut self) -> Result<(), BoxError> {
        (**self).off()
    }
}
