//! MAX31855 thermocouple converter.
//!
//! One conversion is a 32-bit frame, MSB first:
//!
//! | bits  | meaning                                   |
//! |-------|-------------------------------------------|
//! | 31-18 | thermocouple temperature, signed, 0.25 °C |
//! | 16    | fault (any of the bits below)             |
//! | 15-4  | cold junction temperature, signed         |
//! | 2     | short to VCC                              |
//! | 1     | short to GND                              |
//! | 0     | open circuit                              |

use kiln_traits::ThermocoupleReading;

const FAULT: u32 = 1 << 16;
const SCV: u32 = 1 << 2;
const SCG: u32 = 1 << 1;
const OC: u32 = 1 << 0;

/// Thermocouple temperature in °C from the top 14 bits.
#[inline]
pub fn thermocouple_celsius(frame: u32) -> f64 {
    // arithmetic shift keeps the sign of bit 31
    f64::from((frame as i32) >> 18) * 0.25
}

/// Decode one frame; the temperature is converted to °F when `fahrenheit`.
///
/// A set fault bit with none of the specific fault bits is reported as
/// `unknown_error`.
pub fn decode(frame: u32, fahrenheit: bool) -> ThermocoupleReading {
    let c = thermocouple_celsius(frame);
    let fault = frame & FAULT != 0;
    let no_connection = frame & OC != 0;
    let short_to_ground = frame & SCG != 0;
    let short_to_vcc = frame & SCV != 0;
    ThermocoupleReading {
        temperature: if fahrenheit { c * 9.0 / 5.0 + 32.0 } else { c },
        no_connection,
        short_to_ground,
        short_to_vcc,
        unknown_error: fault && !(no_connection || short_to_ground || short_to_vcc),
    }
}

#[cfg(feature = "hardware")]
pub use driver::Max31855;

#[cfg(feature = "hardware")]
mod driver {
    use super::decode;
    use crate::error::{HwError, Result};
    use kiln_traits::{BoxError, Thermocouple, ThermocoupleReading};
    use rppal::gpio::{Gpio, InputPin, OutputPin};
    use std::time::Duration;
    use tracing::trace;

    /// Bit-banged MAX31855 on three GPIO lines.
    pub struct Max31855 {
        cs: OutputPin,
        clk: OutputPin,
        data: InputPin,
        fahrenheit: bool,
    }

    impl Max31855 {
        pub fn new(cs_pin: u8, clock_pin: u8, data_pin: u8, fahrenheit: bool) -> Result<Self> {
            let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
            let pin = |n: u8| gpio.get(n).map_err(|e| HwError::Gpio(format!("pin {n}: {e}")));
            let mut cs = pin(cs_pin)?.into_output();
            let mut clk = pin(clock_pin)?.into_output();
            let data = pin(data_pin)?.into_input();
            cs.set_high();
            clk.set_low();
            Ok(Self {
                cs,
                clk,
                data,
                fahrenheit,
            })
        }

        /// Clock one 32-bit frame out of the converter.
        pub fn read_frame(&mut self) -> u32 {
            self.cs.set_low();
            settle();
            let mut frame: u32 = 0;
            for _ in 0..32 {
                self.clk.set_low();
                settle();
                frame = (frame << 1) | u32::from(self.data.is_high());
                self.clk.set_high();
                settle();
            }
            self.clk.set_low();
            self.cs.set_high();
            trace!(frame, "max31855 frame");
            frame
        }
    }

    impl Thermocouple for Max31855 {
        fn read(&mut self) -> std::result::Result<ThermocoupleReading, BoxError> {
            let frame = self.read_frame();
            if frame == 0 || frame == u32::MAX {
                // bus stuck low or floating
                return Err(Box::new(HwError::Spi(format!(
                    "implausible frame {frame:#010x}"
                ))));
            }
            Ok(decode(frame, self.fahrenheit))
        }
    }

    #[inline]
    fn settle() {
        std::thread::sleep(Duration::from_micros(1));
    }
}
