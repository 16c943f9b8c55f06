//! Accelerated clock for simulated firings.

use kiln_traits::clock::Clock;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Clock whose time advances `factor` times faster than real time.
///
/// `now()` and `unix_time()` both report the accelerated time; `sleep(d)`
/// blocks for `d / factor` of real time. A factor of 1 behaves like the
/// system clock.
#[derive(Debug, Clone, Copy)]
pub struct ScaledClock {
    origin: Instant,
    unix_origin: f64,
    factor: f64,
}

impl ScaledClock {
    /// Non-positive or non-finite factors fall back to 1.
    pub fn new(factor: f64) -> Self {
        let unix_origin = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        Self {
            origin: Instant::now(),
            unix_origin,
            factor: if factor.is_finite() && factor > 0.0 {
                factor
            } else {
                1.0
            },
        }
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    fn scaled_elapsed(&self) -> Duration {
        self.origin.elapsed().mul_f64(self.factor)
    }
}

impl Clock for ScaledClock {
    fn now(&self) -> Instant {
        self.origin + self.scaled_elapsed()
    }

    fn sleep(&self, d: Duration) {
        if d.is_zero() {
            return;
        }
        std::thread::sleep(d.div_f64(self.factor));
    }

    fn unix_time(&self) -> f64 {
        self.unix_origin + self.scaled_elapsed().as_secs_f64()
    }
}
