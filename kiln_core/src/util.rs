//! Common time helpers for kiln_core.

use std::time::Duration;

/// Convert a seconds value to a `Duration`, mapping negative and non-finite input to zero.
#[inline]
pub fn secs(s: f64) -> Duration {
    if s.is_finite() && s > 0.0 {
        Duration::from_secs_f64(s)
    } else {
        Duration::ZERO
    }
}

/// Sleep period between thermocouple reads: `time_step / samples`, at least 1 ms.
#[inline]
pub fn sample_period(time_step_s: f64, samples: usize) -> Duration {
    let n = samples.max(1) as f64;
    secs(time_step_s / n).max(Duration::from_millis(1))
}

/// Whole Unix seconds used as persisted timestamps.
#[inline]
pub fn unix_secs(t: f64) -> i64 {
    if t.is_finite() { t.floor() as i64 } else { 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_period_divides_time_step() {
        assert_eq!(sample_period(2.0, 10), Duration::from_millis(200));
        assert_eq!(sample_period(2.0, 0), Duration::from_secs(2));
        assert_eq!(sample_period(0.0, 10), Duration::from_millis(1));
    }

    #[test]
    fn secs_rejects_garbage() {
        assert_eq!(secs(-1.0), Duration::ZERO);
        assert_eq!(secs(f64::NAN), Duration::ZERO);
        assert_eq!(secs(1.5), Duration::from_millis(1500));
    }

    #[test]
    fn unix_secs_truncates_toward_floor() {
        assert_eq!(unix_secs(1_700_000_000.9), 1_700_000_000);
        assert_eq!(unix_secs(f64::INFINITY), 0);
    }
}
