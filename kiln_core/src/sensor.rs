//! Background thermocouple sampling.
//!
//! `TemperatureSensor` spawns a thread that owns the `Thermocouple`, keeps a
//! sliding window of good readings and publishes a trimmed mean, the latest
//! fault bits and the bad-read percentage through lock-free cells in
//! `SensorCell`. The controller reads those cells field by field.
//!
//! Each `TemperatureSensor` spawns exactly one thread that is shut down and
//! joined when it is dropped.
use crate::config::SensorCfg;
use kiln_traits::clock::Clock;
use kiln_traits::{Thermocouple, ThermocoupleReading};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Fraction dropped from each end of the sorted window before averaging.
pub const TRIM_FRACTION: f64 = 0.25;

/// Single-slot cells published by the sampling thread.
#[derive(Debug, Default)]
pub struct SensorCell {
    temperature: AtomicU64,
    bad_percent: AtomicU64,
    no_connection: AtomicBool,
    short_to_ground: AtomicBool,
    short_to_vcc: AtomicBool,
    unknown_error: AtomicBool,
}

/// Point-in-time copy of everything in a `SensorCell`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SensorSnapshot {
    pub temperature: f64,
    pub bad_percent: f64,
    pub no_connection: bool,
    pub short_to_ground: bool,
    pub short_to_vcc: bool,
    pub unknown_error: bool,
}

impl SensorSnapshot {
    pub fn any_fault(&self) -> bool {
        self.no_connection || self.short_to_ground || self.short_to_vcc || self.unknown_error
    }
}

impl SensorCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn temperature(&self) -> f64 {
        f64::from_bits(self.temperature.load(Ordering::Relaxed))
    }

    pub fn bad_percent(&self) -> f64 {
        f64::from_bits(self.bad_percent.load(Ordering::Relaxed))
    }

    pub fn publish_temperature(&self, t: f64) {
        self.temperature.store(t.to_bits(), Ordering::Relaxed);
    }

    pub fn publish_bad_percent(&self, pct: f64) {
        self.bad_percent.store(pct.to_bits(), Ordering::Relaxed);
    }

    /// Publish the fault bits of the latest raw reading.
    pub fn publish_flags(&self, r: &ThermocoupleReading) {
        self.no_connection.store(r.no_connection, Ordering::Relaxed);
        self.short_to_ground
            .store(r.short_to_ground, Ordering::Relaxed);
        self.short_to_vcc.store(r.short_to_vcc, Ordering::Relaxed);
        self.unknown_error.store(r.unknown_error, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SensorSnapshot {
        SensorSnapshot {
            temperature: self.temperature(),
            bad_percent: self.bad_percent(),
            no_connection: self.no_connection.load(Ordering::Relaxed),
            short_to_ground: self.short_to_ground.load(Ordering::Relaxed),
            short_to_vcc: self.short_to_vcc.load(Ordering::Relaxed),
            unknown_error: self.unknown_error.load(Ordering::Relaxed),
        }
    }
}

/// A reading is bad when disconnected or unknown, or shorted unless shorts are ignored.
#[inline]
pub fn is_bad(r: &ThermocoupleReading, ignore_short_errors: bool) -> bool {
    r.no_connection
        || r.unknown_error
        || (!ignore_short_errors && (r.short_to_ground || r.short_to_vcc))
}

/// Sort, drop `floor(len × chop)` from each end and average the rest.
pub fn trimmed_mean(values: &[f64], chop: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let drop = (sorted.len() as f64 * chop).floor() as usize;
    let kept = sorted.get(drop..sorted.len().saturating_sub(drop))?;
    if kept.is_empty() {
        return None;
    }
    Some(kept.iter().sum::<f64>() / kept.len() as f64)
}

/// Sliding window of at most `cap` good readings.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    cap: usize,
    buf: VecDeque<f64>,
}

impl SampleWindow {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            cap,
            buf: VecDeque::with_capacity(cap),
        }
    }

    pub fn push(&mut self, v: f64) {
        if self.buf.len() == self.cap {
            self.buf.pop_front();
        }
        self.buf.push_back(v);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn average(&self) -> Option<f64> {
        let v: Vec<f64> = self.buf.iter().copied().collect();
        trimmed_mean(&v, TRIM_FRACTION)
    }
}

/// Counts good and bad reads and reports the bad percentage once per window.
#[derive(Debug, Clone)]
pub struct BadRateTracker {
    window: Duration,
    started: Instant,
    ok: u64,
    bad: u64,
}

impl BadRateTracker {
    pub fn new(window: Duration, now: Instant) -> Self {
        Self {
            window,
            started: now,
            ok: 0,
            bad: 0,
        }
    }

    pub fn record(&mut self, bad: bool) {
        if bad {
            self.bad += 1;
        } else {
            self.ok += 1;
        }
    }

    /// When the window has elapsed, return the percentage and start a new window.
    pub fn roll(&mut self, now: Instant) -> Option<f64> {
        if now.saturating_duration_since(self.started) < self.window {
            return None;
        }
        let total = self.ok + self.bad;
        let pct = if total == 0 {
            0.0
        } else {
            self.bad as f64 / total as f64 * 100.0
        };
        self.ok = 0;
        self.bad = 0;
        self.started = now;
        Some(pct)
    }
}

/// Owns the sampling thread; dropping it stops and joins the thread.
pub struct TemperatureSensor {
    cell: Arc<SensorCell>,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl TemperatureSensor {
    pub fn spawn<T, C>(mut thermocouple: T, cfg: &SensorCfg, clock: C) -> Self
    where
        T: Thermocouple + Send + 'static,
        C: Clock + Send + Sync + 'static,
    {
        let cell = Arc::new(SensorCell::new());
        let cell_clone = cell.clone();
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let period = crate::util::sample_period(cfg.time_step_s, cfg.average_samples);
        let bad_window = crate::util::secs(cfg.time_step_s * 2.0);
        let ignore_short = cfg.ignore_short_errors;
        let mut window = SampleWindow::new(cfg.average_samples);

        let join_handle = std::thread::spawn(move || {
            let mut rate = BadRateTracker::new(bad_window, clock.now());
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("sensor thread received shutdown signal");
                    break;
                }

                let reading = thermocouple.read().unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "thermocouple read failed");
                    ThermocoupleReading {
                        unknown_error: true,
                        ..ThermocoupleReading::default()
                    }
                });
                cell_clone.publish_flags(&reading);

                if is_bad(&reading, ignore_short) {
                    tracing::error!(
                        no_connection = reading.no_connection,
                        short_to_ground = reading.short_to_ground,
                        short_to_vcc = reading.short_to_vcc,
                        unknown_error = reading.unknown_error,
                        "problem reading temperature"
                    );
                    rate.record(true);
                } else {
                    rate.record(false);
                    window.push(reading.temperature);
                }
                if let Some(avg) = window.average() {
                    cell_clone.publish_temperature(avg);
                }
                if let Some(pct) = rate.roll(clock.now()) {
                    cell_clone.publish_bad_percent(pct);
                }

                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }
                clock.sleep(period);
            }
            tracing::trace!("sensor thread exiting cleanly");
        });

        Self {
            cell,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    /// Shared handle to the published values.
    pub fn cell(&self) -> Arc<SensorCell> {
        self.cell.clone()
    }
}

impl Drop for TemperatureSensor {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("sensor thread joined"),
                Err(e) => tracing::warn!(?e, "sensor thread panicked during shutdown"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(vec![], None)]
    #[case(vec![5.0], Some(5.0))]
    #[case(vec![1.0, 2.0, 3.0], Some(2.0))]
    #[case(vec![100.0, 1.0, 2.0, 3.0], Some(2.5))]
    #[case(vec![0.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 1000.0], Some(10.0))]
    fn trimmed_mean_drops_quartiles(#[case] v: Vec<f64>, #[case] expected: Option<f64>) {
        assert_eq!(trimmed_mean(&v, TRIM_FRACTION), expected);
    }

    #[test]
    fn window_evicts_oldest() {
        let mut w = SampleWindow::new(3);
        for v in [1.0, 2.0, 3.0, 4.0] {
            w.push(v);
        }
        assert_eq!(w.len(), 3);
        assert_eq!(w.average(), Some(3.0));
    }

    #[rstest]
    #[case(ThermocoupleReading { no_connection: true, ..Default::default() }, false, true)]
    #[case(ThermocoupleReading { unknown_error: true, ..Default::default() }, true, true)]
    #[case(ThermocoupleReading { short_to_ground: true, ..Default::default() }, false, true)]
    #[case(ThermocoupleReading { short_to_vcc: true, ..Default::default() }, true, false)]
    #[case(ThermocoupleReading::ok(70.0), false, false)]
    fn bad_reading_classification(
        #[case] r: ThermocoupleReading,
        #[case] ignore_short: bool,
        #[case] bad: bool,
    ) {
        assert_eq!(is_bad(&r, ignore_short), bad);
    }

    #[test]
    fn bad_rate_reports_once_per_window() {
        let t0 = Instant::now();
        let mut r = BadRateTracker::new(Duration::from_secs(4), t0);
        r.record(true);
        r.record(false);
        r.record(false);
        r.record(false);
        assert_eq!(r.roll(t0 + Duration::from_secs(1)), None);
        assert_eq!(r.roll(t0 + Duration::from_secs(4)), Some(25.0));
        assert_eq!(r.roll(t0 + Duration::from_secs(8)), Some(0.0));
    }

    #[test]
    fn cell_round_trips_values() {
        let c = SensorCell::new();
        assert_eq!(c.temperature(), 0.0);
        c.publish_temperature(1234.5);
        c.publish_flags(&ThermocoupleReading {
            short_to_vcc: true,
            ..Default::default()
        });
        let s = c.snapshot();
        assert_eq!(s.temperature, 1234.5);
        assert!(s.short_to_vcc && s.any_fault());
        assert!(!s.no_connection);
    }
}
