//! Windowed PID regulator producing an on/off duty fraction.

use crate::config::PidCfg;
use serde::{Deserialize, Serialize};

/// Raw PID output is clamped to `±PID_WINDOW` before scaling to a fraction.
const PID_WINDOW: f64 = 100.0;

/// Diagnostics from the most recent `compute` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PidStats {
    pub time: f64,
    #[serde(rename = "timeDelta")]
    pub time_delta: f64,
    pub setpoint: f64,
    pub ispoint: f64,
    pub err: f64,
    #[serde(rename = "errDelta")]
    pub err_delta: f64,
    pub p: f64,
    pub i: f64,
    pub d: f64,
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Clamped raw output before scaling; 0 outside the control window.
    pub pid: f64,
    /// Duty fraction handed to the heating element.
    pub out: f64,
}

#[derive(Debug, Clone)]
pub struct Pid {
    cfg: PidCfg,
    /// dt used for the first call and whenever the clock does not advance.
    baseline_dt: f64,
    integral: f64,
    last_error: f64,
    last_time: Option<f64>,
    stats: PidStats,
}

impl Pid {
    pub fn new(cfg: PidCfg, baseline_dt: f64) -> Self {
        Self {
            cfg,
            baseline_dt: if baseline_dt > 0.0 { baseline_dt } else { 1.0 },
            integral: 0.0,
            last_error: 0.0,
            last_time: None,
            stats: PidStats::default(),
        }
    }

    /// Duty fraction in `[0, 1]` for the given setpoint and measurement at `now` (Unix seconds).
    pub fn compute(&mut self, setpoint: f64, measured: f64, now: f64) -> f64 {
        let dt = match self.last_time {
            Some(prev) if now - prev > 0.0 => now - prev,
            _ => self.baseline_dt,
        };
        let error = setpoint - measured;
        let window = self.cfg.control_window;

        let mut err_delta = 0.0;
        let mut raw = 0.0;
        let mut output = if error < -window {
            tracing::debug!(error, "outside pid control window, max cooling");
            0.0
        } else if error > window {
            tracing::debug!(error, "outside pid control window, max heating");
            1.0
        } else {
            self.integral += error * dt / self.cfg.ki;
            err_delta = (error - self.last_error) / dt;
            raw = (self.cfg.kp * error + self.integral + self.cfg.kd * err_delta)
                .clamp(-PID_WINDOW, PID_WINDOW);
            raw / PID_WINDOW
        };
        // no active cooling
        if output < 0.0 {
            output = 0.0;
        }

        self.last_error = error;
        self.last_time = Some(now);
        self.stats = PidStats {
            time: now,
            time_delta: dt,
            setpoint,
            ispoint: measured,
            err: error,
            err_delta,
            p: self.cfg.kp * error,
            i: self.integral,
            d: self.cfg.kd * err_delta,
            kp: self.cfg.kp,
            ki: self.cfg.ki,
            kd: self.cfg.kd,
            pid: raw,
            out: output,
        };
        output
    }

    /// Clear the integral term and last error, e.g. after the schedule jumped.
    pub fn reset_integral(&mut self) {
        self.integral = 0.0;
        self.last_error = 0.0;
    }

    /// Fresh state for a new run.
    pub fn reset(&mut self) {
        self.reset_integral();
        self.last_time = None;
        self.stats = PidStats::default();
    }

    pub fn stats(&self) -> PidStats {
        self.stats
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pid() -> Pid {
        Pid::new(
            PidCfg {
                kp: 10.0,
                ki: 5.0,
                kd: 2.0,
                control_window: 10.0,
            },
            2.0,
        )
    }

    #[test]
    fn forced_on_and_off_outside_window() {
        let mut p = pid();
        assert_eq!(p.compute(100.0, 50.0, 0.0), 1.0);
        assert_eq!(p.integral(), 0.0);
        assert_eq!(p.compute(50.0, 100.0, 2.0), 0.0);
        assert_eq!(p.integral(), 0.0);
        assert_eq!(p.stats().pid, 0.0);
    }

    #[test]
    fn first_call_uses_baseline_dt() {
        let mut p = pid();
        let out = p.compute(105.0, 100.0, 1000.0);
        let s = p.stats();
        assert_eq!(s.time_delta, 2.0);
        // integral = 5*2/5 = 2; derivative = 5/2 = 2.5
        assert!((s.i - 2.0).abs() < 1e-12);
        assert!((s.err_delta - 2.5).abs() < 1e-12);
        let raw = 10.0 * 5.0 + 2.0 + 2.0 * 2.5;
        assert!((out - raw / 100.0).abs() < 1e-12);
    }

    #[test]
    fn non_advancing_clock_falls_back_to_baseline() {
        let mut p = pid();
        p.compute(101.0, 100.0, 50.0);
        p.compute(101.0, 100.0, 50.0);
        assert_eq!(p.stats().time_delta, 2.0);
    }

    #[test]
    fn negative_raw_output_is_clamped_to_zero() {
        let mut p = pid();
        let out = p.compute(95.0, 100.0, 0.0);
        assert_eq!(out, 0.0);
        assert!(p.stats().pid < 0.0);
    }

    #[test]
    fn reset_integral_clears_error_memory() {
        let mut p = pid();
        p.compute(105.0, 100.0, 0.0);
        p.reset_integral();
        assert_eq!(p.integral(), 0.0);
        p.compute(105.0, 100.0, 2.0);
        // derivative measured against a zeroed last error
        assert!((p.stats().err_delta - 2.5).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn output_is_a_fraction(
            steps in proptest::collection::vec((-500.0f64..2500.0, -500.0f64..2500.0, 0.0f64..10.0), 1..50)
        ) {
            let mut p = pid();
            let mut now = 0.0;
            for (sp, pv, dt) in steps {
                now += dt;
                let out = p.compute(sp, pv, now);
                prop_assert!((0.0..=1.0).contains(&out));
                let err = sp - pv;
                if err > 10.0 { prop_assert_eq!(out, 1.0); }
                if err < -10.0 { prop_assert_eq!(out, 0.0); }
            }
        }
    }
}
