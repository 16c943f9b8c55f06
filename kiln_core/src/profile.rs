//! Piecewise-linear firing schedule.

use crate::error::{KilnError, Result};
use std::path::PathBuf;

/// Immutable, time-sorted `(seconds, temperature)` control points.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleProfile {
    name: String,
    points: Vec<(f64, f64)>,
}

impl ScheduleProfile {
    /// Sort by time; a repeated time keeps the last supplied temperature.
    pub fn new(name: impl Into<String>, mut points: Vec<(f64, f64)>) -> Result<Self> {
        let name = name.into();
        if points
            .iter()
            .any(|(t, v)| !t.is_finite() || !v.is_finite() || *t < 0.0)
        {
            return Err(eyre::Report::new(KilnError::InvalidProfile(format!(
                "profile '{name}' has negative or non-finite points"
            ))));
        }
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        let mut dedup: Vec<(f64, f64)> = Vec::with_capacity(points.len());
        for p in points {
            match dedup.last_mut() {
                Some(last) if last.0 == p.0 => *last = p,
                _ => dedup.push(p),
            }
        }
        if dedup.len() < 2 {
            return Err(eyre::Report::new(KilnError::InvalidProfile(format!(
                "profile '{name}' needs at least two distinct times"
            ))));
        }
        Ok(Self {
            name,
            points: dedup,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    /// Time of the last control point.
    pub fn duration(&self) -> f64 {
        self.points.last().map_or(0.0, |p| p.0)
    }

    /// Schedule temperature at `t` seconds; 0 past the end.
    pub fn target_temperature(&self, t: f64) -> f64 {
        if t > self.duration() {
            return 0.0;
        }
        let pts = &self.points;
        let i = pts
            .iter()
            .skip(1)
            .position(|p| t <= p.0)
            .map_or(pts.len() - 1, |k| k + 1);
        interpolate(pts[i - 1], pts[i], t)
    }

    /// Earliest time at or after `from` where the schedule reaches `temp`.
    ///
    /// Flat and falling segments never produce a crossing; `None` when the
    /// remaining schedule never gets there or `from` is already past the end.
    pub fn find_time_for_temperature(&self, temp: f64, from: f64) -> Option<f64> {
        if from >= self.duration() {
            return None;
        }
        if self.target_temperature(from) >= temp {
            return Some(from);
        }
        for w in self.points.windows(2) {
            let (mut t0, mut v0) = w[0];
            let (t1, v1) = w[1];
            if t1 <= from {
                continue;
            }
            if t0 < from {
                t0 = from;
                v0 = interpolate(w[0], w[1], from);
            }
            if v1 >= temp {
                if v0 >= temp {
                    return Some(t0);
                }
                let rise = v1 - v0;
                if rise <= 0.0 {
                    continue;
                }
                return Some(t0 + (temp - v0) / rise * (t1 - t0));
            }
        }
        None
    }
}

#[inline]
fn interpolate((t0, v0): (f64, f64), (t1, v1): (f64, f64), t: f64) -> f64 {
    let span = t1 - t0;
    if span <= 0.0 {
        return v1;
    }
    v0 + (t - t0) * (v1 - v0) / span
}

impl TryFrom<&kiln_config::ProfileFile> for ScheduleProfile {
    type Error = eyre::Report;

    fn try_from(p: &kiln_config::ProfileFile) -> Result<Self> {
        Self::new(p.name.clone(), p.data.clone())
    }
}

/// Resolves a profile by name, used when a run is resumed after restart.
pub trait ProfileLoader: Send {
    fn load(&self, name: &str) -> Result<ScheduleProfile>;
}

/// Loads `<dir>/<name>.json`.
#[derive(Debug, Clone)]
pub struct DirProfileLoader {
    dir: PathBuf,
}

impl DirProfileLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ProfileLoader for DirProfileLoader {
    fn load(&self, name: &str) -> Result<ScheduleProfile> {
        let file = kiln_config::load_profile_by_name(&self.dir, name)?;
        ScheduleProfile::try_from(&file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn ramp() -> ScheduleProfile {
        ScheduleProfile::new("ramp", vec![(60.0, 100.0), (0.0, 70.0)]).expect("profile")
    }

    #[rstest]
    #[case(0.0, 70.0)]
    #[case(30.0, 85.0)]
    #[case(60.0, 100.0)]
    #[case(61.0, 0.0)]
    fn target_follows_ramp(#[case] t: f64, #[case] expected: f64) {
        assert!((ramp().target_temperature(t) - expected).abs() < 1e-9);
    }

    #[test]
    fn duplicate_times_keep_last_value() {
        let p = ScheduleProfile::new("d", vec![(0.0, 10.0), (10.0, 50.0), (10.0, 60.0)])
            .expect("profile");
        assert_eq!(p.points(), &[(0.0, 10.0), (10.0, 60.0)]);
        assert_eq!(p.duration(), 10.0);
    }

    #[test]
    fn rejects_degenerate_profiles() {
        assert!(ScheduleProfile::new("one", vec![(0.0, 1.0)]).is_err());
        assert!(ScheduleProfile::new("same", vec![(5.0, 1.0), (5.0, 2.0)]).is_err());
        assert!(ScheduleProfile::new("nan", vec![(0.0, f64::NAN), (1.0, 2.0)]).is_err());
        let err = ScheduleProfile::new("neg", vec![(-1.0, 1.0), (1.0, 2.0)]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<KilnError>(),
            Some(KilnError::InvalidProfile(_))
        ));
    }

    #[test]
    fn before_first_point_uses_first_segment() {
        let p = ScheduleProfile::new("late", vec![(10.0, 100.0), (20.0, 200.0)]).expect("profile");
        assert!((p.target_temperature(10.0) - 100.0).abs() < 1e-9);
        assert!((p.target_temperature(5.0) - 50.0).abs() < 1e-9);
    }

    fn hump() -> ScheduleProfile {
        ScheduleProfile::new(
            "hump",
            vec![(0.0, 100.0), (100.0, 500.0), (200.0, 500.0), (300.0, 300.0), (400.0, 900.0)],
        )
        .expect("profile")
    }

    #[rstest]
    #[case(300.0, 0.0, Some(50.0))]
    #[case(100.0, 0.0, Some(0.0))]
    #[case(500.0, 150.0, Some(150.0))]
    #[case(600.0, 150.0, Some(350.0))]
    #[case(400.0, 250.0, Some(250.0))]
    #[case(1000.0, 0.0, None)]
    #[case(100.0, 400.0, None)]
    #[case(100.0, 500.0, None)]
    fn finds_crossings(#[case] temp: f64, #[case] from: f64, #[case] expected: Option<f64>) {
        let got = hump().find_time_for_temperature(temp, from);
        match (got, expected) {
            (Some(a), Some(b)) => assert!((a - b).abs() < 1e-9, "got {a}, want {b}"),
            (a, b) => assert_eq!(a, b),
        }
    }

    #[test]
    fn clipped_segment_interpolates_from_current_point() {
        // from=50 on the 100→500 ramp: curve at 50 is 300
        let got = hump().find_time_for_temperature(400.0, 50.0);
        assert_eq!(got, Some(75.0));
    }

    #[test]
    fn loads_profiles_from_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("cone6.json"),
            r#"{"name":"cone6","data":[[0,65],[3600,1000],[7200,2232]]}"#,
        )
        .expect("write");
        let p = DirProfileLoader::new(dir.path()).load("cone6").expect("load");
        assert_eq!(p.name(), "cone6");
        assert_eq!(p.duration(), 7200.0);
        assert!(DirProfileLoader::new(dir.path()).load("missing").is_err());
    }
}
