//! Thermocouple offset correction: a flat offset or a linearly interpolated table.

/// Correction added to a raw reading: `corrected = raw + offset(raw)`.
#[derive(Debug, Clone, PartialEq)]
pub enum Calibration {
    Flat(f64),
    /// `(temp, offset)` rows, strictly increasing by temp. Clamped at both ends.
    Table(Vec<(f64, f64)>),
}

impl Default for Calibration {
    fn default() -> Self {
        Self::Flat(0.0)
    }
}

impl Calibration {
    pub fn offset(&self, raw: f64) -> f64 {
        match self {
            Self::Flat(o) => *o,
            Self::Table(rows) => table_offset(rows, raw),
        }
    }

    pub fn corrected(&self, raw: f64) -> f64 {
        raw + self.offset(raw)
    }
}

fn table_offset(rows: &[(f64, f64)], raw: f64) -> f64 {
    let (Some(first), Some(last)) = (rows.first(), rows.last()) else {
        return 0.0;
    };
    if raw <= first.0 {
        return first.1;
    }
    if raw >= last.0 {
        return last.1;
    }
    for w in rows.windows(2) {
        let (t0, o0) = w[0];
        let (t1, o1) = w[1];
        if raw <= t1 {
            let span = t1 - t0;
            if span <= 0.0 {
                return o1;
            }
            return o0 + (raw - t0) * (o1 - o0) / span;
        }
    }
    last.1
}
