use serde::{Deserialize, Serialize};

/// Default number of decimals kept by [`f2t`].
pub const DEFAULT_PRECISION: i32 = 5;

/// Most decimals [`f2t`] will keep; an f64 carries no more than this.
pub const MAX_PRECISION: i32 = 15;

/// Extremes of a buffer and the span used to normalize it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaxMin {
    pub maxi: usize,
    pub maxv: f32,
    pub mini: usize,
    pub minv: f32,
    /// `maxv - minv`, or `f32::EPSILON` when every value is equal.
    pub dv: f32,
}

impl Default for MaxMin {
    /// The range of an empty buffer: everything at zero with the minimal span.
    fn default() -> Self {
        Self {
            maxi: 0,
            maxv: 0.0,
            mini: 0,
            minv: 0.0,
            dv: f32::EPSILON,
        }
    }
}

impl MaxMin {
    /// Maps `value` onto `[0, 255]` relative to this range.
    pub fn intensity(&self, value: f32) -> u8 {
        let scaled = f64::from(value - self.minv) * 255.0 / f64::from(self.dv);
        scaled.floor().clamp(0.0, 255.0) as u8
    }
}

/// Single-pass scan for the smallest and largest value. Returns `None` for an empty buffer.
pub fn max_min(values: &[f32]) -> Option<MaxMin> {
    let (&first, rest) = values.split_first()?;
    let mut scan = MaxMin {
        maxi: 0,
        maxv: first,
        mini: 0,
        minv: first,
        dv: 0.0,
    };

    for (offset, &value) in rest.iter().enumerate() {
        if value > scan.maxv {
            scan.maxv = value;
            scan.maxi = offset + 1;
        }
        if value < scan.minv {
            scan.minv = value;
            scan.mini = offset + 1;
        }
    }

    let span = scan.maxv - scan.minv;
    scan.dv = if span > 0.0 { span } else { f32::EPSILON };
    Some(scan)
}

/// Truncates `value` toward negative infinity at `decimals` places and prints it
/// in its shortest form, e.g. `0.5`, `1` or `-0.12346`. `decimals` is clamped
/// to `0..=MAX_PRECISION`.
pub fn f2t(value: f32, decimals: i32) -> String {
    let scale = 10f64.powi(decimals.clamp(0, MAX_PRECISION));
    // start from the shortest decimal form of the f32, not its binary expansion
    let value = value.to_string().parse::<f64>().unwrap_or(f64::from(value));
    let scaled = value * scale;
    let nearest = scaled.round();
    let steps = if (scaled - nearest).abs() <= scaled.abs().max(1.0) * 1e-12 {
        nearest
    } else {
        scaled.floor()
    };
    let truncated = steps / scale;
    // adding zero folds -0.0 into 0.0
    format!("{}", truncated + 0.0)
}
