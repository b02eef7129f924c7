//! Stateless numeric helpers shared by the expression engine and the
//! synthesizer: tolerance rounding, common-factor selection and literal
//! formatting.

use serde::{Deserialize, Serialize};

/// Default rounding tolerance applied to rendered coefficients
pub const DEFAULT_ROUNDING_TOLERANCE: f64 = 1e-14;

/// Default relative grid for solved coefficients in raw units
pub const DEFAULT_SOLUTION_PRECISION: f64 = 1e-9;

/// Round `value` to the nearest multiple of `tolerance`.
///
/// Values too large to be represented on the tolerance grid are returned
/// unchanged. Negative zero is normalized to positive zero.
pub fn round_to(value: f64, tolerance: f64) -> f64 {
    if tolerance <= 0.0 || !value.is_finite() {
        return value;
    }
    let rounded = if tolerance >= 1.0 {
        (value / tolerance).round() * tolerance
    } else {
        let scale = (1.0 / tolerance).round();
        let scaled = value * scale;
        if !scaled.is_finite() || scaled.abs() >= 4.0e15 {
            return value;
        }
        scaled.round() / scale
    };
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Round `value` onto a decimal grid of `precision` relative to its order of
/// magnitude, so `2.9999999999982` and `6000.999999999` land on `3` and
/// `6001`.
pub fn snap(value: f64, precision: f64) -> f64 {
    if precision <= 0.0 || !value.is_finite() {
        return value;
    }
    let exponent = value.abs().max(1.0).log10().floor();
    round_to(value, precision * 10f64.powf(exponent))
}

/// Which magnitude wins when several occur equally often
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MagnitudeTieBreak {
    #[default]
    Largest,
    Smallest,
}

/// Pick the magnitude that occurs most frequently among the nonzero values.
///
/// Returns `None` when every value is zero.
pub fn dominant_magnitude<I>(values: I, tie_break: MagnitudeTieBreak) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let mut counts: Vec<(f64, usize)> = Vec::new();
    for value in values {
        let magnitude = value.abs();
        if magnitude == 0.0 {
            continue;
        }
        match counts.iter_mut().find(|(m, _)| *m == magnitude) {
            Some((_, count)) => *count += 1,
            None => counts.push((magnitude, 1)),
        }
    }

    counts
        .into_iter()
        .max_by(|(ma, ca), (mb, cb)| {
            ca.cmp(cb).then_with(|| match tie_break {
                MagnitudeTieBreak::Largest => ma.total_cmp(mb),
                MagnitudeTieBreak::Smallest => mb.total_cmp(ma),
            })
        })
        .map(|(magnitude, _)| magnitude)
}

/// Render a numeric literal.
///
/// Zero is always `0`; other integral values keep a trailing `.0` so the
/// emitted source reads as floating point.
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        "0".to_string()
    } else if value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_cancels_noise() {
        assert_eq!(round_to(1.9999999999999998, DEFAULT_ROUNDING_TOLERANCE), 2.0);
        assert_eq!(round_to(0.09999999999999999, DEFAULT_ROUNDING_TOLERANCE), 0.1);
        assert_eq!(round_to(0.15000000012, 1e-9), 0.15);
    }

    #[test]
    fn test_round_normalizes_negative_zero() {
        let r = round_to(-1e-17, DEFAULT_ROUNDING_TOLERANCE);
        assert_eq!(r, 0.0);
        assert!(r.is_sign_positive());
    }

    #[test]
    fn test_round_leaves_huge_values() {
        assert_eq!(round_to(1e20, DEFAULT_ROUNDING_TOLERANCE), 1e20);
        assert_eq!(round_to(3.3, 0.0), 3.3);
    }

    #[test]
    fn test_round_to_coarse_grid() {
        assert_eq!(round_to(1234.0, 100.0), 1200.0);
        assert_eq!(round_to(-7.4, 1.0), -7.0);
    }

    #[test]
    fn test_snap_is_relative_to_magnitude() {
        assert_eq!(snap(2.9999999999982, DEFAULT_SOLUTION_PRECISION), 3.0);
        assert_eq!(snap(1.00000000004, DEFAULT_SOLUTION_PRECISION), 1.0);
        assert_eq!(snap(6000.9999999999, DEFAULT_SOLUTION_PRECISION), 6001.0);
        assert_eq!(snap(-0.25, DEFAULT_SOLUTION_PRECISION), -0.25);
        assert_eq!(snap(0.1 + 1e-13, DEFAULT_SOLUTION_PRECISION), 0.1);
        assert_eq!(snap(2.5e-12, DEFAULT_SOLUTION_PRECISION), 0.0);
        assert_eq!(snap(1.23456789e-3, 0.0), 1.23456789e-3);
    }

    #[test]
    fn test_dominant_magnitude_by_count() {
        let got = dominant_magnitude([0.1, -0.1, 0.3], MagnitudeTieBreak::Largest);
        assert_eq!(got, Some(0.1));
    }

    #[test]
    fn test_dominant_magnitude_ties() {
        let values = [0.5, 2.0, -0.5, -2.0];
        assert_eq!(
            dominant_magnitude(values, MagnitudeTieBreak::Largest),
            Some(2.0)
        );
        assert_eq!(
            dominant_magnitude(values, MagnitudeTieBreak::Smallest),
            Some(0.5)
        );
    }

    #[test]
    fn test_dominant_magnitude_ignores_zero() {
        assert_eq!(dominant_magnitude([0.0, 0.0], MagnitudeTieBreak::Largest), None);
        assert_eq!(
            dominant_magnitude([0.0, 0.0, 3.0], MagnitudeTieBreak::Largest),
            Some(3.0)
        );
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0.0), "0");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(2.0), "2.0");
        assert_eq!(format_number(-1.0), "-1.0");
        assert_eq!(format_number(0.25), "0.25");
    }
}
