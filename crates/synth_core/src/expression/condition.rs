//! Boolean rendering of linear forms: `form >= 0` as source text.

use super::linear::{LinearForm, Sign};
use super::numeric::{dominant_magnitude, format_number};
use super::RenderOptions;

/// Literal emitted for a condition that always holds
pub const TRUE_LITERAL: &str = "True";
/// Literal emitted for a condition that never holds
pub const FALSE_LITERAL: &str = "False";

/// Outcome of interval reasoning over 0/1-valued terms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanShape {
    AlwaysTrue,
    AlwaysFalse,
    /// Any single satisfied term makes the condition hold
    Any,
    /// Every term must be satisfied
    All,
    /// No AND/OR collapse; keep the inequality
    Threshold,
}

/// Classify `Σ positives - Σ negatives + constant >= 0` where every term is
/// 0 or 1.
pub fn classify_boolean(positives: usize, negatives: usize, constant: f64) -> BooleanShape {
    let positives = positives as f64;
    let negatives = negatives as f64;

    if -negatives + constant >= 0.0 {
        BooleanShape::AlwaysTrue
    } else if positives + constant < 0.0 {
        BooleanShape::AlwaysFalse
    } else if -negatives + constant + 1.0 >= 0.0 {
        BooleanShape::Any
    } else if positives + constant - 1.0 < 0.0 {
        BooleanShape::All
    } else {
        BooleanShape::Threshold
    }
}

/// Divide by the dominant coefficient magnitude so emitted coefficients are
/// small integers where possible. Noise is snapped away first so equal
/// magnitudes count as equal.
fn normalize(form: &LinearForm, options: &RenderOptions) -> LinearForm {
    let mut form = form.clone();
    if let Some(largest) = form.coefficients().map(f64::abs).reduce(f64::max) {
        form.scale_by(1.0 / largest);
        form.snap(options.precision);
    }
    if let Some(divisor) = dominant_magnitude(form.coefficients(), options.tie_break) {
        form.scale_by(1.0 / divisor);
        form.snap(options.precision);
    }
    form
}

/// Keys of the `is None` literals with a positive and a negative sign, when
/// every term is a unit missingness indicator.
fn literal_keys(form: &LinearForm) -> Option<(Vec<&str>, Vec<&str>)> {
    let terms = form.boolean_terms()?;
    let (positives, negatives): (Vec<_>, Vec<_>) =
        terms.into_iter().partition(|(sign, _)| *sign == Sign::Plus);
    Some((
        positives.into_iter().map(|(_, key)| key).collect(),
        negatives.into_iter().map(|(_, key)| key).collect(),
    ))
}

/// Render the condition `form >= 0`.
pub fn render_condition(form: &LinearForm, options: &RenderOptions) -> String {
    let form = normalize(form, options);

    if let Some((positives, negatives)) = literal_keys(&form) {
        let literals = || {
            positives
                .iter()
                .map(|key| format!("{key} is None"))
                .chain(negatives.iter().map(|key| format!("{key} is not None")))
                .collect::<Vec<_>>()
        };

        match classify_boolean(positives.len(), negatives.len(), form.constant()) {
            BooleanShape::AlwaysTrue => return TRUE_LITERAL.to_string(),
            BooleanShape::AlwaysFalse => return FALSE_LITERAL.to_string(),
            BooleanShape::Any => return literals().join(" or "),
            BooleanShape::All => return literals().join(" and "),
            BooleanShape::Threshold => {}
        }
    }

    render_inequality(&form)
}

/// Keys proven non-null when `form >= 0` holds (`holds`) or fails.
///
/// Only collapsed AND/OR conditions carry such facts: a satisfied AND makes
/// every `k is not None` literal true, a failed OR makes every `k is None`
/// literal false, and a single literal works both ways.
pub fn keys_known_present(form: &LinearForm, holds: bool, options: &RenderOptions) -> Vec<String> {
    let form = normalize(form, options);
    let Some((positives, negatives)) = literal_keys(&form) else {
        return Vec::new();
    };
    let single = positives.len() + negatives.len() == 1;

    let keys = match (
        classify_boolean(positives.len(), negatives.len(), form.constant()),
        holds,
    ) {
        (BooleanShape::All, true) => negatives,
        (BooleanShape::Any, false) => positives,
        (BooleanShape::Any, true) if single => negatives,
        (BooleanShape::All, false) if single => positives,
        _ => Vec::new(),
    };
    keys.into_iter().map(str::to_string).collect()
}

/// `Σ positive terms >= Σ negated negative terms`, with the constant folded
/// onto whichever side would otherwise be empty.
fn render_inequality(form: &LinearForm) -> String {
    let mut lhs = Vec::new();
    let mut rhs = Vec::new();
    for (sign, text) in form.signed_terms() {
        match sign {
            Sign::Plus => lhs.push(text),
            Sign::Minus => rhs.push(text),
        }
    }

    let constant = form.constant();
    if lhs.is_empty() {
        lhs.push(format_number(constant));
    } else if rhs.is_empty() {
        rhs.push(format_number(-constant));
    } else if constant > 0.0 {
        lhs.push(format_number(constant));
    } else if constant < 0.0 {
        rhs.push(format_number(-constant));
    }

    if rhs.is_empty() {
        rhs.push(format_number(0.0));
    }

    format!("{} >= {}", lhs.join(" + "), rhs.join(" + "))
}
