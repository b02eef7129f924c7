//! Symbolic linear forms over named keys and their arithmetic rendering.

use super::numeric::{format_number, round_to, snap};
use std::collections::BTreeSet;
use std::fmt;

/// Sign token placed in front of a rendered term
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Plus,
    Minus,
}

impl Sign {
    fn of(value: f64) -> Self {
        if value < 0.0 {
            Sign::Minus
        } else {
            Sign::Plus
        }
    }

    fn token(self) -> &'static str {
        match self {
            Sign::Plus => "+",
            Sign::Minus => "-",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Term {
    key: String,
    value: f64,
    missing: f64,
}

/// Accumulates a value coefficient and a missingness coefficient per key,
/// plus a scalar constant.
///
/// Keys keep their first-insertion order, which is also the order terms are
/// rendered in. Every stored number is rounded to the form's tolerance, and
/// keys whose coefficients both round to zero are dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearForm {
    terms: Vec<Term>,
    constant: f64,
    nullable: BTreeSet<String>,
    tolerance: f64,
}

impl LinearForm {
    pub fn new(tolerance: f64) -> Self {
        Self {
            terms: Vec::new(),
            constant: 0.0,
            nullable: BTreeSet::new(),
            tolerance,
        }
    }

    /// Mark keys that may be null at runtime; value terms over them get a
    /// null-safe fallback when rendered.
    pub fn with_nullable_keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.nullable = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn value_coefficient(&self, key: &str) -> f64 {
        self.terms
            .iter()
            .find(|t| t.key == key)
            .map_or(0.0, |t| t.value)
    }

    pub fn missing_coefficient(&self, key: &str) -> f64 {
        self.terms
            .iter()
            .find(|t| t.key == key)
            .map_or(0.0, |t| t.missing)
    }

    /// All nonzero coefficients, value and missingness alike.
    pub fn coefficients(&self) -> impl Iterator<Item = f64> + '_ {
        self.terms
            .iter()
            .flat_map(|t| [t.value, t.missing])
            .filter(|c| *c != 0.0)
    }

    pub fn add_coefficient(&mut self, key: &str, value: f64) {
        let tolerance = self.tolerance;
        if let Some(term) = self.term_mut(key, value) {
            term.value = round_to(term.value + value, tolerance);
        }
        self.prune();
    }

    pub fn add_missing_coefficient(&mut self, key: &str, value: f64) {
        let tolerance = self.tolerance;
        if let Some(term) = self.term_mut(key, value) {
            term.missing = round_to(term.missing + value, tolerance);
        }
        self.prune();
    }

    pub fn add_constant(&mut self, value: f64) {
        self.constant = round_to(self.constant + value, self.tolerance);
    }

    pub fn shift_by(&mut self, value: f64) {
        self.add_constant(value);
    }

    /// Multiply every coefficient and the constant by `factor`. Scaling by
    /// zero clears the form.
    pub fn scale_by(&mut self, factor: f64) {
        if factor == 0.0 {
            self.terms.clear();
            self.constant = 0.0;
            return;
        }
        let tolerance = self.tolerance;
        for term in &mut self.terms {
            term.value = round_to(term.value * factor, tolerance);
            term.missing = round_to(term.missing * factor, tolerance);
        }
        self.constant = round_to(self.constant * factor, tolerance);
        self.prune();
    }

    /// Snap every coefficient and the constant with [`snap`].
    pub fn snap(&mut self, precision: f64) {
        for term in &mut self.terms {
            term.value = snap(term.value, precision);
            term.missing = snap(term.missing, precision);
        }
        self.constant = snap(self.constant, precision);
        self.prune();
    }

    /// Drop the missingness coefficient of a key known to be non-null.
    pub fn assume_present(&mut self, key: &str) {
        if let Some(term) = self.terms.iter_mut().find(|t| t.key == key) {
            term.missing = 0.0;
        }
        self.prune();
    }

    fn term_mut(&mut self, key: &str, delta: f64) -> Option<&mut Term> {
        if round_to(delta, self.tolerance) == 0.0 {
            return None;
        }
        let idx = match self.terms.iter().position(|t| t.key == key) {
            Some(idx) => idx,
            None => {
                self.terms.push(Term {
                    key: key.to_string(),
                    value: 0.0,
                    missing: 0.0,
                });
                self.terms.len() - 1
            }
        };
        self.terms.get_mut(idx)
    }

    fn prune(&mut self) {
        self.terms.retain(|t| t.value != 0.0 || t.missing != 0.0);
    }

    /// Render each key as a signed term. The text carries the magnitude; the
    /// sign is returned separately so callers can move terms across an
    /// inequality.
    pub(crate) fn signed_terms(&self) -> Vec<(Sign, String)> {
        self.terms.iter().map(|t| self.render_term(t)).collect()
    }

    pub(crate) fn boolean_terms(&self) -> Option<Vec<(Sign, &str)>> {
        self.terms
            .iter()
            .map(|t| {
                if t.value == 0.0 && t.missing.abs() == 1.0 {
                    Some((Sign::of(t.missing), t.key.as_str()))
                } else {
                    None
                }
            })
            .collect()
    }

    fn render_term(&self, term: &Term) -> (Sign, String) {
        let key = term.key.as_str();
        let (value, missing) = (term.value, term.missing);

        if value == 0.0 {
            let sign = Sign::of(missing);
            let text = if missing.abs() == 1.0 {
                format!("int({key} is None)")
            } else {
                format!("({} if {key} is None else 0)", format_number(missing.abs()))
            };
            return (sign, text);
        }

        if missing != 0.0 {
            let sign = Sign::of(missing);
            let flip = if sign == Sign::Minus { -1.0 } else { 1.0 };
            let text = format!(
                "({} if {key} is None else {})",
                format_number(missing.abs()),
                product(value * flip, key)
            );
            return (sign, text);
        }

        let sign = Sign::of(value);
        let magnitude = value.abs();
        let nullable = self.nullable.contains(key);
        let text = match (magnitude == 1.0, nullable) {
            (true, true) => format!("({key} or 0)"),
            (true, false) => key.to_string(),
            (false, true) => format!(
                "({} * {key} if {key} is not None else 0)",
                format_number(magnitude)
            ),
            (false, false) => format!("{} * {key}", format_number(magnitude)),
        };
        (sign, text)
    }

    /// Arithmetic rendering: terms joined with explicit signs, then the
    /// constant.
    pub fn render(&self) -> String {
        let terms = self.signed_terms();
        if terms.is_empty() {
            return format_number(self.constant);
        }

        let mut out = String::new();
        for (idx, (sign, text)) in terms.iter().enumerate() {
            if idx == 0 {
                if *sign == Sign::Minus {
                    out.push('-');
                }
                out.push_str(text);
            } else {
                out.push_str(&format!(" {} {}", sign.token(), text));
            }
        }

        if self.constant > 0.0 {
            out.push_str(&format!(" + {}", format_number(self.constant)));
        } else if self.constant < 0.0 {
            out.push_str(&format!(" - {}", format_number(-self.constant)));
        }
        out
    }
}

impl fmt::Display for LinearForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn product(coefficient: f64, key: &str) -> String {
    if coefficient == 1.0 {
        key.to_string()
    } else if coefficient == -1.0 {
        format!("-{key}")
    } else {
        format!("{} * {key}", format_number(coefficient))
    }
}
