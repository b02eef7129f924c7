//! Symbolic expression engine
//!
//! Turns solved coefficient rows into readable source expressions:
//! - `numeric`: tolerance rounding, common-factor selection, literals
//! - `linear`: linear form builder and arithmetic rendering
//! - `condition`: boolean rendering with AND/OR collapse
//! - `nullable`: null-guarded output expressions

pub mod condition;
pub mod linear;
pub mod nullable;
pub mod numeric;

pub use condition::{
    classify_boolean, keys_known_present, render_condition, BooleanShape, FALSE_LITERAL,
    TRUE_LITERAL,
};
pub use linear::{LinearForm, Sign};
pub use nullable::{NullableExpression, OutputExpression};
pub use numeric::{
    dominant_magnitude, format_number, round_to, snap, MagnitudeTieBreak,
    DEFAULT_ROUNDING_TOLERANCE, DEFAULT_SOLUTION_PRECISION,
};

use serde::{Deserialize, Serialize};

/// Rounding and normalization policy used when rendering solved rows
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderOptions {
    /// Rounding applied after every form operation
    pub tolerance: f64,
    /// Relative grid raw-unit coefficients and split sums are snapped to
    #[serde(default = "default_precision")]
    pub precision: f64,
    pub tie_break: MagnitudeTieBreak,
}

fn default_precision() -> f64 {
    DEFAULT_SOLUTION_PRECISION
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_ROUNDING_TOLERANCE,
            precision: DEFAULT_SOLUTION_PRECISION,
            tie_break: MagnitudeTieBreak::default(),
        }
    }
}
