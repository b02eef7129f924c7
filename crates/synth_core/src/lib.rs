//! Exact piecewise-linear decision tree synthesis
//!
//! Given example input records and the output records they must produce,
//! finds the shallowest binary tree whose leaves are exact linear maps, then
//! renders it as readable source code.
//!
//! Modules:
//! - `record`: Number-or-null records and JSON conversion
//! - `vectorizer`: Schema fitting, scaling and record <-> vector conversion
//! - `expression`: Symbolic linear forms, boolean collapse, null guards
//! - `tree`: Solved tree nodes and routing
//! - `solver`: MILP description and the `good_lp` backed solver
//! - `encoder`: Fixed-depth tree encoding as a MILP
//! - `synth`: Depth search producing a `SynthesizedModel`
//! - `model`: Prediction, source emission and persistence
//! - `codegen`: Function layout for emitted source
//! - `config`: TOML configuration with environment overrides
//! - `canon`: Canonical JSON and BLAKE3 fingerprints

pub mod canon;
pub mod codegen;
pub mod config;
pub mod encoder;
pub mod errors;
pub mod expression;
pub mod model;
pub mod record;
pub mod solver;
pub mod synth;
pub mod tree;
pub mod vectorizer;

pub use config::{Regularization, SynthConfig};
pub use encoder::{Shape, TreeEncoding, BIG_M, SPLIT_GAP};
pub use errors::{Result, SynthError};
pub use expression::{LinearForm, MagnitudeTieBreak, NullableExpression, RenderOptions};
pub use model::SynthesizedModel;
pub use record::{record, record_from_json, records_from_json, Record, Value};
pub use solver::{GoodLpSolver, MilpProblem, MilpSolver, SolveOutcome};
pub use synth::{fit, DepthSchedule, Synthesizer};
pub use tree::{Branch, Node};
pub use vectorizer::{ScaleMap, Vectorizer};

/// Crate version string recorded alongside emitted artifacts
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
