//! Error types for the synthesis engine

use thiserror::Error;

/// Errors that can occur while fitting, emitting or persisting a model
#[derive(Error, Debug)]
pub enum SynthError {
    /// A record value is neither a finite number nor null
    #[error("Invalid value for key `{key}`: {found}")]
    InvalidValueKind { key: String, found: String },

    /// Input and output sequences differ in length
    #[error("Training data length mismatch: {inputs} input records, {outputs} output records")]
    LengthMismatch { inputs: usize, outputs: usize },

    /// No training examples were supplied
    #[error("Training set is empty")]
    EmptyTrainingSet,

    /// Every depth up to the configured ceiling was infeasible
    #[error("No exact fit found up to depth {max_depth}")]
    NoExactFitFound { max_depth: usize },

    /// The solver failed for a reason other than infeasibility
    #[error("Solver failure: {0}")]
    Solver(String),

    /// A tree, assignment or loaded model does not match the expected layout
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// TOML configuration could not be parsed or written
    #[error("Configuration format error: {0}")]
    ConfigParse(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for synthesis operations
pub type Result<T> = std::result::Result<T, SynthError>;
