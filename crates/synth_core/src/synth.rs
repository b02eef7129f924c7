//! Depth search: encode, solve, deepen on infeasibility
//!
//! Depths are tried in increasing order, so the first feasible depth is the
//! shallowest complete tree that reproduces the training data.

use crate::config::{Regularization, SynthConfig};
use crate::encoder::TreeEncoding;
use crate::errors::{Result, SynthError};
use crate::model::SynthesizedModel;
use crate::record::Record;
use crate::solver::{GoodLpSolver, MilpSolver, SolveOutcome};
use crate::vectorizer::Vectorizer;
use tracing::{debug, info};

/// Depths `1..=max_depth`, in order
#[derive(Debug, Clone)]
pub struct DepthSchedule {
    next: usize,
    max_depth: usize,
}

impl DepthSchedule {
    pub fn new(max_depth: usize) -> Self {
        Self { next: 1, max_depth }
    }
}

impl Iterator for DepthSchedule {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.next > self.max_depth {
            return None;
        }
        let depth = self.next;
        self.next += 1;
        Some(depth)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.max_depth + 1).saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for DepthSchedule {}

/// Fits exact trees with a configurable solver
pub struct Synthesizer<S: MilpSolver = GoodLpSolver> {
    config: SynthConfig,
    solver: S,
}

impl Synthesizer<GoodLpSolver> {
    pub fn new(config: SynthConfig) -> Self {
        Self::with_solver(config, GoodLpSolver::new())
    }
}

impl<S: MilpSolver> Synthesizer<S> {
    pub fn with_solver(config: SynthConfig, solver: S) -> Self {
        Self { config, solver }
    }

    pub fn config(&self) -> &SynthConfig {
        &self.config
    }

    /// Find the shallowest tree mapping every input record to its output
    /// record exactly.
    pub fn fit(&self, inputs: &[Record], outputs: &[Record]) -> Result<SynthesizedModel> {
        self.config.validate()?;
        self.config.warnings();

        if inputs.len() != outputs.len() {
            return Err(SynthError::LengthMismatch {
                inputs: inputs.len(),
                outputs: outputs.len(),
            });
        }
        if inputs.is_empty() {
            return Err(SynthError::EmptyTrainingSet);
        }

        let input = Vectorizer::fit(inputs, true)?;
        let output = Vectorizer::fit(outputs, false)?;
        let x = input.to_vectors(inputs);
        let y = output.to_vectors(outputs);

        info!(
            examples = inputs.len(),
            input_width = input.width(),
            output_width = output.width(),
            max_depth = self.config.max_depth,
            regularization = %self.config.regularization,
            "Starting tree synthesis"
        );

        for depth in DepthSchedule::new(self.config.max_depth) {
            let encoding = TreeEncoding::build(depth, &x, &y, self.config.regularization)?;
            debug!(
                depth,
                variables = encoding.problem().variable_count(),
                constraints = encoding.problem().constraints().len(),
                "Solving depth"
            );

            match self.solver.solve(encoding.problem())? {
                SolveOutcome::Solved(values) => {
                    let root = encoding.extract(&values)?;
                    info!(depth, leaves = root.leaf_count(), "Found exact tree");
                    return Ok(SynthesizedModel::new(
                        input,
                        output,
                        root,
                        self.config.regularization,
                        self.config.render_options(),
                        self.config.indent_width,
                    ));
                }
                SolveOutcome::Infeasible => debug!(depth, "No exact tree at depth"),
            }
        }

        Err(SynthError::NoExactFitFound {
            max_depth: self.config.max_depth,
        })
    }
}

/// Fit with default settings and the given regularization.
pub fn fit(
    inputs: &[Record],
    outputs: &[Record],
    regularization: Regularization,
) -> Result<SynthesizedModel> {
    let config = SynthConfig {
        regularization,
        ..SynthConfig::default()
    };
    Synthesizer::new(config).fit(inputs, outputs)
}
