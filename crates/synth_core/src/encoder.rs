//! Fixed-depth tree encoding as a mixed-integer linear program
//!
//! For a given depth the encoder lays out a complete binary skeleton and
//! declares, in a side table keyed by node path:
//! - a free variable per leaf-map cell and per split-condition cell,
//! - a binary choice per (split, example), 0 routing to `greater`,
//! - with L1 regularization, a non-negative magnitude per coefficient cell.
//!
//! Big-M relaxation lets a leaf ignore every example that is routed
//! elsewhere. The constants are only valid for inputs scaled into `[-1, 1]`.

use crate::config::Regularization;
use crate::errors::{Result, SynthError};
use crate::solver::{Constraint, LinearExpr, MilpProblem, Relation, VarId, VarKind};
use crate::tree::{route, Branch, Node};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Relaxation bound for leaf equalities and split sums
pub const BIG_M: f64 = 2.0;

/// Minimum distance of a `less` split sum below zero
pub const SPLIT_GAP: f64 = 0.1;

/// Total objective weight spread over split choices under L1. It only
/// breaks ties between mirrored trees: earlier examples prefer `less`.
pub const ORIENTATION_WEIGHT: f64 = 1e-3;

/// Complete binary skeleton with path identifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    Leaf {
        id: String,
    },
    Internal {
        id: String,
        greater: Box<Shape>,
        less: Box<Shape>,
    },
}

impl Shape {
    /// Depth 1 is a single leaf; depth `d` splits into two depth `d - 1`
    /// subtrees.
    pub fn complete(depth: usize) -> Self {
        Self::grow("root".to_string(), depth)
    }

    fn grow(id: String, depth: usize) -> Self {
        if depth <= 1 {
            return Shape::Leaf { id };
        }
        Shape::Internal {
            greater: Box::new(Self::grow(format!("{id}.gt"), depth - 1)),
            less: Box::new(Self::grow(format!("{id}.lt"), depth - 1)),
            id,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Shape::Leaf { id } | Shape::Internal { id, .. } => id,
        }
    }

    pub fn leaf_count(&self) -> usize {
        match self {
            Shape::Leaf { .. } => 1,
            Shape::Internal { greater, less, .. } => greater.leaf_count() + less.leaf_count(),
        }
    }

    pub fn split_count(&self) -> usize {
        match self {
            Shape::Leaf { .. } => 0,
            Shape::Internal { greater, less, .. } => {
                1 + greater.split_count() + less.split_count()
            }
        }
    }
}

#[derive(Debug, Clone)]
struct SplitVars {
    condition: Vec<VarId>,
    /// One per training example
    choices: Vec<VarId>,
}

/// A fixed-depth MILP together with the side table mapping skeleton nodes
/// to their variables.
#[derive(Debug, Clone)]
pub struct TreeEncoding {
    depth: usize,
    shape: Shape,
    problem: MilpProblem,
    inputs: Vec<Vec<f64>>,
    input_width: usize,
    output_width: usize,
    leaves: BTreeMap<String, Vec<Vec<VarId>>>,
    splits: BTreeMap<String, SplitVars>,
    /// `(coefficient, magnitude)` pairs under L1 regularization
    magnitudes: Vec<(VarId, VarId)>,
}

impl TreeEncoding {
    /// Encode "a depth-`depth` tree reproduces every `(input, output)` pair
    /// exactly" over vectorized, scaled examples.
    pub fn build(
        depth: usize,
        inputs: &[Vec<f64>],
        outputs: &[Vec<f64>],
        regularization: Regularization,
    ) -> Result<Self> {
        if depth == 0 {
            return Err(SynthError::InvalidConfig(
                "tree depth must be at least 1".to_string(),
            ));
        }
        if inputs.len() != outputs.len() {
            return Err(SynthError::LengthMismatch {
                inputs: inputs.len(),
                outputs: outputs.len(),
            });
        }
        let input_width = inputs.first().map_or(0, Vec::len);
        let output_width = outputs.first().map_or(0, Vec::len);
        if inputs.iter().any(|x| x.len() != input_width)
            || outputs.iter().any(|y| y.len() != output_width)
        {
            return Err(SynthError::ShapeMismatch(
                "training vectors have inconsistent widths".to_string(),
            ));
        }

        if let Some(max) = inputs
            .iter()
            .flatten()
            .map(|v| v.abs())
            .filter(|v| *v > 1.0 + 1e-9)
            .reduce(f64::max)
        {
            warn!(
                max_abs_input = max,
                "input component outside [-1, 1]; big-M constants may cut off valid trees"
            );
        }

        let mut encoding = Self {
            depth,
            shape: Shape::complete(depth),
            problem: MilpProblem::new(),
            inputs: inputs.to_vec(),
            input_width,
            output_width,
            leaves: BTreeMap::new(),
            splits: BTreeMap::new(),
            magnitudes: Vec::new(),
        };

        let shape = encoding.shape.clone();
        let mut ancestors = Vec::new();
        encoding.encode_node(&shape, outputs, &mut ancestors);

        if regularization == Regularization::L1 {
            encoding.add_l1_objective();
        }

        debug!(
            depth,
            variables = encoding.problem.variable_count(),
            binaries = encoding.problem.binary_count(),
            constraints = encoding.problem.constraints().len(),
            "encoded tree"
        );
        Ok(encoding)
    }

    fn encode_node(
        &mut self,
        shape: &Shape,
        outputs: &[Vec<f64>],
        ancestors: &mut Vec<(String, Branch)>,
    ) {
        match shape {
            Shape::Leaf { id } => self.encode_leaf(id, outputs, ancestors),
            Shape::Internal { id, greater, less } => {
                self.encode_split(id);
                ancestors.push((id.clone(), Branch::Greater));
                self.encode_node(greater, outputs, ancestors);
                ancestors.pop();
                ancestors.push((id.clone(), Branch::Less));
                self.encode_node(less, outputs, ancestors);
                ancestors.pop();
            }
        }
    }

    fn encode_leaf(&mut self, id: &str, outputs: &[Vec<f64>], ancestors: &[(String, Branch)]) {
        let mut map: Vec<Vec<VarId>> = Vec::with_capacity(self.output_width);
        for i in 0..self.output_width {
            let mut row = Vec::with_capacity(self.input_width);
            for j in 0..self.input_width {
                row.push(
                    self.problem
                        .add_variable(format!("{id}.map[{i}][{j}]"), VarKind::Free),
                );
            }
            map.push(row);
        }

        let mut constraints = Vec::new();
        for (example, (x, y)) in self.inputs.iter().zip(outputs).enumerate() {
            // R counts ancestors whose routing sends this example elsewhere
            let mut relaxation = LinearExpr::new();
            for (split_id, branch) in ancestors {
                let choice = self.splits[split_id].choices[example];
                match branch {
                    Branch::Greater => relaxation.add_term(choice, 1.0),
                    Branch::Less => {
                        relaxation.add_constant(1.0);
                        relaxation.add_term(choice, -1.0);
                    }
                }
            }

            for (row, target) in map.iter().zip(y) {
                let mut mapped = LinearExpr::new();
                for (&var, &component) in row.iter().zip(x) {
                    mapped.add_term(var, component);
                }

                if ancestors.is_empty() {
                    constraints.push(Constraint {
                        lhs: mapped,
                        relation: Relation::Equal,
                        rhs: *target,
                    });
                    continue;
                }

                let mut upper = mapped.clone();
                upper.add_scaled(&relaxation, -BIG_M);
                constraints.push(Constraint::leq(upper, *target));

                let mut lower = mapped;
                lower.add_scaled(&relaxation, BIG_M);
                constraints.push(Constraint::geq(lower, *target));
            }
        }

        for constraint in constraints {
            self.problem.add_constraint(constraint);
        }
        self.leaves.insert(id.to_string(), map);
    }

    fn encode_split(&mut self, id: &str) {
        let mut condition = Vec::with_capacity(self.input_width);
        for j in 0..self.input_width {
            condition.push(
                self.problem
                    .add_variable(format!("{id}.cond[{j}]"), VarKind::Free),
            );
        }
        let mut choices = Vec::with_capacity(self.inputs.len());
        for e in 0..self.inputs.len() {
            choices.push(
                self.problem
                    .add_variable(format!("{id}.choice[{e}]"), VarKind::Binary),
            );
        }

        let mut constraints = Vec::new();
        for (x, &choice) in self.inputs.iter().zip(&choices) {
            let mut sum = LinearExpr::new();
            for (&var, &component) in condition.iter().zip(x) {
                sum.add_term(var, component);
            }

            // choice = 0: 0 <= s <= M; choice = 1: -M <= s <= -gap
            let mut upper = sum.clone();
            upper.add_term(choice, BIG_M + SPLIT_GAP);
            constraints.push(Constraint::leq(upper, BIG_M));

            let mut lower = sum;
            lower.add_term(choice, BIG_M);
            constraints.push(Constraint::geq(lower, 0.0));
        }

        for constraint in constraints {
            self.problem.add_constraint(constraint);
        }
        self.splits
            .insert(id.to_string(), SplitVars { condition, choices });
    }

    fn coefficient_vars(&self) -> Vec<VarId> {
        let mut vars: Vec<VarId> = self
            .problem
            .variables()
            .iter()
            .enumerate()
            .filter(|(_, decl)| decl.kind == VarKind::Free)
            .map(|(idx, _)| VarId(idx))
            .collect();
        vars.sort();
        vars
    }

    fn add_l1_objective(&mut self) {
        let mut objective = LinearExpr::new();
        for var in self.coefficient_vars() {
            let name = format!("{}.abs", self.problem.variables()[var.0].name);
            let magnitude = self.problem.add_variable(name, VarKind::NonNegative);

            let mut above = LinearExpr::new();
            above.add_term(var, 1.0);
            above.add_term(magnitude, -1.0);
            self.problem.add_constraint(Constraint::leq(above, 0.0));

            let mut below = LinearExpr::new();
            below.add_term(var, -1.0);
            below.add_term(magnitude, -1.0);
            self.problem.add_constraint(Constraint::leq(below, 0.0));

            objective.add_term(magnitude, 1.0);
            self.magnitudes.push((var, magnitude));
        }

        let count = self.inputs.len() as f64;
        let total = count * (count + 1.0) / 2.0;
        for split in self.splits.values() {
            for (idx, &choice) in split.choices.iter().enumerate() {
                objective.add_term(choice, ORIENTATION_WEIGHT * (idx as f64 + 1.0) / total);
            }
        }
        self.problem.set_objective(objective);
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn problem(&self) -> &MilpProblem {
        &self.problem
    }

    /// Read a solved assignment back into a tree. Coefficients are kept as
    /// the solver reported them; cleanup happens in raw units at render time.
    pub fn extract(&self, values: &[f64]) -> Result<Node> {
        if values.len() != self.problem.variable_count() {
            return Err(SynthError::ShapeMismatch(format!(
                "solver returned {} values for {} variables",
                values.len(),
                self.problem.variable_count()
            )));
        }
        let read = |var: &VarId| values[var.0];
        self.extract_node(&self.shape, &read)
    }

    fn extract_node(&self, shape: &Shape, read: &dyn Fn(&VarId) -> f64) -> Result<Node> {
        match shape {
            Shape::Leaf { id } => {
                let map = self.leaf_vars(id)?;
                Ok(Node::leaf(
                    map.iter().map(|row| row.iter().map(read).collect()).collect(),
                ))
            }
            Shape::Internal { id, greater, less } => {
                let split = self.split_vars(id)?;
                Ok(Node::internal(
                    split.condition.iter().map(read).collect(),
                    self.extract_node(greater, read)?,
                    self.extract_node(less, read)?,
                ))
            }
        }
    }

    /// The variable assignment a concrete tree induces on this encoding.
    /// Choices follow the tree's own routing; magnitudes are the absolute
    /// coefficient values.
    pub fn assignment_from_tree(&self, tree: &Node, tolerance: f64) -> Result<Vec<f64>> {
        tree.validate(self.input_width, self.output_width)?;
        let mut values = vec![0.0; self.problem.variable_count()];
        self.assign_node(&self.shape, tree, tolerance, &mut values)?;
        for &(var, magnitude) in &self.magnitudes {
            values[magnitude.0] = values[var.0].abs();
        }
        Ok(values)
    }

    fn assign_node(
        &self,
        shape: &Shape,
        node: &Node,
        tolerance: f64,
        values: &mut [f64],
    ) -> Result<()> {
        match (shape, node) {
            (Shape::Leaf { id }, Node::Leaf { map }) => {
                for (vars, coefficients) in self.leaf_vars(id)?.iter().zip(map) {
                    for (var, coefficient) in vars.iter().zip(coefficients) {
                        values[var.0] = *coefficient;
                    }
                }
                Ok(())
            }
            (
                Shape::Internal { id, greater, less },
                Node::Internal {
                    condition,
                    greater: node_greater,
                    less: node_less,
                },
            ) => {
                let split = self.split_vars(id)?;
                for (var, coefficient) in split.condition.iter().zip(condition) {
                    values[var.0] = *coefficient;
                }
                for (x, choice) in self.inputs.iter().zip(&split.choices) {
                    values[choice.0] = match route(condition, x, tolerance) {
                        Branch::Greater => 0.0,
                        Branch::Less => 1.0,
                    };
                }
                self.assign_node(greater, node_greater, tolerance, values)?;
                self.assign_node(less, node_less, tolerance, values)
            }
            _ => Err(SynthError::ShapeMismatch(format!(
                "tree does not match the depth {} skeleton at `{}`",
                self.depth,
                shape.id()
            ))),
        }
    }

    fn leaf_vars(&self, id: &str) -> Result<&Vec<Vec<VarId>>> {
        self.leaves
            .get(id)
            .ok_or_else(|| SynthError::ShapeMismatch(format!("no leaf variables for `{id}`")))
    }

    fn split_vars(&self, id: &str) -> Result<&SplitVars> {
        self.splits
            .get(id)
            .ok_or_else(|| SynthError::ShapeMismatch(format!("no split variables for `{id}`")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-9;

    /// x in {0, 1, 2, 3} scaled with a constant column; y = -1, -1, 1, 1.
    fn step_data() -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
        let inputs = [0.0, 1.0, 2.0, 3.0]
            .iter()
            .map(|x| vec![2.0 / 3.0 * x - 1.0, 1.0])
            .collect();
        let outputs = [-1.0, -1.0, 1.0, 1.0].iter().map(|y| vec![*y]).collect();
        (inputs, outputs)
    }

    fn step_tree() -> Node {
        Node::internal(
            vec![0.15, -0.05],
            Node::leaf(vec![vec![0.0, 1.0]]),
            Node::leaf(vec![vec![0.0, -1.0]]),
        )
    }

    #[test]
    fn test_shape_paths() {
        let shape = Shape::complete(3);
        assert_eq!(shape.id(), "root");
        assert_eq!(shape.leaf_count(), 4);
        assert_eq!(shape.split_count(), 3);
        match shape {
            Shape::Internal { greater, less, .. } => {
                assert_eq!(greater.id(), "root.gt");
                assert_eq!(less.id(), "root.lt");
            }
            Shape::Leaf { .. } => panic!("expected a split at the root"),
        }
        assert!(matches!(Shape::complete(1), Shape::Leaf { .. }));
    }

    #[test]
    fn test_variable_and_constraint_counts() {
        let (inputs, outputs) = step_data();
        let encoding = TreeEncoding::build(2, &inputs, &outputs, Regularization::L1).unwrap();
        let problem = encoding.problem();
        // 2 leaves x 2 map cells, 2 condition cells, 4 choices, 6 magnitudes
        assert_eq!(problem.variable_count(), 16);
        assert_eq!(problem.binary_count(), 4);
        // leaves 2 x 4 examples x 2, splits 4 x 2, magnitudes 6 x 2
        assert_eq!(problem.constraints().len(), 36);
        assert!(problem.objective().is_some());

        let plain = TreeEncoding::build(2, &inputs, &outputs, Regularization::None).unwrap();
        assert_eq!(plain.problem().variable_count(), 10);
        assert!(plain.problem().objective().is_none());
    }

    #[test]
    fn test_root_leaf_is_exact() {
        let (inputs, outputs) = step_data();
        let encoding = TreeEncoding::build(1, &inputs, &outputs, Regularization::None).unwrap();
        assert_eq!(encoding.problem().constraints().len(), 4);

        // a single linear map cannot reproduce a step
        let linear = Node::leaf(vec![vec![1.0, 0.0]]);
        let values = encoding.assignment_from_tree(&linear, 1e-14).unwrap();
        assert!(!encoding.problem().is_satisfied_by(&values, TOL));
    }

    #[test]
    fn test_step_tree_satisfies_depth_two() {
        let (inputs, outputs) = step_data();
        let encoding = TreeEncoding::build(2, &inputs, &outputs, Regularization::L1).unwrap();
        let values = encoding.assignment_from_tree(&step_tree(), 1e-14).unwrap();
        assert!(
            encoding.problem().is_satisfied_by(&values, TOL),
            "violated: {:?}",
            encoding.problem().violations(&values, TOL)
        );
    }

    #[test]
    fn test_depth_monotonicity() {
        let (inputs, outputs) = step_data();
        let deeper = step_tree().extend_trivially(2);
        let encoding = TreeEncoding::build(3, &inputs, &outputs, Regularization::L1).unwrap();
        let values = encoding.assignment_from_tree(&deeper, 1e-14).unwrap();
        assert!(
            encoding.problem().is_satisfied_by(&values, TOL),
            "violated: {:?}",
            encoding.problem().violations(&values, TOL)
        );
    }

    #[test]
    fn test_wrong_leaf_value_is_violated() {
        let (inputs, outputs) = step_data();
        let encoding = TreeEncoding::build(2, &inputs, &outputs, Regularization::None).unwrap();
        let wrong = Node::internal(
            vec![0.15, -0.05],
            Node::leaf(vec![vec![0.0, 0.5]]),
            Node::leaf(vec![vec![0.0, -1.0]]),
        );
        let values = encoding.assignment_from_tree(&wrong, 1e-14).unwrap();
        assert!(!encoding.problem().violations(&values, TOL).is_empty());
    }

    #[test]
    fn test_assignment_shape_mismatch() {
        let (inputs, outputs) = step_data();
        let encoding = TreeEncoding::build(1, &inputs, &outputs, Regularization::L1).unwrap();
        let err = encoding.assignment_from_tree(&step_tree(), 1e-14).unwrap_err();
        assert!(matches!(err, SynthError::ShapeMismatch(_)));
    }

    #[test]
    fn test_extract_round_trips_assignment() {
        let (inputs, outputs) = step_data();
        let encoding = TreeEncoding::build(2, &inputs, &outputs, Regularization::L1).unwrap();
        let mut values = encoding.assignment_from_tree(&step_tree(), 1e-14).unwrap();
        let tree = encoding.extract(&values).unwrap();
        assert_eq!(tree, step_tree());

        // noise survives extraction untouched
        values[0] += 1e-12;
        assert_ne!(encoding.extract(&values).unwrap(), step_tree());

        assert!(encoding.extract(&values[1..]).is_err());
    }

    #[test]
    fn test_objective_weights_choices_by_example_order() {
        let (inputs, outputs) = step_data();
        let encoding = TreeEncoding::build(2, &inputs, &outputs, Regularization::L1).unwrap();
        let problem = encoding.problem();
        let objective = problem.objective().unwrap();

        let weights: Vec<f64> = objective
            .terms
            .iter()
            .filter(|(var, _)| problem.variables()[var.0].kind == VarKind::Binary)
            .map(|(_, weight)| *weight)
            .collect();
        assert_eq!(weights.len(), 4);
        assert!(weights.windows(2).all(|pair| pair[0] < pair[1]));
        assert!((weights.iter().sum::<f64>() - ORIENTATION_WEIGHT).abs() < 1e-15);

        // the x >= 2 orientation is strictly cheaper than its mirror
        let values = encoding.assignment_from_tree(&step_tree(), 1e-14).unwrap();
        let mirrored = Node::internal(
            vec![-0.15, -0.05],
            Node::leaf(vec![vec![0.0, -1.0]]),
            Node::leaf(vec![vec![0.0, 1.0]]),
        );
        let mirror_values = encoding.assignment_from_tree(&mirrored, 1e-14).unwrap();
        assert!(problem.is_satisfied_by(&mirror_values, TOL));
        assert!(objective.evaluate(&values) < objective.evaluate(&mirror_values));
    }

    #[test]
    fn test_rejects_bad_training_shapes() {
        let (inputs, outputs) = step_data();
        assert!(matches!(
            TreeEncoding::build(2, &inputs[1..], &outputs, Regularization::L1),
            Err(SynthError::LengthMismatch { .. })
        ));
        let mut ragged = inputs.clone();
        ragged[2].push(0.0);
        assert!(matches!(
            TreeEncoding::build(2, &ragged, &outputs, Regularization::L1),
            Err(SynthError::ShapeMismatch(_))
        ));
        assert!(TreeEncoding::build(0, &inputs, &outputs, Regularization::L1).is_err());
    }
}
