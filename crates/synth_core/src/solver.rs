//! Solver-independent MILP description and the solver seam
//!
//! The encoder builds a `MilpProblem`; a `MilpSolver` turns it into either a
//! value per declared variable or an infeasibility verdict. `GoodLpSolver`
//! is the default implementation, backed by `good_lp` with the pure-Rust
//! `microlp` engine.

use crate::errors::{Result, SynthError};
use good_lp::{
    constraint, microlp, variable, Expression, ProblemVariables, ResolutionError, Solution,
    SolverModel, Variable,
};
use tracing::debug;

/// Index of a declared variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub usize);

/// Variable domain
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VarKind {
    /// Unbounded real
    Free,
    /// Real, at least zero
    NonNegative,
    /// Integer in {0, 1}
    Binary,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub name: String,
    pub kind: VarKind,
}

/// `Σ coefficient·variable + constant`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    pub terms: Vec<(VarId, f64)>,
    pub constant: f64,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constant(value: f64) -> Self {
        Self {
            terms: Vec::new(),
            constant: value,
        }
    }

    pub fn add_term(&mut self, var: VarId, coefficient: f64) {
        if coefficient != 0.0 {
            self.terms.push((var, coefficient));
        }
    }

    pub fn add_constant(&mut self, value: f64) {
        self.constant += value;
    }

    /// Add `scale * other` to this expression.
    pub fn add_scaled(&mut self, other: &LinearExpr, scale: f64) {
        for &(var, coefficient) in &other.terms {
            self.add_term(var, coefficient * scale);
        }
        self.constant += other.constant * scale;
    }

    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|(var, c)| c * values.get(var.0).copied().unwrap_or(0.0))
            .sum::<f64>()
            + self.constant
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    LessEq,
    GreaterEq,
    Equal,
}

/// `lhs (<= | >= | ==) rhs`
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub lhs: LinearExpr,
    pub relation: Relation,
    pub rhs: f64,
}

impl Constraint {
    pub fn leq(lhs: LinearExpr, rhs: f64) -> Self {
        Self {
            lhs,
            relation: Relation::LessEq,
            rhs,
        }
    }

    pub fn geq(lhs: LinearExpr, rhs: f64) -> Self {
        Self {
            lhs,
            relation: Relation::GreaterEq,
            rhs,
        }
    }

    pub fn is_satisfied_by(&self, values: &[f64], tolerance: f64) -> bool {
        let lhs = self.lhs.evaluate(values);
        match self.relation {
            Relation::LessEq => lhs <= self.rhs + tolerance,
            Relation::GreaterEq => lhs >= self.rhs - tolerance,
            Relation::Equal => (lhs - self.rhs).abs() <= tolerance,
        }
    }
}

/// Variables, constraints and an optional minimization objective
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MilpProblem {
    variables: Vec<VarDecl>,
    constraints: Vec<Constraint>,
    objective: Option<LinearExpr>,
}

impl MilpProblem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_variable(&mut self, name: impl Into<String>, kind: VarKind) -> VarId {
        self.variables.push(VarDecl {
            name: name.into(),
            kind,
        });
        VarId(self.variables.len() - 1)
    }

    pub fn add_constraint(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    pub fn set_objective(&mut self, objective: LinearExpr) {
        self.objective = Some(objective);
    }

    pub fn variables(&self) -> &[VarDecl] {
        &self.variables
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn objective(&self) -> Option<&LinearExpr> {
        self.objective.as_ref()
    }

    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    pub fn binary_count(&self) -> usize {
        self.variables
            .iter()
            .filter(|v| v.kind == VarKind::Binary)
            .count()
    }

    /// Indices of constraints violated by `values`. Variable domains are
    /// reported as `constraints().len() + variable index`.
    pub fn violations(&self, values: &[f64], tolerance: f64) -> Vec<usize> {
        let mut violated: Vec<usize> = self
            .constraints
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.is_satisfied_by(values, tolerance))
            .map(|(idx, _)| idx)
            .collect();

        for (idx, decl) in self.variables.iter().enumerate() {
            let value = values.get(idx).copied().unwrap_or(f64::NAN);
            let ok = match decl.kind {
                VarKind::Free => value.is_finite(),
                VarKind::NonNegative => value >= -tolerance,
                VarKind::Binary => value.abs() <= tolerance || (value - 1.0).abs() <= tolerance,
            };
            if !ok {
                violated.push(self.constraints.len() + idx);
            }
        }
        violated
    }

    pub fn is_satisfied_by(&self, values: &[f64], tolerance: f64) -> bool {
        values.len() == self.variables.len() && self.violations(values, tolerance).is_empty()
    }
}

/// Result of one solver invocation
#[derive(Debug, Clone, PartialEq)]
pub enum SolveOutcome {
    /// One value per declared variable, in declaration order
    Solved(Vec<f64>),
    Infeasible,
}

/// External MILP engine
pub trait MilpSolver {
    fn solve(&self, problem: &MilpProblem) -> Result<SolveOutcome>;
}

impl<S: MilpSolver + ?Sized> MilpSolver for &S {
    fn solve(&self, problem: &MilpProblem) -> Result<SolveOutcome> {
        (**self).solve(problem)
    }
}

/// `good_lp` + `microlp` backed solver
#[derive(Debug, Clone, Copy, Default)]
pub struct GoodLpSolver;

impl GoodLpSolver {
    pub fn new() -> Self {
        Self
    }
}

fn to_expression(expr: &LinearExpr, handles: &[Variable]) -> Expression {
    let mut out = Expression::from(expr.constant);
    for &(var, coefficient) in &expr.terms {
        out += handles[var.0] * coefficient;
    }
    out
}

impl MilpSolver for GoodLpSolver {
    fn solve(&self, problem: &MilpProblem) -> Result<SolveOutcome> {
        let mut vars = ProblemVariables::new();
        let handles: Vec<Variable> = problem
            .variables()
            .iter()
            .map(|decl| {
                let definition = match decl.kind {
                    VarKind::Free => variable(),
                    VarKind::NonNegative => variable().min(0.0),
                    VarKind::Binary => variable().integer().min(0.0).max(1.0),
                };
                vars.add(definition.name(decl.name.clone()))
            })
            .collect();

        let objective = problem
            .objective()
            .map(|o| to_expression(o, &handles))
            .unwrap_or_else(|| Expression::from(0.0));

        let mut model = vars.minimise(objective).using(microlp);
        for c in problem.constraints() {
            let lhs = to_expression(&c.lhs, &handles);
            let rhs = Expression::from(c.rhs);
            let translated = match c.relation {
                Relation::LessEq => constraint!(lhs <= rhs),
                Relation::GreaterEq => constraint!(lhs >= rhs),
                Relation::Equal => constraint!(lhs == rhs),
            };
            model.add_constraint(translated);
        }

        debug!(
            variables = handles.len(),
            constraints = problem.constraints().len(),
            "invoking microlp"
        );

        match model.solve() {
            Ok(solution) => Ok(SolveOutcome::Solved(
                handles.iter().map(|&h| solution.value(h)).collect(),
            )),
            Err(ResolutionError::Infeasible) => Ok(SolveOutcome::Infeasible),
            Err(err) => Err(SynthError::Solver(err.to_string())),
        }
    }
}
