//! Capability interface to an external MILP solver.
//!
//! The layout formulator never talks to a solver library directly. It only
//! needs to create variables, register linear constraints, set an objective,
//! run the optimization and read values back; [`MilpSolver`] captures exactly
//! that, so any conforming library can be substituted.
//!
//! ```text
//! LayoutFormulator ──add_*_variable / add_linear_constraint / set_objective──▶ MilpSolver
//!                  ◀──────────── optimize() -> SolveStatus, value(var) ───────
//! ```
//!
//! [`GoodLpSolver`] is the stock implementation, backed by `good_lp` and one
//! of its MILP backends (see [`MilpBackend`]).

mod lp_backend;

pub use lp_backend::GoodLpSolver;

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Handle to a variable created through [`MilpSolver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variable(usize);

impl Variable {
    pub fn new(index: usize) -> Self {
        Variable(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

/// Affine expression `Σ coef·var + constant`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    terms: Vec<(Variable, f64)>,
    constant: f64,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style `+ coef·var`.
    pub fn with_term(mut self, var: Variable, coef: f64) -> Self {
        self.add_term(var, coef);
        self
    }

    pub fn add_term(&mut self, var: Variable, coef: f64) {
        self.terms.push((var, coef));
    }

    pub fn add_constant(&mut self, value: f64) {
        self.constant += value;
    }

    /// Unit-coefficient sum of the given variables.
    pub fn sum(vars: impl IntoIterator<Item = Variable>) -> Self {
        vars.into_iter().map(|v| (v, 1.0)).collect()
    }

    pub fn terms(&self) -> &[(Variable, f64)] {
        &self.terms
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Evaluate against a value lookup; unknown variables count as zero.
    pub fn evaluate(&self, value: impl Fn(Variable) -> Option<f64>) -> f64 {
        self.terms
            .iter()
            .map(|&(var, coef)| coef * value(var).unwrap_or(0.0))
            .sum::<f64>()
            + self.constant
    }
}

impl From<Variable> for LinearExpr {
    fn from(var: Variable) -> Self {
        LinearExpr::new().with_term(var, 1.0)
    }
}

impl FromIterator<(Variable, f64)> for LinearExpr {
    fn from_iter<I: IntoIterator<Item = (Variable, f64)>>(iter: I) -> Self {
        Self {
            terms: iter.into_iter().collect(),
            constant: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    LessOrEqual,
    Equal,
    GreaterOrEqual,
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Relation::LessOrEqual => "<=",
            Relation::Equal => "==",
            Relation::GreaterOrEqual => ">=",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Minimize,
    Maximize,
}

/// Terminal status reported by [`MilpSolver::optimize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    /// Proven optimal solution.
    Optimal,
    /// Feasible incumbent returned under a time or resource limit.
    Feasible,
    /// No assignment satisfies the constraints.
    Infeasible,
    /// Objective can improve without bound.
    Unbounded,
    /// Budget exhausted without any incumbent.
    TimeLimit,
}

impl SolveStatus {
    /// Whether variable values are available after this status.
    pub fn has_solution(&self) -> bool {
        matches!(self, SolveStatus::Optimal | SolveStatus::Feasible)
    }
}

impl std::fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SolveStatus::Optimal => "optimal",
            SolveStatus::Feasible => "feasible",
            SolveStatus::Infeasible => "infeasible",
            SolveStatus::Unbounded => "unbounded",
            SolveStatus::TimeLimit => "time_limit",
        })
    }
}

/// Failures of the solver machinery itself (as opposed to model outcomes).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SolverError {
    #[error("No objective set before optimize()")]
    NoObjective,

    #[error("Variable {0} was not created by this solver")]
    UnknownVariable(usize),

    #[error("Solver backend '{0}' is not compiled in; enable the matching cargo feature")]
    BackendUnavailable(&'static str),

    #[error("Solver backend failed: {0}")]
    Backend(String),

    #[error("Solver worker exited without reporting a result")]
    WorkerLost,
}

/// The narrow surface the layout formulator needs from a MILP solver.
///
/// Implementations own their model: variables and constraints registered
/// through one instance are never shared with another.
pub trait MilpSolver {
    fn add_binary_variable(&mut self, name: &str) -> Variable;

    fn add_continuous_variable(&mut self, name: &str, lower_bound: f64) -> Variable;

    fn add_linear_constraint(
        &mut self,
        expression: LinearExpr,
        relation: Relation,
        rhs: f64,
        name: &str,
    ) -> Result<(), SolverError>;

    fn set_objective(&mut self, expression: LinearExpr, sense: Sense) -> Result<(), SolverError>;

    /// Run the optimization. Blocks until the backend returns or the
    /// configured budget expires.
    fn optimize(&mut self) -> Result<SolveStatus, SolverError>;

    /// Value of a variable in the last solution, if one is available.
    fn value(&self, variable: Variable) -> Option<f64>;
}

/// MILP library used by [`GoodLpSolver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilpBackend {
    /// Pure-Rust branch-and-bound (`solver-microlp` feature).
    #[default]
    Microlp,
    /// HiGHS (`solver-highs` feature).
    Highs,
    /// COIN-OR CBC (`solver-coin_cbc` feature).
    CoinCbc,
}

impl MilpBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            MilpBackend::Microlp => "microlp",
            MilpBackend::Highs => "highs",
            MilpBackend::CoinCbc => "coin_cbc",
        }
    }

    /// Backends compiled into this build.
    pub fn available() -> &'static [MilpBackend] {
        AVAILABLE_BACKENDS
    }

    pub fn is_available(&self) -> bool {
        AVAILABLE_BACKENDS.contains(self)
    }
}

const AVAILABLE_BACKENDS: &[MilpBackend] = &[
    #[cfg(feature = "solver-microlp")]
    MilpBackend::Microlp,
    #[cfg(feature = "solver-highs")]
    MilpBackend::Highs,
    #[cfg(feature = "solver-coin_cbc")]
    MilpBackend::CoinCbc,
];

impl std::fmt::Display for MilpBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MilpBackend {
    type Err = SolverError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "microlp" => Ok(MilpBackend::Microlp),
            "highs" => Ok(MilpBackend::Highs),
            "coin_cbc" | "cbc" => Ok(MilpBackend::CoinCbc),
            other => Err(SolverError::Backend(format!(
                "unknown MILP backend '{}'; supported values: microlp, highs, coin_cbc",
                other
            ))),
        }
    }
}
