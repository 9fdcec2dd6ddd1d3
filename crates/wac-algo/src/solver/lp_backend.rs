//! `good_lp`-backed implementation of [`MilpSolver`].
//!
//! Variables and constraints are recorded as plain data while the formulator
//! builds the model and only turned into a `good_lp` problem inside
//! `optimize()`. That keeps the recorded model `Send`, so a configured time
//! budget is passed to the backend as its native limit and also enforced by
//! solving on a worker thread that is abandoned when the budget runs out.
//!
//! Result statuses come from the backend itself:
//!
//! | `good_lp` result | [`SolveStatus`] |
//! |------------------|-----------------|
//! | `SolutionStatus::Optimal` | `Optimal` |
//! | `SolutionStatus::TimeLimit` / `GapLimit` | `Feasible` |
//! | limit reached without an incumbent | `TimeLimit` |
//! | `ResolutionError::Infeasible` / `Unbounded` | `Infeasible` / `Unbounded` |

use super::{
    LinearExpr, MilpBackend, MilpSolver, Relation, Sense, SolveStatus, SolverError, Variable,
};
use crate::config::SolverConfig;
use good_lp::{
    constraint, variable, Constraint, Expression, ProblemVariables, ResolutionError, Solution,
    SolutionStatus, SolverModel, WithMipGap, WithTimeLimit,
};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Extra wait beyond the budget so backends with a native time limit can
/// hand back their incumbent before the worker is abandoned.
const WORKER_GRACE: Duration = Duration::from_millis(500);

/// Absolute slack when checking an incumbent against the recorded model.
const FEASIBILITY_TOLERANCE: f64 = 1e-6;

/// `ResolutionError::Other` messages that mean a limit was hit before any
/// incumbent existed (HiGHS and microlp respectively).
const NO_INCUMBENT: [&str; 2] = [
    "NoSolutionFound",
    "Time limit reached before finding a feasible solution",
];

#[derive(Debug, Clone, Copy)]
enum VariableKind {
    Binary,
    Continuous { lower_bound: f64 },
}

#[derive(Debug, Clone)]
struct VariableSpec {
    name: String,
    kind: VariableKind,
}

#[derive(Debug, Clone)]
struct ConstraintSpec {
    name: String,
    expression: LinearExpr,
    relation: Relation,
    rhs: f64,
}

#[derive(Debug, Clone, Default)]
struct ModelDefinition {
    variables: Vec<VariableSpec>,
    constraints: Vec<ConstraintSpec>,
    objective: Option<(LinearExpr, Sense)>,
}

impl ModelDefinition {
    /// Whether `values` respects every bound, integrality requirement and
    /// constraint of the recorded model.
    fn is_satisfied_by(&self, values: &[f64]) -> bool {
        if values.len() != self.variables.len() {
            return false;
        }
        let bounds_ok = self.variables.iter().zip(values).all(|(spec, &v)| {
            if !v.is_finite() {
                return false;
            }
            match spec.kind {
                VariableKind::Binary => {
                    (v - v.round()).abs() <= FEASIBILITY_TOLERANCE
                        && (-FEASIBILITY_TOLERANCE..=1.0 + FEASIBILITY_TOLERANCE).contains(&v)
                }
                VariableKind::Continuous { lower_bound } => v >= lower_bound - FEASIBILITY_TOLERANCE,
            }
        });
        bounds_ok
            && self.constraints.iter().all(|c| {
                let lhs = c.expression.evaluate(|var| values.get(var.index()).copied());
                let slack = FEASIBILITY_TOLERANCE * c.rhs.abs().max(1.0);
                match c.relation {
                    Relation::LessOrEqual => lhs <= c.rhs + slack,
                    Relation::Equal => (lhs - c.rhs).abs() <= slack,
                    Relation::GreaterOrEqual => lhs >= c.rhs - slack,
                }
            })
    }
}

/// The recorded model translated into `good_lp` types, ready for a backend.
struct BuiltModel {
    problem: ProblemVariables,
    objective: Expression,
    sense: Sense,
    constraints: Vec<Constraint>,
    vars: Vec<good_lp::Variable>,
}

type BackendResult = Result<(SolveStatus, Option<Vec<f64>>), SolverError>;

type SolveFn = fn(&ModelDefinition, &SolverConfig) -> BackendResult;

/// MILP solver backed by `good_lp`.
///
/// # Example
///
/// ```no_run
/// use wac_algo::config::SolverConfig;
/// use wac_algo::solver::{GoodLpSolver, LinearExpr, MilpSolver, Relation, Sense};
///
/// let mut solver = GoodLpSolver::new(SolverConfig::default());
/// let x = solver.add_binary_variable("x");
/// let y = solver.add_binary_variable("y");
/// solver.add_linear_constraint(LinearExpr::sum([x, y]), Relation::GreaterOrEqual, 1.0, "cover")?;
/// solver.set_objective(LinearExpr::new().with_term(x, 3.0).with_term(y, 2.0), Sense::Minimize)?;
/// solver.optimize()?;
/// assert_eq!(solver.value(y), Some(1.0));
/// # Ok::<(), wac_algo::solver::SolverError>(())
/// ```
#[derive(Debug, Clone)]
pub struct GoodLpSolver {
    config: SolverConfig,
    model: ModelDefinition,
    values: Option<Vec<f64>>,
    solve: SolveFn,
}

impl GoodLpSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            model: ModelDefinition::default(),
            values: None,
            solve: solve_definition,
        }
    }

    /// Replace the backend call, keeping the budget handling around it.
    #[cfg(test)]
    fn with_solve_fn(mut self, solve: SolveFn) -> Self {
        self.solve = solve;
        self
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn num_variables(&self) -> usize {
        self.model.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.model.constraints.len()
    }

    /// Names of the constraints registered so far, in insertion order.
    pub fn constraint_names(&self) -> impl Iterator<Item = &str> {
        self.model.constraints.iter().map(|c| c.name.as_str())
    }

    fn add_variable(&mut self, name: &str, kind: VariableKind) -> Variable {
        let var = Variable::new(self.model.variables.len());
        self.model.variables.push(VariableSpec {
            name: name.to_string(),
            kind,
        });
        var
    }

    fn check_expression(&self, expression: &LinearExpr) -> Result<(), SolverError> {
        let known = self.model.variables.len();
        match expression.terms().iter().find(|(var, _)| var.index() >= known) {
            Some((var, _)) => Err(SolverError::UnknownVariable(var.index())),
            None => Ok(()),
        }
    }

    fn solve_on_worker(&self, limit: Duration) -> BackendResult {
        let model = self.model.clone();
        let config = self.config.clone();
        let solve = self.solve;
        let (tx, rx) = mpsc::channel();

        thread::Builder::new()
            .name("wac-milp".into())
            .spawn(move || {
                // the receiver is gone once the budget has expired
                let _ = tx.send(solve(&model, &config));
            })
            .map_err(|e| SolverError::Backend(format!("spawning solver worker: {e}")))?;

        match rx.recv_timeout(limit + WORKER_GRACE) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    budget_s = limit.as_secs_f64(),
                    "MILP solve exceeded its budget; abandoning worker"
                );
                Ok((SolveStatus::TimeLimit, None))
            }
            Err(RecvTimeoutError::Disconnected) => Err(SolverError::WorkerLost),
        }
    }
}

impl MilpSolver for GoodLpSolver {
    fn add_binary_variable(&mut self, name: &str) -> Variable {
        self.add_variable(name, VariableKind::Binary)
    }

    fn add_continuous_variable(&mut self, name: &str, lower_bound: f64) -> Variable {
        self.add_variable(name, VariableKind::Continuous { lower_bound })
    }

    fn add_linear_constraint(
        &mut self,
        expression: LinearExpr,
        relation: Relation,
        rhs: f64,
        name: &str,
    ) -> Result<(), SolverError> {
        self.check_expression(&expression)?;
        self.model.constraints.push(ConstraintSpec {
            name: name.to_string(),
            expression,
            relation,
            rhs,
        });
        Ok(())
    }

    fn set_objective(&mut self, expression: LinearExpr, sense: Sense) -> Result<(), SolverError> {
        self.check_expression(&expression)?;
        self.model.objective = Some((expression, sense));
        Ok(())
    }

    fn optimize(&mut self) -> Result<SolveStatus, SolverError> {
        if self.model.objective.is_none() {
            return Err(SolverError::NoObjective);
        }
        let backend = self.config.backend;
        if !backend.is_available() {
            return Err(SolverError::BackendUnavailable(backend.as_str()));
        }

        debug!(
            backend = %backend,
            variables = self.model.variables.len(),
            constraints = self.model.constraints.len(),
            "starting MILP solve"
        );

        self.values = None;
        let start = Instant::now();
        let (status, values) = match self.config.time_limit() {
            Some(limit) => self.solve_on_worker(limit)?,
            None => (self.solve)(&self.model, &self.config)?,
        };

        info!(
            backend = %backend,
            status = %status,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "MILP solve finished"
        );

        self.values = values;
        Ok(status)
    }

    fn value(&self, variable: Variable) -> Option<f64> {
        self.values.as_ref()?.get(variable.index()).copied()
    }
}

fn to_expression(expression: &LinearExpr, vars: &[good_lp::Variable]) -> Expression {
    let mut out = Expression::from(expression.constant());
    for &(var, coef) in expression.terms() {
        out += coef * vars[var.index()];
    }
    out
}

fn to_constraint(spec: &ConstraintSpec, vars: &[good_lp::Variable]) -> Constraint {
    let lhs = to_expression(&spec.expression, vars);
    let rhs = spec.rhs;
    match spec.relation {
        Relation::LessOrEqual => constraint!(lhs <= rhs),
        Relation::Equal => constraint!(lhs == rhs),
        Relation::GreaterOrEqual => constraint!(lhs >= rhs),
    }
}

fn build_model(model: &ModelDefinition) -> Result<BuiltModel, SolverError> {
    let (objective, sense) = model.objective.as_ref().ok_or(SolverError::NoObjective)?;

    let mut problem = ProblemVariables::new();
    let vars: Vec<good_lp::Variable> = model
        .variables
        .iter()
        .map(|spec| {
            let definition = match spec.kind {
                VariableKind::Binary => variable().binary(),
                VariableKind::Continuous { lower_bound } => variable().min(lower_bound),
            };
            problem.add(definition.name(spec.name.clone()))
        })
        .collect();

    let constraints = model
        .constraints
        .iter()
        .map(|spec| to_constraint(spec, &vars))
        .collect();

    Ok(BuiltModel {
        objective: to_expression(objective, &vars),
        sense: *sense,
        problem,
        constraints,
        vars,
    })
}

fn solve_definition(model: &ModelDefinition, config: &SolverConfig) -> BackendResult {
    let built = build_model(model)?;
    match config.backend {
        MilpBackend::Microlp => solve_microlp(built, model, config),
        MilpBackend::Highs => solve_highs(built, model, config),
        MilpBackend::CoinCbc => solve_coin_cbc(built, model, config),
    }
}

/// Attach a `good_lp` solver function to a built model in its sense.
#[allow(unused_macros)]
macro_rules! using_solver {
    ($built:ident, $solver:expr) => {
        match $built.sense {
            Sense::Minimize => $built.problem.minimise($built.objective).using($solver),
            Sense::Maximize => $built.problem.maximise($built.objective).using($solver),
        }
    };
}

/// Pass the configured time budget and MIP gap through `good_lp`'s limit traits.
#[allow(dead_code)]
fn with_limits<M>(mut model: M, config: &SolverConfig) -> Result<M, SolverError>
where
    M: WithTimeLimit + WithMipGap,
{
    if let Some(limit) = config.time_limit() {
        model = model.with_time_limit(limit.as_secs_f64());
    }
    if let Some(gap) = config.mip_gap {
        model = model
            .with_mip_gap(gap as f32)
            .map_err(|e| SolverError::Backend(format!("setting MIP gap {gap}: {e}")))?;
    }
    Ok(model)
}

#[allow(dead_code)]
fn run<M>(
    model: M,
    constraints: Vec<Constraint>,
    definition: &ModelDefinition,
    vars: &[good_lp::Variable],
) -> BackendResult
where
    M: SolverModel<Error = ResolutionError>,
{
    let model = constraints.into_iter().fold(model, |m, c| m.with(c));
    match model.solve() {
        Ok(solution) => {
            let status = solved_status(solution.status());
            let values: Vec<f64> = vars.iter().map(|&v| solution.value(v)).collect();
            // a stopped run may hand back columns that are not an incumbent
            if status != SolveStatus::Optimal && !definition.is_satisfied_by(&values) {
                return Ok((SolveStatus::TimeLimit, None));
            }
            Ok((status, Some(values)))
        }
        Err(err) => failed_status(err),
    }
}

fn solved_status(status: SolutionStatus) -> SolveStatus {
    match status {
        SolutionStatus::Optimal => SolveStatus::Optimal,
        SolutionStatus::TimeLimit | SolutionStatus::GapLimit => SolveStatus::Feasible,
    }
}

fn failed_status(err: ResolutionError) -> BackendResult {
    match err {
        ResolutionError::Infeasible => Ok((SolveStatus::Infeasible, None)),
        ResolutionError::Unbounded => Ok((SolveStatus::Unbounded, None)),
        ResolutionError::Other(msg) if NO_INCUMBENT.contains(&msg) => {
            Ok((SolveStatus::TimeLimit, None))
        }
        other => Err(SolverError::Backend(other.to_string())),
    }
}

#[cfg(feature = "solver-microlp")]
fn solve_microlp(built: BuiltModel, model: &ModelDefinition, config: &SolverConfig) -> BackendResult {
    let solver = with_limits(using_solver!(built, good_lp::solvers::microlp::microlp), config)?;
    run(solver, built.constraints, model, &built.vars)
}

#[cfg(not(feature = "solver-microlp"))]
fn solve_microlp(_: BuiltModel, _: &ModelDefinition, _: &SolverConfig) -> BackendResult {
    Err(SolverError::BackendUnavailable(MilpBackend::Microlp.as_str()))
}

#[cfg(feature = "solver-highs")]
fn solve_highs(built: BuiltModel, model: &ModelDefinition, config: &SolverConfig) -> BackendResult {
    let mut solver = with_limits(using_solver!(built, good_lp::solvers::highs::highs), config)?;
    solver.set_verbose(config.verbose);
    if let Some(threads) = config.threads {
        solver = solver.set_option("threads", threads as i32);
    }
    run(solver, built.constraints, model, &built.vars)
}

#[cfg(not(feature = "solver-highs"))]
fn solve_highs(_: BuiltModel, _: &ModelDefinition, _: &SolverConfig) -> BackendResult {
    Err(SolverError::BackendUnavailable(MilpBackend::Highs.as_str()))
}

#[cfg(feature = "solver-coin_cbc")]
fn solve_coin_cbc(
    built: BuiltModel,
    model: &ModelDefinition,
    config: &SolverConfig,
) -> BackendResult {
    let mut solver = with_limits(using_solver!(built, good_lp::solvers::coin_cbc::coin_cbc), config)?;
    if !config.verbose {
        solver.set_parameter("log", "0");
    }
    if let Some(threads) = config.threads {
        solver.set_parameter("threads", &threads.to_string());
    }
    run(solver, built.constraints, model, &built.vars)
}

#[cfg(not(feature = "solver-coin_cbc"))]
fn solve_coin_cbc(_: BuiltModel, _: &ModelDefinition, _: &SolverConfig) -> BackendResult {
    Err(SolverError::BackendUnavailable(MilpBackend::CoinCbc.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_foreign_variables() {
        let mut solver = GoodLpSolver::new(SolverConfig::default());
        let x = solver.add_binary_variable("x");
        let foreign = Variable::new(42);

        let err = solver
            .add_linear_constraint(LinearExpr::sum([x, foreign]), Relation::LessOrEqual, 1.0, "c")
            .unwrap_err();
        assert_eq!(err, SolverError::UnknownVariable(42));
        assert_eq!(solver.num_constraints(), 0);
    }

    #[test]
    fn test_optimize_requires_objective() {
        let mut solver = GoodLpSolver::new(SolverConfig::default());
        solver.add_binary_variable("x");
        assert_eq!(solver.optimize(), Err(SolverError::NoObjective));
        assert_eq!(solver.value(Variable::new(0)), None);
    }

    #[cfg(feature = "solver-microlp")]
    #[test]
    fn test_small_knapsack() {
        let mut solver = GoodLpSolver::new(SolverConfig::default());
        let a = solver.add_binary_variable("a");
        let b = solver.add_binary_variable("b");
        let c = solver.add_binary_variable("c");
        // weights 3, 4, 2 with capacity 6; values 4, 5, 3
        solver
            .add_linear_constraint(
                LinearExpr::new().with_term(a, 3.0).with_term(b, 4.0).with_term(c, 2.0),
                Relation::LessOrEqual,
                6.0,
                "capacity",
            )
            .unwrap();
        solver
            .set_objective(
                LinearExpr::new().with_term(a, 4.0).with_term(b, 5.0).with_term(c, 3.0),
                Sense::Maximize,
            )
            .unwrap();

        assert_eq!(solver.optimize().unwrap(), SolveStatus::Optimal);
        let picked: Vec<bool> = [a, b, c]
            .iter()
            .map(|&v| solver.value(v).unwrap() > 0.5)
            .collect();
        assert_eq!(picked, vec![false, true, true]);
    }

    #[cfg(feature = "solver-microlp")]
    #[test]
    fn test_infeasible_is_a_status() {
        let mut solver = GoodLpSolver::new(SolverConfig::default());
        let x = solver.add_continuous_variable("x", 0.0);
        solver
            .add_linear_constraint(LinearExpr::from(x), Relation::LessOrEqual, -1.0, "negative")
            .unwrap();
        solver.set_objective(LinearExpr::from(x), Sense::Minimize).unwrap();

        assert_eq!(solver.optimize().unwrap(), SolveStatus::Infeasible);
        assert_eq!(solver.value(x), None);
    }

    #[cfg(feature = "solver-microlp")]
    #[test]
    fn test_budgeted_solve_on_worker() {
        let config = SolverConfig {
            time_limit_seconds: Some(30.0),
            ..SolverConfig::default()
        };
        let mut solver = GoodLpSolver::new(config);
        let x = solver.add_continuous_variable("x", 2.0);
        solver.set_objective(LinearExpr::from(x), Sense::Minimize).unwrap();

        assert_eq!(solver.optimize().unwrap(), SolveStatus::Optimal);
        assert!((solver.value(x).unwrap() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_backend_status_translation() {
        assert_eq!(solved_status(SolutionStatus::Optimal), SolveStatus::Optimal);
        assert_eq!(solved_status(SolutionStatus::GapLimit), SolveStatus::Feasible);
        assert_eq!(solved_status(SolutionStatus::TimeLimit), SolveStatus::Feasible);
    }

    #[test]
    fn test_limit_without_incumbent_is_time_limit() {
        for message in NO_INCUMBENT {
            assert_eq!(
                failed_status(ResolutionError::Other(message)),
                Ok((SolveStatus::TimeLimit, None))
            );
        }
        assert_eq!(
            failed_status(ResolutionError::Infeasible),
            Ok((SolveStatus::Infeasible, None))
        );
        assert!(matches!(
            failed_status(ResolutionError::Other("Stopped")),
            Err(SolverError::Backend(_))
        ));
    }

    #[test]
    fn test_incumbent_checked_against_model() {
        let mut solver = GoodLpSolver::new(SolverConfig::default());
        let x = solver.add_binary_variable("x");
        let f = solver.add_continuous_variable("f", 0.0);
        solver
            .add_linear_constraint(
                LinearExpr::new().with_term(f, 1.0).with_term(x, -4.0),
                Relation::LessOrEqual,
                0.0,
                "capacity",
            )
            .unwrap();
        solver
            .add_linear_constraint(LinearExpr::from(f), Relation::Equal, 3.0, "demand")
            .unwrap();

        assert!(solver.model.is_satisfied_by(&[1.0, 3.0]));
        // fractional binary
        assert!(!solver.model.is_satisfied_by(&[0.75, 3.0]));
        // capacity violated
        assert!(!solver.model.is_satisfied_by(&[0.0, 3.0]));
        assert!(!solver.model.is_satisfied_by(&[1.0, -1.0]));
        assert!(!solver.model.is_satisfied_by(&[1.0]));
    }

    fn slow_solve(model: &ModelDefinition, config: &SolverConfig) -> BackendResult {
        thread::sleep(WORKER_GRACE * 4);
        solve_definition(model, config)
    }

    #[test]
    fn test_worker_abandoned_after_budget() {
        let config = SolverConfig::default().with_time_limit(0.05);
        let mut solver = GoodLpSolver::new(config).with_solve_fn(slow_solve);
        let x = solver.add_binary_variable("x");
        solver.set_objective(LinearExpr::from(x), Sense::Minimize).unwrap();

        let start = Instant::now();
        assert_eq!(solver.optimize().unwrap(), SolveStatus::TimeLimit);
        assert!(start.elapsed() < WORKER_GRACE * 4);
        assert_eq!(solver.value(x), None);
    }

    #[test]
    fn test_abandoned_worker_gives_no_layout() {
        use crate::formulator::{LayoutFormulator, LayoutOutcome};
        use crate::graph::CandidateGraph;
        use crate::test_utils::triangle_fixture;
        use crate::ModelParameters;

        let (units, cables) = triangle_fixture().unwrap();
        let graph = CandidateGraph::build(&units, &cables).unwrap();
        let solver = GoodLpSolver::new(SolverConfig::default().with_time_limit(0.05))
            .with_solve_fn(slow_solve);
        let mut formulator =
            LayoutFormulator::new(&graph, ModelParameters::new(4.0, 2), solver).unwrap();

        let outcome = formulator.solve().unwrap();
        assert_eq!(outcome, LayoutOutcome::NoSolutionWithinBudget);
        assert!(outcome.layout().is_none());
        assert!(formulator.selected_cable_types().is_empty());
    }

    #[cfg(feature = "solver-microlp")]
    #[test]
    fn test_budget_keeps_proven_optimum() {
        let mut solver = GoodLpSolver::new(SolverConfig::default().with_time_limit(5.0));
        let a = solver.add_binary_variable("a");
        let b = solver.add_binary_variable("b");
        solver
            .add_linear_constraint(LinearExpr::sum([a, b]), Relation::GreaterOrEqual, 1.0, "cover")
            .unwrap();
        solver
            .set_objective(LinearExpr::new().with_term(a, 3.0).with_term(b, 2.0), Sense::Minimize)
            .unwrap();

        assert_eq!(solver.optimize().unwrap(), SolveStatus::Optimal);
        assert!(solver.value(b).unwrap() > 0.5);
    }
}
