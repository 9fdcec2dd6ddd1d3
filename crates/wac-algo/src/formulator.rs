//! MILP formulation of the array cable layout problem.
//!
//! ## Variables
//!
//! | Name | Domain | Per | Meaning |
//! |------|--------|-----|---------|
//! | `install[c]` | {0,1} | connection | link built with this cable type |
//! | `built[l]` | {0,1} | link | link built with some cable type |
//! | `flow[l]` | ≥ 0 | link | MW carried along the link |
//! | `cable_used[k]` | {0,1} | cable type | type appears anywhere in the layout |
//!
//! ## Constraints
//!
//! 1. `Σ install[c ∈ l] = built[l]` for each link
//! 2. `Σ flow(out) − Σ flow(in) = P` at each turbine
//! 3. `flow[l] ≤ Σ cap(c)·install[c ∈ l]` for each link
//! 4. `Σ built(out) = 1` at each turbine
//! 5. `install[c] ≤ cable_used[type(c)]` for each connection
//! 6. `Σ cable_used ≤ max_number_of_cable_types`
//! 7. `built[a] + built[b] ≤ 1` for each crossing pair
//!
//! Collectors carry no balance or capacity constraint: they absorb whatever
//! arrives.
//!
//! Objective: minimize `Σ cost(c)·install[c]`.

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};
use wac_core::{Connection, Layout};

use crate::config::ModelParameters;
use crate::error::{LayoutError, LayoutResult};
use crate::graph::{CableTypeId, CandidateGraph, ConnectionId, LinkId};
use crate::solver::{LinearExpr, MilpSolver, Relation, Sense, SolveStatus, SolverError, Variable};

/// Install values strictly above this threshold select a connection.
pub const SELECTION_THRESHOLD: f64 = 0.5;

/// Terminal result of a layout solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "layout", rename_all = "snake_case")]
pub enum LayoutOutcome {
    /// Proven minimum-cost layout.
    Optimal(Layout),
    /// Valid layout found under a time limit, not proven optimal.
    Feasible(Layout),
    Infeasible,
    Unbounded,
    /// The time budget ran out before any layout was found.
    NoSolutionWithinBudget,
}

impl LayoutOutcome {
    pub fn layout(&self) -> Option<&Layout> {
        match self {
            LayoutOutcome::Optimal(layout) | LayoutOutcome::Feasible(layout) => Some(layout),
            _ => None,
        }
    }

    pub fn into_layout(self) -> Option<Layout> {
        match self {
            LayoutOutcome::Optimal(layout) | LayoutOutcome::Feasible(layout) => Some(layout),
            _ => None,
        }
    }

    pub fn is_optimal(&self) -> bool {
        matches!(self, LayoutOutcome::Optimal(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            LayoutOutcome::Optimal(_) => "optimal",
            LayoutOutcome::Feasible(_) => "feasible",
            LayoutOutcome::Infeasible => "infeasible",
            LayoutOutcome::Unbounded => "unbounded",
            LayoutOutcome::NoSolutionWithinBudget => "no_solution_within_budget",
        }
    }
}

impl std::fmt::Display for LayoutOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.layout() {
            Some(layout) => write!(
                f,
                "{}: {} cables, cost {:.3}",
                self.label(),
                layout.len(),
                layout.total_cost()
            ),
            None => f.write_str(self.label()),
        }
    }
}

/// Counts of what was registered with the solver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelStats {
    pub install_variables: usize,
    pub built_variables: usize,
    pub flow_variables: usize,
    pub cable_used_variables: usize,
    pub link_install_constraints: usize,
    pub flow_balance_constraints: usize,
    pub capacity_constraints: usize,
    pub radial_constraints: usize,
    pub cable_usage_constraints: usize,
    pub cable_budget_constraints: usize,
    pub crossing_constraints: usize,
}

impl ModelStats {
    pub fn total_variables(&self) -> usize {
        self.install_variables + self.built_variables + self.flow_variables + self.cable_used_variables
    }

    pub fn total_constraints(&self) -> usize {
        self.link_install_constraints
            + self.flow_balance_constraints
            + self.capacity_constraints
            + self.radial_constraints
            + self.cable_usage_constraints
            + self.cable_budget_constraints
            + self.crossing_constraints
    }
}

#[derive(Debug, Clone)]
struct ModelVariables {
    install: Vec<Variable>,
    built: Vec<Variable>,
    flow: Vec<Variable>,
    cable_used: Vec<Variable>,
}

/// Builds the layout MILP on a candidate graph and solves it through a
/// [`MilpSolver`].
///
/// Each formulator owns its solver; run independent problems with
/// independent formulators.
pub struct LayoutFormulator<'g, S: MilpSolver> {
    graph: &'g CandidateGraph,
    parameters: ModelParameters,
    solver: S,
    variables: Option<ModelVariables>,
    stats: ModelStats,
    trivially_infeasible: bool,
    failed_build: bool,
}

impl<'g, S: MilpSolver> LayoutFormulator<'g, S> {
    /// Validates `parameters`; nothing is registered with the solver yet.
    pub fn new(
        graph: &'g CandidateGraph,
        parameters: ModelParameters,
        solver: S,
    ) -> LayoutResult<Self> {
        parameters.validate()?;
        Ok(Self {
            graph,
            parameters,
            solver,
            variables: None,
            stats: ModelStats::default(),
            trivially_infeasible: false,
            failed_build: false,
        })
    }

    pub fn graph(&self) -> &'g CandidateGraph {
        self.graph
    }

    pub fn parameters(&self) -> &ModelParameters {
        &self.parameters
    }

    pub fn stats(&self) -> &ModelStats {
        &self.stats
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    pub fn into_solver(self) -> S {
        self.solver
    }

    /// Register variables, constraints and the objective. Calling it again
    /// is a no-op.
    ///
    /// If the solver refuses part of the model, the formulator stays unusable
    /// and every later `build()` or `solve()` returns
    /// [`LayoutError::IncompleteModel`].
    pub fn build(&mut self) -> LayoutResult<&ModelStats> {
        if self.failed_build {
            return Err(LayoutError::IncompleteModel);
        }
        if self.variables.is_some() {
            return Ok(&self.stats);
        }

        // A turbine with nowhere to send its output cannot satisfy the
        // radial constraint; skip the solver entirely.
        let graph = self.graph;
        let stranded = graph
            .turbine_ids()
            .find(|&u| graph.outgoing_link_ids(u).is_empty());
        if let Some(stranded) = stranded {
            warn!(
                turbine = %graph.unit(stranded),
                "turbine has no candidate link; model is infeasible"
            );
            self.trivially_infeasible = true;
            self.variables = Some(ModelVariables {
                install: Vec::new(),
                built: Vec::new(),
                flow: Vec::new(),
                cable_used: Vec::new(),
            });
            return Ok(&self.stats);
        }

        let variables = self.add_variables();
        if let Err(err) = self.register_model(&variables) {
            warn!(error = %err, "layout model registration failed");
            self.failed_build = true;
            self.stats = ModelStats::default();
            return Err(err);
        }

        debug!(
            variables = self.stats.total_variables(),
            constraints = self.stats.total_constraints(),
            crossing_constraints = self.stats.crossing_constraints,
            "layout model built"
        );
        self.variables = Some(variables);
        Ok(&self.stats)
    }

    /// Build if needed, optimize and extract the layout.
    pub fn solve(&mut self) -> LayoutResult<LayoutOutcome> {
        self.build()?;
        if self.trivially_infeasible {
            return Ok(LayoutOutcome::Infeasible);
        }

        let start = Instant::now();
        let status = self.solver.optimize()?;
        let outcome = match status {
            SolveStatus::Optimal => LayoutOutcome::Optimal(self.extract_layout()?),
            SolveStatus::Feasible => LayoutOutcome::Feasible(self.extract_layout()?),
            SolveStatus::Infeasible => LayoutOutcome::Infeasible,
            SolveStatus::Unbounded => LayoutOutcome::Unbounded,
            SolveStatus::TimeLimit => LayoutOutcome::NoSolutionWithinBudget,
        };

        match outcome.layout() {
            Some(layout) => info!(
                status = outcome.label(),
                cables = layout.len(),
                cost = layout.total_cost(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "layout solved"
            ),
            None => warn!(status = outcome.label(), "no layout produced"),
        }
        Ok(outcome)
    }

    fn register_model(&mut self, variables: &ModelVariables) -> LayoutResult<()> {
        self.add_link_install_constraints(variables)?;
        self.add_flow_balance_constraints(variables)?;
        self.add_capacity_constraints(variables)?;
        self.add_radial_constraints(variables)?;
        self.add_cable_usage_constraints(variables)?;
        self.add_cable_budget_constraint(variables)?;
        self.add_crossing_constraints(variables)?;
        self.set_cost_objective(variables)
    }

    fn add_variables(&mut self) -> ModelVariables {
        let graph = self.graph;
        let install: Vec<Variable> = graph
            .connections()
            .iter()
            .map(|c| self.solver.add_binary_variable(&format!("install_{}", c)))
            .collect();
        let built: Vec<Variable> = graph
            .links()
            .iter()
            .map(|l| self.solver.add_binary_variable(&format!("built_{}", l)))
            .collect();
        let flow: Vec<Variable> = graph
            .links()
            .iter()
            .map(|l| self.solver.add_continuous_variable(&format!("flow_{}", l), 0.0))
            .collect();
        let cable_used: Vec<Variable> = graph
            .cable_types()
            .iter()
            .map(|k| self.solver.add_binary_variable(&format!("cable_used_{}", k)))
            .collect();

        self.stats.install_variables = install.len();
        self.stats.built_variables = built.len();
        self.stats.flow_variables = flow.len();
        self.stats.cable_used_variables = cable_used.len();

        ModelVariables {
            install,
            built,
            flow,
            cable_used,
        }
    }

    fn constrain(
        &mut self,
        expression: LinearExpr,
        relation: Relation,
        rhs: f64,
        name: String,
    ) -> Result<(), SolverError> {
        self.solver.add_linear_constraint(expression, relation, rhs, &name)
    }

    fn link_ids(&self) -> impl Iterator<Item = LinkId> {
        (0..self.graph.links().len()).map(LinkId::new)
    }

    fn add_link_install_constraints(&mut self, vars: &ModelVariables) -> LayoutResult<()> {
        let graph = self.graph;
        for l in self.link_ids() {
            let mut expr = LinearExpr::sum(
                graph
                    .connection_ids_for_link(l)
                    .map(|c| vars.install[c.value()]),
            );
            expr.add_term(vars.built[l.value()], -1.0);
            self.constrain(expr, Relation::Equal, 0.0, format!("link_install[{}]", graph.link(l)))?;
            self.stats.link_install_constraints += 1;
        }
        Ok(())
    }

    fn add_flow_balance_constraints(&mut self, vars: &ModelVariables) -> LayoutResult<()> {
        let graph = self.graph;
        let production = self.parameters.production_per_turbine_mw;
        for u in graph.turbine_ids() {
            let outgoing = graph.outgoing_link_ids(u).into_iter().map(|l| (vars.flow[l.value()], 1.0));
            let incoming = graph.incoming_link_ids(u).into_iter().map(|l| (vars.flow[l.value()], -1.0));
            let expr: LinearExpr = outgoing.chain(incoming).collect();
            self.constrain(expr, Relation::Equal, production, format!("flow_balance[{}]", graph.unit(u)))?;
            self.stats.flow_balance_constraints += 1;
        }
        Ok(())
    }

    fn add_capacity_constraints(&mut self, vars: &ModelVariables) -> LayoutResult<()> {
        let graph = self.graph;
        for l in self.link_ids() {
            let mut expr = LinearExpr::from(vars.flow[l.value()]);
            for c in graph.connection_ids_for_link(l) {
                let capacity = graph.connection(c).cable_type().max_mw_on_cable();
                expr.add_term(vars.install[c.value()], -capacity);
            }
            self.constrain(expr, Relation::LessOrEqual, 0.0, format!("capacity[{}]", graph.link(l)))?;
            self.stats.capacity_constraints += 1;
        }
        Ok(())
    }

    fn add_radial_constraints(&mut self, vars: &ModelVariables) -> LayoutResult<()> {
        let graph = self.graph;
        for u in graph.turbine_ids() {
            let expr = LinearExpr::sum(
                graph
                    .outgoing_link_ids(u)
                    .into_iter()
                    .map(|l| vars.built[l.value()]),
            );
            self.constrain(expr, Relation::Equal, 1.0, format!("radial[{}]", graph.unit(u)))?;
            self.stats.radial_constraints += 1;
        }
        Ok(())
    }

    fn add_cable_usage_constraints(&mut self, vars: &ModelVariables) -> LayoutResult<()> {
        let graph = self.graph;
        for (i, connection) in graph.connections().iter().enumerate() {
            let k = graph.connection_cable_type(ConnectionId::new(i));
            let expr = LinearExpr::from(vars.install[i]).with_term(vars.cable_used[k.value()], -1.0);
            self.constrain(expr, Relation::LessOrEqual, 0.0, format!("cable_usage[{}]", connection))?;
            self.stats.cable_usage_constraints += 1;
        }
        Ok(())
    }

    fn add_cable_budget_constraint(&mut self, vars: &ModelVariables) -> LayoutResult<()> {
        let expr = LinearExpr::sum(vars.cable_used.iter().copied());
        let budget = self.parameters.max_number_of_cable_types as f64;
        self.constrain(expr, Relation::LessOrEqual, budget, "cable_budget".to_string())?;
        self.stats.cable_budget_constraints += 1;
        Ok(())
    }

    fn add_crossing_constraints(&mut self, vars: &ModelVariables) -> LayoutResult<()> {
        let graph = self.graph;
        for &(a, b) in graph.crossing_pairs() {
            let expr = LinearExpr::sum([vars.built[a.value()], vars.built[b.value()]]);
            let name = format!("no_crossing[{}|{}]", graph.link(a), graph.link(b));
            self.constrain(expr, Relation::LessOrEqual, 1.0, name)?;
            self.stats.crossing_constraints += 1;
        }
        Ok(())
    }

    fn set_cost_objective(&mut self, vars: &ModelVariables) -> LayoutResult<()> {
        let objective: LinearExpr = self
            .graph
            .connections()
            .iter()
            .zip(&vars.install)
            .map(|(c, &v)| (v, c.cost()))
            .collect();
        self.solver.set_objective(objective, Sense::Minimize)?;
        Ok(())
    }

    fn extract_layout(&self) -> LayoutResult<Layout> {
        let vars = self
            .variables
            .as_ref()
            .ok_or_else(|| LayoutError::Solver(SolverError::Backend("model was never built".into())))?;

        let mut selected: Vec<Connection> = Vec::new();
        for (connection, &var) in self.graph.connections().iter().zip(&vars.install) {
            let value = self
                .solver
                .value(var)
                .ok_or(SolverError::UnknownVariable(var.index()))?;
            if value > SELECTION_THRESHOLD {
                selected.push(connection.clone());
            }
        }
        Ok(Layout::new(selected))
    }

    /// Cable type chosen for each built link, by id. Only meaningful after
    /// a solve that produced a layout.
    pub fn selected_cable_types(&self) -> Vec<(LinkId, CableTypeId)> {
        let Some(vars) = self.variables.as_ref() else {
            return Vec::new();
        };
        vars.install
            .iter()
            .enumerate()
            .filter(|&(_, &v)| self.solver.value(v).is_some_and(|x| x > SELECTION_THRESHOLD))
            .map(|(i, _)| {
                let c = ConnectionId::new(i);
                (self.graph.connection_link(c), self.graph.connection_cable_type(c))
            })
            .collect()
    }
}
