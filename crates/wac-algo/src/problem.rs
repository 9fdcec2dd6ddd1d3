//! A complete layout problem: units, cable catalogue and configuration.

use serde::{Deserialize, Serialize};
use tracing::debug;
use wac_core::{CableType, Diagnostics, Layout, Unit};

use crate::config::{LayoutConfig, ModelParameters};
use crate::error::LayoutResult;
use crate::formulator::{LayoutFormulator, LayoutOutcome};
use crate::graph::CandidateGraph;
use crate::solver::{GoodLpSolver, MilpSolver};

/// Inputs of one array cable layout run.
///
/// # Example
///
/// ```no_run
/// use wac_algo::{ArrayCableProblem, LayoutConfig};
/// use wac_core::{CableType, Unit};
///
/// let problem = ArrayCableProblem::new(
///     vec![
///         Unit::new("WTG_1", 0.0, 0.0),
///         Unit::new("WTG_2", 1000.0, 1000.0),
///         Unit::new("OSS_1", 2000.0, 0.0),
///     ],
///     vec![CableType::new("XLPE_240", 40.0, 250_000.0)?],
///     LayoutConfig::default(),
/// );
/// let outcome = problem.create_layout()?;
/// if let Some(layout) = outcome.layout() {
///     for row in layout.rows() {
///         println!("{} -> {} ({})", row.origin, row.destination, row.cable_type);
///     }
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayCableProblem {
    pub units: Vec<Unit>,
    pub cable_types: Vec<CableType>,
    #[serde(default)]
    pub config: LayoutConfig,
}

impl ArrayCableProblem {
    pub fn new(units: Vec<Unit>, cable_types: Vec<CableType>, config: LayoutConfig) -> Self {
        Self {
            units,
            cable_types,
            config,
        }
    }

    pub fn with_parameters(mut self, parameters: ModelParameters) -> Self {
        self.config.parameters = parameters;
        self
    }

    pub fn parameters(&self) -> &ModelParameters {
        &self.config.parameters
    }

    pub fn candidate_graph(&self) -> LayoutResult<CandidateGraph> {
        CandidateGraph::build(&self.units, &self.cable_types)
    }

    /// Solve with the configured `good_lp` backend.
    pub fn create_layout(&self) -> LayoutResult<LayoutOutcome> {
        self.config.solver.validate()?;
        self.solve_with(GoodLpSolver::new(self.config.solver.clone()))
    }

    /// Solve with a caller-supplied solver.
    pub fn solve_with<S: MilpSolver>(&self, solver: S) -> LayoutResult<LayoutOutcome> {
        self.config.parameters.validate()?;
        let graph = self.candidate_graph()?;
        let mut formulator = LayoutFormulator::new(&graph, self.config.parameters.clone(), solver)?;
        let stats = formulator.build()?;
        debug!(
            variables = stats.total_variables(),
            constraints = stats.total_constraints(),
            "solving array cable problem"
        );
        formulator.solve()
    }

    /// Check a layout against this problem's units and parameters.
    pub fn verify(&self, layout: &Layout) -> Diagnostics {
        layout.verify(
            &self.units,
            self.config.parameters.production_per_turbine_mw,
            self.config.parameters.max_number_of_cable_types,
        )
    }
}
