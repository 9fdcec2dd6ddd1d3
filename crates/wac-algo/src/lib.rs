//! # wac-algo: Array Cable Layout Optimization
//!
//! Builds and solves the mixed-integer model that picks which cables to lay
//! between the turbines and substations of an offshore wind array.
//!
//! ## Pipeline
//!
//! | Stage | Type | Responsibility |
//! |-------|------|----------------|
//! | Candidate graph | [`CandidateGraph`] | Links from every turbine to every other unit, links × cable types, lookup indices |
//! | Crossing oracle | [`CrossingOracle`] | Every pair of candidate links whose cables would cross |
//! | Formulation | [`LayoutFormulator`] | Variables, constraints and cost objective registered with a [`MilpSolver`] |
//! | Solve | [`GoodLpSolver`] | `good_lp` backend selected by [`MilpBackend`], with an optional time budget |
//! | Result | [`LayoutOutcome`] | The chosen [`Layout`](wac_core::Layout), or why there is none |
//!
//! [`ArrayCableProblem`] bundles the inputs and runs the whole pipeline.
//!
//! ## Solver Backends
//!
//! | Feature | Backend | Notes |
//! |---------|---------|-------|
//! | `solver-microlp` (default) | microlp | Pure Rust; time budget enforced by abandoning the worker |
//! | `solver-highs` | HiGHS | Native; honours time limit, MIP gap and threads |
//! | `solver-coin_cbc` | CBC | Native; honours time limit, MIP gap and threads |
//!
//! ## Example
//!
//! ```no_run
//! use wac_algo::{CandidateGraph, GoodLpSolver, LayoutFormulator, ModelParameters, SolverConfig};
//! use wac_core::{CableType, Unit};
//!
//! let units = vec![
//!     Unit::new("WTG_1", 0.0, 0.0),
//!     Unit::new("WTG_2", 1.0, 1.0),
//!     Unit::new("OSS_1", 2.0, 0.0),
//! ];
//! let cables = vec![CableType::new("small", 5.0, 10.0)?, CableType::new("large", 8.0, 20.0)?];
//!
//! let graph = CandidateGraph::build(&units, &cables)?;
//! let solver = GoodLpSolver::new(SolverConfig::default());
//! let mut formulator = LayoutFormulator::new(&graph, ModelParameters::new(4.0, 2), solver)?;
//! let outcome = formulator.solve()?;
//! println!("{}", outcome);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod crossing;
pub mod error;
pub mod formulator;
pub mod graph;
pub mod problem;
pub mod solver;
pub mod test_utils;

pub use config::{LayoutConfig, ModelParameters, SolverConfig};
pub use crossing::CrossingOracle;
pub use error::{LayoutError, LayoutResult};
pub use formulator::{LayoutFormulator, LayoutOutcome, ModelStats, SELECTION_THRESHOLD};
pub use graph::{CableTypeId, CandidateGraph, ConnectionId, GraphStats, LinkId, UnitId};
pub use problem::ArrayCableProblem;
pub use solver::{GoodLpSolver, MilpBackend, MilpSolver, SolveStatus, SolverError};
