use thiserror::Error;
use wac_core::WacError;

use crate::solver::SolverError;

/// Errors raised while building or solving a layout model.
///
/// Infeasibility and an exhausted time budget are not errors; they are
/// reported as [`LayoutOutcome`](crate::LayoutOutcome) variants.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    #[error("No units supplied")]
    NoUnits,

    #[error("No turbines; no feasible layout")]
    NoTurbines,

    #[error("No cable types supplied")]
    NoCableTypes,

    #[error("Duplicate unit name: {0}")]
    DuplicateUnit(String),

    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error(transparent)]
    Entity(#[from] WacError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Solver error: {0}")]
    Solver(#[from] SolverError),

    /// An earlier `build()` failed after registering part of the model.
    #[error("Layout model is incomplete after a failed build; start a new formulator")]
    IncompleteModel,
}

pub type LayoutResult<T> = Result<T, LayoutError>;
