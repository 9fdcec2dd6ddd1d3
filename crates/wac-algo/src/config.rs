//! Model parameters and solver tuning, loadable from TOML.
//!
//! Every section is `#[serde(default)]`, so a partial file only needs the
//! values it changes:
//!
//! ```toml
//! [parameters]
//! production_per_turbine_mw = 15.0
//!
//! [solver]
//! backend = "highs"
//! time_limit_seconds = 120.0
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LayoutError;
use crate::solver::MilpBackend;

/// Complete configuration for one layout run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub parameters: ModelParameters,
    pub solver: SolverConfig,
}

/// Physical and design parameters of the array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParameters {
    /// Power exported by every turbine (MW).
    pub production_per_turbine_mw: f64,

    /// Upper bound on the number of distinct cable types in the layout.
    pub max_number_of_cable_types: usize,
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            production_per_turbine_mw: 8.0,
            max_number_of_cable_types: 3,
        }
    }
}

impl ModelParameters {
    pub fn new(production_per_turbine_mw: f64, max_number_of_cable_types: usize) -> Self {
        Self {
            production_per_turbine_mw,
            max_number_of_cable_types,
        }
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        let production = self.production_per_turbine_mw;
        if !production.is_finite() || production <= 0.0 {
            return Err(LayoutError::InvalidParameter {
                name: "production_per_turbine_mw",
                reason: format!("must be a positive, finite MW value (got {})", production),
            });
        }
        if self.max_number_of_cable_types == 0 {
            return Err(LayoutError::InvalidParameter {
                name: "max_number_of_cable_types",
                reason: "at least one cable type must be allowed".to_string(),
            });
        }
        Ok(())
    }
}

/// Tuning handed to the MILP backend. Knobs a backend does not support are
/// ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub backend: MilpBackend,

    /// Wall-clock budget for `optimize()`; `None` waits for the backend.
    ///
    /// The budget is handed to the backend as its native limit. A backend
    /// that still has not returned 500 ms past the budget is abandoned on its
    /// worker thread, which keeps running until the backend finishes. Batches
    /// of many budgeted jobs should bound their own parallelism accordingly.
    pub time_limit_seconds: Option<f64>,

    /// Relative MIP optimality gap.
    pub mip_gap: Option<f64>,

    pub threads: Option<u32>,

    /// Let the backend print its own log.
    pub verbose: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            backend: MilpBackend::default(),
            time_limit_seconds: None,
            mip_gap: None,
            threads: None,
            verbose: false,
        }
    }
}

impl SolverConfig {
    pub fn with_backend(mut self, backend: MilpBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_time_limit(mut self, seconds: f64) -> Self {
        self.time_limit_seconds = Some(seconds);
        self
    }

    /// The configured budget, if it is a usable duration.
    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_seconds
            .filter(|s| s.is_finite() && *s >= 0.0)
            .map(Duration::from_secs_f64)
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        if let Some(seconds) = self.time_limit_seconds {
            if !seconds.is_finite() || seconds < 0.0 {
                return Err(LayoutError::InvalidParameter {
                    name: "time_limit_seconds",
                    reason: format!("must be finite and non-negative (got {})", seconds),
                });
            }
        }
        if let Some(gap) = self.mip_gap {
            if !gap.is_finite() || gap < 0.0 {
                return Err(LayoutError::InvalidParameter {
                    name: "mip_gap",
                    reason: format!("must be finite and non-negative (got {})", gap),
                });
            }
        }
        if self.threads == Some(0) {
            return Err(LayoutError::InvalidParameter {
                name: "threads",
                reason: "leave unset to let the backend choose".to_string(),
            });
        }
        Ok(())
    }
}

impl LayoutConfig {
    pub fn new(parameters: ModelParameters, solver: SolverConfig) -> Self {
        Self { parameters, solver }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, LayoutError> {
        let config: Self =
            toml::from_str(contents).map_err(|e| LayoutError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, LayoutError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| LayoutError::Config(format!("reading {}: {}", path.display(), e)))?;
        Self::from_toml_str(&contents)
    }

    pub fn to_toml_string(&self) -> Result<String, LayoutError> {
        toml::to_string_pretty(self).map_err(|e| LayoutError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        self.parameters.validate()?;
        self.solver.validate()
    }
}
