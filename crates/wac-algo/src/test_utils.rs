//! Shared fixtures and a recording solver for formulation tests.

use std::collections::HashMap;

use wac_core::{CableType, Unit, WacResult};

use crate::solver::{LinearExpr, MilpSolver, Relation, Sense, SolveStatus, SolverError, Variable};

/// Two turbines and one substation with a cheap small cable and a dearer
/// large one: `WTG_1(0,0)`, `WTG_2(1,1)`, `OSS_1(2,0)`.
pub fn triangle_fixture() -> WacResult<(Vec<Unit>, Vec<CableType>)> {
    let units = vec![
        Unit::new("WTG_1", 0.0, 0.0),
        Unit::new("WTG_2", 1.0, 1.0),
        Unit::new("OSS_1", 2.0, 0.0),
    ];
    let cables = vec![
        CableType::new("cable_5mw", 5.0, 10.0)?,
        CableType::new("cable_8mw", 8.0, 20.0)?,
    ];
    Ok((units, cables))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecordedKind {
    Binary,
    Continuous { lower_bound: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedVariable {
    pub name: String,
    pub kind: RecordedKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedConstraint {
    pub name: String,
    pub expression: LinearExpr,
    pub relation: Relation,
    pub rhs: f64,
}

/// A [`MilpSolver`] that records the model and replays a scripted result.
///
/// After `optimize()` with a status that carries a solution, every variable
/// reads as `0.0` unless a value was scripted with [`with_value`].
///
/// [`with_value`]: RecordingSolver::with_value
#[derive(Debug, Clone)]
pub struct RecordingSolver {
    pub variables: Vec<RecordedVariable>,
    pub constraints: Vec<RecordedConstraint>,
    pub objective: Option<(LinearExpr, Sense)>,
    pub status: SolveStatus,
    pub values: HashMap<usize, f64>,
    pub optimize_calls: usize,
    /// Constraints whose name starts with this prefix are refused.
    pub reject_prefix: Option<String>,
}

impl Default for RecordingSolver {
    fn default() -> Self {
        Self::with_status(SolveStatus::Infeasible)
    }
}

impl RecordingSolver {
    pub fn with_status(status: SolveStatus) -> Self {
        Self {
            variables: Vec::new(),
            constraints: Vec::new(),
            objective: None,
            status,
            values: HashMap::new(),
            optimize_calls: 0,
            reject_prefix: None,
        }
    }

    /// Refuse every constraint whose name starts with `prefix`.
    pub fn rejecting(mut self, prefix: &str) -> Self {
        self.reject_prefix = Some(prefix.to_string());
        self
    }

    /// Script the value reported for the variable with this index.
    pub fn with_value(mut self, index: usize, value: f64) -> Self {
        self.values.insert(index, value);
        self
    }

    pub fn constraint(&self, name: &str) -> Option<&RecordedConstraint> {
        self.constraints.iter().find(|c| c.name == name)
    }

    pub fn continuous_count(&self) -> usize {
        self.variables
            .iter()
            .filter(|v| matches!(v.kind, RecordedKind::Continuous { .. }))
            .count()
    }

    fn push(&mut self, name: &str, kind: RecordedKind) -> Variable {
        self.variables.push(RecordedVariable {
            name: name.to_string(),
            kind,
        });
        Variable::new(self.variables.len() - 1)
    }

    fn check(&self, expression: &LinearExpr) -> Result<(), SolverError> {
        match expression
            .terms()
            .iter()
            .find(|(v, _)| v.index() >= self.variables.len())
        {
            Some((v, _)) => Err(SolverError::UnknownVariable(v.index())),
            None => Ok(()),
        }
    }
}

impl MilpSolver for RecordingSolver {
    fn add_binary_variable(&mut self, name: &str) -> Variable {
        self.push(name, RecordedKind::Binary)
    }

    fn add_continuous_variable(&mut self, name: &str, lower_bound: f64) -> Variable {
        self.push(name, RecordedKind::Continuous { lower_bound })
    }

    fn add_linear_constraint(
        &mut self,
        expression: LinearExpr,
        relation: Relation,
        rhs: f64,
        name: &str,
    ) -> Result<(), SolverError> {
        self.check(&expression)?;
        if let Some(prefix) = &self.reject_prefix {
            if name.starts_with(prefix.as_str()) {
                return Err(SolverError::Backend(format!("constraint {name} refused")));
            }
        }
        self.constraints.push(RecordedConstraint {
            name: name.to_string(),
            expression,
            relation,
            rhs,
        });
        Ok(())
    }

    fn set_objective(&mut self, expression: LinearExpr, sense: Sense) -> Result<(), SolverError> {
        self.check(&expression)?;
        self.objective = Some((expression, sense));
        Ok(())
    }

    fn optimize(&mut self) -> Result<SolveStatus, SolverError> {
        self.optimize_calls += 1;
        if self.objective.is_none() {
            return Err(SolverError::NoObjective);
        }
        Ok(self.status)
    }

    fn value(&self, variable: Variable) -> Option<f64> {
        let solved = self.optimize_calls > 0 && self.status.has_solution();
        if !solved || variable.index() >= self.variables.len() {
            return None;
        }
        Some(self.values.get(&variable.index()).copied().unwrap_or(0.0))
    }
}
