//! Diagnostics collected while checking a layout.
//!
//! A check never stops at the first problem: it records every issue it finds
//! with a severity and a category so callers can report all of them at once.
//!
//! # Example
//!
//! ```
//! use wac_core::diagnostics::{Diagnostics, Severity};
//!
//! let mut diag = Diagnostics::new();
//! diag.add_warning("budget", "Only one cable type in use");
//! diag.add_error_with_entity("radial", "Turbine has no outgoing cable", "WTG_3");
//!
//! assert_eq!(diag.warning_count(), 1);
//! assert_eq!(diag.error_count(), 1);
//! assert!(diag.has_errors());
//! ```

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// A single issue found during a check.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticIssue {
    pub severity: Severity,
    /// Grouping key, e.g. "radial", "crossing", "capacity"
    pub category: String,
    pub message: String,
    /// Unit, link or cable type the issue refers to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
}

impl DiagnosticIssue {
    pub fn new(severity: Severity, category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            category: category.into(),
            message: message.into(),
            entity: None,
        }
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }
}

impl std::fmt::Display for DiagnosticIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "[{}:{}] {}", severity, self.category, self.message)?;
        if let Some(entity) = &self.entity {
            write!(f, " ({})", entity)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<DiagnosticIssue>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, issue: DiagnosticIssue) {
        self.issues.push(issue);
    }

    pub fn add_warning(&mut self, category: &str, message: impl Into<String>) {
        self.add(DiagnosticIssue::new(Severity::Warning, category, message));
    }

    pub fn add_error(&mut self, category: &str, message: impl Into<String>) {
        self.add(DiagnosticIssue::new(Severity::Error, category, message));
    }

    pub fn add_error_with_entity(
        &mut self,
        category: &str,
        message: impl Into<String>,
        entity: impl Into<String>,
    ) {
        self.add(DiagnosticIssue::new(Severity::Error, category, message).with_entity(entity));
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Issues in a given category, in the order they were recorded.
    pub fn in_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a DiagnosticIssue> {
        self.issues.iter().filter(move |issue| issue.category == category)
    }

    fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|issue| issue.severity == severity).count()
    }
}

impl std::fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for issue in &self.issues {
            writeln!(f, "{}", issue)?;
        }
        Ok(())
    }
}
