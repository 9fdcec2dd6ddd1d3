//! Error types for entity construction and layout checks.
//!
//! [`WacError`] covers everything that can go wrong before an optimization
//! model exists: malformed units, degenerate links, unusable cable data.
//! Higher layers wrap it in their own error enums via `#[from]`.
//!
//! # Example
//!
//! ```
//! use wac_core::{Link, Unit, WacError};
//!
//! let a = Unit::new("WTG_1", 0.0, 0.0);
//! let err = Link::new(a.clone(), a).unwrap_err();
//! assert!(matches!(err, WacError::SelfLink(_)));
//! ```

use thiserror::Error;

/// Unified error type for entity and geometry validation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WacError {
    /// A link would start and end at the same unit.
    #[error("Link from {0} to itself is not allowed")]
    SelfLink(String),

    /// Unit coordinates are NaN or infinite.
    #[error("Unit {name} has non-finite coordinates ({x}, {y})")]
    NonFiniteCoordinates { name: String, x: f64, y: f64 },

    /// Cable data is unusable (non-positive capacity, negative cost, ...).
    #[error("Cable type {name}: {reason}")]
    InvalidCableType { name: String, reason: String },

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Convenience type alias for Results using WacError.
pub type WacResult<T> = Result<T, WacError>;

impl From<serde_json::Error> for WacError {
    fn from(err: serde_json::Error) -> Self {
        WacError::Serialization(err.to_string())
    }
}
