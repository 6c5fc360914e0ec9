//! Error taxonomy.
//!
//! Three families, all fatal to a run:
//! - [`ConfigError`]: the simulation was set up inconsistently (missing coefficient profile,
//!   non-positive normalizer, bad grid step). Raised before any round executes.
//! - [`DataError`]: an observation source is missing or malformed. Raised at load time; no
//!   partial table is ever handed out.
//! - [`ServiceError`]: the decision service rejected a request or report. Raised mid-run; the
//!   run aborts and its partial statistics are dropped.
//!
//! Nothing here is retried.

use std::path::PathBuf;

use thiserror::Error;

use crate::context::Context;

/// Setup-time inconsistencies.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("no coefficient profile for context {0}")]
    MissingProfile(Context),
    #[error("max raw cost for context {0} is {1}; must be finite and > 0")]
    NonPositiveNormalizer(Context, f64),
    #[error("action bound {name} is {value}; must be finite and > 0")]
    NonPositiveBound { name: &'static str, value: f64 },
    #[error("reward range [{min}, {max}] is empty or not finite")]
    InvalidRange { min: f64, max: f64 },
    #[error("grid step {0} must be finite and > 0")]
    InvalidStep(f64),
    #[error("context population is empty")]
    EmptyPopulation,
    #[error("persona {id}: click probability {value} is outside [0, 1]")]
    InvalidProbability { id: String, value: f64 },
    #[error("action dimension {0} is out of range (records carry 3 action fields)")]
    DimensionOutOfRange(usize),
    #[error("observation table is empty")]
    EmptyTable,
    #[error("noise standard deviation {0} must be finite and >= 0")]
    InvalidNoise(f64),
    #[error("scorer cannot interpret picks: {0}")]
    ActionShape(String),
}

/// Observation-source failures.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("{} not found", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read {source_name}: {error}")]
    Io {
        source_name: String,
        #[source]
        error: std::io::Error,
    },
    #[error("{source_name}:{line}: {token:?} is an unknown {field} value")]
    UnknownToken {
        source_name: String,
        line: usize,
        field: &'static str,
        token: String,
    },
    #[error("{source_name}:{line}: expected 7 fields, found {found}")]
    FieldCount {
        source_name: String,
        line: usize,
        found: usize,
    },
    #[error("{source_name}:{line}: reward {token:?} is not a number")]
    InvalidReward {
        source_name: String,
        line: usize,
        token: String,
    },
}

/// A categorical token did not belong to its declared domain.
///
/// Carried without location; [`DataError::UnknownToken`] adds the source and line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{token:?} is an unknown {field} value")]
pub struct UnknownToken {
    pub field: &'static str,
    pub token: String,
}

/// Failure reported by (or while talking to) the decision service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The service reported a non-success status.
    #[error("decision service failed: {message}")]
    Status { message: String },
    /// The service returned a choice the problem cannot resolve.
    #[error("invalid choice: {0}")]
    InvalidChoice(String),
    /// A report referenced an event the service never issued (or already closed).
    #[error("unknown event id {0}")]
    UnknownEvent(String),
}

impl ServiceError {
    pub fn status(message: impl Into<String>) -> Self {
        Self::Status {
            message: message.into(),
        }
    }
}

/// Crate-level error.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
