use thiserror::Error;

/// Result type alias for experiment operations
pub type Result<T, E = ExperimentError> = std::result::Result<T, E>;

/// Errors raised by the experiment core
///
/// Only misconfiguration is an error. Bad request input (a stale override
/// parameter, an unknown value shape) is never surfaced.
#[derive(Error, Debug, PartialEq)]
pub enum ExperimentError {
    #[error("origin pool is empty (app pool: {app}, s3 pool: {s3}), a default origin is required")]
    EmptyOriginPool { app: usize, s3: usize },

    #[error("missing default origin for the {0} pool")]
    MissingDefaultOrigin(&'static str),

    #[error("invalid origin {origin:?}: {reason}")]
    InvalidOrigin { origin: String, reason: String },
}
