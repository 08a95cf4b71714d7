use thiserror::Error;

use crate::workflow::Phase;

#[derive(Debug, Error)]
pub enum TankflowError {
    #[error("No pending internal transport jobs.")]
    NoJobs,

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("No job selected. Pick a pending job first.")]
    NoActiveJob,

    #[error("`{command}` is not valid in phase {phase}")]
    PhaseMismatch { command: &'static str, phase: Phase },

    #[error("Route order of job {0} does not match its destination set")]
    RouteIntegrity(String),

    #[error("Job {0} has no destination branches")]
    NoDestinations(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Operator-input failures. These are local and non-fatal: the commit is
/// rejected, the job is left untouched and the form can be resubmitted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("required field missing: {0}")]
    MissingField(&'static str),

    #[error("field {field} must be numeric, got \"{value}\"")]
    NotNumeric { field: &'static str, value: String },

    #[error("at least {required} proof photo(s) required, got {got}")]
    NoPhotos { required: usize, got: usize },

    #[error("odometer reading {reading} km exceeds maximum {max} km")]
    OdometerOutOfRange { reading: u32, max: u32 },

    #[error("route order must be a permutation of the destination branch ids")]
    RouteNotPermutation,

    #[error("route is frozen once delivery has begun")]
    RouteFrozen,

    #[error("arrival must be confirmed before delivery")]
    NotArrived,

    #[error("arrival already confirmed for the current stop")]
    AlreadyArrived,
}
