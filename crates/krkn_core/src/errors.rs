use std::fmt;
use thiserror::Error;
use tokio::time::Duration;

/// Low-level failure causes, analogous to the teacher's `StdError`.
#[derive(Error, Debug)]
pub enum StdError {
    #[error("JsonSerializationError: {0}")]
    JsonSerializationError(#[source] serde_json::Error),

    #[error("YamlSerializationError: {0}")]
    YamlSerializationError(#[source] serde_yaml::Error),

    #[error("KubeError: {0}")]
    KubeError(#[source] kube::Error),

    #[error("HttpError: {0}")]
    HttpError(String),

    #[error("CryptoError: {0}")]
    CryptoError(String),

    #[error("DecodingError: {0}")]
    DecodingError(String),

    #[error("MetadataMissing: {0}")]
    MetadataMissing(String),
}

impl StdError {
    pub fn metric_label(&self) -> String {
        format!("{self:?}").to_lowercase()
    }
}

/// An error paired with a requeue delay, used by the scenario-run
/// controller's retry policy exactly as the teacher threads
/// `ErrorWithRequeue` through its reconcile functions.
#[derive(Error, Debug)]
pub struct ErrorWithRequeue {
    pub duration: Duration,
    pub error: StdError,
}

impl ErrorWithRequeue {
    pub fn new(error: StdError, duration: Duration) -> Self {
        Self { duration, error }
    }
}

impl fmt::Display for ErrorWithRequeue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

/// Boundary error taxonomy (spec §7). HTTP handlers classify into this
/// enum; it is the only error type that crosses the core/API seam.
#[derive(Error, Debug)]
pub enum Error {
    #[error("BadRequest: {0}")]
    BadRequest(String),

    #[error("field `{field}` not present in schema")]
    BadField { field: String },

    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("NotFound: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal: {0}")]
    Internal(#[source] StdError),

    #[error("Error With Requeue: {0}")]
    ErrorWithRequeue(#[source] ErrorWithRequeue),
}

impl Error {
    pub fn metric_label(&self) -> String {
        match self {
            Error::BadRequest(_) => "bad_request".into(),
            Error::BadField { .. } => "bad_field".into(),
            Error::InvalidValue { .. } => "invalid_value".into(),
            Error::Unauthorized(_) => "unauthorized".into(),
            Error::Forbidden(_) => "forbidden".into(),
            Error::NotFound(_) => "not_found".into(),
            Error::Conflict(_) => "conflict".into(),
            Error::Internal(e) => e.metric_label(),
            Error::ErrorWithRequeue(e) => e.error.metric_label(),
        }
    }

    pub fn internal(e: StdError) -> Self {
        Error::Internal(e)
    }
}

impl From<kube::Error> for Error {
    fn from(e: kube::Error) -> Self {
        Error::Internal(StdError::KubeError(e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Internal(StdError::JsonSerializationError(e))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Internal(StdError::YamlSerializationError(e))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
