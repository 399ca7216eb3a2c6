//! Error taxonomy for the account client.
//!
//! # Design
//! Three layers, each owned by the component that produces it:
//!
//! - `TransportError`: a single failed network attempt.
//! - `DispatchError`: what a `Dispatcher` reports for one logical call, which
//!   adds deadline, cancellation and retry exhaustion on top of transport
//!   failures.
//! - `ApiError`: the only type callers see. Every variant is a plain value
//!   (`Clone + PartialEq`) so tests can compare errors directly.
//!
//! HTTP-level failures (a response arrived, but not the expected status) are
//! always `ApiError::Request` carrying a `RequestError`; transport-level
//! failures never are.

use thiserror::Error;

/// Message used for every 404, whatever the server put in the body.
pub const RECORD_NOT_FOUND: &str = "record does not exist.";

/// Failure of a single transport attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The per-attempt timeout elapsed before a response arrived.
    #[error("request timed out")]
    Timeout,

    /// Any other network failure (connect, DNS, TLS, broken stream, ...).
    #[error("transport failure: {0}")]
    Failure(String),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout)
    }
}

/// Failure of one logical call as reported by a `Dispatcher`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The caller's deadline expired before or between attempts.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The caller cancelled the call.
    #[error("call cancelled")]
    Cancelled,

    /// Every allowed attempt failed; `last` is the final attempt's failure.
    #[error("retry limit reached after {attempts} attempts: {last}")]
    RetryLimitExceeded { attempts: u32, last: TransportError },
}

impl DispatchError {
    /// The underlying transport failure, looking through retry exhaustion.
    pub fn transport_error(&self) -> Option<&TransportError> {
        match self {
            DispatchError::Transport(err) => Some(err),
            DispatchError::RetryLimitExceeded { last, .. } => Some(last),
            _ => None,
        }
    }
}

/// Normalized application-level HTTP error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("status:{status_code}, error:'{message}'")]
pub struct RequestError {
    pub status_code: u16,
    pub message: String,
}

impl RequestError {
    pub fn new(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
        }
    }
}

/// Errors returned by `AccountClient` operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// A required input was empty or whitespace; no request was sent.
    #[error("{field} must be provided and can't contain only blanks")]
    MissingRequiredField { field: &'static str },

    /// The request payload could not be encoded as JSON.
    #[error("serialization failed: {0}")]
    SerializationFailure(String),

    /// The network call failed for a reason other than a timeout.
    #[error("transport failure: {0}")]
    TransportFailure(String),

    /// The per-attempt timeout or the caller's deadline expired.
    #[error("request cancelled due to deadline exceeded")]
    Timeout,

    /// The caller cancelled the call.
    #[error("request cancelled by caller")]
    Cancelled,

    /// Retries were exhausted; `source` is the classified last failure.
    #[error("unable to execute request, {attempts} attempts made: {source}")]
    RetryLimitExceeded {
        attempts: u32,
        source: Box<ApiError>,
    },

    /// A response body was not the JSON we expected.
    #[error("invalid JSON value: {0}")]
    UnmarshalFailure(String),

    /// The server answered with an unexpected status.
    #[error(transparent)]
    Request(#[from] RequestError),
}

impl ApiError {
    /// HTTP status for `Request` errors, `None` for everything else.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Request(err) => Some(err.status_code),
            _ => None,
        }
    }

    /// Whether this error ultimately stems from a timeout, looking through
    /// retry exhaustion.
    pub fn is_timeout(&self) -> bool {
        match self {
            ApiError::Timeout => true,
            ApiError::RetryLimitExceeded { source, .. } => source.is_timeout(),
            _ => false,
        }
    }
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout => ApiError::Timeout,
            TransportError::Failure(msg) => ApiError::TransportFailure(msg),
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Transport(err) => err.into(),
            DispatchError::DeadlineExceeded => ApiError::Timeout,
            DispatchError::Cancelled => ApiError::Cancelled,
            DispatchError::RetryLimitExceeded { attempts, last } => ApiError::RetryLimitExceeded {
                attempts,
                source: Box::new(last.into()),
            },
        }
    }
}
