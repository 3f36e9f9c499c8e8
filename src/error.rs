use std::path::PathBuf;
use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

use crate::models::splunk::{DispatchState, ResultRow};

/// Connection, authentication or HTTP-level failure. Never retried here.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("failed to read certificate {path:?}: {source}")]
    Certificate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("authentication rejected ({status}): {body}")]
    Unauthorized { status: StatusCode, body: String },
    #[error("API Error {status}: {body}")]
    Status { status: StatusCode, body: String },
}

/// A response arrived but did not have the expected shape.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed XML response: {0}")]
    Markup(String),
    #[error("response is missing '{0}'")]
    MissingField(&'static str),
    #[error("unrecognized dispatch state '{0}'")]
    UnknownDispatchState(String),
    #[error("malformed JSON response: {0}")]
    Json(#[from] serde_json::Error),
    #[error("result document has no 'results' container")]
    MissingResults,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transport,
    Protocol,
    Timeout,
    JobFailed,
    Cancelled,
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("search job still running after {elapsed:?}")]
    Timeout { elapsed: Duration },
    #[error("search job ended in state {0}")]
    JobFailed(DispatchState),
    #[error("search cancelled by caller")]
    Cancelled,
}

impl SearchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            SearchError::Transport(_) => FailureKind::Transport,
            SearchError::Protocol(_) => FailureKind::Protocol,
            SearchError::Timeout { .. } => FailureKind::Timeout,
            SearchError::JobFailed(_) => FailureKind::JobFailed,
            SearchError::Cancelled => FailureKind::Cancelled,
        }
    }
}

/// Either the rows of a finished job, in server order, or why there are none.
pub type SearchOutcome = Result<Vec<ResultRow>, SearchError>;
