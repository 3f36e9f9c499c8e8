//! Client for Splunk's asynchronous search-job API: submit a search, poll the
//! job's dispatch state until it settles, then fetch its results, all within a
//! caller-supplied deadline.

pub mod api;
pub mod config;
pub mod error;
pub mod job;
pub mod markup;
pub mod models;
pub mod records;
pub mod search;

pub use api::{Auth, ClientConfig, SearchTransport, SplunkClient, TrustMode};
pub use error::{FailureKind, ProtocolError, SearchError, SearchOutcome, TransportError};
pub use models::splunk::{DispatchState, JobHandle, ResultRow, SearchOptions};
pub use search::SearchOrchestrator;
