use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::time::Duration;

/// Lifecycle stage of a search job as reported by Splunk's `dispatchState` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchState {
    Queued,
    Parsing,
    Running,
    Finalizing,
    Done,
    Paused,
    CancelledInternal,
    CancelledByUser,
    RejectedInput,
    Quit,
    Failed,
}

impl DispatchState {
    pub const ALL: [DispatchState; 11] = [
        DispatchState::Queued,
        DispatchState::Parsing,
        DispatchState::Running,
        DispatchState::Finalizing,
        DispatchState::Done,
        DispatchState::Paused,
        DispatchState::CancelledInternal,
        DispatchState::CancelledByUser,
        DispatchState::RejectedInput,
        DispatchState::Quit,
        DispatchState::Failed,
    ];

    /// The string Splunk uses for this state on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchState::Queued => "QUEUED",
            DispatchState::Parsing => "PARSING",
            DispatchState::Running => "RUNNING",
            DispatchState::Finalizing => "FINALIZING",
            DispatchState::Done => "DONE",
            DispatchState::Paused => "PAUSE",
            DispatchState::CancelledInternal => "INTERNAL_CANCEL",
            DispatchState::CancelledByUser => "USER_CANCEL",
            DispatchState::RejectedInput => "BAD_INPUT_CANCEL",
            DispatchState::Quit => "QUIT",
            DispatchState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownDispatchState(pub String);

impl FromStr for DispatchState {
    type Err = UnknownDispatchState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DispatchState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| UnknownDispatchState(s.to_string()))
    }
}

/// Search id of a submitted job. Only obtainable by parsing a submit response;
/// not `Clone`, a handle belongs to exactly one `search` call.
#[derive(Debug, PartialEq, Eq)]
pub struct JobHandle(String);

impl JobHandle {
    pub(crate) fn new(sid: String) -> Self {
        Self(sid)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One result record. Fields the server omitted for this row are absent.
pub type ResultRow = BTreeMap<String, String>;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
    /// Fields to project; empty means every field.
    pub fields: Vec<String>,
    /// `None` leaves the limit to the server.
    pub max_results: Option<NonZeroU32>,
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            fields: Vec::new(),
            max_results: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl SearchOptions {
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut collected: Vec<String> = Vec::new();
        for field in fields {
            let field = field.into();
            if !collected.contains(&field) {
                collected.push(field);
            }
        }
        self.fields = collected;
        self
    }

    pub fn with_max_results(mut self, max_results: Option<NonZeroU32>) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
