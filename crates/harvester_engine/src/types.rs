use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use harvester_core::RateLimitReset;
use serde_json::Value;
use thiserror::Error;

use crate::persist::PersistError;

/// Classification of a single GraphQL round trip.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The `data` object of an error-free response.
    Success(Value),
    RateLimited(RateLimitReset),
    TransientFailure(String),
    FatalFailure(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitReason {
    RateLimited,
    Transient { attempt: u32 },
    PagePause,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyDone,
    InvalidKey(String),
    NoRecords,
}

/// Progress reported while a job runs. `item` is the display form of the work item key.
#[derive(Debug, Clone, PartialEq)]
pub enum HarvestEvent {
    ItemStarted {
        item: String,
    },
    PageFetched {
        item: String,
        page: usize,
        nodes: usize,
    },
    Waiting {
        item: String,
        delay: Duration,
        reason: WaitReason,
    },
    RecordsWritten {
        item: String,
        count: usize,
    },
    ItemDone {
        item: String,
        records: usize,
    },
    ItemSkipped {
        item: String,
        reason: SkipReason,
    },
    ItemFailed {
        item: String,
        failure: RequestFailure,
    },
}

/// A request that was given up on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct RequestFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl RequestFailure {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// Rejected by the API or by the transport; never retried.
    Fatal,
    /// Transient failures outlasted the retry budget.
    RetriesExhausted { attempts: u32 },
    /// The payload did not have the expected shape.
    UnexpectedShape,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Fatal => write!(f, "fatal failure"),
            FailureKind::RetriesExhausted { attempts } => {
                write!(f, "gave up after {attempts} transient failures")
            }
            FailureKind::UnexpectedShape => write!(f, "unexpected response shape"),
        }
    }
}

/// Counts reported at the end of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JobSummary {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub records_written: usize,
}

/// Failures that stop a whole job rather than a single item.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error("an API token is required")]
    MissingToken,
    #[error("http client setup failed: {0}")]
    Client(String),
    #[error("{path:?} does not exist")]
    MissingInput { path: PathBuf },
    #[error("{path:?} has no {column:?} column")]
    MissingColumn { path: PathBuf, column: String },
    #[error("discovery aborted: {0}")]
    Discovery(RequestFailure),
    #[error("async runtime unavailable: {0}")]
    Runtime(#[from] std::io::Error),
}
