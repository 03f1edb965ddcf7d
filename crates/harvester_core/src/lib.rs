//! Harvester core: work item keys, checkpoint bookkeeping, retry decisions and
//! the record projections. Nothing in here performs IO.
mod annotation;
mod backoff;
mod checkpoint;
mod key;
mod page;
mod pull_request;
mod repository;

pub use annotation::{
    annotated_header, NUMBER_COLUMN, PR_STATE_COLUMN, REPOSITORY_COLUMN, UNKNOWN_STATE,
};
pub use backoff::{
    Backoff, BackoffController, BackoffPolicy, RateLimitReset, RetrySignal, DEFAULT_BASE_DELAY,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY, DEFAULT_RESET_SKEW,
};
pub use checkpoint::CheckpointSet;
pub use key::{KeyError, PullKey, RepoKey};
pub use page::{Connection, Edge, PageInfo};
pub use pull_request::{
    Exclusion, PullRequestNode, PullRequestRecord, RecordFilter, ReviewedPullFilter, TotalCount,
    PULL_REQUEST_COLUMNS,
};
pub use repository::{
    parse_collected_flag, OwnerNode, RepositoryNode, RepositoryRecord, REPOSITORY_COLUMNS,
};
