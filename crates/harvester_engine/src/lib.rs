//! Harvester engine: GraphQL transport, pagination, CSV persistence and the
//! resumable harvesting jobs.
mod checkpoint;
mod clock;
mod config;
mod engine;
mod jobs;
mod persist;
mod progress;
pub mod queries;
mod request;
mod transport;
mod types;
mod walker;

pub use checkpoint::{CheckpointStore, RepositoryFlags, RowCheckpoint};
pub use clock::{Clock, SystemClock};
pub use config::{DiscoverySettings, HarvestConfig, PullSettings};
pub use engine::EngineHandle;
pub use jobs::{reconcile_flags, Harvester, PipelineSummary};
pub use persist::{
    ensure_output_dir, read_records, read_table, rewrite_csv, AtomicFileWriter, CsvSink,
    PersistError, Table,
};
pub use progress::{LogProgressSink, ProgressSink};
pub use request::Requester;
pub use transport::{
    decode_payload, GraphqlRequest, RateLimitState, ReqwestTransport, Transport,
    TransportSettings, GITHUB_GRAPHQL_ENDPOINT,
};
pub use types::{
    FailureKind, HarvestError, HarvestEvent, JobSummary, Outcome, RequestFailure, SkipReason,
    WaitReason,
};
pub use walker::{Page, PaginationWalker, CURSOR_VARIABLE};
