use std::fs;
use std::path::{Path, PathBuf};

use csv::StringRecord;
use engine_logging::{engine_info, engine_trace};
use harvester_core::{
    annotated_header, PullKey, PullRequestNode, PullRequestRecord, RecordFilter, RepoKey,
    RepositoryNode, RepositoryRecord, NUMBER_COLUMN, PR_STATE_COLUMN, PULL_REQUEST_COLUMNS,
    REPOSITORY_COLUMN, REPOSITORY_COLUMNS, UNKNOWN_STATE,
};
use serde_json::{Map, Value};

use crate::checkpoint::{CheckpointStore, RepositoryFlags, RowCheckpoint};
use crate::clock::Clock;
use crate::config::HarvestConfig;
use crate::persist::{read_table, CsvSink, PersistError};
use crate::progress::ProgressSink;
use crate::queries;
use crate::request::Requester;
use crate::transport::{GraphqlRequest, Transport};
use crate::walker::PaginationWalker;
use crate::{FailureKind, HarvestError, HarvestEvent, JobSummary, RequestFailure, SkipReason};

/// Summary of `run`: discovery only happens when the repository list is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineSummary {
    pub discovery: Option<JobSummary>,
    pub pulls: JobSummary,
}

enum RepositoryHarvest {
    Completed { records: usize, written: usize },
    Abandoned { written: usize, failure: RequestFailure },
}

/// Runs the harvesting jobs one work item at a time.
pub struct Harvester {
    config: HarvestConfig,
    transport: Box<dyn Transport>,
    clock: Box<dyn Clock>,
    progress: Box<dyn ProgressSink>,
    filter: Box<dyn RecordFilter>,
}

impl Harvester {
    pub fn new(
        config: HarvestConfig,
        transport: Box<dyn Transport>,
        clock: Box<dyn Clock>,
        progress: Box<dyn ProgressSink>,
    ) -> Self {
        let filter: Box<dyn RecordFilter> = Box::new(config.pulls.filter);
        Self {
            config,
            transport,
            clock,
            progress,
            filter,
        }
    }

    /// Replaces the review/duration filter used by the pull request job.
    pub fn with_filter(mut self, filter: Box<dyn RecordFilter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    fn requester(&self) -> Requester<'_> {
        Requester::new(
            self.transport.as_ref(),
            self.clock.as_ref(),
            self.progress.as_ref(),
            self.config.retry,
        )
    }

    fn emit(&self, event: HarvestEvent) {
        self.progress.emit(event);
    }

    /// Walks the ranking and writes every repository with `pr_collected=false`.
    ///
    /// Rows go to `<destination>.partial` as pages arrive; the file replaces
    /// `destination` once the walk ends. A rerun starts the partial file over.
    pub async fn discover(&self, destination: &Path) -> Result<JobSummary, HarvestError> {
        let settings = &self.config.discovery;
        let partial = partial_path(destination);
        if partial.exists() {
            engine_info!("Discarding unfinished discovery at {:?}", partial);
            fs::remove_file(&partial).map_err(PersistError::from)?;
        }
        let sink = CsvSink::open(&partial, &REPOSITORY_COLUMNS)?;

        let item = format!("search {:?}", settings.search_query);
        self.emit(HarvestEvent::ItemStarted { item: item.clone() });

        let requester = self.requester();
        let mut walker = PaginationWalker::<RepositoryNode>::new(
            &requester,
            item.clone(),
            queries::SEARCH_REPOSITORIES,
            variables([
                ("searchQuery", Value::from(settings.search_query.clone())),
                ("first", Value::from(settings.page_size)),
            ]),
            queries::SEARCH_CONNECTION,
        )
        .with_cap(settings.item_cap)
        .with_page_pause(self.config.page_pause);

        let mut summary = JobSummary::default();
        while let Some(page) = walker.next_page().await {
            let page = match page {
                Ok(page) => page,
                Err(failure) => {
                    self.emit(HarvestEvent::ItemFailed {
                        item,
                        failure: failure.clone(),
                    });
                    return Err(HarvestError::Discovery(failure));
                }
            };
            let records: Vec<RepositoryRecord> =
                page.nodes.into_iter().map(Into::into).collect();
            let count = sink.append(&records)?;
            summary.records_written += count;
            self.emit(HarvestEvent::RecordsWritten {
                item: item.clone(),
                count,
            });
        }

        fs::rename(&partial, destination).map_err(PersistError::from)?;
        summary.processed = 1;
        self.emit(HarvestEvent::ItemDone {
            item,
            records: summary.records_written,
        });
        Ok(summary)
    }

    /// Collects the pull requests of every repository not yet flagged in `repositories`.
    ///
    /// A repository is flagged only after all of its rows are appended and only
    /// when it produced at least one row. Rows already present in `destination`
    /// are not appended again when an unflagged repository is replayed.
    pub async fn harvest_pull_requests(
        &self,
        repositories: &Path,
        destination: &Path,
    ) -> Result<JobSummary, HarvestError> {
        if !repositories.exists() {
            return Err(HarvestError::MissingInput {
                path: repositories.to_path_buf(),
            });
        }
        let mut flags = RepositoryFlags::load(repositories)?;
        let mut written_rows = RowCheckpoint::load(destination)?;
        let sink = CsvSink::open(destination, &PULL_REQUEST_COLUMNS)?;
        let requester = self.requester();

        let mut summary = JobSummary::default();
        for repo in flags.keys() {
            let item = repo.to_string();
            if flags.is_done(&repo) {
                summary.skipped += 1;
                self.emit(HarvestEvent::ItemSkipped {
                    item,
                    reason: SkipReason::AlreadyDone,
                });
                continue;
            }

            self.emit(HarvestEvent::ItemStarted { item: item.clone() });
            match self
                .harvest_repository(&requester, &repo, &sink, &mut written_rows)
                .await?
            {
                RepositoryHarvest::Completed { records, written } => {
                    summary.records_written += written;
                    if records == 0 {
                        summary.skipped += 1;
                        self.emit(HarvestEvent::ItemSkipped {
                            item,
                            reason: SkipReason::NoRecords,
                        });
                        continue;
                    }
                    flags.mark_done(repo)?;
                    summary.processed += 1;
                    self.emit(HarvestEvent::ItemDone { item, records });
                }
                RepositoryHarvest::Abandoned { written, failure } => {
                    summary.records_written += written;
                    summary.failed += 1;
                    self.emit(HarvestEvent::ItemFailed { item, failure });
                }
            }
        }
        Ok(summary)
    }

    async fn harvest_repository(
        &self,
        requester: &Requester<'_>,
        repo: &RepoKey,
        sink: &CsvSink,
        written_rows: &mut RowCheckpoint,
    ) -> Result<RepositoryHarvest, HarvestError> {
        let item = repo.to_string();
        let mut walker = PaginationWalker::<PullRequestNode>::new(
            requester,
            item.clone(),
            queries::PULL_REQUESTS,
            variables([
                ("owner", Value::from(repo.owner.clone())),
                ("name", Value::from(repo.name.clone())),
                ("first", Value::from(self.config.pulls.page_size)),
            ]),
            queries::PULL_REQUESTS_CONNECTION,
        )
        .with_page_pause(self.config.page_pause);

        let mut records = 0;
        let mut written = 0;
        while let Some(page) = walker.next_page().await {
            let page = match page {
                Ok(page) => page,
                Err(failure) => return Ok(RepositoryHarvest::Abandoned { written, failure }),
            };

            let mut fresh: Vec<PullRequestRecord> = Vec::new();
            for node in &page.nodes {
                match self.filter.project(repo, node) {
                    Ok(record) => {
                        records += 1;
                        let key = PullKey::new(repo.clone(), record.number);
                        let repeated = fresh.iter().any(|r| r.number == record.number);
                        if !written_rows.is_done(&key) && !repeated {
                            fresh.push(record);
                        }
                    }
                    Err(exclusion) => {
                        engine_trace!("{}#{}: excluded, {}", item, node.number, exclusion)
                    }
                }
            }

            let count = sink.append(&fresh)?;
            for record in fresh {
                written_rows.mark_done(PullKey::new(repo.clone(), record.number))?;
            }
            if count > 0 {
                written += count;
                self.emit(HarvestEvent::RecordsWritten {
                    item: item.clone(),
                    count,
                });
            }
        }
        Ok(RepositoryHarvest::Completed { records, written })
    }

    /// Appends every row of `input` that `destination` does not hold yet, with
    /// the pull request's current state in a trailing `pr_state` column.
    ///
    /// An error answer from the API writes `Unknown`. A request that runs out of
    /// retries writes nothing, so the row is tried again on the next run.
    pub async fn annotate_states(
        &self,
        input: &Path,
        destination: &Path,
    ) -> Result<JobSummary, HarvestError> {
        let table = read_table(input)?.ok_or_else(|| HarvestError::MissingInput {
            path: input.to_path_buf(),
        })?;
        let column = |name: &str| {
            table.column(name).ok_or_else(|| HarvestError::MissingColumn {
                path: input.to_path_buf(),
                column: name.to_string(),
            })
        };
        let repository_column = column(REPOSITORY_COLUMN)?;
        let number_column = column(NUMBER_COLUMN)?;

        let mut done = RowCheckpoint::load(destination)?;
        let sink = CsvSink::open(destination, &annotated_header(&table.header))?;
        let requester = self.requester();

        let mut summary = JobSummary::default();
        for (index, row) in table.rows().enumerate() {
            let repository = row.get(repository_column).unwrap_or_default();
            let number = row.get(number_column).unwrap_or_default();
            let key = match PullKey::parse(repository, number) {
                Ok(key) => key,
                Err(err) => {
                    summary.skipped += 1;
                    self.emit(HarvestEvent::ItemSkipped {
                        item: format!("row {}", index + 1),
                        reason: SkipReason::InvalidKey(err.to_string()),
                    });
                    continue;
                }
            };
            let item = key.to_string();
            if done.is_done(&key) {
                summary.skipped += 1;
                self.emit(HarvestEvent::ItemSkipped {
                    item,
                    reason: SkipReason::AlreadyDone,
                });
                continue;
            }

            self.emit(HarvestEvent::ItemStarted { item: item.clone() });
            let state = match fetch_state(&requester, &item, &key).await {
                Ok(state) => state,
                Err(failure) => {
                    summary.failed += 1;
                    let retry_later =
                        matches!(failure.kind, FailureKind::RetriesExhausted { .. });
                    self.emit(HarvestEvent::ItemFailed {
                        item: item.clone(),
                        failure,
                    });
                    if retry_later {
                        continue;
                    }
                    UNKNOWN_STATE.to_string()
                }
            };

            let count = sink.append_rows(&[annotate_row(&table.header, row, &state)])?;
            done.mark_done(key)?;
            summary.records_written += count;
            if state != UNKNOWN_STATE {
                summary.processed += 1;
            }
            self.emit(HarvestEvent::ItemDone {
                item,
                records: count,
            });
        }
        Ok(summary)
    }

    /// Discovery when the repository list does not exist yet, then pull requests.
    pub async fn run(
        &self,
        repositories: &Path,
        pulls: &Path,
    ) -> Result<PipelineSummary, HarvestError> {
        let discovery = if repositories.exists() {
            engine_info!(
                "Repository list {:?} found, skipping discovery",
                repositories
            );
            None
        } else {
            Some(self.discover(repositories).await?)
        };
        let pulls = self.harvest_pull_requests(repositories, pulls).await?;
        Ok(PipelineSummary { discovery, pulls })
    }
}

/// Sets `pr_collected` for exactly the repositories that have rows in `pulls`.
/// Returns how many repositories ended up flagged.
pub fn reconcile_flags(repositories: &Path, pulls: &Path) -> Result<usize, HarvestError> {
    if !repositories.exists() {
        return Err(HarvestError::MissingInput {
            path: repositories.to_path_buf(),
        });
    }
    let mut flags = RepositoryFlags::load(repositories)?;
    let collected = RowCheckpoint::load(pulls)?.repositories();
    let flagged = flags.reset_flags(|key| collected.is_done(key))?;
    engine_info!(
        "Reconciled {:?}: {} of {} repositories collected",
        repositories,
        flagged,
        flags.len()
    );
    Ok(flagged)
}

async fn fetch_state(
    requester: &Requester<'_>,
    item: &str,
    key: &PullKey,
) -> Result<String, RequestFailure> {
    let request = GraphqlRequest::new(
        queries::PULL_REQUEST_STATE,
        Value::Object(variables([
            ("owner", Value::from(key.repository.owner.clone())),
            ("repo", Value::from(key.repository.name.clone())),
            ("number", Value::from(key.number)),
        ])),
    );
    let data = requester.execute(item, &request).await?;
    data.pointer(queries::PULL_REQUEST_STATE_FIELD)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| RequestFailure::new(FailureKind::UnexpectedShape, "no pull request state"))
}

fn annotate_row(input_header: &[String], row: &StringRecord, state: &str) -> StringRecord {
    let mut annotated: StringRecord = input_header
        .iter()
        .enumerate()
        .filter(|(_, column)| column.as_str() != PR_STATE_COLUMN)
        .map(|(index, _)| row.get(index).unwrap_or_default())
        .collect();
    annotated.push_field(state);
    annotated
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

fn variables<const N: usize>(pairs: [(&str, Value); N]) -> Map<String, Value> {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}
