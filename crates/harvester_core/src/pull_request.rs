use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{KeyError, PullKey, RepoKey};

pub const PULL_REQUEST_COLUMNS: [&str; 13] = [
    "repository",
    "number",
    "title",
    "created_at",
    "closed_at",
    "state",
    "review_count",
    "description_length",
    "file_count",
    "additions",
    "deletions",
    "comments_count",
    "participants_count",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalCount {
    pub total_count: u64,
}

/// A merged or closed pull request as returned by the pull request query.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestNode {
    pub number: u64,
    pub title: String,
    pub created_at: String,
    pub merged_at: Option<String>,
    pub closed_at: Option<String>,
    #[serde(default)]
    pub body_text: String,
    pub reviews: TotalCount,
    pub files: TotalCount,
    pub additions: u64,
    pub deletions: u64,
    pub comments: TotalCount,
    pub participants: TotalCount,
    pub state: String,
}

impl PullRequestNode {
    /// `closedAt`, falling back to `mergedAt`.
    pub fn finished_at(&self) -> Option<&str> {
        self.closed_at
            .as_deref()
            .or(self.merged_at.as_deref())
            .filter(|value| !value.is_empty())
    }
}

/// One row of the pull request dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRecord {
    pub repository: String,
    pub number: u64,
    pub title: String,
    pub created_at: String,
    pub closed_at: String,
    pub state: String,
    pub review_count: u64,
    pub description_length: u64,
    pub file_count: u64,
    pub additions: u64,
    pub deletions: u64,
    pub comments_count: u64,
    pub participants_count: u64,
}

impl PullRequestRecord {
    pub fn key(&self) -> Result<PullKey, KeyError> {
        Ok(PullKey::new(RepoKey::parse(&self.repository)?, self.number))
    }
}

/// Why a node did not become a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Exclusion {
    #[error("{found} reviews, at least {required} required")]
    TooFewReviews { found: u64, required: u64 },
    #[error("no closed or merged timestamp")]
    NotClosed,
    #[error("open for {open_secs}s, more than {required_secs}s required")]
    OpenTooShort { open_secs: i64, required_secs: u64 },
    #[error("unparseable timestamp {0:?}")]
    InvalidTimestamp(String),
}

/// Selects and flattens child nodes into dataset rows.
pub trait RecordFilter: Send + Sync {
    fn project(
        &self,
        repository: &RepoKey,
        node: &PullRequestNode,
    ) -> Result<PullRequestRecord, Exclusion>;
}

/// Keeps pull requests that were reviewed and stayed open longer than a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewedPullFilter {
    pub min_reviews: u64,
    /// The open duration must be strictly greater than this.
    pub min_open: Duration,
}

impl Default for ReviewedPullFilter {
    fn default() -> Self {
        Self {
            min_reviews: 1,
            min_open: Duration::from_secs(60 * 60),
        }
    }
}

impl RecordFilter for ReviewedPullFilter {
    fn project(
        &self,
        repository: &RepoKey,
        node: &PullRequestNode,
    ) -> Result<PullRequestRecord, Exclusion> {
        let reviews = node.reviews.total_count;
        if reviews < self.min_reviews {
            return Err(Exclusion::TooFewReviews {
                found: reviews,
                required: self.min_reviews,
            });
        }
        let finished_at = node.finished_at().ok_or(Exclusion::NotClosed)?;

        let created = parse_timestamp(&node.created_at)?;
        let finished = parse_timestamp(finished_at)?;
        let open = finished - created;
        let required = TimeDelta::from_std(self.min_open).unwrap_or(TimeDelta::MAX);
        if open <= required {
            return Err(Exclusion::OpenTooShort {
                open_secs: open.num_seconds(),
                required_secs: self.min_open.as_secs(),
            });
        }

        Ok(PullRequestRecord {
            repository: repository.to_string(),
            number: node.number,
            title: node.title.clone(),
            created_at: node.created_at.clone(),
            closed_at: finished_at.to_string(),
            state: node.state.clone(),
            review_count: reviews,
            description_length: node.body_text.chars().count() as u64,
            file_count: node.files.total_count,
            additions: node.additions,
            deletions: node.deletions,
            comments_count: node.comments.total_count,
            participants_count: node.participants.total_count,
        })
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, Exclusion> {
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|_| Exclusion::InvalidTimestamp(raw.to_string()))
}
