use std::time::Duration;

use harvester_core::{
    Exclusion, PullRequestNode, RecordFilter, RepoKey, ReviewedPullFilter, TotalCount,
};
use pretty_assertions::assert_eq;

fn node(reviews: u64, created_at: &str, closed_at: Option<&str>) -> PullRequestNode {
    PullRequestNode {
        number: 42,
        title: "Fix the flux capacitor".to_string(),
        created_at: created_at.to_string(),
        merged_at: None,
        closed_at: closed_at.map(str::to_string),
        body_text: "Ação rápida".to_string(),
        reviews: TotalCount {
            total_count: reviews,
        },
        files: TotalCount { total_count: 3 },
        additions: 10,
        deletions: 2,
        comments: TotalCount { total_count: 4 },
        participants: TotalCount { total_count: 2 },
        state: "MERGED".to_string(),
    }
}

fn repo() -> RepoKey {
    RepoKey::new("rust-lang", "rust")
}

#[test]
fn unreviewed_pull_requests_are_excluded() {
    let filter = ReviewedPullFilter::default();
    let result = filter.project(
        &repo(),
        &node(0, "2024-01-01T00:00:00Z", Some("2024-01-01T05:00:00Z")),
    );
    assert_eq!(
        result,
        Err(Exclusion::TooFewReviews {
            found: 0,
            required: 1
        })
    );
}

#[test]
fn short_lived_pull_requests_are_excluded() {
    let filter = ReviewedPullFilter::default();
    let result = filter.project(
        &repo(),
        &node(1, "2024-01-01T00:00:00Z", Some("2024-01-01T00:30:00Z")),
    );
    assert!(matches!(result, Err(Exclusion::OpenTooShort { .. })));
}

#[test]
fn exactly_one_hour_is_not_enough() {
    let filter = ReviewedPullFilter::default();
    let result = filter.project(
        &repo(),
        &node(1, "2024-01-01T00:00:00Z", Some("2024-01-01T01:00:00Z")),
    );
    assert_eq!(
        result,
        Err(Exclusion::OpenTooShort {
            open_secs: 3600,
            required_secs: 3600
        })
    );
}

#[test]
fn reviewed_long_lived_pull_request_is_projected() {
    let filter = ReviewedPullFilter::default();
    let record = filter
        .project(
            &repo(),
            &node(1, "2024-01-01T00:00:00Z", Some("2024-01-01T02:00:00Z")),
        )
        .expect("included");

    assert_eq!(record.repository, "rust-lang/rust");
    assert_eq!(record.number, 42);
    assert_eq!(record.closed_at, "2024-01-01T02:00:00Z");
    assert_eq!(record.review_count, 1);
    // Characters, not bytes.
    assert_eq!(record.description_length, 11);
    assert_eq!(record.file_count, 3);
    assert_eq!(record.comments_count, 4);
    assert_eq!(record.participants_count, 2);
    assert_eq!(record.key().unwrap().to_string(), "rust-lang/rust#42");
}

#[test]
fn merged_at_is_used_when_closed_at_is_missing() {
    let filter = ReviewedPullFilter::default();
    let mut pr = node(2, "2024-01-01T00:00:00Z", None);
    pr.merged_at = Some("2024-01-03T00:00:00Z".to_string());
    let record = filter.project(&repo(), &pr).expect("included");
    assert_eq!(record.closed_at, "2024-01-03T00:00:00Z");
}

#[test]
fn missing_close_time_is_excluded() {
    let filter = ReviewedPullFilter::default();
    let result = filter.project(&repo(), &node(3, "2024-01-01T00:00:00Z", None));
    assert_eq!(result, Err(Exclusion::NotClosed));
}

#[test]
fn thresholds_are_configurable() {
    let filter = ReviewedPullFilter {
        min_reviews: 2,
        min_open: Duration::from_secs(60),
    };
    let one_review = node(1, "2024-01-01T00:00:00Z", Some("2024-01-01T02:00:00Z"));
    assert!(filter.project(&repo(), &one_review).is_err());

    let quick = node(2, "2024-01-01T00:00:00Z", Some("2024-01-01T00:02:00Z"));
    assert!(filter.project(&repo(), &quick).is_ok());
}

#[test]
fn nodes_decode_from_graphql_json() {
    let raw = serde_json::json!({
        "number": 7,
        "title": "t",
        "createdAt": "2024-01-01T00:00:00Z",
        "mergedAt": null,
        "closedAt": "2024-01-02T00:00:00Z",
        "bodyText": "body",
        "reviews": {"totalCount": 1},
        "files": {"totalCount": 2},
        "additions": 3,
        "deletions": 4,
        "comments": {"totalCount": 5},
        "participants": {"totalCount": 6},
        "state": "CLOSED"
    });
    let decoded: PullRequestNode = serde_json::from_value(raw).unwrap();
    assert_eq!(decoded.number, 7);
    assert_eq!(decoded.participants.total_count, 6);
    assert_eq!(decoded.finished_at(), Some("2024-01-02T00:00:00Z"));
}

#[test]
fn sub_second_excess_counts_as_longer() {
    let filter = ReviewedPullFilter::default();
    let record = filter.project(
        &repo(),
        &node(1, "2024-01-01T00:00:00Z", Some("2024-01-01T01:00:00.500Z")),
    );
    assert!(record.is_ok(), "{record:?}");
}

#[test]
fn closed_before_created_is_excluded() {
    let filter = ReviewedPullFilter {
        min_reviews: 1,
        min_open: Duration::ZERO,
    };
    let result = filter.project(
        &repo(),
        &node(1, "2024-01-02T00:00:00Z", Some("2024-01-01T00:00:00Z")),
    );
    assert!(matches!(result, Err(Exclusion::OpenTooShort { .. })));
}
