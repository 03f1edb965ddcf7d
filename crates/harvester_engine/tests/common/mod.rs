#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use harvester_core::BackoffPolicy;
use harvester_engine::{
    Clock, GraphqlRequest, HarvestConfig, HarvestEvent, Harvester, Outcome, ProgressSink,
    ReqwestTransport, Transport, TransportSettings,
};
use serde_json::{json, Value};

pub const EPOCH: u64 = 1_700_000_000;

/// Clock that never blocks: sleeping records the duration and moves time forward.
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<SystemTime>>,
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl ManualClock {
    pub fn at(secs: u64) -> Self {
        Self {
            now: Arc::new(Mutex::new(UNIX_EPOCH + Duration::from_secs(secs))),
            sleeps: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }

    pub fn epoch_secs(&self) -> u64 {
        self.now
            .lock()
            .unwrap()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }
}

#[async_trait::async_trait]
impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        *self.now.lock().unwrap() += duration;
    }
}

#[derive(Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<HarvestEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<HarvestEvent> {
        self.events.lock().unwrap().drain(..).collect()
    }
}

impl ProgressSink for RecordingSink {
    fn emit(&self, event: HarvestEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Plays back canned outcomes and remembers each request with the clock time it was made at.
#[derive(Clone)]
pub struct ScriptedTransport {
    clock: ManualClock,
    script: Arc<Mutex<VecDeque<Outcome>>>,
    calls: Arc<Mutex<Vec<(u64, GraphqlRequest)>>>,
}

impl ScriptedTransport {
    pub fn new(clock: ManualClock, script: Vec<Outcome>) -> Self {
        Self {
            clock,
            script: Arc::new(Mutex::new(script.into())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Vec<(u64, GraphqlRequest)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn cursors(&self) -> Vec<Value> {
        self.calls()
            .into_iter()
            .map(|(_, request)| request.variables["cursor"].clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: &GraphqlRequest) -> Outcome {
        self.calls
            .lock()
            .unwrap()
            .push((self.clock.epoch_secs(), request.clone()));
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Outcome::FatalFailure("script exhausted".to_string()))
    }
}

pub fn fast_policy(max_attempts: u32) -> BackoffPolicy {
    BackoffPolicy {
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_secs(1),
        max_attempts,
        reset_skew: Duration::ZERO,
    }
}

/// `data` of a connection page at `/search` with `count` repositories.
pub fn search_page(start: usize, count: usize, end_cursor: &str, has_next: bool) -> Value {
    let edges: Vec<Value> = (start..start + count)
        .map(|i| json!({"node": {"name": format!("repo{i}"), "owner": {"login": format!("owner{i}")}}}))
        .collect();
    json!({
        "search": {
            "pageInfo": {"endCursor": end_cursor, "hasNextPage": has_next},
            "edges": edges
        }
    })
}

pub fn pull_node(number: u64, reviews: u64, created_at: &str, closed_at: &str) -> Value {
    json!({
        "number": number,
        "title": format!("PR {number}"),
        "createdAt": created_at,
        "mergedAt": null,
        "closedAt": closed_at,
        "bodyText": "description",
        "reviews": {"totalCount": reviews},
        "files": {"totalCount": 1},
        "additions": 5,
        "deletions": 1,
        "comments": {"totalCount": 0},
        "participants": {"totalCount": 1},
        "state": "MERGED"
    })
}

/// Full response body of a pull request page.
pub fn pulls_body(nodes: Vec<Value>, end_cursor: &str, has_next: bool) -> Value {
    let edges: Vec<Value> = nodes.into_iter().map(|node| json!({"node": node})).collect();
    json!({
        "data": {
            "repository": {
                "pullRequests": {
                    "pageInfo": {"endCursor": end_cursor, "hasNextPage": has_next},
                    "edges": edges
                }
            }
        }
    })
}

pub fn test_config(endpoint: String) -> HarvestConfig {
    HarvestConfig {
        transport: TransportSettings {
            endpoint,
            token: "t0ken".to_string(),
            ..TransportSettings::default()
        },
        retry: fast_policy(5),
        page_pause: Duration::ZERO,
        ..HarvestConfig::default()
    }
}

/// A harvester talking to a mock server, with a manual clock and a recording sink.
pub fn harvester_for(
    config: HarvestConfig,
    clock: &ManualClock,
    sink: &RecordingSink,
) -> Harvester {
    let transport = ReqwestTransport::new(config.transport.clone()).expect("client");
    Harvester::new(
        config,
        Box::new(transport),
        Box::new(clock.clone()),
        Box::new(sink.clone()),
    )
}
