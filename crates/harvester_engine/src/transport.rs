use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures_util::StreamExt;
use harvester_core::RateLimitReset;
use reqwest::header::{HeaderMap, RETRY_AFTER, USER_AGENT};
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;

use crate::{HarvestError, Outcome};

pub const GITHUB_GRAPHQL_ENDPOINT: &str = "https://api.github.com/graphql";

const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";

#[derive(Clone)]
pub struct TransportSettings {
    pub endpoint: String,
    pub token: String,
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_bytes: u64,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            endpoint: GITHUB_GRAPHQL_ENDPOINT.to_string(),
            token: String::new(),
            user_agent: concat!("harvester/", env!("CARGO_PKG_VERSION")).to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_bytes: 10 * 1024 * 1024,
        }
    }
}

// Keeps the token out of logs.
impl fmt::Debug for TransportSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportSettings")
            .field("endpoint", &self.endpoint)
            .field("token", &"<redacted>")
            .field("user_agent", &self.user_agent)
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("max_bytes", &self.max_bytes)
            .finish()
    }
}

/// Body of a GraphQL POST.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphqlRequest {
    pub query: String,
    pub variables: Value,
}

impl GraphqlRequest {
    pub fn new(query: impl Into<String>, variables: Value) -> Self {
        Self {
            query: query.into(),
            variables,
        }
    }
}

/// Rate-limit headers of one response. Recomputed for every response, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RateLimitState {
    pub remaining: Option<u32>,
    pub reset_at: Option<SystemTime>,
    pub retry_after: Option<Duration>,
}

impl RateLimitState {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let number = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<u64>().ok())
        };
        Self {
            remaining: number(RATE_LIMIT_REMAINING).map(|v| v.min(u32::MAX as u64) as u32),
            reset_at: number(RATE_LIMIT_RESET).map(|secs| UNIX_EPOCH + Duration::from_secs(secs)),
            retry_after: number(RETRY_AFTER.as_str()).map(Duration::from_secs),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == Some(0)
    }

    /// For a 403/429: a `Retry-After`, or a reset time with no budget left.
    fn rejection_reset(&self) -> Option<RateLimitReset> {
        if let Some(delay) = self.retry_after {
            return Some(RateLimitReset::After(delay));
        }
        match (self.reset_at, self.remaining) {
            (Some(reset_at), None | Some(0)) => Some(RateLimitReset::At(reset_at)),
            _ => None,
        }
    }
}

/// One network call, classified. Implementations never sleep.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &GraphqlRequest) -> Outcome;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    settings: TransportSettings,
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(settings: TransportSettings) -> Result<Self, HarvestError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| HarvestError::Client(err.to_string()))?;
        Ok(Self { settings, client })
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: &GraphqlRequest) -> Outcome {
        let response = match self
            .client
            .post(&self.settings.endpoint)
            .bearer_auth(&self.settings.token)
            .header(USER_AGENT, &self.settings.user_agent)
            .json(request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => return map_reqwest_error(err),
        };

        let status = response.status();
        let rate_limit = RateLimitState::from_headers(response.headers());
        if !status.is_success() {
            return classify_rejection(status, &rate_limit);
        }
        if rate_limit.is_exhausted() {
            return Outcome::RateLimited(
                rate_limit
                    .reset_at
                    .map(RateLimitReset::At)
                    .unwrap_or(RateLimitReset::After(Duration::ZERO)),
            );
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Outcome::FatalFailure(format!(
                    "response too large (max {}, actual {content_len})",
                    self.settings.max_bytes
                ));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => return map_reqwest_error(err),
            };
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Outcome::FatalFailure(format!(
                    "response too large (max {}, read {next_len})",
                    self.settings.max_bytes
                ));
            }
            bytes.extend_from_slice(&chunk);
        }

        decode_payload(&bytes)
    }
}

fn classify_rejection(status: StatusCode, rate_limit: &RateLimitState) -> Outcome {
    if status.is_server_error() {
        return Outcome::TransientFailure(format!("http status {status}"));
    }
    if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
        if let Some(reset) = rate_limit.rejection_reset() {
            return Outcome::RateLimited(reset);
        }
    }
    Outcome::FatalFailure(format!("http status {status}"))
}

/// Turns a 2xx body into `Success(data)` or a fatal failure.
pub fn decode_payload(body: &[u8]) -> Outcome {
    let mut payload: Value = match serde_json::from_slice(body) {
        Ok(payload) => payload,
        Err(err) => return Outcome::FatalFailure(format!("invalid json: {err}")),
    };

    if let Some(errors) = payload.get("errors").and_then(Value::as_array) {
        if !errors.is_empty() {
            let messages: Vec<&str> = errors
                .iter()
                .map(|error| {
                    error
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown error")
                })
                .collect();
            return Outcome::FatalFailure(format!("graphql errors: {}", messages.join("; ")));
        }
    }

    match payload.get_mut("data").map(Value::take) {
        Some(data) if !data.is_null() => Outcome::Success(data),
        _ => Outcome::FatalFailure("response has no data".to_string()),
    }
}

fn map_reqwest_error(err: reqwest::Error) -> Outcome {
    if err.is_builder() {
        return Outcome::FatalFailure(err.to_string());
    }
    // Timeouts, refused or reset connections and truncated bodies are all safe to resend.
    Outcome::TransientFailure(err.to_string())
}
