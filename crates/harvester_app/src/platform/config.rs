//! RON settings file, layered under the command line.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use harvester_core::{BackoffPolicy, ReviewedPullFilter};
use harvester_engine::{
    DiscoverySettings, HarvestConfig, PullSettings, TransportSettings, GITHUB_GRAPHQL_ENDPOINT,
};
use serde::Deserialize;

use crate::cli::{Command, GlobalArgs};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct FileConfig {
    pub endpoint: String,
    pub token: Option<String>,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub max_response_bytes: u64,
    pub page_pause_ms: u64,
    pub retry: RetryConfig,
    pub discovery: DiscoveryConfig,
    pub pulls: PullsConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct RetryConfig {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
    pub reset_skew_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct DiscoveryConfig {
    pub search_query: String,
    pub page_size: u32,
    pub item_cap: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct PullsConfig {
    pub page_size: u32,
    pub min_reviews: u64,
    pub min_open_minutes: u64,
}

impl Default for FileConfig {
    fn default() -> Self {
        let transport = TransportSettings::default();
        Self {
            endpoint: GITHUB_GRAPHQL_ENDPOINT.to_string(),
            token: None,
            connect_timeout_ms: millis(transport.connect_timeout),
            request_timeout_ms: millis(transport.request_timeout),
            max_response_bytes: transport.max_bytes,
            page_pause_ms: millis(HarvestConfig::default().page_pause),
            retry: RetryConfig::default(),
            discovery: DiscoveryConfig::default(),
            pulls: PullsConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = BackoffPolicy::default();
        Self {
            base_delay_ms: millis(policy.base_delay),
            max_delay_ms: millis(policy.max_delay),
            max_attempts: policy.max_attempts,
            reset_skew_secs: policy.reset_skew.as_secs(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        let settings = DiscoverySettings::default();
        Self {
            search_query: settings.search_query,
            page_size: settings.page_size,
            item_cap: settings.item_cap,
        }
    }
}

impl Default for PullsConfig {
    fn default() -> Self {
        let settings = PullSettings::default();
        Self {
            page_size: settings.page_size,
            min_reviews: settings.filter.min_reviews,
            min_open_minutes: settings.filter.min_open.as_secs() / 60,
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl FileConfig {
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        ron::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub(crate) fn into_harvest_config(self) -> HarvestConfig {
        HarvestConfig {
            transport: TransportSettings {
                endpoint: self.endpoint,
                token: self.token.unwrap_or_default(),
                connect_timeout: Duration::from_millis(self.connect_timeout_ms),
                request_timeout: Duration::from_millis(self.request_timeout_ms),
                max_bytes: self.max_response_bytes,
                ..TransportSettings::default()
            },
            retry: BackoffPolicy {
                base_delay: Duration::from_millis(self.retry.base_delay_ms),
                max_delay: Duration::from_millis(self.retry.max_delay_ms),
                max_attempts: self.retry.max_attempts,
                reset_skew: Duration::from_secs(self.retry.reset_skew_secs),
            },
            discovery: DiscoverySettings {
                search_query: self.discovery.search_query,
                page_size: self.discovery.page_size,
                item_cap: self.discovery.item_cap,
            },
            pulls: PullSettings {
                page_size: self.pulls.page_size,
                filter: ReviewedPullFilter {
                    min_reviews: self.pulls.min_reviews,
                    min_open: Duration::from_secs(self.pulls.min_open_minutes * 60),
                },
            },
            page_pause: Duration::from_millis(self.page_pause_ms),
        }
    }
}

/// Reads the config file, if any, and applies the command line on top of it.
pub(crate) fn resolve(global: &GlobalArgs, command: &Command) -> Result<HarvestConfig> {
    let file = match &global.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let mut config = file.into_harvest_config();

    if let Some(token) = &global.token {
        config.transport.token = token.clone();
    }
    if let Some(endpoint) = &global.endpoint {
        config.transport.endpoint = endpoint.clone();
    }
    if let Command::Discover {
        query, cap, no_cap, ..
    } = command
    {
        if let Some(query) = query {
            config.discovery.search_query = query.clone();
        }
        if *no_cap {
            config.discovery.item_cap = None;
        } else if cap.is_some() {
            config.discovery.item_cap = *cap;
        }
    }
    Ok(config)
}
