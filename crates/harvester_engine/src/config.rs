use std::time::Duration;

use harvester_core::{BackoffPolicy, ReviewedPullFilter};

use crate::transport::TransportSettings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoverySettings {
    pub search_query: String,
    pub page_size: u32,
    /// Stop after this many repositories; `None` walks the whole ranking.
    pub item_cap: Option<usize>,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            search_query: "stars:>10000".to_string(),
            page_size: 50,
            item_cap: Some(200),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullSettings {
    pub page_size: u32,
    pub filter: ReviewedPullFilter,
}

impl Default for PullSettings {
    fn default() -> Self {
        Self {
            page_size: 40,
            filter: ReviewedPullFilter::default(),
        }
    }
}

/// Everything a harvesting run needs, handed to the engine at construction.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub transport: TransportSettings,
    pub retry: BackoffPolicy,
    pub discovery: DiscoverySettings,
    pub pulls: PullSettings,
    /// Pause between two pages of the same walk.
    pub page_pause: Duration,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            transport: TransportSettings::default(),
            retry: BackoffPolicy::default(),
            discovery: DiscoverySettings::default(),
            pulls: PullSettings::default(),
            page_pause: Duration::from_secs(2),
        }
    }
}
