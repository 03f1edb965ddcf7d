use engine_logging::{engine_debug, engine_info, engine_warn};

use crate::{HarvestEvent, SkipReason, WaitReason};

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: HarvestEvent);
}

/// Reports every event through the logging facade as it happens.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgressSink;

impl ProgressSink for LogProgressSink {
    fn emit(&self, event: HarvestEvent) {
        match event {
            HarvestEvent::ItemStarted { item } => engine_info!("{item}: started"),
            HarvestEvent::PageFetched { item, page, nodes } => {
                engine_debug!("{item}: page {page} fetched with {nodes} nodes")
            }
            HarvestEvent::Waiting {
                item,
                delay,
                reason,
            } => match reason {
                WaitReason::RateLimited => {
                    engine_warn!("{item}: rate limit exhausted, waiting {delay:?}")
                }
                WaitReason::Transient { attempt } => {
                    engine_warn!("{item}: transient failure #{attempt}, retrying in {delay:?}")
                }
                WaitReason::PagePause => engine_debug!("{item}: pausing {delay:?} between pages"),
            },
            HarvestEvent::RecordsWritten { item, count } => {
                engine_debug!("{item}: {count} records appended")
            }
            HarvestEvent::ItemDone { item, records } => {
                engine_info!("{item}: done, {records} records")
            }
            HarvestEvent::ItemSkipped { item, reason } => match reason {
                SkipReason::AlreadyDone => engine_debug!("{item}: already collected, skipping"),
                SkipReason::InvalidKey(detail) => engine_warn!("{item}: skipped, {detail}"),
                SkipReason::NoRecords => {
                    engine_info!("{item}: no matching records, left pending")
                }
            },
            HarvestEvent::ItemFailed { item, failure } => {
                engine_warn!("{item}: abandoned, {failure}")
            }
        }
    }
}
