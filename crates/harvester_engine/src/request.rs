use std::time::Duration;

use engine_logging::engine_debug;
use harvester_core::{Backoff, BackoffController, BackoffPolicy, RetrySignal};
use serde_json::Value;

use crate::clock::Clock;
use crate::progress::ProgressSink;
use crate::transport::{GraphqlRequest, Transport};
use crate::{FailureKind, HarvestEvent, Outcome, RequestFailure, WaitReason};

/// Runs requests through the transport, sleeping and retrying as the backoff
/// policy dictates, until a payload arrives or the request is given up.
pub struct Requester<'a> {
    transport: &'a dyn Transport,
    clock: &'a dyn Clock,
    progress: &'a dyn ProgressSink,
    policy: BackoffPolicy,
}

impl<'a> Requester<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        clock: &'a dyn Clock,
        progress: &'a dyn ProgressSink,
        policy: BackoffPolicy,
    ) -> Self {
        Self {
            transport,
            clock,
            progress,
            policy,
        }
    }

    pub fn progress(&self) -> &dyn ProgressSink {
        self.progress
    }

    pub async fn execute(
        &self,
        item: &str,
        request: &GraphqlRequest,
    ) -> Result<Value, RequestFailure> {
        let mut controller = BackoffController::new(self.policy);
        loop {
            let (signal, detail) = match self.transport.execute(request).await {
                Outcome::Success(data) => return Ok(data),
                Outcome::RateLimited(reset) => (RetrySignal::RateLimited(reset), None),
                Outcome::TransientFailure(detail) => (RetrySignal::Transient, Some(detail)),
                Outcome::FatalFailure(detail) => (RetrySignal::Fatal, Some(detail)),
            };
            if let Some(detail) = &detail {
                engine_debug!("{item}: request failed: {detail}");
            }

            match controller.next_delay(signal, self.clock.now()) {
                Backoff::Wait(delay) => {
                    let reason = match signal {
                        RetrySignal::RateLimited(_) => WaitReason::RateLimited,
                        _ => WaitReason::Transient {
                            attempt: controller.attempts(),
                        },
                    };
                    self.progress.emit(HarvestEvent::Waiting {
                        item: item.to_string(),
                        delay,
                        reason,
                    });
                    self.clock.sleep(delay).await;
                }
                Backoff::Abort => {
                    let detail = detail.unwrap_or_default();
                    let kind = match signal {
                        RetrySignal::Transient => FailureKind::RetriesExhausted {
                            attempts: controller.attempts(),
                        },
                        _ => FailureKind::Fatal,
                    };
                    return Err(RequestFailure::new(kind, detail));
                }
            }
        }
    }

    /// Fixed courtesy pause between consecutive pages.
    pub async fn pause(&self, item: &str, delay: Duration) {
        if delay.is_zero() {
            return;
        }
        self.progress.emit(HarvestEvent::Waiting {
            item: item.to_string(),
            delay,
            reason: WaitReason::PagePause,
        });
        self.clock.sleep(delay).await;
    }
}
