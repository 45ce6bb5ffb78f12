//! SQS consumer loop.
//!
//! A single sequential consumer: one long-poll receive, then each item of the
//! batch in order. An item is deleted only after the whole pipeline succeeds;
//! anything else is left to the queue's visibility timeout for redelivery.
//! A crash between delivery and delete can therefore deliver twice.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::process::{Forwarder, Outcome};
use crate::queue::{QueueItem, WorkQueue, RECEIVE_BATCH_SIZE, RECEIVE_WAIT};

/// Pause after a failed receive before polling again.
pub const RECEIVE_BACKOFF: Duration = Duration::from_secs(1);

/// What the consumer did with one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Processed (or skipped) and deleted from the queue.
    Acknowledged,
    /// Processed, but the delete call failed; the queue will redeliver.
    AckFailed,
    /// Processing failed; left for redelivery.
    Retained,
    /// Permanently undecodable and past the receive threshold; deleted.
    Dropped,
}

pub struct IngestionLoop {
    queue: Arc<dyn WorkQueue>,
    forwarder: Forwarder,
    max_receive_count: Option<u32>,
    backoff: Duration,
}

impl IngestionLoop {
    pub fn new(queue: Arc<dyn WorkQueue>, forwarder: Forwarder) -> Self {
        Self {
            queue,
            forwarder,
            max_receive_count: None,
            backoff: RECEIVE_BACKOFF,
        }
    }

    /// Drop permanently malformed items once delivered this many times.
    pub fn with_max_receive_count(mut self, max_receive_count: Option<u32>) -> Self {
        self.max_receive_count = max_receive_count;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Run until `ctx` is cancelled.
    ///
    /// Cancellation is observed before each receive, while a receive is in
    /// flight, during the receive backoff, and before each item. An item
    /// that has started is always carried to completion.
    pub async fn run(&self, ctx: CancellationToken) {
        info!(
            batch_size = RECEIVE_BATCH_SIZE,
            wait_secs = RECEIVE_WAIT.as_secs(),
            max_receive_count = ?self.max_receive_count,
            "consumer_started"
        );

        'poll: loop {
            if ctx.is_cancelled() {
                break;
            }

            info!("sqs_poll_start");
            let received = tokio::select! {
                _ = ctx.cancelled() => None,
                result = self.queue.receive(RECEIVE_BATCH_SIZE, RECEIVE_WAIT) => Some(result),
            };
            let Some(received) = received else {
                break;
            };

            let items = match received {
                Ok(items) => items,
                Err(e) => {
                    error!(error = %e, backoff_ms = self.backoff.as_millis() as u64, "sqs_receive_failed");
                    tokio::select! {
                        _ = ctx.cancelled() => break,
                        _ = tokio::time::sleep(self.backoff) => continue,
                    }
                }
            };

            info!(count = items.len(), "sqs_poll_complete");

            for (index, item) in items.iter().enumerate() {
                if ctx.is_cancelled() {
                    info!(
                        abandoned = items.len() - index,
                        "consumer_cancelled_mid_batch"
                    );
                    break 'poll;
                }
                self.handle_item(item).await;
            }
        }

        info!("consumer_stopped");
    }

    /// Process one item and acknowledge it if appropriate.
    pub async fn handle_item(&self, item: &QueueItem) -> Disposition {
        info!(
            message_id = %item.log_id(),
            receive_count = ?item.receive_count,
            body_length = item.body.len(),
            "item_processing_start"
        );

        match self.forwarder.process(&item.body).await {
            Ok(outcome) => {
                match &outcome {
                    Outcome::Delivered { recipients } => info!(
                        message_id = %item.log_id(),
                        recipient_count = recipients.len(),
                        "item_processed"
                    ),
                    Outcome::Skipped { action_type } => info!(
                        message_id = %item.log_id(),
                        action_type = %action_type,
                        "item_skipped"
                    ),
                }
                self.acknowledge(item).await
            }
            Err(e) if e.is_permanent() && self.past_receive_threshold(item) => {
                error!(
                    message_id = %item.log_id(),
                    error = %e,
                    error_kind = e.kind(),
                    receive_count = ?item.receive_count,
                    body_preview = %&item.body[..floor_char_boundary(&item.body, 500)],
                    "poison_message_dropped"
                );
                match self.acknowledge(item).await {
                    Disposition::Acknowledged => Disposition::Dropped,
                    other => other,
                }
            }
            Err(e) => {
                error!(
                    message_id = %item.log_id(),
                    error = %e,
                    error_kind = e.kind(),
                    permanent = e.is_permanent(),
                    "item_processing_failed"
                );
                Disposition::Retained
            }
        }
    }

    async fn acknowledge(&self, item: &QueueItem) -> Disposition {
        match self.queue.delete(&item.receipt_handle).await {
            Ok(()) => {
                info!(message_id = %item.log_id(), "sqs_message_deleted");
                Disposition::Acknowledged
            }
            Err(e) => {
                warn!(message_id = %item.log_id(), error = %e, "sqs_delete_failed");
                Disposition::AckFailed
            }
        }
    }

    fn past_receive_threshold(&self, item: &QueueItem) -> bool {
        match (self.max_receive_count, item.receive_count) {
            (Some(max), Some(count)) => count >= max,
            _ => false,
        }
    }
}

/// Largest char boundary in `s` not after `max`.
fn floor_char_boundary(s: &str, max: usize) -> usize {
    if max >= s.len() {
        return s.len();
    }
    (0..=max).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0)
}
