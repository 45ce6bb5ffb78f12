//! Work queue module.
//!
//! This module provides:
//! - The [`WorkQueue`] seam the consumer polls and acknowledges through
//! - An SQS-backed implementation
//!
//! ## Architecture
//!
//! ```text
//! SES → SNS topic → SQS queue → Consumer → S3 fetch → LMTP
//! ```

pub mod sqs;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use sqs::SqsQueue;
pub use types::{QueueItem, RECEIVE_BATCH_SIZE, RECEIVE_WAIT};

/// Queue-level failures. Neither is fatal to the consumer.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("failed to receive messages from queue: {0}")]
    Receive(String),

    #[error("failed to delete message from queue: {0}")]
    Delete(String),
}

/// Long-poll receive and delete against a work queue.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Receive up to `max_items`, waiting server-side up to `wait` for any to
    /// become available.
    async fn receive(&self, max_items: i32, wait: Duration) -> Result<Vec<QueueItem>, QueueError>;

    /// Acknowledge one delivery attempt.
    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError>;
}
