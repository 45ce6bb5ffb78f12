//! Queue item type and long-poll parameters.

use std::time::Duration;

/// Maximum number of items requested per receive call.
pub const RECEIVE_BATCH_SIZE: i32 = 10;

/// Server-side long-poll wait per receive call.
pub const RECEIVE_WAIT: Duration = Duration::from_secs(20);

/// One delivery attempt of a queue message.
///
/// Held only for the duration of one processing attempt. The receipt handle
/// is what acknowledges (deletes) it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    /// Queue-assigned message id, for logs only
    pub message_id: Option<String>,
    /// Token identifying this delivery attempt
    pub receipt_handle: String,
    /// Raw notification payload
    pub body: String,
    /// How many times the queue has handed this message out, if reported
    pub receive_count: Option<u32>,
}

impl QueueItem {
    /// Create an item with no queue metadata beyond the receipt handle.
    pub fn new(receipt_handle: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            message_id: None,
            receipt_handle: receipt_handle.into(),
            body: body.into(),
            receive_count: None,
        }
    }

    /// Message id for log fields.
    pub fn log_id(&self) -> &str {
        self.message_id.as_deref().unwrap_or("unknown")
    }
}
