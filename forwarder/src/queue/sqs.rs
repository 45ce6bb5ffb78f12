//! SQS-backed work queue.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::types::{Message, MessageSystemAttributeName};
use aws_sdk_sqs::Client;
use tracing::{debug, warn};

use super::{QueueError, QueueItem, WorkQueue};

/// Work queue over a single SQS queue URL.
#[derive(Clone)]
pub struct SqsQueue {
    client: Client,
    queue_url: String,
}

impl SqsQueue {
    pub fn new(client: Client, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }
}

#[async_trait]
impl WorkQueue for SqsQueue {
    async fn receive(&self, max_items: i32, wait: Duration) -> Result<Vec<QueueItem>, QueueError> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max_items)
            .wait_time_seconds(wait.as_secs() as i32)
            .message_system_attribute_names(MessageSystemAttributeName::ApproximateReceiveCount)
            .send()
            .await
            .map_err(|e| QueueError::Receive(DisplayErrorContext(&e).to_string()))?;

        let messages = output.messages.unwrap_or_default();
        debug!(count = messages.len(), "sqs_receive_complete");

        Ok(messages.into_iter().filter_map(into_item).collect())
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| QueueError::Delete(DisplayErrorContext(&e).to_string()))?;

        Ok(())
    }
}

/// Convert an SQS message into a queue item.
///
/// A message without a receipt handle can never be acknowledged, so it is
/// dropped here and left to the queue's visibility timeout.
fn into_item(message: Message) -> Option<QueueItem> {
    let Some(receipt_handle) = message.receipt_handle else {
        warn!(message_id = ?message.message_id, "sqs_message_missing_receipt_handle");
        return None;
    };

    let receive_count = message
        .attributes
        .as_ref()
        .and_then(|attrs| attrs.get(&MessageSystemAttributeName::ApproximateReceiveCount))
        .and_then(|v| v.parse().ok());

    Some(QueueItem {
        message_id: message.message_id,
        receipt_handle,
        body: message.body.unwrap_or_default(),
        receive_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_item_reads_receive_count() {
        let message = Message::builder()
            .message_id("m-1")
            .receipt_handle("handle-1")
            .body("{}")
            .attributes(MessageSystemAttributeName::ApproximateReceiveCount, "3")
            .build();

        let item = into_item(message).unwrap();

        assert_eq!(item.message_id.as_deref(), Some("m-1"));
        assert_eq!(item.receipt_handle, "handle-1");
        assert_eq!(item.body, "{}");
        assert_eq!(item.receive_count, Some(3));
    }

    #[test]
    fn test_into_item_without_receipt_handle() {
        let message = Message::builder().message_id("m-2").body("{}").build();
        assert!(into_item(message).is_none());
    }

    #[test]
    fn test_into_item_defaults() {
        let message = Message::builder().receipt_handle("handle-3").build();

        let item = into_item(message).unwrap();

        assert_eq!(item.body, "");
        assert_eq!(item.receive_count, None);
        assert_eq!(item.log_id(), "unknown");
    }
}
