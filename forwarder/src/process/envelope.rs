//! Two-layer notification decoding.
//!
//! The queue body is an SNS notification whose `Message` field is itself a
//! JSON-encoded SES receipt event:
//!
//! ```text
//! {"Type":"Notification", ..., "Message":"{\"receipt\":{\"action\":{...}}}"}
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ForwardError;

/// The only receipt action type this forwarder handles.
pub const S3_ACTION: &str = "S3";

/// Outer pub/sub wrapper. Only `Message` is required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEnvelope {
    #[serde(rename = "Type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(rename = "MessageId", default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,

    #[serde(rename = "TopicArn", default, skip_serializing_if = "Option::is_none")]
    pub topic_arn: Option<String>,

    /// Serialized [`MailReceiptEvent`]
    #[serde(rename = "Message", alias = "message")]
    pub message: String,
}

impl NotificationEnvelope {
    /// Wrap an event the way the notification topic does.
    pub fn wrap(event: &MailReceiptEvent) -> serde_json::Result<Self> {
        Ok(Self {
            kind: Some("Notification".to_string()),
            message_id: None,
            topic_arn: None,
            message: serde_json::to_string(event)?,
        })
    }
}

/// Inner mail receipt event.
///
/// Every field defaults when absent; an event without a usable action ends
/// up with an empty action type and is skipped as unsupported.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailReceiptEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_type: Option<String>,

    #[serde(default)]
    pub mail: MailInfo,

    #[serde(default)]
    pub receipt: Receipt,
}

/// Mail metadata, used for logs only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    /// Envelope recipients, in the order the receiver accepted them
    #[serde(default)]
    pub recipients: Vec<String>,

    #[serde(default)]
    pub action: ReceiptAction,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptAction {
    #[serde(rename = "type", default)]
    pub action_type: String,

    #[serde(default)]
    pub bucket_name: String,

    #[serde(default)]
    pub object_key: String,
}

impl ReceiptAction {
    pub fn s3(bucket_name: impl Into<String>, object_key: impl Into<String>) -> Self {
        Self {
            action_type: S3_ACTION.to_string(),
            bucket_name: bucket_name.into(),
            object_key: object_key.into(),
        }
    }

    pub fn is_supported(&self) -> bool {
        self.action_type == S3_ACTION
    }
}

/// Decode a raw queue body into the receipt event it carries.
pub fn decode_notification(body: &str) -> Result<MailReceiptEvent, ForwardError> {
    let envelope: NotificationEnvelope =
        serde_json::from_str(body).map_err(ForwardError::MalformedEnvelope)?;

    debug!(
        notification_type = ?envelope.kind,
        notification_id = ?envelope.message_id,
        topic_arn = ?envelope.topic_arn,
        "notification_envelope_decoded"
    );

    let event: MailReceiptEvent =
        serde_json::from_str(&envelope.message).map_err(ForwardError::MalformedReceiptEvent)?;

    debug!(
        mail_message_id = ?event.mail.message_id,
        source = ?event.mail.source,
        action_type = %event.receipt.action.action_type,
        recipient_count = event.receipt.recipients.len(),
        "receipt_event_decoded"
    );

    Ok(event)
}
