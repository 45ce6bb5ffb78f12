//! Shared payloads for unit tests.

use crate::process::envelope::{MailReceiptEvent, NotificationEnvelope, Receipt, ReceiptAction};

pub const RAW_EMAIL: &[u8] = b"From: sender@example.com\r\nTo: a@x.com\r\nMessage-ID: <fixture@example.com>\r\nSubject: Fixture\r\n\r\nHello\r\n";

/// Queue body for an SNS-wrapped receipt event.
pub fn notification_body(action_type: &str, bucket: &str, key: &str, recipients: &[&str]) -> String {
    let event = MailReceiptEvent {
        receipt: Receipt {
            recipients: recipients.iter().map(|r| r.to_string()).collect(),
            action: ReceiptAction {
                action_type: action_type.to_string(),
                bucket_name: bucket.to_string(),
                object_key: key.to_string(),
            },
        },
        ..Default::default()
    };
    let envelope = NotificationEnvelope::wrap(&event).expect("event serializes");
    serde_json::to_string(&envelope).expect("envelope serializes")
}
