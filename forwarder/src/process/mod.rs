//! Notification processing pipeline.
//!
//! ## Processing Flow
//!
//! ```text
//! queue body → decode_notification() → ObjectStore::get_object()
//!            → parse_raw_email() → MailboxSet::resolve() → MailSink::deliver()
//! ```

pub mod email_parser;
pub mod envelope;
pub mod recipients;

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Config;
use crate::deliver::MailSink;
use crate::error::ForwardError;
use crate::store::ObjectStore;

pub use email_parser::{parse_raw_email, ParsedEmail};
pub use envelope::{decode_notification, MailReceiptEvent, NotificationEnvelope, ReceiptAction};
pub use recipients::{MailboxSet, ResolvedRecipients};

/// What happened to a successfully processed notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The message was handed to the sink.
    Delivered { recipients: ResolvedRecipients },
    /// The receipt action is not one this forwarder handles.
    Skipped { action_type: String },
}

/// Drives one notification through fetch, resolve and deliver.
#[derive(Clone)]
pub struct Forwarder {
    store: Arc<dyn ObjectStore>,
    sink: Arc<dyn MailSink>,
    sender: String,
    mailboxes: MailboxSet,
}

impl Forwarder {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        sink: Arc<dyn MailSink>,
        sender: impl Into<String>,
        mailboxes: MailboxSet,
    ) -> Self {
        Self {
            store,
            sink,
            sender: sender.into(),
            mailboxes,
        }
    }

    pub fn from_config(
        config: &Config,
        store: Arc<dyn ObjectStore>,
        sink: Arc<dyn MailSink>,
    ) -> Self {
        Self::new(store, sink, config.lmtp_from.clone(), config.mailboxes.clone())
    }

    /// Process one raw queue body end to end.
    ///
    /// `Ok` means the item is done with and may be acknowledged.
    pub async fn process(&self, body: &str) -> Result<Outcome, ForwardError> {
        let event = decode_notification(body)?;
        let action = &event.receipt.action;

        if !action.is_supported() {
            warn!(action_type = %action.action_type, "unsupported_action_type");
            return Ok(Outcome::Skipped {
                action_type: action.action_type.clone(),
            });
        }

        info!(
            bucket = %action.bucket_name,
            key = %action.object_key,
            "s3_fetch_start"
        );
        let raw = self
            .store
            .get_object(&action.bucket_name, &action.object_key)
            .await?;
        info!(body_length = raw.len(), "s3_fetch_complete");

        parse_raw_email(&raw)?;

        let recipients = self.mailboxes.resolve(&event.receipt.recipients);
        if recipients.is_fallback() {
            info!(
                receipt_recipients = ?event.receipt.recipients,
                default_mailbox = %self.mailboxes.default_mailbox(),
                "no_known_recipients_using_default"
            );
        }
        info!(recipients = ?&*recipients, "recipients_resolved");

        self.sink.deliver(&self.sender, &recipients, &raw).await?;
        info!(recipient_count = recipients.len(), "email_delivered");

        Ok(Outcome::Delivered { recipients })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deliver::{DeliveryError, MockMailSink};
    use crate::fixtures::{notification_body, RAW_EMAIL};
    use crate::store::{FetchError, MockObjectStore};

    fn forwarder(store: MockObjectStore, sink: MockMailSink) -> Forwarder {
        Forwarder::new(
            Arc::new(store),
            Arc::new(sink),
            "forwarder@x.com",
            MailboxSet::new(vec!["a@x.com".to_string()], "catchall@x.com"),
        )
    }

    #[tokio::test]
    async fn test_known_recipient_delivered() {
        let mut store = MockObjectStore::new();
        store
            .expect_get_object()
            .withf(|bucket: &str, key: &str| bucket == "b" && key == "k")
            .times(1)
            .returning(|_, _| Ok(RAW_EMAIL.to_vec()));

        let mut sink = MockMailSink::new();
        sink.expect_deliver()
            .withf(|sender: &str, recipients: &[String], body: &[u8]| {
                sender == "forwarder@x.com" && recipients == ["a@x.com"] && body == RAW_EMAIL
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let body = notification_body("S3", "b", "k", &["a@x.com", "unknown@y.com"]);
        let outcome = forwarder(store, sink).process(&body).await.unwrap();

        match outcome {
            Outcome::Delivered { recipients } => assert_eq!(*recipients, ["a@x.com"]),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_recipients_go_to_default() {
        let mut store = MockObjectStore::new();
        store
            .expect_get_object()
            .times(1)
            .returning(|_, _| Ok(RAW_EMAIL.to_vec()));

        let mut sink = MockMailSink::new();
        sink.expect_deliver()
            .withf(|_: &str, recipients: &[String], _: &[u8]| recipients == ["catchall@x.com"])
            .times(1)
            .returning(|_, _, _| Ok(()));

        let body = notification_body("S3", "b", "k", &["unknown@y.com"]);
        let outcome = forwarder(store, sink).process(&body).await.unwrap();

        assert!(matches!(
            outcome,
            Outcome::Delivered { recipients } if recipients.is_fallback()
        ));
    }

    #[tokio::test]
    async fn test_unsupported_action_skips_fetch_and_delivery() {
        let mut store = MockObjectStore::new();
        store.expect_get_object().times(0);
        let mut sink = MockMailSink::new();
        sink.expect_deliver().times(0);

        let body = notification_body("SNS", "", "", &["a@x.com"]);
        let outcome = forwarder(store, sink).process(&body).await.unwrap();

        assert_eq!(
            outcome,
            Outcome::Skipped {
                action_type: "SNS".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_fetch_not_found_fails_item() {
        let mut store = MockObjectStore::new();
        store.expect_get_object().times(1).returning(|bucket, key| {
            Err(FetchError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
        });
        let mut sink = MockMailSink::new();
        sink.expect_deliver().times(0);

        let body = notification_body("S3", "b", "k", &["a@x.com"]);
        let err = forwarder(store, sink).process(&body).await.unwrap_err();

        assert!(matches!(err, ForwardError::FetchFailure(FetchError::NotFound { .. })));
        assert!(!err.is_permanent());
    }

    #[tokio::test]
    async fn test_malformed_email_is_not_delivered() {
        let mut store = MockObjectStore::new();
        store
            .expect_get_object()
            .times(1)
            .returning(|_, _| Ok(Vec::new()));
        let mut sink = MockMailSink::new();
        sink.expect_deliver().times(0);

        let body = notification_body("S3", "b", "k", &["a@x.com"]);
        let err = forwarder(store, sink).process(&body).await.unwrap_err();

        assert!(matches!(err, ForwardError::MalformedEmail(_)));
    }

    #[tokio::test]
    async fn test_non_email_object_is_not_delivered() {
        let mut store = MockObjectStore::new();
        store
            .expect_get_object()
            .times(1)
            .returning(|_, _| Ok(b"garbage no colon at all".to_vec()));
        let mut sink = MockMailSink::new();
        sink.expect_deliver().times(0);

        let body = notification_body("S3", "b", "k", &["unknown@y.com"]);
        let err = forwarder(store, sink).process(&body).await.unwrap_err();

        assert!(matches!(err, ForwardError::MalformedEmail(_)));
        assert!(!err.is_permanent());
    }

    #[tokio::test]
    async fn test_delivery_failure_propagates() {
        let mut store = MockObjectStore::new();
        store
            .expect_get_object()
            .times(1)
            .returning(|_, _| Ok(RAW_EMAIL.to_vec()));
        let mut sink = MockMailSink::new();
        sink.expect_deliver().times(1).returning(|_, _, _| {
            Err(DeliveryError::Rejected {
                stage: "MAIL FROM",
                code: 451,
                text: "try again later".to_string(),
            })
        });

        let body = notification_body("S3", "b", "k", &["a@x.com"]);
        let err = forwarder(store, sink).process(&body).await.unwrap_err();

        assert!(matches!(err, ForwardError::DeliveryFailure(_)));
        assert_eq!(err.kind(), "delivery_failure");
    }

    #[tokio::test]
    async fn test_malformed_payload_is_permanent() {
        let mut store = MockObjectStore::new();
        store.expect_get_object().times(0);
        let mut sink = MockMailSink::new();
        sink.expect_deliver().times(0);

        let err = forwarder(store, sink).process("{").await.unwrap_err();

        assert!(matches!(err, ForwardError::MalformedEnvelope(_)));
        assert!(err.is_permanent());
    }
}
