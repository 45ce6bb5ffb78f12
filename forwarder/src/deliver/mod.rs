//! Delivery module.
//!
//! Hands a finished message to the local mail-submission sink. A new
//! connection is opened and closed for every delivery.

pub mod lmtp;

use std::io;

use async_trait::async_trait;
use thiserror::Error;

pub use lmtp::LmtpClient;

/// Failure to hand a message to the sink. Always left for queue redelivery.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("lmtp i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("lmtp endpoint timed out during {stage}")]
    Timeout { stage: &'static str },

    #[error("malformed lmtp reply: {0:?}")]
    MalformedReply(String),

    #[error("lmtp {stage} rejected: {code} {text}")]
    Rejected {
        stage: &'static str,
        code: u16,
        text: String,
    },

    #[error("lmtp delivery to {recipient} rejected: {code} {text}")]
    RecipientRejected {
        recipient: String,
        code: u16,
        text: String,
    },
}

/// A mail-submission sink.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailSink: Send + Sync {
    /// Submit `body` unmodified from `sender` to every address in
    /// `recipients`. Succeeds only if the whole transaction completes.
    async fn deliver(
        &self,
        sender: &str,
        recipients: &[String],
        body: &[u8],
    ) -> Result<(), DeliveryError>;
}
