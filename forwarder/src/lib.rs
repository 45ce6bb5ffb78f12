//! SES Forwarder - relays inbound email from SES to a local LMTP server.
//!
//! ## Architecture
//!
//! ```text
//! SES → S3 (raw email) + SNS → SQS → Consumer → S3 fetch → LMTP
//! ```
//!
//! The consumer acknowledges an SQS message only after the email has been
//! accepted by the LMTP server. Processing is at-least-once.

pub mod config;
pub mod consumer;
pub mod deliver;
pub mod error;
pub mod process;
pub mod queue;
pub mod store;

#[cfg(test)]
mod fixtures;

// Re-export commonly used types
pub use config::Config;
pub use consumer::{Disposition, IngestionLoop};
pub use deliver::{DeliveryError, LmtpClient, MailSink};
pub use error::{ConfigError, ForwardError};
pub use process::{Forwarder, MailboxSet, Outcome, ResolvedRecipients};
pub use queue::{QueueError, QueueItem, SqsQueue, WorkQueue};
pub use store::{FetchError, ObjectStore, S3Store};
