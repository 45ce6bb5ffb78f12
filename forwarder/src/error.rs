//! Error types for startup and per-item processing.

use thiserror::Error;

use crate::deliver::DeliveryError;
use crate::store::FetchError;

/// Fatal configuration errors. Only produced at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} is required")]
    Missing(&'static str),

    #[error("environment variable {name}={value:?} is invalid: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Failures of a single queue item. Caught at the item boundary by the
/// consumer; none of them stop the loop.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("failed to decode notification envelope: {0}")]
    MalformedEnvelope(#[source] serde_json::Error),

    #[error("failed to decode receipt event: {0}")]
    MalformedReceiptEvent(#[source] serde_json::Error),

    #[error(transparent)]
    FetchFailure(#[from] FetchError),

    #[error("failed to parse email: {0}")]
    MalformedEmail(String),

    #[error(transparent)]
    DeliveryFailure(#[from] DeliveryError),
}

impl ForwardError {
    /// Whether retrying the same payload can never succeed.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ForwardError::MalformedEnvelope(_) | ForwardError::MalformedReceiptEvent(_)
        )
    }

    /// Short stable label for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ForwardError::MalformedEnvelope(_) => "malformed_envelope",
            ForwardError::MalformedReceiptEvent(_) => "malformed_receipt_event",
            ForwardError::FetchFailure(_) => "fetch_failure",
            ForwardError::MalformedEmail(_) => "malformed_email",
            ForwardError::DeliveryFailure(_) => "delivery_failure",
        }
    }
}
