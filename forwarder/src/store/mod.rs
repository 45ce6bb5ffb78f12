//! Object store module.
//!
//! The raw email is written to the store by the mail receiver; the
//! notification only carries its bucket and key.

pub mod s3;

use async_trait::async_trait;
use thiserror::Error;

pub use s3::S3Store;

/// Failure to retrieve an object. Always left for queue redelivery.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("object s3://{bucket}/{key} not found")]
    NotFound { bucket: String, key: String },

    #[error("failed to get object s3://{bucket}/{key}: {reason}")]
    Transport {
        bucket: String,
        key: String,
        reason: String,
    },
}

/// Get-by-key access to an object store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the whole object body into memory.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, FetchError>;
}
