//! S3-backed object store.

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::Client;
use tracing::debug;

use super::{FetchError, ObjectStore};

#[derive(Clone)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, FetchError> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                classify_get_error(
                    e.as_service_error(),
                    bucket,
                    key,
                    DisplayErrorContext(&e).to_string(),
                )
            })?;

        // The body stream is consumed here; on error it is dropped with it.
        let body = output
            .body
            .collect()
            .await
            .map_err(|e| classify_get_error(None, bucket, key, DisplayErrorContext(&e).to_string()))?
            .into_bytes()
            .to_vec();

        debug!(bucket, key, body_length = body.len(), "s3_object_read");

        Ok(body)
    }
}

/// Only a `NoSuchKey` service error means the object is missing. Everything
/// else, including dispatch and credential errors, is a transport failure.
fn classify_get_error(
    service_error: Option<&GetObjectError>,
    bucket: &str,
    key: &str,
    reason: String,
) -> FetchError {
    match service_error {
        Some(err) if err.is_no_such_key() => FetchError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        },
        _ => FetchError::Transport {
            bucket: bucket.to_string(),
            key: key.to_string(),
            reason,
        },
    }
}
