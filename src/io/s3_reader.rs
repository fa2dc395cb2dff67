use async_trait::async_trait;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::debug;
use url::Url;

use super::range_reader::{check_range, range_header};
use super::RangeReader;
use crate::error::IoError;

/// S3 implementation of RangeReader using ranged `GetObject` calls.
///
/// Works with S3-compatible services (MinIO, etc.) through a custom endpoint.
/// The object size comes from a HEAD request when the reader is created.
#[derive(Clone)]
pub struct S3RangeReader {
    client: Client,
    bucket: String,
    key: String,
    size: Option<u64>,
    identifier: String,
}

impl S3RangeReader {
    /// Create a reader for `bucket`/`key`, probing the object with HEAD.
    ///
    /// Fails with [`IoError::NotFound`] when the object does not exist.
    pub async fn new(client: Client, bucket: String, key: String) -> Result<Self, IoError> {
        let identifier = format!("s3://{}/{}", bucket, key);
        let head = client
            .head_object()
            .bucket(&bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| head_error(e, &identifier))?;

        let size = head
            .content_length()
            .and_then(|len| u64::try_from(len).ok());
        debug!(object = %identifier, size, "Opened S3 object");

        Ok(Self {
            client,
            bucket,
            key,
            size,
            identifier,
        })
    }

    /// Create a reader for an `s3://bucket/key` location.
    pub async fn from_location(client: Client, location: &str) -> Result<Self, IoError> {
        let (bucket, key) = parse_s3_location(location)?;
        Self::new(client, bucket, key).await
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

fn head_error(e: SdkError<HeadObjectError>, identifier: &str) -> IoError {
    let missing = e
        .as_service_error()
        .is_some_and(HeadObjectError::is_not_found)
        || e.raw_response()
            .is_some_and(|response| response.status().as_u16() == 404);
    if missing {
        IoError::NotFound(identifier.to_string())
    } else {
        IoError::S3(format!("{identifier}: {e}"))
    }
}

#[async_trait]
impl RangeReader for S3RangeReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        check_range(offset, len, self.size)?;
        if len == 0 {
            return Ok(Bytes::new());
        }

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .range(range_header(offset, len))
            .send()
            .await
            .map_err(|e| IoError::S3(format!("{}: {}", self.identifier, e)))?;

        let body = response
            .body
            .collect()
            .await
            .map_err(|e| IoError::Connection(e.to_string()))?;
        Ok(body.into_bytes())
    }

    fn size(&self) -> Option<u64> {
        self.size
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

/// Split an `s3://bucket/key` location into bucket and key.
pub fn parse_s3_location(location: &str) -> Result<(String, String), IoError> {
    let invalid = |reason: &str| IoError::S3(format!("{location}: {reason}"));

    let url = Url::parse(location).map_err(|e| invalid(&e.to_string()))?;
    if url.scheme() != "s3" {
        return Err(invalid("expected s3:// location"));
    }
    let bucket = url
        .host_str()
        .filter(|bucket| !bucket.is_empty())
        .ok_or_else(|| invalid("missing bucket"))?;
    let key = url.path().trim_start_matches('/');
    if key.is_empty() {
        return Err(invalid("missing key"));
    }
    Ok((bucket.to_string(), key.to_string()))
}

/// Build an S3 client for `region`, optionally against a custom endpoint.
///
/// Custom endpoints get path-style addressing, which MinIO and most other
/// S3-compatible services expect.
pub async fn create_s3_client(endpoint_url: Option<&str>, region: &str) -> Client {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(region.to_string()));
    if let Some(endpoint) = endpoint_url {
        loader = loader.endpoint_url(endpoint);
    }
    let sdk_config = loader.load().await;

    let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
        .force_path_style(endpoint_url.is_some())
        .build();
    Client::from_conf(s3_config)
}
