use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_LENGTH, RANGE};
use reqwest::{Client, StatusCode};
use url::Url;

use super::range_reader::{check_range, range_header};
use super::RangeReader;
use crate::error::IoError;

/// HTTP(S) implementation of RangeReader using `Range: bytes=a-b` requests.
///
/// The size comes from a HEAD request when the server reports a
/// `Content-Length`; otherwise it stays unknown.
#[derive(Clone)]
pub struct HttpRangeReader {
    client: Client,
    url: Url,
    size: Option<u64>,
    identifier: String,
}

impl HttpRangeReader {
    /// Create a reader for `url`, probing its size with a HEAD request.
    pub async fn new(client: Client, url: &str) -> Result<Self, IoError> {
        let url = Url::parse(url).map_err(|e| IoError::Connection(format!("{url}: {e}")))?;
        let identifier = url.to_string();

        let response = client
            .head(url.clone())
            .send()
            .await
            .map_err(|e| IoError::Connection(e.to_string()))?;

        let size = match response.status() {
            StatusCode::NOT_FOUND => return Err(IoError::NotFound(identifier)),
            status if status.is_success() => response
                .headers()
                .get(CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok()),
            // Some servers refuse HEAD but still serve ranges
            _ => None,
        };

        Ok(Self {
            client,
            url,
            size,
            identifier,
        })
    }

    /// Create a reader without probing, for servers with a known size or none.
    pub fn with_size(client: Client, url: Url, size: Option<u64>) -> Self {
        let identifier = url.to_string();
        Self {
            client,
            url,
            size,
            identifier,
        }
    }
}

#[async_trait]
impl RangeReader for HttpRangeReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        check_range(offset, len, self.size)?;
        if len == 0 {
            return Ok(Bytes::new());
        }

        let response = self
            .client
            .get(self.url.clone())
            .header(RANGE, range_header(offset, len))
            .send()
            .await
            .map_err(|e| IoError::Connection(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(IoError::NotFound(self.identifier.clone()));
        }
        if !status.is_success() {
            return Err(IoError::Http {
                status: status.as_u16(),
                url: self.identifier.clone(),
            });
        }

        let data = response
            .bytes()
            .await
            .map_err(|e| IoError::Connection(e.to_string()))?;

        // A server ignoring the Range header answers 200 with the whole body
        if status == StatusCode::OK && data.len() > len {
            let start = (offset as usize).min(data.len());
            let end = (start + len).min(data.len());
            return Ok(data.slice(start..end));
        }

        Ok(data)
    }

    fn size(&self) -> Option<u64> {
        self.size
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}
