use async_trait::async_trait;
use aws_sdk_s3::Client;
use bytes::Bytes;

use super::Fetcher;
use crate::error::FetchError;

/// Fetcher reading whole objects from S3 or S3-compatible storage (MinIO, etc.).
///
/// The identifier is used as the object key, below an optional prefix.
///
/// # Example
///
/// ```ignore
/// use pixserve::source::{create_s3_client, S3Fetcher};
///
/// let client = create_s3_client(None, "us-east-1").await;
/// let fetcher = S3Fetcher::new(client, "my-bucket").with_prefix("originals");
///
/// // Reads s3://my-bucket/originals/cats/tabby.jpg
/// let data = fetcher.fetch("cats/tabby.jpg").await?;
/// ```
#[derive(Clone)]
pub struct S3Fetcher {
    client: Client,
    bucket: String,
    prefix: Option<String>,
}

impl S3Fetcher {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: None,
        }
    }

    /// Place every object key below `prefix`. An empty prefix is ignored.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let prefix = prefix.trim_matches('/');
        self.prefix = (!prefix.is_empty()).then(|| prefix.to_string());
        self
    }

    /// Get the bucket name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// The object key for an identifier.
    pub fn object_key(&self, identifier: &str) -> String {
        match self.prefix {
            Some(ref prefix) => format!("{}/{}", prefix, identifier),
            None => identifier.to_string(),
        }
    }
}

#[async_trait]
impl Fetcher for S3Fetcher {
    async fn fetch(&self, identifier: &str) -> Result<Bytes, FetchError> {
        let key = self.object_key(identifier);
        let location = format!("s3://{}/{}", self.bucket, key);

        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| {
                let is_not_found = e
                    .as_service_error()
                    .map(|se| se.is_no_such_key())
                    .unwrap_or(false);

                // Some S3-compatible services answer a bare 404 instead
                let status_is_404 = e
                    .raw_response()
                    .map(|r| r.status().as_u16() == 404)
                    .unwrap_or(false);

                if is_not_found || status_is_404 {
                    return FetchError::NotFound(location.clone());
                }

                FetchError::Transfer(format!(
                    "{}: {}",
                    location,
                    aws_sdk_s3::error::DisplayErrorContext(&e)
                ))
            })?;

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| FetchError::Transfer(format!("{}: {}", location, e)))?
            .into_bytes();

        Ok(data)
    }
}

/// Create an S3 client with optional custom endpoint and region.
///
/// Use a custom endpoint for S3-compatible services like MinIO:
/// ```ignore
/// let client = create_s3_client(Some("http://localhost:9000"), "us-east-1").await;
/// ```
pub async fn create_s3_client(endpoint_url: Option<&str>, region: &str) -> Client {
    let region = aws_config::Region::new(region.to_string());
    let mut config_loader =
        aws_config::defaults(aws_config::BehaviorVersion::latest()).region(region);

    if let Some(endpoint) = endpoint_url {
        config_loader = config_loader.endpoint_url(endpoint);
    }

    let sdk_config = config_loader.load().await;

    // S3-compatible services generally need path-style addressing
    let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
    if endpoint_url.is_some() {
        builder = builder.force_path_style(true);
    }

    Client::from_conf(builder.build())
}
