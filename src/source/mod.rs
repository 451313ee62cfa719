//! Source image origin.
//!
//! The innermost pipeline stage. It reads the `source` parameter, fetches the
//! named object through a [`Fetcher`], labels it through a
//! [`FormatDetector`], and returns the untouched bytes as an [`Image`].
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              SourceOrigin               │
//! └──────────┬─────────────────┬────────────┘
//!            │ identifier      │ bytes
//!            ▼                 ▼
//! ┌────────────────────┐  ┌───────────────────────┐
//! │   Fetcher          │  │   FormatDetector      │
//! │  Memory/File/S3    │  │  Header/Extension     │
//! └────────────────────┘  └───────────────────────┘
//! ```

mod detect;
mod file;
mod memory;
mod s3;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::artifact::Image;
use crate::error::{DetectError, FetchError, ImageError};
use crate::handler::Origin;
use crate::params::Params;

pub use detect::{format_label, ChainDetector, ExtensionDetector, HeaderDetector};
pub use file::FileFetcher;
pub use memory::MemoryFetcher;
pub use s3::{create_s3_client, S3Fetcher};

/// Name of the parameter identifying the source object.
pub const SOURCE_PARAM: &str = "source";

// =============================================================================
// Capabilities
// =============================================================================

/// Retrieves raw source bytes by identifier.
///
/// This abstraction allows the origin to work with different storage backends
/// (S3, local files, in-memory fixtures) without being tied to one.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the whole object named by `identifier`.
    async fn fetch(&self, identifier: &str) -> Result<Bytes, FetchError>;
}

#[async_trait]
impl<T: Fetcher + ?Sized> Fetcher for Arc<T> {
    async fn fetch(&self, identifier: &str) -> Result<Bytes, FetchError> {
        (**self).fetch(identifier).await
    }
}

/// Labels fetched bytes with an image format.
pub trait FormatDetector: Send + Sync {
    fn detect(&self, identifier: &str, data: &[u8]) -> Result<String, DetectError>;
}

impl<T: FormatDetector + ?Sized> FormatDetector for Arc<T> {
    fn detect(&self, identifier: &str, data: &[u8]) -> Result<String, DetectError> {
        (**self).detect(identifier, data)
    }
}

// =============================================================================
// Source Origin
// =============================================================================

/// Origin stage fetching the image named by the `source` parameter.
///
/// # Errors
///
/// - `source` missing, not a string, or empty: [`ImageError::Param`]
/// - fetch failure: [`ImageError::Source`]
/// - unidentifiable content: [`ImageError::Param`] naming `source`
pub struct SourceOrigin<F, D> {
    fetcher: F,
    detector: D,
}

impl<F: Fetcher, D: FormatDetector> SourceOrigin<F, D> {
    pub fn new(fetcher: F, detector: D) -> Self {
        Self { fetcher, detector }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }
}

#[async_trait]
impl<F: Fetcher, D: FormatDetector> Origin for SourceOrigin<F, D> {
    async fn produce(&self, params: &Params) -> Result<Image, ImageError> {
        let identifier = params.get_str(SOURCE_PARAM)?;
        if identifier.is_empty() {
            return Err(ImageError::param(SOURCE_PARAM, "empty"));
        }

        let data = self.fetcher.fetch(identifier).await?;

        let format = self
            .detector
            .detect(identifier, &data)
            .map_err(|e| ImageError::param(SOURCE_PARAM, e.to_string()))?;

        debug!(
            source = identifier,
            format = %format,
            bytes = data.len(),
            "Fetched source image"
        );

        Image::new(format, data)
    }

    fn name(&self) -> &'static str {
        "source"
    }
}
