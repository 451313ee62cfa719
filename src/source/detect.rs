//! Format detection.
//!
//! Labels are lowercase format names (`jpeg`, `png`, `gif`, ...) as used
//! by [`Image::format`](crate::artifact::Image::format).

use std::path::Path;

use image::ImageFormat;

use super::FormatDetector;
use crate::error::DetectError;

/// Canonical label for an image format.
pub fn format_label(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "jpeg",
        ImageFormat::Png => "png",
        ImageFormat::Gif => "gif",
        ImageFormat::WebP => "webp",
        ImageFormat::Tiff => "tiff",
        ImageFormat::Bmp => "bmp",
        ImageFormat::Ico => "ico",
        ImageFormat::Avif => "avif",
        ImageFormat::Pnm => "pnm",
        ImageFormat::Tga => "tga",
        ImageFormat::Dds => "dds",
        ImageFormat::Hdr => "hdr",
        ImageFormat::OpenExr => "exr",
        ImageFormat::Farbfeld => "farbfeld",
        ImageFormat::Qoi => "qoi",
        other => other.extensions_str().first().copied().unwrap_or("unknown"),
    }
}

/// Detects the format from magic bytes at the start of the data.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderDetector;

impl FormatDetector for HeaderDetector {
    fn detect(&self, identifier: &str, data: &[u8]) -> Result<String, DetectError> {
        image::guess_format(data)
            .map(|format| format_label(format).to_string())
            .map_err(|_| DetectError::UnknownFormat(identifier.to_string()))
    }
}

/// Detects the format from the identifier's file extension.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtensionDetector;

impl FormatDetector for ExtensionDetector {
    fn detect(&self, identifier: &str, _data: &[u8]) -> Result<String, DetectError> {
        Path::new(identifier)
            .extension()
            .and_then(ImageFormat::from_extension)
            .map(|format| format_label(format).to_string())
            .ok_or_else(|| DetectError::UnknownFormat(identifier.to_string()))
    }
}

/// Tries several detectors in order and returns the first success.
pub struct ChainDetector {
    detectors: Vec<Box<dyn FormatDetector>>,
}

impl ChainDetector {
    pub fn new() -> Self {
        Self {
            detectors: Vec::new(),
        }
    }

    /// Append a detector, tried after those already added.
    pub fn then(mut self, detector: impl FormatDetector + 'static) -> Self {
        self.detectors.push(Box::new(detector));
        self
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }
}

impl Default for ChainDetector {
    /// Magic bytes first, then the file extension.
    fn default() -> Self {
        Self::new().then(HeaderDetector).then(ExtensionDetector)
    }
}

impl FormatDetector for ChainDetector {
    fn detect(&self, identifier: &str, data: &[u8]) -> Result<String, DetectError> {
        let mut last_error = None;
        for detector in &self.detectors {
            match detector.detect(identifier, data) {
                Ok(label) => return Ok(label),
                Err(e) => last_error = Some(e),
            }
        }
        Err(last_error.unwrap_or_else(|| DetectError::UnknownFormat(identifier.to_string())))
    }
}
