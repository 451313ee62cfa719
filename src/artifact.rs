//! Image artifacts and their self-describing cache encoding.
//!
//! An [`Image`] is a pure value: a format label and the encoded bytes. The
//! data is never reinterpreted by the pipeline core, only moved between
//! stages and in and out of caches.
//!
//! # Encoding
//!
//! Caches store images as a single contiguous blob, so any backend can hold
//! them without out-of-band metadata:
//!
//! ```text
//! ┌──────────────────┬─────────────────────┬──────────────────┐
//! │ format len (u32) │ format (UTF-8)      │ data (remaining) │
//! │ little-endian    │ 1..=MAX_FORMAT_LEN  │                  │
//! └──────────────────┴─────────────────────┴──────────────────┘
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{CacheError, ImageError};

/// Maximum length of a format label in the encoded form.
pub const MAX_FORMAT_LEN: usize = 64;

/// Size of the format length prefix.
const LEN_PREFIX_SIZE: usize = 4;

/// An encoded image tagged with its format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    format: String,
    data: Bytes,
}

impl Image {
    /// Create an image. The format label must be non-empty and at most
    /// [`MAX_FORMAT_LEN`] bytes.
    pub fn new(format: impl Into<String>, data: impl Into<Bytes>) -> Result<Self, ImageError> {
        let format = format.into();
        if format.is_empty() {
            return Err(ImageError::processing("image format must not be empty"));
        }
        if format.len() > MAX_FORMAT_LEN {
            return Err(ImageError::processing(format!(
                "image format label too long: {} bytes (max {})",
                format.len(),
                MAX_FORMAT_LEN
            )));
        }
        Ok(Self {
            format,
            data: data.into(),
        })
    }

    /// The format label (e.g. `"jpeg"`, `"png"`).
    pub fn format(&self) -> &str {
        &self.format
    }

    /// The encoded image bytes.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Size of the image data in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Split into format and data.
    pub fn into_parts(self) -> (String, Bytes) {
        (self.format, self.data)
    }

    /// Serialize into the cache blob form.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(LEN_PREFIX_SIZE + self.format.len() + self.data.len());
        buf.put_u32_le(self.format.len() as u32);
        buf.put_slice(self.format.as_bytes());
        buf.put_slice(&self.data);
        buf.freeze()
    }

    /// Deserialize from the cache blob form.
    ///
    /// The returned image's data shares the blob's buffer.
    pub fn decode(blob: &Bytes) -> Result<Self, CacheError> {
        if blob.len() < LEN_PREFIX_SIZE {
            return Err(CacheError::Corrupt(format!(
                "entry too small: need at least {} bytes, got {}",
                LEN_PREFIX_SIZE,
                blob.len()
            )));
        }

        let format_len = u32::from_le_bytes([blob[0], blob[1], blob[2], blob[3]]) as usize;
        if format_len == 0 {
            return Err(CacheError::Corrupt("empty format label".to_string()));
        }
        if format_len > MAX_FORMAT_LEN {
            return Err(CacheError::Corrupt(format!(
                "format label too long: {} bytes (max {})",
                format_len, MAX_FORMAT_LEN
            )));
        }

        let data_start = LEN_PREFIX_SIZE + format_len;
        if data_start > blob.len() {
            return Err(CacheError::Corrupt(format!(
                "format label of {} bytes exceeds entry size {}",
                format_len,
                blob.len()
            )));
        }

        let format = std::str::from_utf8(&blob[LEN_PREFIX_SIZE..data_start])
            .map_err(|e| CacheError::Corrupt(format!("format label is not UTF-8: {}", e)))?
            .to_string();

        Ok(Self {
            format,
            data: blob.slice(data_start..),
        })
    }
}
