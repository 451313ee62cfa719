//! Resize and re-encode processor.
//!
//! # Parameters
//!
//! | name      | type | range        | default                          |
//! |-----------|------|--------------|----------------------------------|
//! | `width`   | int  | 1..=16384    | source width                     |
//! | `height`  | int  | 1..=16384    | source height                    |
//! | `format`  | str  | jpeg, png    | source format if encodable, else png |
//! | `quality` | int  | 1..=100      | 85 (jpeg only)                   |
//!
//! Given both `width` and `height` the image is fit inside that box keeping
//! its aspect ratio. Given one, the other is scaled proportionally.
//!
//! # Design Decisions
//!
//! - **Passthrough**: a request naming none of the parameters returns the
//!   source bytes untouched, with no decode or re-encode.
//! - **JPEG has no alpha**: images with an alpha channel are flattened to RGB
//!   before JPEG encoding.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, ImageFormat, ImageReader};

use super::Processor;
use crate::artifact::Image;
use crate::error::ImageError;
use crate::params::Params;

/// Largest accepted output dimension in pixels.
pub const MAX_DIMENSION: i64 = 16384;

/// Default JPEG quality (1-100).
pub const DEFAULT_QUALITY: u8 = 85;

/// Minimum allowed JPEG quality.
pub const MIN_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_QUALITY: u8 = 100;

const WIDTH: &str = "width";
const HEIGHT: &str = "height";
const FORMAT: &str = "format";
const QUALITY: &str = "quality";

/// Encodable output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
}

impl OutputFormat {
    /// Parse a format label, accepting `jpg` as an alias.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Some(OutputFormat::Jpeg),
            "png" => Some(OutputFormat::Png),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
        }
    }
}

// =============================================================================
// Options
// =============================================================================

/// Validated processing options taken from a parameter set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Options {
    width: Option<u32>,
    height: Option<u32>,
    format: Option<OutputFormat>,
    quality: Option<u8>,
}

impl Options {
    fn from_params(params: &Params) -> Result<Self, ImageError> {
        let mut format = None;
        if params.contains(FORMAT) {
            let label = params.get_str(FORMAT)?;
            format = Some(OutputFormat::from_label(label).ok_or_else(|| {
                ImageError::param(
                    FORMAT,
                    format!("unsupported output format \"{}\", expected jpeg or png", label),
                )
            })?);
        }

        let mut quality = None;
        if params.contains(QUALITY) {
            let value = params.get_int(QUALITY)?;
            if !(MIN_QUALITY as i64..=MAX_QUALITY as i64).contains(&value) {
                return Err(ImageError::param(
                    QUALITY,
                    format!(
                        "must be between {} and {}, got {}",
                        MIN_QUALITY, MAX_QUALITY, value
                    ),
                ));
            }
            quality = Some(value as u8);
        }

        Ok(Self {
            width: dimension(params, WIDTH)?,
            height: dimension(params, HEIGHT)?,
            format,
            quality,
        })
    }

    fn is_passthrough(&self) -> bool {
        *self == Options::default()
    }
}

fn dimension(params: &Params, name: &'static str) -> Result<Option<u32>, ImageError> {
    if !params.contains(name) {
        return Ok(None);
    }
    let value = params.get_int(name)?;
    if !(1..=MAX_DIMENSION).contains(&value) {
        return Err(ImageError::param(
            name,
            format!("must be between 1 and {}, got {}", MAX_DIMENSION, value),
        ));
    }
    Ok(Some(value as u32))
}

/// Scale `other` by `target / current`, never below one pixel.
fn scale(other: u32, target: u32, current: u32) -> u64 {
    let scaled = (other as f64 * target as f64 / current.max(1) as f64).round();
    (scaled as u64).max(1)
}

/// Derive the unnamed side from the requested one, bounded by `MAX_DIMENSION`.
///
/// An overflow is blamed on `given`, the parameter that forced the scale.
fn derived_dimension(
    other: u32,
    target: u32,
    current: u32,
    given: &'static str,
) -> Result<u32, ImageError> {
    let scaled = scale(other, target, current);
    if scaled > MAX_DIMENSION as u64 {
        return Err(ImageError::param(
            given,
            format!(
                "{} would scale the other side to {} pixels, above {}",
                target, scaled, MAX_DIMENSION
            ),
        ));
    }
    Ok(scaled as u32)
}

// =============================================================================
// Image Processor
// =============================================================================

/// Resizes and re-encodes images with the `image` crate.
///
/// # Example
///
/// ```ignore
/// let stage = ProcessStage::new(ImageProcessor::new());
/// let params = Params::from([("source", Value::from("cat.png")), ("width", 64.into())]);
/// ```
#[derive(Debug, Clone)]
pub struct ImageProcessor {
    filter: FilterType,
}

impl ImageProcessor {
    pub fn new() -> Self {
        Self {
            filter: FilterType::CatmullRom,
        }
    }

    /// Use a different resampling filter.
    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }

    fn decode(&self, image: &Image) -> Result<DynamicImage, ImageError> {
        let cursor = Cursor::new(image.data().as_ref());
        let reader = match ImageFormat::from_extension(image.format()) {
            Some(format) => ImageReader::with_format(cursor, format),
            None => ImageReader::new(cursor)
                .with_guessed_format()
                .map_err(|e| ImageError::processing(format!("decode failed: {}", e)))?,
        };

        reader
            .decode()
            .map_err(|e| ImageError::processing(format!("decode of {} failed: {}", image.format(), e)))
    }

    fn resize(&self, img: DynamicImage, options: &Options) -> Result<DynamicImage, ImageError> {
        let (src_w, src_h) = (img.width(), img.height());
        let resized = match (options.width, options.height) {
            (Some(w), Some(h)) => img.resize(w, h, self.filter),
            (Some(w), None) => {
                let h = derived_dimension(src_h, w, src_w, WIDTH)?;
                img.resize_exact(w, h, self.filter)
            }
            (None, Some(h)) => {
                let w = derived_dimension(src_w, h, src_h, HEIGHT)?;
                img.resize_exact(w, h, self.filter)
            }
            (None, None) => img,
        };
        Ok(resized)
    }

    fn encode(
        &self,
        img: &DynamicImage,
        format: OutputFormat,
        quality: u8,
    ) -> Result<Vec<u8>, ImageError> {
        let mut output = Vec::new();
        let result = match format {
            OutputFormat::Jpeg => {
                let encoder = JpegEncoder::new_with_quality(&mut output, quality);
                match img.color() {
                    ColorType::L8 | ColorType::Rgb8 => img.write_with_encoder(encoder),
                    _ => DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder),
                }
            }
            OutputFormat::Png => img.write_with_encoder(PngEncoder::new(&mut output)),
        };

        result.map_err(|e| {
            ImageError::processing(format!("{} encode failed: {}", format.label(), e))
        })?;
        Ok(output)
    }
}

impl Default for ImageProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for ImageProcessor {
    fn process(&self, image: Image, params: &Params) -> Result<Image, ImageError> {
        let options = Options::from_params(params)?;
        if options.is_passthrough() {
            return Ok(image);
        }

        let format = options
            .format
            .or_else(|| OutputFormat::from_label(image.format()))
            .unwrap_or(OutputFormat::Png);
        let quality = options.quality.unwrap_or(DEFAULT_QUALITY);

        let img = self.decode(&image)?;
        let img = self.resize(img, &options)?;
        let output = self.encode(&img, format, quality)?;

        Image::new(format.label(), output)
    }

    fn name(&self) -> &'static str {
        "image"
    }
}

// =============================================================================
// Tests
// =============================================================================
