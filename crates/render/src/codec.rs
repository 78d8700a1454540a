//! Image codec capability: decode, center-crop, encode
//!
//! Thumbnails are produced by scaling the source so it fully covers the target
//! box and cropping the overflow evenly from both sides, so the output never
//! has letterboxing.

use std::fmt;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageEncoder};

/// Encoded output formats accepted for thumbnails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MimeType {
    Jpeg,
    Png,
    Webp,
}

impl MimeType {
    /// Canonical MIME string
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
        }
    }

    /// Parse a MIME string against the allow-list, case-insensitively
    ///
    /// Returns `None` for anything outside jpeg/png/webp.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/webp" => Some(Self::Webp),
            _ => None,
        }
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Codec failures
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("empty image buffer")]
    Empty,

    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("failed to encode {mime_type}: {source}")]
    Encode {
        mime_type: MimeType,
        #[source]
        source: image::ImageError,
    },

    #[error("invalid crop of {width}x{height} image")]
    InvalidCrop { width: u32, height: u32 },
}

/// Source rectangle in natural pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Target of a crop-and-encode step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeTarget {
    pub width: u32,
    pub height: u32,
    pub mime_type: MimeType,

    /// Encoder quality in percent, used by lossy formats only
    pub quality: u8,
}

/// Source rectangle that, scaled to `target_width`x`target_height`, fills the
/// target exactly and is centered in the natural image
///
/// The scale is `max(target_w / natural_w, target_h / natural_h)`.
///
/// # Example
///
/// ```
/// use nview_render::{center_crop_rect, CropRect};
///
/// // A wide 800x400 image cropped to a square keeps the middle 400x400
/// assert_eq!(
///     center_crop_rect(800, 400, 100, 100),
///     CropRect { x: 200, y: 0, width: 400, height: 400 }
/// );
/// ```
pub fn center_crop_rect(natural_width: u32, natural_height: u32, target_width: u32, target_height: u32) -> CropRect {
    let natural_w = f64::from(natural_width.max(1));
    let natural_h = f64::from(natural_height.max(1));
    let target_w = f64::from(target_width.max(1));
    let target_h = f64::from(target_height.max(1));

    let scale = (target_w / natural_w).max(target_h / natural_h);
    let width = ((target_w / scale).round() as u32).clamp(1, natural_width.max(1));
    let height = ((target_h / scale).round() as u32).clamp(1, natural_height.max(1));
    let x = ((natural_w - f64::from(width)) / 2.0).round().max(0.0) as u32;
    let y = ((natural_h - f64::from(height)) / 2.0).round().max(0.0) as u32;

    CropRect { x, y, width, height }
}

/// Platform image primitives used by the thumbnail pipeline
pub trait ImageCodec: Send + Sync {
    /// Decoded image
    type Bitmap: Send;

    /// Decode an encoded image
    fn decode(&self, bytes: &[u8]) -> Result<Self::Bitmap, CodecError>;

    /// Natural `(width, height)` of a decoded image
    fn dimensions(&self, bitmap: &Self::Bitmap) -> (u32, u32);

    /// Crop `rect` out of `bitmap`, resize it to the target and encode it
    fn crop(&self, bitmap: &Self::Bitmap, rect: CropRect, target: &EncodeTarget) -> Result<Vec<u8>, CodecError>;

    /// Decode `bytes` and center-crop them to `target`
    fn center_crop(&self, bytes: &[u8], target: &EncodeTarget) -> Result<Vec<u8>, CodecError> {
        let bitmap = self.decode(bytes)?;
        let (width, height) = self.dimensions(&bitmap);
        let rect = center_crop_rect(width, height, target.width, target.height);
        self.crop(&bitmap, rect, target)
    }
}

/// Software codec backed by the `image` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterCodec {
    filter: Filter,
}

#[derive(Debug, Clone, Copy, Default)]
enum Filter {
    #[default]
    CatmullRom,
    Triangle,
}

impl RasterCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a cheaper bilinear filter for resizing
    pub fn fast() -> Self {
        Self { filter: Filter::Triangle }
    }

    fn filter_type(&self) -> FilterType {
        match self.filter {
            Filter::CatmullRom => FilterType::CatmullRom,
            Filter::Triangle => FilterType::Triangle,
        }
    }
}

impl ImageCodec for RasterCodec {
    type Bitmap = DynamicImage;

    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, CodecError> {
        if bytes.is_empty() {
            return Err(CodecError::Empty);
        }
        image::load_from_memory(bytes).map_err(CodecError::Decode)
    }

    fn dimensions(&self, bitmap: &DynamicImage) -> (u32, u32) {
        (bitmap.width(), bitmap.height())
    }

    fn crop(&self, bitmap: &DynamicImage, rect: CropRect, target: &EncodeTarget) -> Result<Vec<u8>, CodecError> {
        let (width, height) = self.dimensions(bitmap);
        let fits = rect.width > 0
            && rect.height > 0
            && rect.x.saturating_add(rect.width) <= width
            && rect.y.saturating_add(rect.height) <= height;
        if !fits {
            return Err(CodecError::InvalidCrop { width, height });
        }

        let resized = bitmap.crop_imm(rect.x, rect.y, rect.width, rect.height).resize_exact(
            target.width.max(1),
            target.height.max(1),
            self.filter_type(),
        );
        encode(&resized, target)
    }
}

fn encode(image: &DynamicImage, target: &EncodeTarget) -> Result<Vec<u8>, CodecError> {
    let (width, height) = (image.width(), image.height());
    let mut out = Vec::new();
    let result = match target.mime_type {
        MimeType::Jpeg => {
            // JPEG has no alpha channel
            let rgb = image.to_rgb8();
            JpegEncoder::new_with_quality(&mut out, target.quality.clamp(1, 100)).write_image(
                rgb.as_raw(),
                width,
                height,
                ExtendedColorType::Rgb8,
            )
        }
        MimeType::Png => {
            let rgba = image.to_rgba8();
            PngEncoder::new(&mut out).write_image(rgba.as_raw(), width, height, ExtendedColorType::Rgba8)
        }
        MimeType::Webp => {
            let rgba = image.to_rgba8();
            WebPEncoder::new_lossless(&mut out).write_image(rgba.as_raw(), width, height, ExtendedColorType::Rgba8)
        }
    };
    result.map_err(|source| CodecError::Encode { mime_type: target.mime_type, source })?;
    Ok(out)
}
