//! Header-only image metadata
//!
//! Reads natural dimensions without decoding pixel data, so page slots can be
//! laid out before any page is loaded.

use std::io::Cursor;

use image::{ImageFormat, ImageReader};

/// Largest accepted width or height in pixels
pub const MAX_DIMENSION_PX: u32 = 100_000;

/// Longest page name kept, in characters
pub const PAGE_NAME_MAX_LENGTH: usize = 120;

/// Dimensions read from an image header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,

    /// Size of the probed buffer
    pub bytes: usize,

    /// MIME type of the detected container
    pub mime_type: &'static str,
}

fn mime_for(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::WebP => "image/webp",
        ImageFormat::Gif => "image/gif",
        _ => "application/octet-stream",
    }
}

/// Accept a dimension only within `1..=MAX_DIMENSION_PX`
pub fn to_safe_dimension(value: f64) -> Option<u32> {
    if !value.is_finite() {
        return None;
    }
    let value = value.floor();
    (1.0..=f64::from(MAX_DIMENSION_PX)).contains(&value).then_some(value as u32)
}

/// Read dimensions from a PNG, JPEG, WEBP or GIF header
///
/// Returns `None` for short buffers, unknown formats and out-of-range sizes.
pub fn probe_dimensions(bytes: &[u8]) -> Option<ImageMetadata> {
    if bytes.len() < 8 {
        return None;
    }

    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format().ok()?;
    let format = reader.format()?;
    let (width, height) = reader.into_dimensions().ok()?;

    Some(ImageMetadata {
        width: to_safe_dimension(f64::from(width))?,
        height: to_safe_dimension(f64::from(height))?,
        bytes: bytes.len(),
        mime_type: mime_for(format),
    })
}

/// Collapse control characters and whitespace runs and cap the length
///
/// # Example
///
/// ```
/// use nview_render::sanitize_page_name;
///
/// assert_eq!(sanitize_page_name("  001\t\u{7}cover .jpg "), "001 cover .jpg");
/// ```
pub fn sanitize_page_name(value: &str) -> String {
    value
        .split(|c: char| c.is_control() || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(PAGE_NAME_MAX_LENGTH)
        .collect()
}
