use image::ImageFormat;

use crate::error::{GenerationError, Result};
use crate::models::DecodedImage;

/// Decode raw image bytes into an RGBA8 pixel buffer.
///
/// The signature is checked before any real decoding work so unknown
/// formats fail fast. Every failure mode (corrupt data, truncated stream,
/// unsupported color depth) comes back as `Decode` — this never panics.
pub fn decode(bytes: &[u8]) -> Result<DecodedImage> {
    if bytes.is_empty() {
        return Err(GenerationError::Decode("empty image payload".to_string()));
    }

    let format = image::guess_format(bytes)
        .map_err(|_| GenerationError::Decode("unrecognized image signature".to_string()))?;
    if !matches!(
        format,
        ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::WebP
    ) {
        return Err(GenerationError::Decode(format!(
            "unsupported image format {:?}",
            format
        )));
    }

    let decoded = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| GenerationError::Decode(e.to_string()))?;
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();

    DecodedImage::new(width, height, 4, rgba.into_raw())
}
