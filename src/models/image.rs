use serde::{Deserialize, Serialize};

use crate::error::{GenerationError, Result};

/// The square sizes the generation endpoint accepts.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum ImageSize {
    #[serde(rename = "256x256")]
    Square256,
    #[serde(rename = "512x512")]
    Square512,
    #[default]
    #[serde(rename = "1024x1024")]
    Square1024,
}

impl ImageSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageSize::Square256 => "256x256",
            ImageSize::Square512 => "512x512",
            ImageSize::Square1024 => "1024x1024",
        }
    }

    pub fn pixels(&self) -> u32 {
        match self {
            ImageSize::Square256 => 256,
            ImageSize::Square512 => 512,
            ImageSize::Square1024 => 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ImageResponseFormat {
    #[default]
    Url,
    B64Json,
}

/// One prompt submission. Immutable once handed to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub model: Option<String>,
    pub size: ImageSize,
    pub count: u8,
    pub response_format: ImageResponseFormat,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: None,
            size: ImageSize::default(),
            count: 1,
            response_format: ImageResponseFormat::default(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_size(mut self, size: ImageSize) -> Self {
        self.size = size;
        self
    }

    pub fn with_count(mut self, count: u8) -> Self {
        self.count = count;
        self
    }

    pub fn with_response_format(mut self, format: ImageResponseFormat) -> Self {
        self.response_format = format;
        self
    }
}

/// One image as the provider handed it back, before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Url(String),
    Bytes(Vec<u8>),
}

/// Decoded pixel data. The buffer always holds exactly
/// width x height x channels bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    width: u32,
    height: u32,
    channels: u8,
    pixels: Vec<u8>,
}

impl DecodedImage {
    pub fn new(width: u32, height: u32, channels: u8, pixels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * channels as usize;
        if pixels.len() != expected {
            return Err(GenerationError::Decode(format!(
                "pixel buffer holds {} bytes, expected {} for {}x{}x{}",
                pixels.len(),
                expected,
                width,
                height,
                channels
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }
}

/// Everything a finished run delivers to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutput {
    pub images: Vec<DecodedImage>,
    pub model: String,
    pub created: Option<u64>,
    pub revised_prompts: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoded_image_rejects_inconsistent_buffer() {
        let result = DecodedImage::new(2, 2, 4, vec![0u8; 15]);
        assert!(matches!(result, Err(GenerationError::Decode(_))));
    }

    #[test]
    fn test_decoded_image_accepts_exact_buffer() {
        let image = DecodedImage::new(2, 2, 4, vec![0u8; 16]).unwrap();
        assert_eq!(image.width(), 2);
        assert_eq!(image.height(), 2);
        assert_eq!(image.channels(), 4);
        assert_eq!(image.pixels().len(), 16);
    }

    #[test]
    fn test_image_size_serializes_to_provider_strings() {
        assert_eq!(
            serde_json::to_string(&ImageSize::Square512).unwrap(),
            "\"512x512\""
        );
        assert_eq!(ImageSize::Square1024.as_str(), "1024x1024");
        assert_eq!(ImageSize::Square256.pixels(), 256);
    }

    #[test]
    fn test_response_format_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ImageResponseFormat::B64Json).unwrap(),
            "\"b64_json\""
        );
        assert_eq!(
            serde_json::to_string(&ImageResponseFormat::Url).unwrap(),
            "\"url\""
        );
    }

    #[test]
    fn test_request_builder_chain() {
        let request = GenerationRequest::new("mossy stone")
            .with_model("dall-e-3")
            .with_size(ImageSize::Square512)
            .with_count(2)
            .with_response_format(ImageResponseFormat::B64Json);

        assert_eq!(request.prompt, "mossy stone");
        assert_eq!(request.model.as_deref(), Some("dall-e-3"));
        assert_eq!(request.size, ImageSize::Square512);
        assert_eq!(request.count, 2);
        assert_eq!(request.response_format, ImageResponseFormat::B64Json);
    }
}
