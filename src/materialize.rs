use std::io::Cursor;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::{GenerationError, Result};
use crate::models::DecodedImage;

#[derive(Debug, Clone)]
pub struct MaterializeResult {
    pub path: PathBuf,
    pub bytes_written: usize,
}

/// Turns a decoded image into a persisted texture asset. The pipeline
/// never calls this itself; the embedding application decides where
/// generated pixels end up.
#[async_trait]
pub trait TextureMaterializer: Send + Sync {
    async fn materialize(&self, name: &str, image: &DecodedImage) -> Result<MaterializeResult>;
}

/// Writes textures as PNG files under a base directory.
pub struct PngFileMaterializer {
    base_dir: PathBuf,
}

impl PngFileMaterializer {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

#[async_trait]
impl TextureMaterializer for PngFileMaterializer {
    async fn materialize(&self, name: &str, image: &DecodedImage) -> Result<MaterializeResult> {
        if name.trim().is_empty() {
            return Err(GenerationError::Materialize(
                "texture name must not be empty".to_string(),
            ));
        }

        let path = self.base_dir.join(format!("{}.png", name));
        let width = image.width();
        let height = image.height();
        let pixels = image.pixels().to_vec();
        let base_dir = self.base_dir.clone();
        let target = path.clone();

        let bytes_written = tokio::task::spawn_blocking(move || -> Result<usize> {
            let buffer: image::RgbaImage = image::ImageBuffer::from_raw(width, height, pixels)
                .ok_or_else(|| {
                    GenerationError::Materialize("pixel buffer does not match dimensions".to_string())
                })?;

            let mut encoded = Vec::new();
            buffer
                .write_to(&mut Cursor::new(&mut encoded), image::ImageFormat::Png)
                .map_err(|e| GenerationError::Materialize(e.to_string()))?;

            std::fs::create_dir_all(&base_dir)
                .map_err(|e| GenerationError::Materialize(e.to_string()))?;
            std::fs::write(&target, &encoded)
                .map_err(|e| GenerationError::Materialize(e.to_string()))?;
            Ok(encoded.len())
        })
        .await
        .map_err(|e| GenerationError::Materialize(e.to_string()))??;

        log::info!("Texture saved to {}", path.display());
        Ok(MaterializeResult {
            path,
            bytes_written,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rejects_empty_name() {
        let materializer = PngFileMaterializer::new(std::env::temp_dir());
        let image = DecodedImage::new(1, 1, 4, vec![0, 0, 0, 255]).unwrap();
        let result = materializer.materialize("  ", &image).await;
        assert!(matches!(result, Err(GenerationError::Materialize(_))));
    }

    #[tokio::test]
    async fn test_writes_png_under_base_dir() {
        let base_dir = std::env::temp_dir().join("texgen_materialize_test");
        let materializer = PngFileMaterializer::new(&base_dir);
        let image = DecodedImage::new(2, 2, 4, vec![255u8; 16]).unwrap();

        let result = materializer.materialize("white_tile", &image).await.unwrap();
        assert_eq!(result.path, base_dir.join("white_tile.png"));
        assert!(result.bytes_written > 0);

        let written = std::fs::read(&result.path).unwrap();
        let round_trip = crate::decoder::decode(&written).unwrap();
        assert_eq!(round_trip, image);

        let _ = std::fs::remove_dir_all(&base_dir);
    }
}
