use derivative::Derivative;
use kiln_scene::{Filter, Sampler, Wrapping};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TextureArrayError {
    #[error("A texture array needs at least one layer")]
    Empty,
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("Layer {index} is {width}x{height}, expected {expected_width}x{expected_height}")]
    DimensionMismatch {
        index: usize,
        width: u32,
        height: u32,
        expected_width: u32,
        expected_height: u32,
    },
}

/// Equally sized RGBA8 layers packed back to back, ready for a 2D array upload
#[derive(Derivative, Clone, PartialEq)]
#[derivative(Debug)]
pub struct TextureArray {
    pub width: u32,
    pub height: u32,
    pub layers: u32,
    #[derivative(Debug = "ignore")]
    pub data: Vec<u8>,
    pub sampler: Sampler,
    pub generate_mipmaps: bool,
}

impl TextureArray {
    fn layer_size(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    pub fn layer(&self, index: u32) -> Option<&[u8]> {
        if index >= self.layers {
            return None;
        }
        let size = self.layer_size();
        let start = index as usize * size;
        self.data.get(start..start + size)
    }
}

pub struct TextureArrayLoader;

impl TextureArrayLoader {
    /// Read and decode every image concurrently, then pack them in order
    pub async fn load<P: AsRef<Path>>(paths: &[P]) -> Result<TextureArray, TextureArrayError> {
        if paths.is_empty() {
            return Err(TextureArrayError::Empty);
        }
        let reads = paths.iter().map(|path| {
            let path = path.as_ref().to_path_buf();
            async move {
                let bytes = tokio::fs::read(&path)
                    .await
                    .map_err(|source| TextureArrayError::Io {
                        path: path.clone(),
                        source,
                    })?;
                let decoded = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
                    .await
                    .map_err(|e| TextureArrayError::Io {
                        path: path.clone(),
                        source: std::io::Error::other(e),
                    })?
                    .map_err(|source| TextureArrayError::Decode {
                        path: path.clone(),
                        source,
                    })?;
                Ok::<_, TextureArrayError>(decoded.to_rgba8())
            }
        });
        let layers = futures::future::try_join_all(reads).await?;
        tracing::debug!("Decoded {} texture array layers", layers.len());
        Self::pack(layers)
    }

    /// Flip every layer vertically and pack them into one array
    pub fn pack(layers: Vec<image::RgbaImage>) -> Result<TextureArray, TextureArrayError> {
        let (width, height) = layers
            .first()
            .map(|layer| layer.dimensions())
            .ok_or(TextureArrayError::Empty)?;

        let mut data = Vec::with_capacity(width as usize * height as usize * 4 * layers.len());
        let count = layers.len() as u32;
        for (index, mut layer) in layers.into_iter().enumerate() {
            if layer.dimensions() != (width, height) {
                return Err(TextureArrayError::DimensionMismatch {
                    index,
                    width: layer.width(),
                    height: layer.height(),
                    expected_width: width,
                    expected_height: height,
                });
            }
            image::imageops::flip_vertical_in_place(&mut layer);
            data.extend_from_slice(layer.as_raw());
        }

        Ok(TextureArray {
            width,
            height,
            layers: count,
            data,
            sampler: Sampler {
                min_filter: Filter::LinearMipmapLinear,
                mag_filter: Filter::Linear,
                wrap_s: Wrapping::ClampToEdge,
                wrap_t: Wrapping::ClampToEdge,
            },
            generate_mipmaps: true,
        })
    }
}
