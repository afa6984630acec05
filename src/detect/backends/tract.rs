#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use tract_onnx::prelude::*;

use crate::detect::backend::{VisionBackend, VisionCapability};
use crate::detect::result::FaceEmbedding;

/// Tract-based face encoder for ONNX embedding models.
///
/// The model is expected to take a `1x3xHxW` RGB tensor of an aligned face
/// crop and return a single embedding row. Images are decoded in memory; the
/// backend does no network I/O and writes nothing to disk.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    width: u32,
    height: u32,
    normalize: bool,
}

impl TractBackend {
    /// Load an ONNX embedding model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, width: u32, height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            width,
            height,
            normalize: false,
        })
    }

    /// L2-normalize embeddings before returning them.
    pub fn with_l2_normalization(mut self) -> Self {
        self.normalize = true;
        self
    }

    fn build_input(&self, image: &[u8]) -> Result<Tensor> {
        let decoded = image::load_from_memory(image).context("failed to decode face image")?;
        let rgb = decoded
            .resize_exact(self.width, self.height, FilterType::Triangle)
            .to_rgb8();

        let width = self.width as usize;
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.height as usize, width),
            |(_, channel, y, x)| {
                let pixel = rgb.get_pixel(x as u32, y as u32);
                (pixel[channel] as f32 - 127.5) / 128.0
            },
        );

        Ok(input.into_tensor())
    }

    fn extract_embedding(&self, outputs: TVec<TValue>) -> Result<Vec<f32>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let values: Vec<f32> = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .iter()
            .copied()
            .collect();
        if values.is_empty() || values.iter().any(|v| !v.is_finite()) {
            return Err(anyhow!("model produced an unusable embedding"));
        }
        if !self.normalize {
            return Ok(values);
        }
        let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm == 0.0 {
            return Err(anyhow!("model produced a zero embedding"));
        }
        Ok(values.into_iter().map(|v| v / norm).collect())
    }
}

impl VisionBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn supports(&self, capability: VisionCapability) -> bool {
        matches!(capability, VisionCapability::FaceEncoding)
    }

    fn encode_face(&mut self, image: &[u8]) -> Result<Option<FaceEmbedding>> {
        let input = self.build_input(image)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let values = self.extract_embedding(outputs)?;
        Ok(Some(FaceEmbedding::new(values)))
    }
}
