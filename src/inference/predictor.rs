//! Single-image prediction with a loaded detector

use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

use burn::tensor::{backend::Backend, Tensor, TensorData};
use image::DynamicImage;
use tracing::debug;

use super::preprocess::{decode_image, load_image_file, preprocess_image};
use super::verdict::Verdict;
use crate::model::{AiImageDetector, ModelArtifact};
use crate::utils::error::{DeepscanError, Result};

/// Anything that can turn an image into an AI-generated probability.
///
/// The HTTP service holds a `dyn ImageScorer` so it does not depend on the
/// Burn backend type.
pub trait ImageScorer: Send + Sync {
    /// Probability in [0, 1] that `image` is AI-generated
    fn score(&self, image: &DynamicImage) -> Result<f32>;

    /// Decode raw upload bytes, then score them
    fn score_bytes(&self, bytes: &[u8]) -> Result<f32> {
        let image = decode_image(bytes)?;
        self.score(&image)
    }

    /// Score raw bytes and wrap the result in a [`Verdict`]
    fn verdict_bytes(&self, bytes: &[u8]) -> Result<Verdict> {
        self.score_bytes(bytes).map(Verdict::from_score)
    }
}

/// Detector bound to a device, ready for repeated single-image inference
pub struct Predictor<B: Backend> {
    // Burn modules are Send but not Sync
    model: Mutex<AiImageDetector<B>>,
    device: B::Device,
    image_size: usize,
}

impl<B: Backend> Predictor<B> {
    pub fn new(model: AiImageDetector<B>, image_size: usize, device: B::Device) -> Self {
        Self {
            model: Mutex::new(model),
            device,
            image_size,
        }
    }

    /// Load an artifact written by the training job
    pub fn from_artifact(artifact: &ModelArtifact, device: B::Device) -> Result<Self> {
        let (model, config) = artifact.load::<B>(&device)?;
        Ok(Self::new(model, config.input_size, device))
    }

    pub fn image_size(&self) -> usize {
        self.image_size
    }

    /// Score a decoded image
    pub fn predict_image(&self, image: &DynamicImage) -> Result<f32> {
        let start = Instant::now();
        let size = self.image_size;
        let data = preprocess_image(image, size as u32);
        let input = Tensor::<B, 4>::from_floats(TensorData::new(data, [1, 3, size, size]), &self.device);

        let output = {
            let model = self
                .model
                .lock()
                .map_err(|_| DeepscanError::Inference("model lock poisoned".to_string()))?;
            model.forward_probability(input)
        };

        let probs = output
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| DeepscanError::Inference(format!("Failed to read model output: {:?}", e)))?;

        let score = probs
            .first()
            .copied()
            .ok_or_else(|| DeepscanError::Inference("model returned no output".to_string()))?;
        if !score.is_finite() {
            return Err(DeepscanError::Inference(format!("model returned non-finite score {}", score)));
        }

        debug!("Scored image in {:.1} ms: {:.4}", start.elapsed().as_secs_f64() * 1000.0, score);
        Ok(score)
    }

    /// Score an image file and build its verdict
    pub fn predict_file(&self, path: &Path) -> Result<Verdict> {
        let image = load_image_file(path)?;
        self.predict_image(&image).map(Verdict::from_score)
    }
}

impl<B: Backend> ImageScorer for Predictor<B> {
    fn score(&self, image: &DynamicImage) -> Result<f32> {
        self.predict_image(image)
    }
}
