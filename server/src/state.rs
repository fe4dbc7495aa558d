//! Shared server state

use std::path::Path;
use std::sync::Arc;

use deepscan::backend::{default_device, DefaultBackend};
use deepscan::inference::{ImageScorer, Predictor};
use deepscan::model::ModelArtifact;
use tracing::{error, info, warn};

/// Whether a detector is available to serve requests.
///
/// Decided once at startup. A missing or unreadable artifact leaves the server
/// running in `Unavailable` mode, where `/check-image` answers 503.
#[derive(Clone)]
pub enum ModelState {
    Loaded(Arc<dyn ImageScorer>),
    Unavailable,
}

impl ModelState {
    /// Try to load the artifact at `path`; never fails
    pub fn load(path: &Path) -> Self {
        let artifact = ModelArtifact::new(path);
        if !artifact.exists() {
            warn!(
                "Model artifact not found at {:?} (expected {:?} and {:?}); serving without a model",
                artifact.base(),
                artifact.weights_path(),
                artifact.config_path()
            );
            return Self::Unavailable;
        }

        match Predictor::<DefaultBackend>::from_artifact(&artifact, default_device()) {
            Ok(predictor) => {
                info!(
                    "Loaded model from {:?} ({}x{} input)",
                    artifact.base(),
                    predictor.image_size(),
                    predictor.image_size()
                );
                Self::Loaded(Arc::new(predictor))
            }
            Err(e) => {
                error!("Failed to load model from {:?}: {}", artifact.base(), e);
                Self::Unavailable
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }

    pub fn scorer(&self) -> Option<Arc<dyn ImageScorer>> {
        match self {
            Self::Loaded(scorer) => Some(Arc::clone(scorer)),
            Self::Unavailable => None,
        }
    }
}

/// Application state shared across handlers
pub struct AppState {
    pub model: ModelState,
}

impl AppState {
    pub fn new(model: ModelState) -> Self {
        Self { model }
    }
}

pub type SharedState = Arc<AppState>;

#[cfg(test)]
mod tests {
    use super::*;
    use deepscan::model::DetectorConfig;

    #[test]
    fn test_missing_artifact_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let state = ModelState::load(&dir.path().join("best_model"));
        assert!(!state.is_loaded());
        assert!(state.scorer().is_none());
    }

    #[test]
    fn test_corrupt_artifact_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("best_model");
        std::fs::write(base.with_extension("mpk"), b"not a record").unwrap();
        std::fs::write(base.with_extension("json"), b"{}").unwrap();

        let state = ModelState::load(&base);
        assert!(!state.is_loaded());
    }

    #[test]
    fn test_saved_artifact_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("model").join("best_model");
        let config = DetectorConfig::new().with_input_size(32);
        let model = config.init::<DefaultBackend>(&default_device());
        ModelArtifact::new(&base).save(&model, &config).unwrap();

        let state = ModelState::load(&base);
        assert!(state.is_loaded());

        let png = {
            let img = image::RgbImage::from_pixel(20, 20, image::Rgb([30, 60, 90]));
            let mut buf = std::io::Cursor::new(Vec::new());
            img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
            buf.into_inner()
        };
        let verdict = state.scorer().unwrap().verdict_bytes(&png).unwrap();
        assert!((0.0..=1.0).contains(&verdict.ai_score));
    }
}
