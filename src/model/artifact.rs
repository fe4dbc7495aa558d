//! Model artifact on disk
//!
//! An artifact is two files sharing a base path:
//! `<base>.mpk` (weights, `CompactRecorder`) and `<base>.json` (`DetectorConfig`).

use std::path::{Path, PathBuf};

use burn::{config::Config, module::Module, record::CompactRecorder, tensor::backend::Backend};
use tracing::info;

use super::classifier::{AiImageDetector, DetectorConfig};
use crate::utils::error::{DeepscanError, Result};

/// Default artifact base path used by both the training job and the server
pub const DEFAULT_MODEL_PATH: &str = "model/best_model";

const WEIGHTS_EXTENSION: &str = "mpk";
const CONFIG_EXTENSION: &str = "json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelArtifact {
    base: PathBuf,
}

impl Default for ModelArtifact {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL_PATH)
    }
}

impl ModelArtifact {
    /// Accepts the base path with or without the `.mpk`/`.json` extension.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let base = match path.extension().and_then(|e| e.to_str()) {
            Some(WEIGHTS_EXTENSION) | Some(CONFIG_EXTENSION) => path.with_extension(""),
            _ => path.to_path_buf(),
        };
        Self { base }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn weights_path(&self) -> PathBuf {
        self.base.with_extension(WEIGHTS_EXTENSION)
    }

    pub fn config_path(&self) -> PathBuf {
        self.base.with_extension(CONFIG_EXTENSION)
    }

    /// Both files are present
    pub fn exists(&self) -> bool {
        self.weights_path().is_file() && self.config_path().is_file()
    }

    /// Write config and weights, creating the parent directory if needed.
    pub fn save<B: Backend>(&self, model: &AiImageDetector<B>, config: &DetectorConfig) -> Result<()> {
        if let Some(parent) = self.base.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        config.save(self.config_path())?;
        model
            .clone()
            .save_file(self.base.clone(), &CompactRecorder::new())
            .map_err(|e| DeepscanError::Model(format!("Failed to save model: {:?}", e)))?;

        info!("Saved model artifact to {:?}", self.weights_path());
        Ok(())
    }

    /// Read the config, build the architecture and load the weights into it.
    pub fn load<B: Backend>(&self, device: &B::Device) -> Result<(AiImageDetector<B>, DetectorConfig)> {
        if !self.exists() {
            return Err(DeepscanError::PathNotFound(self.weights_path()));
        }

        let config = DetectorConfig::load(self.config_path())
            .map_err(|e| DeepscanError::Model(format!("Invalid model config {:?}: {}", self.config_path(), e)))?;

        let model = config
            .init::<B>(device)
            .load_file(self.base.clone(), &CompactRecorder::new(), device)
            .map_err(|e| DeepscanError::Model(format!("Failed to load weights {:?}: {:?}", self.weights_path(), e)))?;

        Ok((model, config))
    }
}
