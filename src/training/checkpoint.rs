//! Best-model checkpointing
//!
//! The checkpoint directory holds a single best-so-far artifact
//! (`best_model.mpk` + `best_model.json`) and a `checkpoint.json` describing
//! the epoch it came from.

use std::fs;
use std::path::{Path, PathBuf};

use burn::tensor::backend::Backend;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::model::{AiImageDetector, DetectorConfig, ModelArtifact};
use crate::utils::error::{DeepscanError, Result};

const CHECKPOINT_NAME: &str = "best_model";
const METADATA_FILE: &str = "checkpoint.json";

/// Metadata of the saved checkpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub epoch: usize,
    pub val_loss: f64,
    pub val_accuracy: f64,
    pub learning_rate: f64,
    pub timestamp: String,
}

impl Checkpoint {
    pub fn new(epoch: usize, val_loss: f64, val_accuracy: f64, learning_rate: f64) -> Self {
        Self {
            epoch,
            val_loss,
            val_accuracy,
            learning_rate,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Keeps the best model seen so far on disk
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    checkpoint_dir: PathBuf,
}

impl CheckpointManager {
    pub fn new<P: Into<PathBuf>>(checkpoint_dir: P) -> Self {
        Self {
            checkpoint_dir: checkpoint_dir.into(),
        }
    }

    pub fn artifact(&self) -> ModelArtifact {
        ModelArtifact::new(self.checkpoint_dir.join(CHECKPOINT_NAME))
    }

    fn metadata_path(&self) -> PathBuf {
        self.checkpoint_dir.join(METADATA_FILE)
    }

    /// Overwrite the stored checkpoint with `model`
    pub fn save_best<B: Backend>(
        &self,
        model: &AiImageDetector<B>,
        config: &DetectorConfig,
        checkpoint: &Checkpoint,
    ) -> Result<()> {
        fs::create_dir_all(&self.checkpoint_dir)?;
        self.artifact().save(model, config)?;
        checkpoint.save(&self.metadata_path())?;

        info!(
            "Checkpoint: epoch {} val_loss {:.4} -> {:?}",
            checkpoint.epoch,
            checkpoint.val_loss,
            self.artifact().weights_path()
        );
        Ok(())
    }

    pub fn has_checkpoint(&self) -> bool {
        self.artifact().exists()
    }

    /// Load the stored best model and its metadata
    pub fn load_best<B: Backend>(&self, device: &B::Device) -> Result<(AiImageDetector<B>, Checkpoint)> {
        if !self.has_checkpoint() {
            return Err(DeepscanError::Training(format!(
                "no checkpoint found in {:?}",
                self.checkpoint_dir
            )));
        }
        let (model, _) = self.artifact().load::<B>(device)?;
        let checkpoint = Checkpoint::load(&self.metadata_path())?;
        Ok((model, checkpoint))
    }

    /// Remove a stale checkpoint left over from a previous run
    pub fn clear(&self) -> Result<()> {
        let artifact = self.artifact();
        for path in [artifact.weights_path(), artifact.config_path(), self.metadata_path()] {
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}
