//! Training job configuration
//!
//! Every field has a default, so an empty TOML file (or none at all) gives the
//! standard recipe: 128 px inputs, batch 32, Adam at 1e-5, 20 epochs.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dataset::AugmentationConfig;
use crate::model::{DetectorConfig, DEFAULT_MODEL_PATH};
use crate::utils::config::load_toml_config;
use crate::utils::error::{DeepscanError, Result};

/// Full configuration of a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub data: DataConfig,
    pub augmentation: AugmentationConfig,
    pub model: ModelConfig,
    pub training: FitConfig,
    pub output: OutputConfig,
    /// Seed for shuffling and augmentation
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            data: DataConfig::default(),
            augmentation: AugmentationConfig::default(),
            model: ModelConfig::default(),
            training: FitConfig::default(),
            output: OutputConfig::default(),
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Directory holding `train/`, `val/` and `test/`
    pub root: PathBuf,
    /// Decode the training and validation splits into memory before the first epoch
    pub cache_images: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./split_dataset"),
            cache_images: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub input_size: usize,
    pub dense_units: usize,
    pub hidden_units: usize,
    pub dropout: f64,
    /// Backbone units (stem, 16 blocks, head) left trainable, counted from the top
    pub trainable_backbone_units: usize,
    /// Burn record with ImageNet-pretrained EfficientNet-B0 backbone weights
    pub pretrained_backbone: Option<PathBuf>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            input_size: crate::IMAGE_SIZE,
            dense_units: 512,
            hidden_units: 128,
            dropout: 0.5,
            trainable_backbone_units: 3,
            pretrained_backbone: None,
        }
    }
}

/// Optimizer and fit-loop policies
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub early_stopping_patience: usize,
    pub lr_reduce_factor: f64,
    pub lr_reduce_patience: usize,
    pub lr_min_delta: f64,
    pub min_learning_rate: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            epochs: 20,
            batch_size: 32,
            learning_rate: 1e-5,
            early_stopping_patience: 5,
            lr_reduce_factor: 0.2,
            lr_reduce_patience: 2,
            lr_min_delta: 1e-4,
            min_learning_rate: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Base path of the final artifact (`.mpk` + `.json`)
    pub model_path: PathBuf,
    /// Where the best-so-far checkpoint is kept during training
    pub checkpoint_dir: PathBuf,
    /// History, charts and test predictions
    pub report_dir: PathBuf,
    /// Start from an existing artifact instead of fresh weights
    pub resume: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            checkpoint_dir: PathBuf::from("./tmp_checkpoint"),
            report_dir: PathBuf::from("output"),
            resume: None,
        }
    }
}

impl TrainingConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        load_toml_config(path)
    }

    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig::new()
            .with_input_size(self.model.input_size)
            .with_dense_units(self.model.dense_units)
            .with_hidden_units(self.model.hidden_units)
            .with_dropout(self.model.dropout)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(DeepscanError::Config(msg.to_string()));

        if self.training.epochs == 0 {
            return invalid("epochs must be at least 1");
        }
        if self.training.batch_size == 0 {
            return invalid("batch_size must be at least 1");
        }
        if !(self.training.learning_rate > 0.0) {
            return invalid("learning_rate must be positive");
        }
        if !(0.0..1.0).contains(&self.model.dropout) {
            return invalid("dropout must be in [0, 1)");
        }
        if !(self.training.lr_reduce_factor > 0.0 && self.training.lr_reduce_factor < 1.0) {
            return invalid("lr_reduce_factor must be in (0, 1)");
        }
        // Five stride-2 stages
        if self.model.input_size < 32 {
            return invalid("input_size must be at least 32");
        }
        Ok(())
    }
}
