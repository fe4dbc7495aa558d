//! # deepscan
//!
//! Detects AI-generated images with an EfficientNet-B0 based binary classifier
//! built on the Burn framework.
//!
//! ## Modules
//!
//! - `dataset`: train/val/test discovery, augmentation and Burn batching
//! - `model`: EfficientNet-B0 backbone, classifier head and the on-disk artifact
//! - `training`: fit loop with checkpointing, LR plateau and early stopping
//! - `inference`: preprocessing, single-image prediction and verdicts
//! - `utils`: errors, logging, TOML config and SVG charts
//!
//! The HTTP service lives in the `deepscan-server` workspace member and only
//! depends on [`inference::ImageScorer`] and [`model::ModelArtifact`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use deepscan::backend::{default_device, DefaultBackend};
//! use deepscan::inference::{ImageScorer, Predictor};
//! use deepscan::model::ModelArtifact;
//!
//! let predictor = Predictor::<DefaultBackend>::from_artifact(&ModelArtifact::default(), default_device())?;
//! let verdict = predictor.verdict_bytes(&std::fs::read("photo.jpg")?)?;
//! println!("{}", serde_json::to_string(&verdict)?);
//! ```

pub mod backend;
pub mod dataset;
pub mod inference;
pub mod model;
pub mod training;
pub mod utils;

pub use inference::{ImageScorer, Predictor, Verdict, DECISION_THRESHOLD};
pub use model::{AiImageDetector, DetectorConfig, ModelArtifact, DEFAULT_MODEL_PATH};
pub use training::{run_training, TrainingConfig};
pub use utils::error::{DeepscanError, Result};

/// Default square input resolution
pub const IMAGE_SIZE: usize = 128;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
