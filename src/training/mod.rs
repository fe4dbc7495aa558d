//! Training job: configuration, fit-loop policies, checkpointing and reports
//!
//! Output of a run:
//! - `<model_path>.{mpk,json}`: the best model (final artifact)
//! - `<checkpoint_dir>/best_model.{mpk,json}` + `checkpoint.json`
//! - `<report_dir>/history.json`, `accuracy.svg`, `loss.svg`, `test_predictions.json`

pub mod checkpoint;
pub mod config;
pub mod early_stopping;
pub mod evaluate;
pub mod history;
pub mod scheduler;
pub mod trainer;

pub use checkpoint::{Checkpoint, CheckpointManager};
pub use config::TrainingConfig;
pub use early_stopping::EarlyStopping;
pub use evaluate::{evaluate_dataset, evaluate_test_split, EvalMetrics, TestPrediction, TestReport};
pub use history::{EpochMetrics, TrainingHistory};
pub use scheduler::ReduceLrOnPlateau;
pub use trainer::{run_training, TrainingSummary};
