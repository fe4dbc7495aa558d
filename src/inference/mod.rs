//! Inference: preprocessing, single-image prediction and verdicts
//!
//! The same `preprocess` functions are used for validation/test batches during
//! training, so served images see exactly the transform the model was
//! evaluated with.

pub mod predictor;
pub mod preprocess;
pub mod verdict;

pub use predictor::{ImageScorer, Predictor};
pub use preprocess::{decode_image, preprocess_image};
pub use verdict::{Verdict, DECISION_THRESHOLD};
