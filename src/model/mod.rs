//! Model definitions: EfficientNet-B0 backbone, the real/fake classifier
//! head, and the on-disk artifact format.

pub mod artifact;
pub mod classifier;
pub mod efficientnet;

pub use artifact::{ModelArtifact, DEFAULT_MODEL_PATH};
pub use classifier::{AiImageDetector, DetectorConfig};
pub use efficientnet::{EfficientNetB0, FEATURE_DIM};
