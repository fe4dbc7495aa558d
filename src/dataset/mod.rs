//! Dataset handling for the real/fake image classifier
//!
//! Expected layout on disk:
//!
//! ```text
//! split_dataset/
//! ├── train/
//! │   ├── real/
//! │   └── fake/
//! ├── val/
//! │   ├── real/
//! │   └── fake/
//! └── test/
//!     ├── real/
//!     └── fake/
//! ```
//!
//! Only the training split is augmented; validation and test images are
//! resized and rescaled exactly like inference inputs.

pub mod augmentation;
pub mod burn_dataset;
pub mod loader;

pub use augmentation::{AffineParams, AugmentationConfig, Augmenter};
pub use burn_dataset::{AugmentingBatcher, DetectorBatch, DetectorBatcher, DetectorDataset, DetectorItem};
pub use loader::{DatasetLayout, ImageSample};

/// Class folder names, indexed by label. The model predicts P(label == 1), i.e. "fake".
pub const CLASS_NAMES: [&str; 2] = ["real", "fake"];

/// Label of authentic photographs
pub const LABEL_REAL: usize = 0;
/// Label of AI-generated images
pub const LABEL_FAKE: usize = 1;

/// File extensions picked up when scanning class folders
pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "gif", "webp"];

/// Look up the label for a class folder name
pub fn class_index(name: &str) -> Option<usize> {
    CLASS_NAMES.iter().position(|c| *c == name)
}

/// Name of the class with the given label
pub fn class_name(label: usize) -> &'static str {
    CLASS_NAMES.get(label).copied().unwrap_or("unknown")
}

/// One of the three dataset partitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Split {
    Train,
    Validation,
    Test,
}

impl Split {
    /// Directory name of the split under the dataset root
    pub fn dir_name(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Validation => "val",
            Split::Test => "test",
        }
    }
}

impl std::fmt::Display for Split {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}
