//! Dataset discovery
//!
//! Scans the train/val/test split folders and turns every image file into a
//! labeled [`ImageSample`]. Images are not decoded here.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::{class_index, Split, CLASS_NAMES, IMAGE_EXTENSIONS};
use crate::utils::error::{DeepscanError, Result};

/// A single image file with its label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSample {
    /// Absolute or root-relative path to the image file
    pub path: PathBuf,
    /// 0 = real, 1 = fake
    pub label: usize,
    /// Path relative to the split folder, e.g. `fake/0042.png`
    pub filename: String,
}

/// The three discovered splits of a dataset root
#[derive(Debug, Clone)]
pub struct DatasetLayout {
    pub root: PathBuf,
    pub train: Vec<ImageSample>,
    pub val: Vec<ImageSample>,
    pub test: Vec<ImageSample>,
}

impl DatasetLayout {
    /// Discover all three splits under `root`.
    ///
    /// Fails if a split folder, or one of its `real`/`fake` class folders, is missing
    /// or holds no images.
    pub fn discover<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        info!("Loading dataset from: {:?}", root);

        if !root.is_dir() {
            return Err(DeepscanError::PathNotFound(root));
        }

        Ok(Self {
            train: load_split(&root, Split::Train)?,
            val: load_split(&root, Split::Validation)?,
            test: load_split(&root, Split::Test)?,
            root,
        })
    }
}

/// Scan one split folder (`root/<split>/{real,fake}`).
///
/// Samples come back sorted by filename so evaluation order is stable.
pub fn load_split(root: &Path, split: Split) -> Result<Vec<ImageSample>> {
    let split_dir = root.join(split.dir_name());
    if !split_dir.is_dir() {
        return Err(DeepscanError::Dataset(format!(
            "missing '{}' split directory at {:?}",
            split, split_dir
        )));
    }

    for entry in std::fs::read_dir(&split_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            let name = entry.file_name().to_string_lossy().to_string();
            if class_index(&name).is_none() {
                warn!("Ignoring unknown class folder {:?} in '{}' split", name, split);
            }
        }
    }

    let mut samples = Vec::new();
    for (label, class) in CLASS_NAMES.iter().enumerate() {
        let class_dir = split_dir.join(class);
        if !class_dir.is_dir() {
            return Err(DeepscanError::Dataset(format!(
                "missing class folder '{}' in '{}' split ({:?})",
                class, split, class_dir
            )));
        }

        let before = samples.len();
        for entry in WalkDir::new(&class_dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !entry.file_type().is_file() || !is_image_file(path) {
                continue;
            }
            let file = entry.file_name().to_string_lossy();
            samples.push(ImageSample {
                path: path.to_path_buf(),
                label,
                filename: format!("{}/{}", class, file),
            });
        }

        let count = samples.len() - before;
        if count == 0 {
            return Err(DeepscanError::Dataset(format!(
                "class folder '{}' in '{}' split contains no images",
                class, split
            )));
        }
        debug!("Split '{}' class '{}' (label {}): {} images", split, class, label, count);
    }

    samples.sort_by(|a, b| a.filename.cmp(&b.filename));
    info!("Split '{}': {} images", split, samples.len());
    Ok(samples)
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}
