//! Burn Dataset Integration
//!
//! Implements Burn's `Dataset` trait over discovered image samples and two
//! batchers:
//!
//! - `DetectorBatcher`: resize + rescale only (validation, test)
//! - `AugmentingBatcher`: random affine augmentation, then rescale (training)

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use image::RgbImage;
use indicatif::{ProgressBar, ProgressStyle};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::{info, warn};

use super::augmentation::{AugmentationConfig, Augmenter};
use super::loader::ImageSample;
use crate::inference::preprocess::{load_image_file, resize_rgb, to_chw};
use crate::utils::error::Result;

/// One decoded image at model resolution, with its label
#[derive(Clone, Debug)]
pub struct DetectorItem {
    /// RGB image already resized to `image_size` x `image_size`
    pub image: RgbImage,
    /// 0 = real, 1 = fake
    pub label: usize,
    /// Split-relative filename, e.g. `fake/0042.png`
    pub filename: String,
}

impl DetectorItem {
    /// Decode and resize a sample from disk
    pub fn load(sample: &ImageSample, image_size: usize) -> Result<Self> {
        let image = load_image_file(&sample.path)?;
        Ok(Self {
            image: resize_rgb(&image, image_size as u32),
            label: sample.label,
            filename: sample.filename.clone(),
        })
    }
}

/// Image dataset with optional in-memory cache
///
/// Without caching, images are decoded lazily in `get`.
#[derive(Debug, Clone)]
pub struct DetectorDataset {
    samples: Vec<ImageSample>,
    image_size: usize,
    cached_items: Option<Vec<DetectorItem>>,
}

impl DetectorDataset {
    /// Lazily loading dataset
    pub fn new(samples: Vec<ImageSample>, image_size: usize) -> Self {
        Self {
            samples,
            image_size,
            cached_items: None,
        }
    }

    /// Decode every sample up front (in parallel). Unreadable files are skipped with a warning.
    pub fn new_cached(samples: Vec<ImageSample>, image_size: usize) -> Self {
        let total = samples.len();
        info!("Pre-loading {} images into memory", total);

        let pb = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("  {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
        {
            pb.set_style(style.progress_chars("#>-"));
        }

        let loaded = AtomicUsize::new(0);
        let (kept, items): (Vec<ImageSample>, Vec<DetectorItem>) = samples
            .into_par_iter()
            .filter_map(|sample| {
                let item = match DetectorItem::load(&sample, image_size) {
                    Ok(item) => Some((sample, item)),
                    Err(e) => {
                        warn!("Skipping {:?}: {}", sample.path, e);
                        None
                    }
                };
                let count = loaded.fetch_add(1, Ordering::Relaxed);
                if count % 100 == 0 {
                    pb.set_position(count as u64);
                }
                item
            })
            .unzip();
        pb.finish_and_clear();

        info!("Loaded {} of {} images", items.len(), total);

        Self {
            samples: kept,
            image_size,
            cached_items: Some(items),
        }
    }

    pub fn image_size(&self) -> usize {
        self.image_size
    }

    /// Number of samples per label `[real, fake]`
    pub fn class_distribution(&self) -> [usize; 2] {
        let mut counts = [0usize; 2];
        for sample in &self.samples {
            if let Some(c) = counts.get_mut(sample.label) {
                *c += 1;
            }
        }
        counts
    }
}

impl Dataset<DetectorItem> for DetectorDataset {
    fn get(&self, index: usize) -> Option<DetectorItem> {
        if let Some(ref cached) = self.cached_items {
            return cached.get(index).cloned();
        }

        let sample = self.samples.get(index)?;
        match DetectorItem::load(sample, self.image_size) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("Failed to load {:?}: {}", sample.path, e);
                None
            }
        }
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// A batch of images and binary targets
#[derive(Clone, Debug)]
pub struct DetectorBatch<B: Backend> {
    /// Shape `[batch_size, 3, height, width]`, values in [0, 1]
    pub images: Tensor<B, 4>,
    /// Shape `[batch_size]`, 0 = real, 1 = fake
    pub targets: Tensor<B, 1, Int>,
}

fn build_batch<B: Backend>(
    images_data: Vec<f32>,
    targets_data: Vec<i64>,
    image_size: usize,
    device: &B::Device,
) -> DetectorBatch<B> {
    let batch_size = targets_data.len();
    let images = Tensor::<B, 4>::from_floats(
        TensorData::new(images_data, [batch_size, 3, image_size, image_size]),
        device,
    );
    let targets =
        Tensor::<B, 1, Int>::from_data(TensorData::new(targets_data, [batch_size]), device);

    DetectorBatch { images, targets }
}

/// Batcher without augmentation (validation/test)
#[derive(Clone, Debug)]
pub struct DetectorBatcher {
    image_size: usize,
}

impl DetectorBatcher {
    pub fn new(image_size: usize) -> Self {
        Self { image_size }
    }
}

impl<B: Backend> Batcher<B, DetectorItem, DetectorBatch<B>> for DetectorBatcher {
    fn batch(&self, items: Vec<DetectorItem>, device: &B::Device) -> DetectorBatch<B> {
        let mut images_data = Vec::with_capacity(items.len() * 3 * self.image_size * self.image_size);
        let mut targets_data = Vec::with_capacity(items.len());

        for item in items {
            let image = resize_rgb(&image::DynamicImage::ImageRgb8(item.image), self.image_size as u32);
            images_data.extend(to_chw(&image));
            targets_data.push(item.label as i64);
        }

        build_batch(images_data, targets_data, self.image_size, device)
    }
}

/// Batcher that applies random augmentation to each item (training)
///
/// Every call draws a fresh RNG from `seed` and a batch counter, so a run
/// is reproducible for a given seed.
pub struct AugmentingBatcher {
    image_size: usize,
    augmenter: Augmenter,
    seed: u64,
    batch_counter: AtomicU64,
}

impl Clone for AugmentingBatcher {
    fn clone(&self) -> Self {
        Self {
            image_size: self.image_size,
            augmenter: self.augmenter.clone(),
            seed: self.seed,
            batch_counter: AtomicU64::new(self.batch_counter.load(Ordering::Relaxed)),
        }
    }
}

impl std::fmt::Debug for AugmentingBatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AugmentingBatcher")
            .field("image_size", &self.image_size)
            .field("config", self.augmenter.config())
            .finish()
    }
}

impl AugmentingBatcher {
    pub fn new(image_size: usize, config: AugmentationConfig, seed: u64) -> Self {
        Self {
            image_size,
            augmenter: Augmenter::new(config),
            seed,
            batch_counter: AtomicU64::new(0),
        }
    }
}

impl<B: Backend> Batcher<B, DetectorItem, DetectorBatch<B>> for AugmentingBatcher {
    fn batch(&self, items: Vec<DetectorItem>, device: &B::Device) -> DetectorBatch<B> {
        let batch_index = self.batch_counter.fetch_add(1, Ordering::Relaxed);
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(batch_index));

        let mut images_data = Vec::with_capacity(items.len() * 3 * self.image_size * self.image_size);
        let mut targets_data = Vec::with_capacity(items.len());

        for item in items {
            let image = resize_rgb(&image::DynamicImage::ImageRgb8(item.image), self.image_size as u32);
            let augmented = self.augmenter.augment(&image, &mut rng);
            images_data.extend(to_chw(&augmented));
            targets_data.push(item.label as i64);
        }

        build_batch(images_data, targets_data, self.image_size, device)
    }
}
