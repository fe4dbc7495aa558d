//! Fit loop
//!
//! A hand-written epoch loop over Burn's autodiff backend:
//! shuffled augmented training batches, validation after every epoch,
//! best-checkpoint saving, reduce-on-plateau and early stopping, all driven
//! by validation loss. The best checkpoint is then reloaded, evaluated on the
//! test split and written as the final artifact.

use std::path::PathBuf;
use std::time::Instant;

use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    module::AutodiffModule,
    nn::loss::BinaryCrossEntropyLossConfig,
    optim::{AdamConfig, GradientsParams, Optimizer},
    tensor::{
        backend::{AutodiffBackend, Backend},
        ElementConversion,
    },
};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

use super::checkpoint::{Checkpoint, CheckpointManager};
use super::config::TrainingConfig;
use super::early_stopping::EarlyStopping;
use super::evaluate::{evaluate_dataset, evaluate_test_split};
use super::history::{EpochMetrics, TrainingHistory};
use super::scheduler::ReduceLrOnPlateau;
use crate::dataset::{AugmentingBatcher, DatasetLayout, DetectorBatch, DetectorDataset};
use crate::inference::Predictor;
use crate::model::{AiImageDetector, DetectorConfig, ModelArtifact};
use crate::utils::error::{DeepscanError, Result};
use crate::utils::format_duration;

/// Outcome of a completed run
#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub epochs_run: usize,
    pub best_epoch: usize,
    pub best_val_loss: f64,
    pub test_accuracy: f64,
    pub model_path: PathBuf,
    pub history: TrainingHistory,
}

/// Run a full training job.
///
/// # Type Parameters
/// * `B` - The autodiff backend to train on (e.g. `Autodiff<NdArray>`)
pub fn run_training<B: AutodiffBackend>(config: &TrainingConfig) -> Result<TrainingSummary> {
    config.validate()?;
    let started = Instant::now();

    println!("{}", "Initializing Training...".green().bold());
    let device = B::Device::default();
    let inner_device = <B::InnerBackend as Backend>::Device::default();

    let layout = DatasetLayout::discover(&config.data.root)?;
    let (model, detector_config) = initial_model::<B>(config, &device)?;
    let image_size = detector_config.input_size;
    let model = model.freeze_backbone(config.model.trainable_backbone_units);

    let (train_dataset, val_dataset) = if config.data.cache_images {
        (
            DetectorDataset::new_cached(layout.train.clone(), image_size),
            DetectorDataset::new_cached(layout.val.clone(), image_size),
        )
    } else {
        (
            DetectorDataset::new(layout.train.clone(), image_size),
            DetectorDataset::new(layout.val.clone(), image_size),
        )
    };
    let batcher = AugmentingBatcher::new(image_size, config.augmentation.clone(), config.seed);

    let fit = &config.training;
    let [train_real, train_fake] = train_dataset.class_distribution();
    println!();
    println!("{}", "Training Configuration:".cyan().bold());
    println!("  Training samples:    {} (real {}, fake {})", train_dataset.len(), train_real, train_fake);
    println!("  Validation samples:  {}", val_dataset.len());
    println!("  Test samples:        {}", layout.test.len());
    println!("  Input size:          {}x{}", image_size, image_size);
    println!("  Epochs:              {}", fit.epochs);
    println!("  Batch size:          {}", fit.batch_size);
    println!("  Learning rate:       {:e}", fit.learning_rate);
    println!("  Trainable backbone:  last {} units", config.model.trainable_backbone_units);
    println!("  Device:              {:?}", device);
    println!();

    let checkpoints = CheckpointManager::new(&config.output.checkpoint_dir);
    checkpoints.clear()?;

    let mut model = model;
    let mut optimizer = AdamConfig::new().init();
    let loss_fn = BinaryCrossEntropyLossConfig::new().with_logits(true).init(&device);
    let mut scheduler = ReduceLrOnPlateau::new(fit.learning_rate, fit.lr_reduce_factor, fit.lr_reduce_patience)
        .with_min_delta(fit.lr_min_delta)
        .with_min_lr(fit.min_learning_rate);
    let mut early_stopping = EarlyStopping::new(fit.early_stopping_patience);
    let mut history = TrainingHistory::default();
    let mut epoch_rng = ChaCha8Rng::seed_from_u64(config.seed);

    println!("{}", "Starting Training...".green().bold());

    for epoch in 1..=fit.epochs {
        let lr = scheduler.lr();
        println!("{}", format!("Epoch {}/{}", epoch, fit.epochs).yellow().bold());

        let mut indices: Vec<usize> = (0..train_dataset.len()).collect();
        indices.shuffle(&mut epoch_rng);
        let num_batches = indices.len().div_ceil(fit.batch_size);

        let pb = epoch_progress_bar(num_batches);
        let mut loss_sum = 0.0f64;
        let mut correct = 0usize;
        let mut seen = 0usize;

        for batch_indices in indices.chunks(fit.batch_size) {
            let items: Vec<_> = batch_indices.iter().filter_map(|&i| train_dataset.get(i)).collect();
            if items.is_empty() {
                pb.inc(1);
                continue;
            }

            let batch: DetectorBatch<B> = batcher.batch(items, &device);
            let n = batch.targets.dims()[0];
            let logits = model.forward_train(batch.images).reshape([n]);
            let loss = loss_fn.forward(logits.clone(), batch.targets.clone());

            let loss_value: f64 = loss.clone().into_scalar().elem();
            if !loss_value.is_finite() {
                pb.abandon();
                return Err(DeepscanError::Training(format!(
                    "loss became non-finite in epoch {}",
                    epoch
                )));
            }

            let batch_correct: i64 = logits
                .greater_elem(0.0)
                .int()
                .equal(batch.targets)
                .int()
                .sum()
                .into_scalar()
                .elem();

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optimizer.step(lr, model, grads);

            loss_sum += loss_value * n as f64;
            correct += batch_correct as usize;
            seen += n;
            pb.set_message(format!("loss {:.4} acc {:.2}%", loss_sum / seen as f64, 100.0 * correct as f64 / seen as f64));
            pb.inc(1);
        }
        pb.finish_and_clear();

        if seen == 0 {
            return Err(DeepscanError::Dataset("no readable training images".to_string()));
        }
        let train_loss = loss_sum / seen as f64;
        let train_accuracy = correct as f64 / seen as f64;

        let valid_model = model.valid();
        let val = evaluate_dataset(&valid_model, &val_dataset, fit.batch_size, &inner_device)?;

        let improved = early_stopping.update(epoch, val.loss);
        if improved {
            checkpoints.save_best(
                &valid_model,
                &detector_config,
                &Checkpoint::new(epoch, val.loss, val.accuracy, lr),
            )?;
        }

        println!(
            "  {} loss: {:.4} | acc: {:.2}% | val_loss: {:.4} | val_acc: {:.2}% | lr: {:.1e} {}",
            "→".cyan(),
            train_loss,
            train_accuracy * 100.0,
            val.loss,
            val.accuracy * 100.0,
            lr,
            if improved { "(best)".green().to_string() } else { String::new() }
        );

        history.push(EpochMetrics {
            epoch,
            train_loss,
            train_accuracy,
            val_loss: val.loss,
            val_accuracy: val.accuracy,
            learning_rate: lr,
        });

        scheduler.step(val.loss);

        if early_stopping.should_stop() {
            info!(
                "Early stopping at epoch {}: no val_loss improvement for {} epochs (best {:.4} at epoch {})",
                epoch,
                fit.early_stopping_patience,
                early_stopping.best(),
                early_stopping.best_epoch().unwrap_or(0)
            );
            history.stopped_early = true;
            break;
        }
    }

    // Restore the best weights
    let (best_model, best) = checkpoints.load_best::<B::InnerBackend>(&inner_device)?;
    history.best_epoch = Some(best.epoch);
    println!();
    println!(
        "{} epoch {} (val_loss {:.4}, val_acc {:.2}%)",
        "Restored best model from".cyan(),
        best.epoch,
        best.val_loss,
        best.val_accuracy * 100.0
    );

    let report_dir = &config.output.report_dir;
    let predictor = Predictor::new(best_model.clone(), image_size, inner_device);
    let test_report = evaluate_test_split(&predictor, &layout.test)?;
    test_report.print();
    test_report.save_json(&report_dir.join("test_predictions.json"))?;

    let artifact = ModelArtifact::new(&config.output.model_path);
    artifact.save(&best_model, &detector_config)?;

    history.save_json(&report_dir.join("history.json"))?;
    if let Err(e) = history.write_charts(report_dir) {
        warn!("Failed to write training charts: {}", e);
    }

    println!();
    println!("{}", "Training Complete!".green().bold());
    println!("  Model saved to:   {:?}", artifact.weights_path());
    println!("  Reports in:       {:?}", report_dir);
    println!("  Total time:       {}", format_duration(started.elapsed().as_secs_f64()));

    Ok(TrainingSummary {
        epochs_run: history.epochs.len(),
        best_epoch: best.epoch,
        best_val_loss: best.val_loss,
        test_accuracy: test_report.accuracy,
        model_path: artifact.base().to_path_buf(),
        history,
    })
}

/// Fresh (optionally pretrained-backbone) model, or the resumed artifact.
fn initial_model<B: Backend>(
    config: &TrainingConfig,
    device: &B::Device,
) -> Result<(AiImageDetector<B>, DetectorConfig)> {
    if let Some(resume) = &config.output.resume {
        info!("Resuming from {:?}", resume);
        let (model, detector_config) = ModelArtifact::new(resume).load::<B>(device)?;
        if detector_config.input_size != config.model.input_size {
            warn!(
                "Resumed model uses input size {} (config says {}); keeping the model's",
                detector_config.input_size, config.model.input_size
            );
        }
        return Ok((model, detector_config));
    }

    let detector_config = config.detector_config();
    let mut model = detector_config.init::<B>(device);
    match &config.model.pretrained_backbone {
        Some(path) => {
            info!("Loading pretrained backbone from {:?}", path);
            model.backbone = model.backbone.load_pretrained(path, device)?;
        }
        None => warn!("No pretrained backbone configured; training from random initialization"),
    }
    Ok((model, detector_config))
}

fn epoch_progress_bar(num_batches: usize) -> ProgressBar {
    let pb = ProgressBar::new(num_batches as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("  [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TrainingBackend;
    use image::{Rgb, RgbImage};
    use std::path::Path;

    fn make_dataset(root: &Path) {
        for split in ["train", "val", "test"] {
            for (label, class) in ["real", "fake"].iter().enumerate() {
                let dir = root.join(split).join(class);
                std::fs::create_dir_all(&dir).unwrap();
                for i in 0..2u32 {
                    let img = RgbImage::from_fn(36, 36, |x, y| {
                        let v = ((x + y + i) % 255) as u8;
                        if label == 0 { Rgb([v, 80, 160]) } else { Rgb([200, v, 20]) }
                    });
                    img.save(dir.join(format!("{}_{}.png", class, i))).unwrap();
                }
            }
        }
    }

    #[test]
    fn test_training_run_produces_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("split_dataset");
        make_dataset(&data);

        let mut config = TrainingConfig::default();
        config.data.root = data;
        config.model.input_size = 32;
        config.training.epochs = 2;
        config.training.batch_size = 2;
        config.training.learning_rate = 1e-4;
        config.output.model_path = dir.path().join("model").join("best_model");
        config.output.checkpoint_dir = dir.path().join("tmp_checkpoint");
        config.output.report_dir = dir.path().join("output");

        let summary = run_training::<TrainingBackend>(&config).unwrap();

        let artifact = ModelArtifact::new(&config.output.model_path);
        assert!(artifact.exists());
        assert_eq!(summary.epochs_run, 2);
        assert!(summary.best_epoch >= 1 && summary.best_epoch <= 2);
        assert!((0.0..=1.0).contains(&summary.test_accuracy));
        assert!(config.output.report_dir.join("history.json").exists());
        assert!(config.output.report_dir.join("test_predictions.json").exists());
        assert!(config.output.report_dir.join("loss.svg").exists());

        // The artifact is loadable for inference
        let predictor = Predictor::<crate::backend::DefaultBackend>::from_artifact(
            &artifact,
            Default::default(),
        )
        .unwrap();
        assert_eq!(predictor.image_size(), 32);
    }

    #[test]
    fn test_missing_split_fails_without_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("split_dataset");
        std::fs::create_dir_all(data.join("train").join("real")).unwrap();

        let mut config = TrainingConfig::default();
        config.data.root = data;
        config.output.model_path = dir.path().join("model").join("best_model");
        config.output.checkpoint_dir = dir.path().join("tmp_checkpoint");

        assert!(run_training::<TrainingBackend>(&config).is_err());
        assert!(!ModelArtifact::new(&config.output.model_path).exists());
    }
}
