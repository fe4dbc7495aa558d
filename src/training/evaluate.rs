//! Validation metrics and the per-file test report

use std::fs;
use std::path::Path;

use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    nn::loss::BinaryCrossEntropyLossConfig,
    tensor::{backend::Backend, ElementConversion},
};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::dataset::{class_name, DetectorBatch, DetectorBatcher, DetectorDataset, ImageSample};
use crate::inference::{preprocess::load_image_file, Predictor, DECISION_THRESHOLD};
use crate::model::AiImageDetector;
use crate::utils::error::{DeepscanError, Result};

/// Loss and accuracy over a dataset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalMetrics {
    pub loss: f64,
    pub accuracy: f64,
    pub samples: usize,
}

/// Mean binary cross-entropy and accuracy of `model` over `dataset`.
pub fn evaluate_dataset<B: Backend>(
    model: &AiImageDetector<B>,
    dataset: &DetectorDataset,
    batch_size: usize,
    device: &B::Device,
) -> Result<EvalMetrics> {
    let batcher = DetectorBatcher::new(dataset.image_size());
    let loss_fn = BinaryCrossEntropyLossConfig::new().with_logits(true).init(device);

    let mut loss_sum = 0.0f64;
    let mut correct = 0usize;
    let mut total = 0usize;

    let indices: Vec<usize> = (0..dataset.len()).collect();
    for chunk in indices.chunks(batch_size.max(1)) {
        let items: Vec<_> = chunk.iter().filter_map(|&i| dataset.get(i)).collect();
        if items.is_empty() {
            continue;
        }

        let batch: DetectorBatch<B> = batcher.batch(items, device);
        let n = batch.targets.dims()[0];
        let logits = model.forward(batch.images).reshape([n]);

        let loss: f64 = loss_fn
            .forward(logits.clone(), batch.targets.clone())
            .into_scalar()
            .elem();
        loss_sum += loss * n as f64;

        let batch_correct: i64 = logits
            .greater_elem(0.0)
            .int()
            .equal(batch.targets)
            .int()
            .sum()
            .into_scalar()
            .elem();
        correct += batch_correct as usize;
        total += n;
    }

    if total == 0 {
        return Err(DeepscanError::Dataset("no readable images to evaluate".to_string()));
    }

    Ok(EvalMetrics {
        loss: loss_sum / total as f64,
        accuracy: correct as f64 / total as f64,
        samples: total,
    })
}

/// Prediction for one test image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestPrediction {
    /// Split-relative filename, e.g. `fake/0042.png`
    pub filename: String,
    pub label: String,
    /// Probability of "fake"
    pub prediction: f32,
    pub predicted: String,
}

impl TestPrediction {
    pub fn is_correct(&self) -> bool {
        self.label == self.predicted
    }
}

/// Test-split predictions with summary metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestReport {
    pub predictions: Vec<TestPrediction>,
    pub accuracy: f64,
    pub loss: f64,
    /// Files that could not be read
    pub skipped: Vec<String>,
}

impl TestReport {
    pub fn save_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Print the per-file table followed by accuracy
    pub fn print(&self) {
        println!();
        println!("{}", "Test Predictions:".cyan().bold());
        println!("  {:<48} {:>6} {:>10} {:>6}", "File", "Label", "Prediction", "");
        for p in &self.predictions {
            let mark = if p.is_correct() { "✓".green() } else { "✗".red() };
            println!("  {:<48} {:>6} {:>10.4} {:>6}", p.filename, p.label, p.prediction, mark);
        }
        println!();
        println!(
            "  Test accuracy: {:.2}%  |  Test loss: {:.4}  |  {} images",
            self.accuracy * 100.0,
            self.loss,
            self.predictions.len()
        );
        if !self.skipped.is_empty() {
            println!("  {} {} unreadable files skipped", "!".yellow(), self.skipped.len());
        }
    }
}

/// Score every test sample one at a time, in the given (sorted) order.
pub fn evaluate_test_split<B: Backend>(predictor: &Predictor<B>, samples: &[ImageSample]) -> Result<TestReport> {
    let mut report = TestReport::default();
    let mut loss_sum = 0.0f64;
    let mut correct = 0usize;

    for sample in samples {
        let score = match load_image_file(&sample.path).and_then(|img| predictor.predict_image(&img)) {
            Ok(score) => score,
            Err(e) => {
                warn!("Skipping {}: {}", sample.filename, e);
                report.skipped.push(sample.filename.clone());
                continue;
            }
        };

        let predicted = usize::from(score as f64 > DECISION_THRESHOLD);
        if predicted == sample.label {
            correct += 1;
        }
        loss_sum += binary_cross_entropy(score as f64, sample.label);

        report.predictions.push(TestPrediction {
            filename: sample.filename.clone(),
            label: class_name(sample.label).to_string(),
            prediction: score,
            predicted: class_name(predicted).to_string(),
        });
    }

    let n = report.predictions.len();
    if n == 0 {
        return Err(DeepscanError::Dataset("no readable test images".to_string()));
    }
    report.accuracy = correct as f64 / n as f64;
    report.loss = loss_sum / n as f64;

    info!("Test accuracy {:.4} over {} images", report.accuracy, n);
    Ok(report)
}

fn binary_cross_entropy(p: f64, label: usize) -> f64 {
    let p = p.clamp(1e-7, 1.0 - 1e-7);
    if label == 1 {
        -p.ln()
    } else {
        -(1.0 - p).ln()
    }
}
