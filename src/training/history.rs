//! Per-epoch training history, saved as JSON and rendered as SVG charts

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::utils::charts::{generate_line_chart, DataSeries, YAxis, COLOR_PRIMARY, COLOR_SECONDARY};
use crate::utils::error::Result;

/// Metrics for one epoch. Accuracies are fractions in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub train_loss: f64,
    pub train_accuracy: f64,
    pub val_loss: f64,
    pub val_accuracy: f64,
    pub learning_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochMetrics>,
    pub best_epoch: Option<usize>,
    pub stopped_early: bool,
}

impl TrainingHistory {
    pub fn push(&mut self, metrics: EpochMetrics) {
        self.epochs.push(metrics);
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Write `accuracy.svg` and `loss.svg` into `dir`
    pub fn write_charts(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;

        let collect = |f: fn(&EpochMetrics) -> f64| self.epochs.iter().map(f).collect::<Vec<_>>();

        let accuracy = [
            DataSeries::from_values("train", COLOR_PRIMARY, &collect(|m| m.train_accuracy * 100.0)),
            DataSeries::from_values("validation", COLOR_SECONDARY, &collect(|m| m.val_accuracy * 100.0)),
        ];
        generate_line_chart(
            "Model Accuracy",
            "Epoch",
            "Accuracy (%)",
            &accuracy,
            YAxis::Percent,
            &dir.join("accuracy.svg"),
        )?;

        let loss = [
            DataSeries::from_values("train", COLOR_PRIMARY, &collect(|m| m.train_loss)),
            DataSeries::from_values("validation", COLOR_SECONDARY, &collect(|m| m.val_loss)),
        ];
        generate_line_chart("Model Loss", "Epoch", "Loss", &loss, YAxis::Auto, &dir.join("loss.svg"))?;

        Ok(())
    }
}
