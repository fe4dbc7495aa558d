//! Reduce-on-plateau learning rate policy
//!
//! Multiplies the learning rate by `factor` once the monitored metric
//! (validation loss, lower is better) has failed to improve by more than
//! `min_delta` for `patience` consecutive epochs.

use tracing::info;

#[derive(Debug, Clone)]
pub struct ReduceLrOnPlateau {
    factor: f64,
    patience: usize,
    min_delta: f64,
    min_lr: f64,
    current_lr: f64,
    best: Option<f64>,
    wait: usize,
}

impl ReduceLrOnPlateau {
    pub fn new(initial_lr: f64, factor: f64, patience: usize) -> Self {
        Self {
            factor,
            patience,
            min_delta: 1e-4,
            min_lr: 0.0,
            current_lr: initial_lr,
            best: None,
            wait: 0,
        }
    }

    pub fn with_min_delta(mut self, min_delta: f64) -> Self {
        self.min_delta = min_delta;
        self
    }

    pub fn with_min_lr(mut self, min_lr: f64) -> Self {
        self.min_lr = min_lr;
        self
    }

    pub fn lr(&self) -> f64 {
        self.current_lr
    }

    /// Record an epoch's metric and return the learning rate for the next epoch.
    pub fn step(&mut self, metric: f64) -> f64 {
        let improved = match self.best {
            Some(best) => metric < best - self.min_delta,
            None => true,
        };

        if improved {
            self.best = Some(metric);
            self.wait = 0;
            return self.current_lr;
        }

        self.wait += 1;
        if self.wait >= self.patience && self.current_lr > self.min_lr {
            let new_lr = (self.current_lr * self.factor).max(self.min_lr);
            info!("Reducing learning rate {:.3e} -> {:.3e}", self.current_lr, new_lr);
            self.current_lr = new_lr;
            self.wait = 0;
        }

        self.current_lr
    }
}
