//! Real/fake image classifier
//!
//! EfficientNet-B0 features followed by a small dense head:
//!
//! ```text
//! backbone (1280) → Dense(512, ReLU) → Dropout(0.5) → Dense(128, ReLU) → Dense(1) → sigmoid
//! ```
//!
//! `forward` returns the pre-sigmoid logit so the loss can use the
//! numerically stable logits form of binary cross-entropy.

use burn::{
    config::Config,
    module::Module,
    nn::{Dropout, DropoutConfig, Linear, LinearConfig, Relu},
    tensor::{
        activation::sigmoid,
        backend::{AutodiffBackend, Backend},
        Tensor,
    },
};

use super::efficientnet::{EfficientNetB0, FEATURE_DIM};

/// Architecture hyperparameters, persisted next to the trained weights
#[derive(Config, Debug, PartialEq)]
pub struct DetectorConfig {
    /// Square input resolution in pixels
    #[config(default = "128")]
    pub input_size: usize,

    /// Width of the first dense layer
    #[config(default = "512")]
    pub dense_units: usize,

    /// Width of the second dense layer
    #[config(default = "128")]
    pub hidden_units: usize,

    /// Dropout between the two dense layers
    #[config(default = "0.5")]
    pub dropout: f64,
}

impl DetectorConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> AiImageDetector<B> {
        AiImageDetector::new(self, device)
    }
}

/// Binary classifier: probability that an image is AI-generated
#[derive(Module, Debug)]
pub struct AiImageDetector<B: Backend> {
    pub backbone: EfficientNetB0<B>,
    pub dense: Linear<B>,
    pub dropout: Dropout,
    pub hidden: Linear<B>,
    pub output: Linear<B>,
    pub relu: Relu,
}

impl<B: Backend> AiImageDetector<B> {
    pub fn new(config: &DetectorConfig, device: &B::Device) -> Self {
        Self {
            backbone: EfficientNetB0::new(device),
            dense: LinearConfig::new(FEATURE_DIM, config.dense_units).init(device),
            dropout: DropoutConfig::new(config.dropout).init(),
            hidden: LinearConfig::new(config.dense_units, config.hidden_units).init(device),
            output: LinearConfig::new(config.hidden_units, 1).init(device),
            relu: Relu::new(),
        }
    }

    /// Freeze all backbone units except the last `trainable`; the head stays trainable.
    pub fn freeze_backbone(mut self, trainable: usize) -> Self {
        self.backbone = self.backbone.freeze_all_but_last(trainable);
        self
    }

    /// # Arguments
    /// * `x` - Images `[batch, 3, size, size]` with values in [0, 1]
    ///
    /// # Returns
    /// * Logits `[batch, 1]`
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        self.forward_head(self.backbone.forward(x))
    }

    fn forward_head(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.relu.forward(self.dense.forward(features));
        let x = self.dropout.forward(x);
        let x = self.relu.forward(self.hidden.forward(x));
        self.output.forward(x)
    }

    /// Sigmoid probabilities `[batch, 1]`
    pub fn forward_probability(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        sigmoid(self.forward(x))
    }
}

impl<B: AutodiffBackend> AiImageDetector<B> {
    /// Logits for a training step; frozen backbone units run in inference mode
    pub fn forward_train(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        self.forward_head(self.backbone.forward_train(x))
    }
}
