//! EfficientNet-B0 feature extractor
//!
//! Stem, seven stages of MBConv blocks (depthwise separable convolutions with
//! squeeze-and-excitation and SiLU), a 1x1 head conv to 1280 channels and
//! global max pooling. Output is a `[batch, 1280]` feature vector.
//!
//! The network is split into 18 "units" (stem, 16 blocks, head) so training
//! can freeze everything except the last few.

use burn::{
    module::{AutodiffModule, Module},
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, BatchNormConfig, PaddingConfig2d,
    },
    record::CompactRecorder,
    tensor::{
        activation::{sigmoid, silu},
        backend::{AutodiffBackend, Backend},
        Tensor,
    },
};
use std::path::Path;

use crate::utils::error::{DeepscanError, Result};

/// Channels produced by the backbone
pub const FEATURE_DIM: usize = 1280;

const STEM_CHANNELS: usize = 32;
const SE_RATIO: f64 = 0.25;

/// (expand_ratio, kernel, stride, in_channels, out_channels, repeats)
const B0_STAGES: [(usize, usize, usize, usize, usize, usize); 7] = [
    (1, 3, 1, 32, 16, 1),
    (6, 3, 2, 16, 24, 2),
    (6, 5, 2, 24, 40, 2),
    (6, 3, 2, 40, 80, 3),
    (6, 5, 1, 80, 112, 3),
    (6, 5, 2, 112, 192, 4),
    (6, 3, 1, 192, 320, 1),
];

/// Convolution followed by batch norm (no activation)
#[derive(Module, Debug)]
pub struct ConvBn<B: Backend> {
    pub conv: Conv2d<B>,
    pub bn: BatchNorm<B, 2>,
}

impl<B: Backend> ConvBn<B> {
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        groups: usize,
        device: &B::Device,
    ) -> Self {
        let pad = kernel_size / 2;
        let conv = Conv2dConfig::new([in_channels, out_channels], [kernel_size, kernel_size])
            .with_stride([stride, stride])
            .with_padding(PaddingConfig2d::Explicit(pad, pad))
            .with_groups(groups)
            .with_bias(false)
            .init(device);
        let bn = BatchNormConfig::new(out_channels).init(device);

        Self { conv, bn }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.bn.forward(self.conv.forward(x))
    }
}

/// Mobile inverted bottleneck block
#[derive(Module, Debug)]
pub struct MbConv<B: Backend> {
    pub expand: Option<ConvBn<B>>,
    pub depthwise: ConvBn<B>,
    pub se_reduce: Conv2d<B>,
    pub se_expand: Conv2d<B>,
    pub project: ConvBn<B>,
}

impl<B: Backend> MbConv<B> {
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        expand_ratio: usize,
        kernel_size: usize,
        stride: usize,
        device: &B::Device,
    ) -> Self {
        let hidden = in_channels * expand_ratio;
        let squeezed = ((in_channels as f64 * SE_RATIO) as usize).max(1);

        let expand = (expand_ratio != 1).then(|| ConvBn::new(in_channels, hidden, 1, 1, 1, device));
        let depthwise = ConvBn::new(hidden, hidden, kernel_size, stride, hidden, device);
        let se_reduce = Conv2dConfig::new([hidden, squeezed], [1, 1]).init(device);
        let se_expand = Conv2dConfig::new([squeezed, hidden], [1, 1]).init(device);
        let project = ConvBn::new(hidden, out_channels, 1, 1, 1, device);

        Self {
            expand,
            depthwise,
            se_reduce,
            se_expand,
            project,
        }
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = match &self.expand {
            Some(expand) => silu(expand.forward(input.clone())),
            None => input.clone(),
        };
        let x = silu(self.depthwise.forward(x));

        // Squeeze-and-excitation
        let scale = x.clone().mean_dim(2).mean_dim(3);
        let scale = silu(self.se_reduce.forward(scale));
        let scale = sigmoid(self.se_expand.forward(scale));
        let x = x * scale;

        let x = self.project.forward(x);

        // Identity skip only when shape is preserved (stride 1, same channels)
        if x.dims() == input.dims() {
            x + input
        } else {
            x
        }
    }
}

/// EfficientNet-B0 backbone with global max pooling
#[derive(Module, Debug)]
pub struct EfficientNetB0<B: Backend> {
    pub stem: ConvBn<B>,
    pub blocks: Vec<MbConv<B>>,
    pub head: ConvBn<B>,
    /// Leading units excluded from training (not persisted)
    frozen_units: usize,
}

impl<B: Backend> EfficientNetB0<B> {
    pub fn new(device: &B::Device) -> Self {
        let stem = ConvBn::new(3, STEM_CHANNELS, 3, 2, 1, device);

        let mut blocks = Vec::new();
        for (expand, kernel, stride, in_ch, out_ch, repeats) in B0_STAGES {
            for i in 0..repeats {
                let (block_in, block_stride) = if i == 0 { (in_ch, stride) } else { (out_ch, 1) };
                blocks.push(MbConv::new(block_in, out_ch, expand, kernel, block_stride, device));
            }
        }

        let head = ConvBn::new(B0_STAGES[6].4, FEATURE_DIM, 1, 1, 1, device);

        Self {
            stem,
            blocks,
            head,
            frozen_units: 0,
        }
    }

    /// Initialize from a saved backbone record (e.g. ImageNet-pretrained weights).
    pub fn load_pretrained(self, path: &Path, device: &B::Device) -> Result<Self> {
        self.load_file(path.to_path_buf(), &CompactRecorder::new(), device)
            .map_err(|e| DeepscanError::Model(format!("Failed to load backbone weights {:?}: {:?}", path, e)))
    }

    /// Stem + blocks + head
    pub fn num_units(&self) -> usize {
        self.blocks.len() + 2
    }

    pub fn frozen_units(&self) -> usize {
        self.frozen_units
    }

    /// Freeze every unit except the last `trainable` ones.
    ///
    /// Frozen units get no gradients, and [`forward_train`](Self::forward_train)
    /// runs them in inference mode so their batch-norm statistics stay fixed.
    pub fn freeze_all_but_last(self, trainable: usize) -> Self {
        let frozen = self.num_units().saturating_sub(trainable);
        let freeze = |unit: usize| unit < frozen;

        let stem = if freeze(0) { self.stem.no_grad() } else { self.stem };
        let blocks = self
            .blocks
            .into_iter()
            .enumerate()
            .map(|(i, block)| if freeze(i + 1) { block.no_grad() } else { block })
            .collect::<Vec<_>>();
        let head_unit = blocks.len() + 1;
        let head = if freeze(head_unit) { self.head.no_grad() } else { self.head };

        Self {
            stem,
            blocks,
            head,
            frozen_units: frozen,
        }
    }

    /// Unit 0 is the stem, 1..=16 the MBConv blocks, 17 the head.
    fn forward_unit(&self, unit: usize, x: Tensor<B, 4>) -> Tensor<B, 4> {
        match unit {
            0 => silu(self.stem.forward(x)),
            u if u <= self.blocks.len() => self.blocks[u - 1].forward(x),
            _ => silu(self.head.forward(x)),
        }
    }

    /// # Arguments
    /// * `x` - Images `[batch, 3, height, width]`
    ///
    /// # Returns
    /// * Pooled features `[batch, 1280]`
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = (0..self.num_units()).fold(x, |x, unit| self.forward_unit(unit, x));
        global_max_pool(x)
    }
}

impl<B: AutodiffBackend> EfficientNetB0<B> {
    /// Training forward pass.
    ///
    /// The frozen prefix runs on the inner backend in inference mode; only the
    /// trainable units see the autodiff graph and update batch-norm statistics.
    pub fn forward_train(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let frozen = self.frozen_units.min(self.num_units());

        let x = if frozen > 0 {
            let prefix = self.clone().valid();
            let inner = (0..frozen).fold(x.inner(), |x, unit| prefix.forward_unit(unit, x));
            Tensor::from_inner(inner)
        } else {
            x
        };

        let x = (frozen..self.num_units()).fold(x, |x, unit| self.forward_unit(unit, x));
        global_max_pool(x)
    }
}

/// `[B, C, H, W] -> [B, C]`
fn global_max_pool<B: Backend>(x: Tensor<B, 4>) -> Tensor<B, 2> {
    let x = x.max_dim(3).max_dim(2);
    let [batch_size, channels, _, _] = x.dims();
    x.reshape([batch_size, channels])
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::Autodiff;
    use burn::tensor::{Distribution, ElementConversion};
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_block_count() {
        let device = Default::default();
        let model = EfficientNetB0::<TestBackend>::new(&device);
        assert_eq!(model.blocks.len(), 16);
        assert_eq!(model.num_units(), 18);
    }

    #[test]
    fn test_feature_shape() {
        let device = Default::default();
        let model = EfficientNetB0::<TestBackend>::new(&device);
        let input = Tensor::<TestBackend, 4>::zeros([2, 3, 32, 32], &device);
        let features = model.forward(input);
        assert_eq!(features.dims(), [2, FEATURE_DIM]);
    }

    #[test]
    fn test_mbconv_residual_shape() {
        let device = Default::default();
        let block = MbConv::<TestBackend>::new(16, 16, 6, 3, 1, &device);
        let input = Tensor::<TestBackend, 4>::ones([1, 16, 8, 8], &device);
        assert_eq!(block.forward(input).dims(), [1, 16, 8, 8]);

        let down = MbConv::<TestBackend>::new(16, 24, 6, 5, 2, &device);
        let input = Tensor::<TestBackend, 4>::ones([1, 16, 8, 8], &device);
        assert_eq!(down.forward(input).dims(), [1, 24, 4, 4]);
    }

    #[test]
    fn test_freeze_all_but_last() {
        let device = Default::default();
        let model = EfficientNetB0::<Autodiff<TestBackend>>::new(&device).freeze_all_but_last(3);

        assert!(!model.stem.conv.weight.is_require_grad());
        assert!(!model.blocks[13].depthwise.conv.weight.is_require_grad());
        assert!(model.blocks[14].depthwise.conv.weight.is_require_grad());
        assert!(model.blocks[15].project.conv.weight.is_require_grad());
        assert!(model.head.conv.weight.is_require_grad());
        assert_eq!(model.frozen_units(), 15);
    }

    fn running_mean_magnitude<B: Backend>(bn: &BatchNorm<B, 2>) -> f32 {
        bn.running_mean.value().abs().sum().into_scalar().elem::<f32>()
    }

    #[test]
    fn test_forward_train_keeps_frozen_batch_norm_statistics() {
        type TrainBackend = Autodiff<TestBackend>;
        let device = Default::default();
        let model = EfficientNetB0::<TrainBackend>::new(&device).freeze_all_but_last(3);

        let input = Tensor::<TrainBackend, 4>::random([2, 3, 32, 32], Distribution::Uniform(0.0, 1.0), &device);
        let features = model.forward_train(input);
        assert_eq!(features.dims(), [2, FEATURE_DIM]);

        assert_eq!(running_mean_magnitude(&model.stem.bn), 0.0);
        assert_eq!(running_mean_magnitude(&model.blocks[0].depthwise.bn), 0.0);
        assert!(running_mean_magnitude(&model.head.bn) > 0.0);
    }

    #[test]
    fn test_forward_train_matches_shape_when_unfrozen() {
        type TrainBackend = Autodiff<TestBackend>;
        let device = Default::default();
        let model = EfficientNetB0::<TrainBackend>::new(&device);
        assert_eq!(model.frozen_units(), 0);

        let input = Tensor::<TrainBackend, 4>::ones([1, 3, 32, 32], &device);
        assert_eq!(model.forward_train(input).dims(), [1, FEATURE_DIM]);
    }
}
