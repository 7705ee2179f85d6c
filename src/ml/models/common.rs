// Building blocks shared by every architecture family.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
        BatchNorm, BatchNormConfig, Linear, LinearConfig, PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::relu,
};

/// A convolution stored as one `Conv2d` per group.
///
/// Grouped kernels that are not depthwise are split into `groups`
/// dense convolutions over contiguous channel slices and concatenated,
/// which computes the same function as `Conv2dConfig::with_groups`.
/// Dense and depthwise kernels keep a single native `Conv2d`.
/// The ndarray backend's grouped conv2d fails on some channel counts.
#[derive(Module, Debug)]
pub struct GroupConv<B: Backend> {
    pub branches: Vec<Conv2d<B>>,
}

impl<B: Backend> GroupConv<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        if let [conv] = self.branches.as_slice() {
            return conv.forward(x);
        }
        let parts = x
            .chunk(self.branches.len(), 1)
            .into_iter()
            .zip(&self.branches)
            .map(|(part, conv)| conv.forward(part))
            .collect();
        Tensor::cat(parts, 1)
    }
}

/// Convolution, optional batch norm, optional ReLU.
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub conv: GroupConv<B>,
    pub bn: Option<BatchNorm<B>>,
    pub activate: bool,
}

impl<B: Backend> ConvBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = match &self.bn {
            Some(bn) => bn.forward(x),
            None => x,
        };
        if self.activate {
            relu(x)
        } else {
            x
        }
    }
}

/// Geometry of a square convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvSpec {
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel: usize,
    pub stride: usize,
    pub padding: usize,
    pub groups: usize,
}

impl ConvSpec {
    pub fn new(in_channels: usize, out_channels: usize, kernel: usize) -> Self {
        Self {
            in_channels,
            out_channels,
            kernel,
            stride: 1,
            padding: kernel / 2,
            groups: 1,
        }
    }

    pub fn stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    pub fn padding(mut self, padding: usize) -> Self {
        self.padding = padding;
        self
    }

    pub fn groups(mut self, groups: usize) -> Self {
        self.groups = groups;
        self
    }

    /// Depthwise: one group per channel
    pub fn depthwise(channels: usize, kernel: usize) -> Self {
        Self::new(channels, channels, kernel).groups(channels)
    }

    /// Grouped but not depthwise
    pub fn is_split(&self) -> bool {
        self.groups > 1 && self.groups != self.in_channels
    }

    fn dense<B: Backend>(&self, channels: [usize; 2], groups: usize, bias: bool, device: &B::Device) -> Conv2d<B> {
        Conv2dConfig::new(channels, [self.kernel, self.kernel])
            .with_stride([self.stride, self.stride])
            .with_padding(PaddingConfig2d::Explicit(self.padding, self.padding))
            .with_groups(groups)
            .with_bias(bias)
            .init(device)
    }

    fn conv<B: Backend>(&self, bias: bool, device: &B::Device) -> GroupConv<B> {
        let branches = if self.is_split() {
            let per_group = [self.in_channels / self.groups, self.out_channels / self.groups];
            (0..self.groups)
                .map(|_| self.dense(per_group, 1, bias, device))
                .collect()
        } else {
            vec![self.dense([self.in_channels, self.out_channels], self.groups, bias, device)]
        };
        GroupConv { branches }
    }

    /// Bias-free conv followed by batch norm
    pub fn bn<B: Backend>(&self, activate: bool, device: &B::Device) -> ConvBlock<B> {
        ConvBlock {
            conv: self.conv(false, device),
            bn: Some(BatchNormConfig::new(self.out_channels).init(device)),
            activate,
        }
    }

    /// Conv with bias and no normalisation
    pub fn plain<B: Backend>(&self, activate: bool, device: &B::Device) -> ConvBlock<B> {
        ConvBlock {
            conv: self.conv(true, device),
            bn: None,
            activate,
        }
    }
}

/// Global average pool followed by a linear classifier.
#[derive(Module, Debug)]
pub struct ClassifierHead<B: Backend> {
    pub pool: AdaptiveAvgPool2d,
    pub fc: Linear<B>,
}

impl<B: Backend> ClassifierHead<B> {
    pub fn new(in_features: usize, num_classes: usize, device: &B::Device) -> Self {
        Self {
            pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc: LinearConfig::new(in_features, num_classes).init(device),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.pool.forward(x).flatten::<2>(1, 3);
        self.fc.forward(x)
    }
}

/// Interleave channels across groups:
/// [b, g * n, h, w] → [b, g, n, h, w] → [b, n, g, h, w] → [b, g * n, h, w]
pub fn channel_shuffle<B: Backend>(x: Tensor<B, 4>, groups: usize) -> Tensor<B, 4> {
    if groups <= 1 {
        return x;
    }
    let [b, c, h, w] = x.dims();
    x.reshape([b, groups, c / groups, h, w])
        .swap_dims(1, 2)
        .reshape([b, c, h, w])
}

/// Scale a channel count by a width multiplier, truncating like `int(c * s)`.
pub fn scale_channels(channels: usize, width_scale: f64) -> usize {
    ((channels as f64) * width_scale) as usize
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::{
        backend::NdArray,
        tensor::{module::conv2d, ops::ConvOptions, Distribution, TensorData},
    };

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_channel_shuffle_order() {
        let device = Default::default();
        // 6 channels, one pixel each, values = channel index
        let data: Vec<f32> = (0..6).map(|c| c as f32).collect();
        let x = Tensor::<TestBackend, 4>::from_data(TensorData::new(data, [1, 6, 1, 1]), &device);
        let y: Vec<f32> = channel_shuffle(x, 2).into_data().to_vec().unwrap();
        assert_eq!(y, vec![0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);
    }

    #[test]
    fn test_split_conv_matches_native_grouped_conv() {
        let device = Default::default();
        let spec = ConvSpec::new(4, 6, 1).groups(2);
        let block = spec.plain::<TestBackend>(false, &device);
        assert_eq!(block.conv.branches.len(), 2);

        // Same weights as one native grouped conv: stack the per-group kernels
        let weight = Tensor::cat(
            block.conv.branches.iter().map(|c| c.weight.val()).collect(),
            0,
        );
        let bias = Tensor::cat(
            block
                .conv
                .branches
                .iter()
                .filter_map(|c| c.bias.as_ref().map(|b| b.val()))
                .collect(),
            0,
        );
        let x = Tensor::<TestBackend, 4>::random([2, 4, 3, 3], Distribution::Default, &device);
        let expected = conv2d(x.clone(), weight, Some(bias), ConvOptions::new([1, 1], [0, 0], [1, 1], 2));
        let got: Vec<f32> = block.forward(x).into_data().to_vec().unwrap();
        let want: Vec<f32> = expected.into_data().to_vec().unwrap();
        assert_eq!(got.len(), 2 * 6 * 9);
        for (a, b) in got.iter().zip(&want) {
            assert!((a - b).abs() < 1e-5, "{a} != {b}");
        }
    }

    #[test]
    fn test_depthwise_and_dense_stay_native() {
        let device = Default::default();
        let dw = ConvSpec::depthwise(32, 3).bn::<TestBackend>(true, &device);
        assert_eq!(dw.conv.branches.len(), 1);
        let dense = ConvSpec::new(16, 64, 1).bn::<TestBackend>(true, &device);
        assert_eq!(dense.conv.branches.len(), 1);
        // 64 -> 64 with two groups, 32 output channels per group
        let grouped = ConvSpec::new(64, 64, 1).groups(2).bn::<TestBackend>(true, &device);
        assert_eq!(grouped.conv.branches.len(), 2);
        let y = grouped.forward(Tensor::zeros([1, 64, 4, 4], &device));
        assert_eq!(y.dims(), [1, 64, 4, 4]);
    }

    #[test]
    fn test_scale_channels_truncates() {
        assert_eq!(scale_channels(24, 0.25), 6);
        assert_eq!(scale_channels(272, 0.5), 136);
        assert_eq!(scale_channels(32, 0.75), 24);
    }
}
