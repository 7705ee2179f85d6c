// MobileNet v1 (Howard et al., 2017) and FD-MobileNet
// (Qin et al., 2018, fast downsampling).
//
// Both are a stem conv followed by depthwise-separable blocks:
// 3x3 depthwise conv + BN + ReLU, then 1x1 pointwise conv + BN + ReLU.
// They differ only in channel layout and whether the first stage
// downsamples.

use burn::prelude::*;

use super::common::{scale_channels, ClassifierHead, ConvBlock, ConvSpec};

#[derive(Config, Debug)]
pub struct MobileNetConfig {
    pub num_classes: usize,
    pub width_scale: f64,
    /// Use the fast-downsampling layout
    #[config(default = false)]
    pub fast_downsampling: bool,
}

impl MobileNetConfig {
    fn channels(&self) -> Vec<Vec<usize>> {
        let base: Vec<Vec<usize>> = if self.fast_downsampling {
            vec![
                vec![32],
                vec![64],
                vec![128, 128],
                vec![256, 256],
                vec![512, 512, 512, 512, 512, 1024],
            ]
        } else {
            vec![
                vec![32],
                vec![64],
                vec![128, 128],
                vec![256, 256],
                vec![512, 512, 512, 512, 512, 512],
                vec![1024, 1024],
            ]
        };
        base.into_iter()
            .map(|stage| stage.into_iter().map(|c| scale_channels(c, self.width_scale)).collect())
            .collect()
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> MobileNet<B> {
        let channels = self.channels();
        let init_channels = channels[0][0];
        let init = ConvSpec::new(3, init_channels, 3).stride(2).bn(true, device);

        let mut in_channels = init_channels;
        let mut blocks = Vec::new();
        for (i, stage) in channels[1..].iter().enumerate() {
            for (j, &out) in stage.iter().enumerate() {
                let downsample = j == 0 && (i != 0 || self.fast_downsampling);
                let stride = if downsample { 2 } else { 1 };
                blocks.push(DwsConvBlock {
                    dw: ConvSpec::depthwise(in_channels, 3).stride(stride).bn(true, device),
                    pw: ConvSpec::new(in_channels, out, 1).bn(true, device),
                });
                in_channels = out;
            }
        }

        MobileNet {
            init,
            blocks,
            head: ClassifierHead::new(in_channels, self.num_classes, device),
        }
    }
}

/// Depthwise-separable convolution block
#[derive(Module, Debug)]
pub struct DwsConvBlock<B: Backend> {
    pub dw: ConvBlock<B>,
    pub pw: ConvBlock<B>,
}

#[derive(Module, Debug)]
pub struct MobileNet<B: Backend> {
    pub init: ConvBlock<B>,
    pub blocks: Vec<DwsConvBlock<B>>,
    pub head: ClassifierHead<B>,
}

impl<B: Backend> MobileNet<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = self.init.forward(x);
        for block in &self.blocks {
            x = block.pw.forward(block.dw.forward(x));
        }
        self.head.forward(x)
    }
}
