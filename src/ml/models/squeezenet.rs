// SqueezeNet v1.0 / v1.1 (Iandola et al., 2016).
//
// Fire unit: 1x1 squeeze to out/8 channels, then parallel 1x1 and
// 3x3 expands of out/2 channels each, concatenated.

use burn::{
    nn::{
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig,
    },
    prelude::*,
};
use serde::{Deserialize, Serialize};

use super::common::{ConvBlock, ConvSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SqueezeNetVersion {
    V1_0,
    V1_1,
}

#[derive(Config, Debug)]
pub struct SqueezeNetConfig {
    pub num_classes: usize,
    pub version: SqueezeNetVersion,
    #[config(default = 0.5)]
    pub dropout: f64,
}

impl SqueezeNetConfig {
    /// (init kernel, init channels, fire output channels per stage)
    fn layout(&self) -> (usize, usize, Vec<Vec<usize>>) {
        match self.version {
            SqueezeNetVersion::V1_0 => (
                7,
                96,
                vec![vec![128, 128, 256], vec![256, 384, 384, 512], vec![512]],
            ),
            SqueezeNetVersion::V1_1 => (
                3,
                64,
                vec![vec![128, 128], vec![256, 256], vec![384, 384, 512, 512]],
            ),
        }
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> SqueezeNet<B> {
        let (kernel, init_channels, stages) = self.layout();
        let init = ConvSpec::new(3, init_channels, kernel)
            .stride(2)
            .padding(0)
            .plain(true, device);

        let mut in_channels = init_channels;
        let stages = stages
            .into_iter()
            .map(|units| {
                let fires = units
                    .into_iter()
                    .map(|out| {
                        let fire = FireUnit::new(in_channels, out, device);
                        in_channels = out;
                        fire
                    })
                    .collect();
                FireStage {
                    pool: MaxPool2dConfig::new([3, 3]).with_strides([2, 2]).init(),
                    fires,
                }
            })
            .collect();

        SqueezeNet {
            init,
            stages,
            dropout: DropoutConfig::new(self.dropout).init(),
            final_conv: ConvSpec::new(in_channels, self.num_classes, 1).plain(true, device),
            pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
        }
    }
}

#[derive(Module, Debug)]
pub struct FireUnit<B: Backend> {
    pub squeeze: ConvBlock<B>,
    pub expand1x1: ConvBlock<B>,
    pub expand3x3: ConvBlock<B>,
}

impl<B: Backend> FireUnit<B> {
    fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        let squeeze_channels = out_channels / 8;
        let expand_channels = out_channels / 2;
        Self {
            squeeze: ConvSpec::new(in_channels, squeeze_channels, 1).plain(true, device),
            expand1x1: ConvSpec::new(squeeze_channels, expand_channels, 1).plain(true, device),
            expand3x3: ConvSpec::new(squeeze_channels, expand_channels, 3).plain(true, device),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.squeeze.forward(x);
        let y1 = self.expand1x1.forward(x.clone());
        let y2 = self.expand3x3.forward(x);
        Tensor::cat(vec![y1, y2], 1)
    }
}

#[derive(Module, Debug)]
pub struct FireStage<B: Backend> {
    pub pool: MaxPool2d,
    pub fires: Vec<FireUnit<B>>,
}

#[derive(Module, Debug)]
pub struct SqueezeNet<B: Backend> {
    pub init: ConvBlock<B>,
    pub stages: Vec<FireStage<B>>,
    pub dropout: Dropout,
    /// 1x1 conv straight to class scores, no linear layer
    pub final_conv: ConvBlock<B>,
    pub pool: AdaptiveAvgPool2d,
}

impl<B: Backend> SqueezeNet<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = self.init.forward(x);
        for stage in &self.stages {
            x = stage.pool.forward(x);
            for fire in &stage.fires {
                x = fire.forward(x);
            }
        }
        let x = self.final_conv.forward(self.dropout.forward(x));
        self.pool.forward(x).flatten::<2>(1, 3)
    }
}
