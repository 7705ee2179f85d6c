// ResNet with basic (two 3x3 conv) residual blocks (He et al., 2016).

use burn::{
    nn::pool::{MaxPool2d, MaxPool2dConfig},
    nn::PaddingConfig2d,
    prelude::*,
    tensor::activation::relu,
};

use super::common::{ClassifierHead, ConvBlock, ConvSpec};

const STAGE_CHANNELS: [usize; 4] = [64, 128, 256, 512];

#[derive(Config, Debug)]
pub struct ResNetConfig {
    pub num_classes: usize,
    /// Basic blocks per stage
    pub layers: [usize; 4],
}

impl ResNetConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ResNet<B> {
        let init = ConvSpec::new(3, 64, 7).stride(2).bn(true, device);
        let pool = MaxPool2dConfig::new([3, 3])
            .with_strides([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init();

        let mut in_channels = 64;
        let mut blocks = Vec::new();
        for (i, (&count, &out)) in self.layers.iter().zip(STAGE_CHANNELS.iter()).enumerate() {
            for j in 0..count {
                let stride = if j == 0 && i != 0 { 2 } else { 1 };
                blocks.push(BasicBlock::new(in_channels, out, stride, device));
                in_channels = out;
            }
        }

        ResNet {
            init,
            pool,
            blocks,
            head: ClassifierHead::new(in_channels, self.num_classes, device),
        }
    }
}

#[derive(Module, Debug)]
pub struct BasicBlock<B: Backend> {
    pub conv1: ConvBlock<B>,
    pub conv2: ConvBlock<B>,
    /// 1x1 projection when the shape changes
    pub identity: Option<ConvBlock<B>>,
}

impl<B: Backend> BasicBlock<B> {
    fn new(in_channels: usize, out_channels: usize, stride: usize, device: &B::Device) -> Self {
        let identity = (stride != 1 || in_channels != out_channels).then(|| {
            ConvSpec::new(in_channels, out_channels, 1)
                .stride(stride)
                .bn(false, device)
        });
        Self {
            conv1: ConvSpec::new(in_channels, out_channels, 3).stride(stride).bn(true, device),
            conv2: ConvSpec::new(out_channels, out_channels, 3).bn(false, device),
            identity,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let identity = match &self.identity {
            Some(proj) => proj.forward(x.clone()),
            None => x.clone(),
        };
        let y = self.conv2.forward(self.conv1.forward(x));
        relu(y + identity)
    }
}

#[derive(Module, Debug)]
pub struct ResNet<B: Backend> {
    pub init: ConvBlock<B>,
    pub pool: MaxPool2d,
    pub blocks: Vec<BasicBlock<B>>,
    pub head: ClassifierHead<B>,
}

impl<B: Backend> ResNet<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = self.pool.forward(self.init.forward(x));
        for block in &self.blocks {
            x = block.forward(x);
        }
        self.head.forward(x)
    }
}
