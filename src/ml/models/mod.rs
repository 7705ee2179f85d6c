// Image classification architectures.
//
// Every family maps [batch, 3, H, W] images to [batch, classes]
// logits. `Network` wraps them in one module type so the trainer,
// the optimiser and the recorder deal with a single concrete model.

pub mod common;
pub mod menet;
pub mod mobilenet;
pub mod resnet;
pub mod shufflenet;
pub mod squeezenet;

use burn::prelude::*;
use thiserror::Error;

use self::{
    menet::MeNet, mobilenet::MobileNet, resnet::ResNet, shufflenet::ShuffleNet,
    squeezenet::SqueezeNet,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown model '{name}', available models: {available}")]
    UnknownModel { name: String, available: String },

    #[error("{unit}: {channels} channels do not divide into {groups} groups")]
    IndivisibleGroups {
        unit: String,
        channels: usize,
        groups: usize,
    },

    #[error("{unit}: downsampling needs more output channels ({output}) than input ({input})")]
    NarrowDownsample {
        unit: String,
        input: usize,
        output: usize,
    },

    #[error("unsupported group count {0}")]
    UnsupportedGroups(usize),

    #[error("unsupported first stage width {0}")]
    UnsupportedWidth(usize),
}

#[derive(Module, Debug)]
pub enum Network<B: Backend> {
    SqueezeNet(SqueezeNet<B>),
    MobileNet(MobileNet<B>),
    ShuffleNet(ShuffleNet<B>),
    MeNet(MeNet<B>),
    ResNet(ResNet<B>),
}

impl<B: Backend> Network<B> {
    /// images: [batch, 3, H, W] → logits: [batch, num_classes]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        match self {
            Network::SqueezeNet(m) => m.forward(images),
            Network::MobileNet(m) => m.forward(images),
            Network::ShuffleNet(m) => m.forward(images),
            Network::MeNet(m) => m.forward(images),
            Network::ResNet(m) => m.forward(images),
        }
    }
}
