// MENet, ShuffleNet units with a merge-and-evolve side branch
// (Qin et al., 2018).
//
// The side branch taps the shuffled bottleneck, compresses it to a
// few channels, runs a strided 3x3 conv, and re-expands to a sigmoid
// gate that scales the depthwise output before the expand conv.

use burn::{
    nn::pool::AvgPool2d,
    prelude::*,
    tensor::activation::{relu, sigmoid},
};

use super::{
    common::{channel_shuffle, ClassifierHead, ConvBlock, ConvSpec},
    shufflenet::{plan_grouped_units, shortcut_pool, GroupedUnitPlan, GroupedInitBlock, STAGE_UNITS},
    RegistryError,
};

#[derive(Config, Debug)]
pub struct MeNetConfig {
    pub num_classes: usize,
    /// Output channels of the first stage, e.g. 108 for menet108
    pub first_stage_channels: usize,
    /// Width of the merge/evolve side branch
    pub side_channels: usize,
    pub groups: usize,
}

impl MeNetConfig {
    fn layout(&self) -> Result<(usize, Vec<Vec<usize>>), RegistryError> {
        let init = match self.first_stage_channels {
            108 | 128 => 12,
            160 => 16,
            228 | 256 | 348 | 352 => 24,
            456 => 48,
            c => return Err(RegistryError::UnsupportedWidth(c)),
        };
        let channels = STAGE_UNITS
            .iter()
            .enumerate()
            .map(|(i, &n)| vec![self.first_stage_channels << i; n])
            .collect();
        Ok((init, channels))
    }

    pub fn validate(&self) -> Result<(), RegistryError> {
        let (init, channels) = self.layout()?;
        plan_grouped_units(init, &channels, self.groups).map(|_| ())
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<MeNet<B>, RegistryError> {
        let (init_channels, channels) = self.layout()?;
        let plans = plan_grouped_units(init_channels, &channels, self.groups)?;

        let units = plans
            .iter()
            .map(|plan| MeUnit::new(plan, self.side_channels, device))
            .collect();
        let last = plans.last().map_or(init_channels, |p| p.out_channels);

        Ok(MeNet {
            init: GroupedInitBlock::new(init_channels, device),
            units,
            head: ClassifierHead::new(last, self.num_classes, device),
        })
    }
}

#[derive(Module, Debug)]
pub struct MeUnit<B: Backend> {
    pub compress: ConvBlock<B>,
    pub dw: ConvBlock<B>,
    pub expand: ConvBlock<B>,
    pub s_merge: ConvBlock<B>,
    pub s_conv: ConvBlock<B>,
    pub s_evolve: ConvBlock<B>,
    pub shortcut_pool: Option<AvgPool2d>,
    pub groups: usize,
}

impl<B: Backend> MeUnit<B> {
    fn new(plan: &GroupedUnitPlan, side_channels: usize, device: &B::Device) -> Self {
        let stride = if plan.downsample { 2 } else { 1 };
        let mid = plan.mid_channels;
        Self {
            compress: ConvSpec::new(plan.in_channels, mid, 1)
                .groups(plan.compress_groups)
                .bn(true, device),
            dw: ConvSpec::depthwise(mid, 3).stride(stride).bn(false, device),
            expand: ConvSpec::new(mid, plan.expand_channels, 1)
                .groups(plan.groups)
                .bn(false, device),
            s_merge: ConvSpec::new(mid, side_channels, 1).bn(true, device),
            s_conv: ConvSpec::new(side_channels, side_channels, 3)
                .stride(stride)
                .bn(true, device),
            s_evolve: ConvSpec::new(side_channels, mid, 1).bn(false, device),
            shortcut_pool: plan.downsample.then(shortcut_pool),
            groups: plan.groups,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let identity = x.clone();
        let x = self.compress.forward(x);
        let x = channel_shuffle(x, self.groups);

        let gate = self.s_merge.forward(x.clone());
        let gate = self.s_conv.forward(gate);
        let gate = sigmoid(self.s_evolve.forward(gate));

        let x = self.dw.forward(x) * gate;
        let x = self.expand.forward(x);
        let x = match &self.shortcut_pool {
            Some(pool) => Tensor::cat(vec![x, pool.forward(identity)], 1),
            None => x + identity,
        };
        relu(x)
    }
}

#[derive(Module, Debug)]
pub struct MeNet<B: Backend> {
    pub init: GroupedInitBlock<B>,
    pub units: Vec<MeUnit<B>>,
    pub head: ClassifierHead<B>,
}

impl<B: Backend> MeNet<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = self.init.forward(x);
        for unit in &self.units {
            x = unit.forward(x);
        }
        self.head.forward(x)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_published_variants_are_valid() {
        let variants = [
            (108, 8, 3),
            (128, 8, 4),
            (160, 8, 8),
            (228, 12, 3),
            (256, 12, 4),
            (348, 12, 3),
            (352, 12, 8),
            (456, 24, 3),
        ];
        for (first, side, groups) in variants {
            let cfg = MeNetConfig::new(1000, first, side, groups);
            assert!(cfg.validate().is_ok(), "menet{first}_{side}x1_g{groups}");
        }
    }

    #[test]
    fn test_unknown_width_is_rejected() {
        let cfg = MeNetConfig::new(10, 100, 8, 3);
        assert!(matches!(cfg.validate(), Err(RegistryError::UnsupportedWidth(100))));
    }

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let model = MeNetConfig::new(7, 108, 8, 3).init::<NdArray<f32>>(&device).unwrap();
        let x = Tensor::<NdArray<f32>, 4>::zeros([2, 3, 32, 32], &device);
        assert_eq!(model.forward(x).dims(), [2, 7]);
    }
}
