// ShuffleNet v1 (Zhang et al., 2017).
//
// Each unit is a bottleneck of grouped 1x1 convs around a 3x3
// depthwise conv, with a channel shuffle after the first grouped
// conv so information crosses groups. The first unit of every stage
// downsamples: its residual branch is average-pooled and
// concatenated instead of added, so the unit's own branch only
// produces `out - in` channels.

use burn::{
    nn::{
        pool::{AvgPool2d, AvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::relu,
};

use super::{
    common::{channel_shuffle, scale_channels, ClassifierHead, ConvBlock, ConvSpec},
    RegistryError,
};

/// Units per stage, shared with MENet
pub(super) const STAGE_UNITS: [usize; 3] = [4, 8, 4];

#[derive(Config, Debug)]
pub struct ShuffleNetConfig {
    pub num_classes: usize,
    pub groups: usize,
    pub width_scale: f64,
}

impl ShuffleNetConfig {
    fn base_channels(&self) -> Result<[usize; 3], RegistryError> {
        match self.groups {
            1 => Ok([144, 288, 576]),
            2 => Ok([200, 400, 800]),
            3 => Ok([240, 480, 960]),
            4 => Ok([272, 544, 1088]),
            8 => Ok([384, 768, 1536]),
            g => Err(RegistryError::UnsupportedGroups(g)),
        }
    }

    /// (stem channels, per-stage unit output channels)
    fn layout(&self) -> Result<(usize, Vec<Vec<usize>>), RegistryError> {
        let base = self.base_channels()?;
        let init = scale_channels(24, self.width_scale);
        let channels = base
            .iter()
            .zip(STAGE_UNITS.iter())
            .map(|(&c, &n)| vec![scale_channels(c, self.width_scale); n])
            .collect();
        Ok((init, channels))
    }

    /// Check that every grouped conv divides evenly.
    pub fn validate(&self) -> Result<(), RegistryError> {
        let (init, channels) = self.layout()?;
        plan_grouped_units(init, &channels, self.groups).map(|_| ())
    }

    /// Build the network, failing on layouts that `validate` rejects.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<ShuffleNet<B>, RegistryError> {
        let (init_channels, channels) = self.layout()?;
        let plans = plan_grouped_units(init_channels, &channels, self.groups)?;

        let units = plans.iter().map(|plan| ShuffleUnit::new(plan, device)).collect();
        let last = plans.last().map_or(init_channels, |p| p.out_channels);

        Ok(ShuffleNet {
            init: GroupedInitBlock::new(init_channels, device),
            units,
            head: ClassifierHead::new(last, self.num_classes, device),
        })
    }
}

/// Resolved channel arithmetic for one grouped bottleneck unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct GroupedUnitPlan {
    pub in_channels: usize,
    /// Channels leaving the unit (after concat on downsampling units)
    pub out_channels: usize,
    pub mid_channels: usize,
    /// Channels produced by the expand conv
    pub expand_channels: usize,
    pub groups: usize,
    /// Groups of the compress conv (1 for the very first unit)
    pub compress_groups: usize,
    pub downsample: bool,
}

/// Lay out every unit of a ShuffleNet-style body and check divisibility.
pub(super) fn plan_grouped_units(
    init_channels: usize,
    channels: &[Vec<usize>],
    groups: usize,
) -> Result<Vec<GroupedUnitPlan>, RegistryError> {
    let mut plans = Vec::new();
    let mut in_channels = init_channels;

    for (i, stage) in channels.iter().enumerate() {
        for (j, &out_channels) in stage.iter().enumerate() {
            let unit = format!("stage{}.unit{}", i + 1, j + 1);
            let downsample = j == 0;
            let ignore_group = i == 0 && j == 0;
            let mid_channels = out_channels / 4;
            let expand_channels = if downsample {
                out_channels.checked_sub(in_channels).filter(|&c| c > 0).ok_or(
                    RegistryError::NarrowDownsample {
                        unit: unit.clone(),
                        input: in_channels,
                        output: out_channels,
                    },
                )?
            } else {
                out_channels
            };
            let compress_groups = if ignore_group { 1 } else { groups };

            let checks = [
                (in_channels, compress_groups),
                (mid_channels, compress_groups),
                (mid_channels, groups),
                (expand_channels, groups),
            ];
            for (channels, g) in checks {
                if channels == 0 || channels % g != 0 {
                    return Err(RegistryError::IndivisibleGroups {
                        unit,
                        channels,
                        groups: g,
                    });
                }
            }

            plans.push(GroupedUnitPlan {
                in_channels,
                out_channels,
                mid_channels,
                expand_channels,
                groups,
                compress_groups,
                downsample,
            });
            in_channels = out_channels;
        }
    }
    Ok(plans)
}

/// 3x3 stride-2 conv + BN + ReLU, then 3x3 stride-2 max pool
#[derive(Module, Debug)]
pub struct GroupedInitBlock<B: Backend> {
    pub conv: ConvBlock<B>,
    pub pool: MaxPool2d,
}

impl<B: Backend> GroupedInitBlock<B> {
    pub(super) fn new(out_channels: usize, device: &B::Device) -> Self {
        Self {
            conv: ConvSpec::new(3, out_channels, 3).stride(2).bn(true, device),
            pool: MaxPool2dConfig::new([3, 3])
                .with_strides([2, 2])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.pool.forward(self.conv.forward(x))
    }
}

pub(super) fn shortcut_pool() -> AvgPool2d {
    AvgPool2dConfig::new([3, 3])
        .with_strides([2, 2])
        .with_padding(PaddingConfig2d::Explicit(1, 1))
        .init()
}

#[derive(Module, Debug)]
pub struct ShuffleUnit<B: Backend> {
    pub compress: ConvBlock<B>,
    pub dw: ConvBlock<B>,
    pub expand: ConvBlock<B>,
    pub shortcut_pool: Option<AvgPool2d>,
    pub groups: usize,
}

impl<B: Backend> ShuffleUnit<B> {
    fn new(plan: &GroupedUnitPlan, device: &B::Device) -> Self {
        let stride = if plan.downsample { 2 } else { 1 };
        Self {
            compress: ConvSpec::new(plan.in_channels, plan.mid_channels, 1)
                .groups(plan.compress_groups)
                .bn(true, device),
            dw: ConvSpec::depthwise(plan.mid_channels, 3).stride(stride).bn(false, device),
            expand: ConvSpec::new(plan.mid_channels, plan.expand_channels, 1)
                .groups(plan.groups)
                .bn(false, device),
            shortcut_pool: plan.downsample.then(shortcut_pool),
            groups: plan.groups,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let identity = x.clone();
        let x = self.compress.forward(x);
        let x = channel_shuffle(x, self.groups);
        let x = self.expand.forward(self.dw.forward(x));
        let x = match &self.shortcut_pool {
            Some(pool) => Tensor::cat(vec![x, pool.forward(identity)], 1),
            None => x + identity,
        };
        relu(x)
    }
}

#[derive(Module, Debug)]
pub struct ShuffleNet<B: Backend> {
    pub init: GroupedInitBlock<B>,
    pub units: Vec<ShuffleUnit<B>>,
    pub head: ClassifierHead<B>,
}

impl<B: Backend> ShuffleNet<B> {
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

    fn config(groups: usize, width_scale: f64) -> ShuffleNetConfig {
        ShuffleNetConfig::new(1000, groups, width_scale)
    }

    #[test]
    fn test_full_width_variants_are_valid() {
        for g in [1, 2, 3, 4, 8] {
            assert!(config(g, 1.0).validate().is_ok(), "g{g}");
        }
    }

    #[test]
    fn test_narrow_variants_with_odd_bottlenecks_are_rejected() {
        // 0.5 * 272 = 136 → bottleneck 34, not divisible by 4
        assert!(matches!(
            config(4, 0.5).validate(),
            Err(RegistryError::IndivisibleGroups { groups: 4, .. })
        ));
        assert!(config(3, 0.5).validate().is_ok());
        assert!(config(3, 0.25).validate().is_ok());
        assert!(config(8, 0.25).validate().is_err());
    }

    #[test]
    fn test_unsupported_group_count() {
        assert!(matches!(
            config(5, 1.0).validate(),
            Err(RegistryError::UnsupportedGroups(5))
        ));
    }

    #[test]
    fn test_downsampling_units_concat_shortcut() {
        let (init, channels) = config(3, 1.0).layout().unwrap();
        let plans = plan_grouped_units(init, &channels, 3).unwrap();
        assert_eq!(plans.len(), 16);
        let first = plans[0];
        assert_eq!(first.compress_groups, 1);
        assert_eq!(first.expand_channels, 240 - 24);
        assert_eq!(first.out_channels, 240);
        assert!(plans[1..4].iter().all(|p| !p.downsample && p.expand_channels == 240));
        assert!(plans[4].downsample);
        assert_eq!(plans[4].expand_channels, 480 - 240);
    }
}
