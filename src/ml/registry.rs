// ============================================================
// Layer 5 - Model Registry
// ============================================================
// Maps model names to architecture configs:
//
//   "shufflenet0_5_g3"  →  ShuffleNetConfig { groups: 3, width_scale: 0.5 }
//   "resnet18"          →  ResNetConfig { layers: [2, 2, 2, 2] }
//
// Lookup is case-insensitive. Grouped families check their channel
// arithmetic before any weights are allocated.

use burn::prelude::*;

use crate::ml::models::{
    menet::MeNetConfig,
    mobilenet::MobileNetConfig,
    resnet::ResNetConfig,
    shufflenet::ShuffleNetConfig,
    squeezenet::{SqueezeNetConfig, SqueezeNetVersion},
    Network,
};

pub use crate::ml::models::RegistryError;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Family {
    SqueezeNet(SqueezeNetVersion),
    MobileNet { width_scale: f64, fast_downsampling: bool },
    ShuffleNet { groups: usize, width_scale: f64 },
    MeNet { first_stage_channels: usize, side_channels: usize, groups: usize },
    ResNet([usize; 4]),
}

const MODELS: &[(&str, Family)] = &[
    ("squeezenet1_0", Family::SqueezeNet(SqueezeNetVersion::V1_0)),
    ("squeezenet1_1", Family::SqueezeNet(SqueezeNetVersion::V1_1)),
    ("mobilenet1_0", mobilenet(1.0, false)),
    ("mobilenet0_75", mobilenet(0.75, false)),
    ("mobilenet0_5", mobilenet(0.5, false)),
    ("mobilenet0_25", mobilenet(0.25, false)),
    ("fd_mobilenet1_0", mobilenet(1.0, true)),
    ("fd_mobilenet0_75", mobilenet(0.75, true)),
    ("fd_mobilenet0_5", mobilenet(0.5, true)),
    ("fd_mobilenet0_25", mobilenet(0.25, true)),
    ("shufflenet1_0_g1", shufflenet(1, 1.0)),
    ("shufflenet1_0_g2", shufflenet(2, 1.0)),
    ("shufflenet1_0_g3", shufflenet(3, 1.0)),
    ("shufflenet1_0_g4", shufflenet(4, 1.0)),
    ("shufflenet1_0_g8", shufflenet(8, 1.0)),
    ("shufflenet0_5_g1", shufflenet(1, 0.5)),
    ("shufflenet0_5_g2", shufflenet(2, 0.5)),
    ("shufflenet0_5_g3", shufflenet(3, 0.5)),
    ("shufflenet0_5_g4", shufflenet(4, 0.5)),
    ("shufflenet0_5_g8", shufflenet(8, 0.5)),
    ("shufflenet0_25_g1", shufflenet(1, 0.25)),
    ("shufflenet0_25_g2", shufflenet(2, 0.25)),
    ("shufflenet0_25_g3", shufflenet(3, 0.25)),
    ("shufflenet0_25_g4", shufflenet(4, 0.25)),
    ("shufflenet0_25_g8", shufflenet(8, 0.25)),
    ("menet108_8x1_g3", menet(108, 8, 3)),
    ("menet128_8x1_g4", menet(128, 8, 4)),
    ("menet160_8x1_g8", menet(160, 8, 8)),
    ("menet228_12x1_g3", menet(228, 12, 3)),
    ("menet256_12x1_g4", menet(256, 12, 4)),
    ("menet348_12x1_g3", menet(348, 12, 3)),
    ("menet352_12x1_g8", menet(352, 12, 8)),
    ("menet456_24x1_g3", menet(456, 24, 3)),
    ("resnet10", Family::ResNet([1, 1, 1, 1])),
    ("resnet18", Family::ResNet([2, 2, 2, 2])),
    ("resnet34", Family::ResNet([3, 4, 6, 3])),
];

const fn mobilenet(width_scale: f64, fast_downsampling: bool) -> Family {
    Family::MobileNet { width_scale, fast_downsampling }
}

const fn shufflenet(groups: usize, width_scale: f64) -> Family {
    Family::ShuffleNet { groups, width_scale }
}

const fn menet(first_stage_channels: usize, side_channels: usize, groups: usize) -> Family {
    Family::MeNet { first_stage_channels, side_channels, groups }
}

/// Every registered model name, sorted.
pub fn available_models() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = MODELS.iter().map(|(name, _)| *name).collect();
    names.sort_unstable();
    names
}

fn lookup(name: &str) -> Result<Family, RegistryError> {
    let wanted = name.to_ascii_lowercase();
    MODELS
        .iter()
        .find(|(n, _)| *n == wanted)
        .map(|(_, family)| *family)
        .ok_or_else(|| RegistryError::UnknownModel {
            name: name.to_string(),
            available: available_models().join(", "),
        })
}

/// Check that `name` exists and its layout is buildable, without
/// allocating any weights.
pub fn check(name: &str) -> Result<(), RegistryError> {
    match lookup(name)? {
        Family::ShuffleNet { groups, width_scale } => {
            ShuffleNetConfig::new(0, groups, width_scale).validate()
        }
        Family::MeNet { first_stage_channels, side_channels, groups } => {
            MeNetConfig::new(0, first_stage_channels, side_channels, groups).validate()
        }
        _ => Ok(()),
    }
}

/// Build a freshly initialised network.
pub fn build<B: Backend>(
    name: &str,
    num_classes: usize,
    device: &B::Device,
) -> Result<Network<B>, RegistryError> {
    let network = match lookup(name)? {
        Family::SqueezeNet(version) => {
            Network::SqueezeNet(SqueezeNetConfig::new(num_classes, version).init(device))
        }
        Family::MobileNet { width_scale, fast_downsampling } => Network::MobileNet(
            MobileNetConfig::new(num_classes, width_scale)
                .with_fast_downsampling(fast_downsampling)
                .init(device),
        ),
        Family::ShuffleNet { groups, width_scale } => Network::ShuffleNet(
            ShuffleNetConfig::new(num_classes, groups, width_scale).init(device)?,
        ),
        Family::MeNet { first_stage_channels, side_channels, groups } => Network::MeNet(
            MeNetConfig::new(num_classes, first_stage_channels, side_channels, groups)
                .init(device)?,
        ),
        Family::ResNet(layers) => Network::ResNet(ResNetConfig::new(num_classes, layers).init(device)),
    };
    Ok(network)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn forward_dims(name: &str, size: usize) -> [usize; 2] {
        let device = Default::default();
        let model = build::<TestBackend>(name, 5, &device).unwrap();
        let x = Tensor::<TestBackend, 4>::zeros([2, 3, size, size], &device);
        model.forward(x).dims()
    }

    #[test]
    fn test_names_sorted_and_unique() {
        let names = available_models();
        assert_eq!(names.len(), MODELS.len());
        assert!(names.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert!(check("ResNet18").is_ok());
        assert!(check("MOBILENET0_25").is_ok());
    }

    #[test]
    fn test_unknown_name_lists_alternatives() {
        let err = check("vgg16").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("vgg16"));
        assert!(msg.contains("resnet18"));
        assert!(msg.contains("menet108_8x1_g3"));
    }

    #[test]
    fn test_invalid_group_arithmetic_is_reported() {
        let invalid = [
            "shufflenet0_5_g2",
            "shufflenet0_5_g4",
            "shufflenet0_5_g8",
            "shufflenet0_25_g2",
            "shufflenet0_25_g4",
            "shufflenet0_25_g8",
        ];
        for name in available_models() {
            let result = check(name);
            assert_eq!(result.is_err(), invalid.contains(&name), "{name}: {result:?}");
        }

        let device = Default::default();
        assert!(build::<TestBackend>("shufflenet0_5_g4", 10, &device).is_err());
    }

    #[test]
    fn test_forward_produces_logits_per_family() {
        assert_eq!(forward_dims("squeezenet1_0", 64), [2, 5]);
        assert_eq!(forward_dims("squeezenet1_1", 64), [2, 5]);
        assert_eq!(forward_dims("mobilenet0_25", 32), [2, 5]);
        assert_eq!(forward_dims("fd_mobilenet0_25", 64), [2, 5]);
        assert_eq!(forward_dims("shufflenet0_25_g3", 32), [2, 5]);
        assert_eq!(forward_dims("shufflenet0_25_g1", 32), [2, 5]);
        assert_eq!(forward_dims("resnet10", 32), [2, 5]);
    }

    #[test]
    fn test_every_registered_model_runs_forward() {
        let mut built = 0;
        for name in available_models() {
            if check(name).is_err() {
                continue;
            }
            assert_eq!(forward_dims(name, 64), [2, 5], "{name}");
            built += 1;
        }
        assert_eq!(built, MODELS.len() - 6);
    }
}
