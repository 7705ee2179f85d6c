// SGD with momentum, plain or Nesterov.
//
//   v = momentum * v + (g + wd * θ)
//   θ = θ - lr * v                      (sgd)
//   θ = θ - lr * (g + momentum * v)     (nag)
//
// Dampening is zero in both cases.

use burn::{
    optim::{adaptor::OptimizerAdaptor, decay::WeightDecayConfig, momentum::MomentumConfig, Sgd, SgdConfig},
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use crate::ml::models::Network;

/// The optimizer every training run uses, whatever the momentum flavour.
pub type NetworkOptimizer<B> =
    OptimizerAdaptor<Sgd<<B as AutodiffBackend>::InnerBackend>, Network<B>, B>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    Sgd,
    #[default]
    Nag,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizerSettings {
    pub kind: OptimizerKind,
    pub momentum: f64,
    pub weight_decay: f64,
}

impl OptimizerSettings {
    pub fn config(&self) -> SgdConfig {
        let momentum = (self.momentum > 0.0).then(|| MomentumConfig {
            momentum: self.momentum,
            dampening: 0.0,
            nesterov: self.kind == OptimizerKind::Nag,
        });
        let weight_decay = (self.weight_decay > 0.0)
            .then(|| WeightDecayConfig::new(self.weight_decay as _));

        SgdConfig::new()
            .with_momentum(momentum)
            .with_weight_decay(weight_decay)
    }

    pub fn init<B: AutodiffBackend>(&self) -> NetworkOptimizer<B> {
        self.config().init::<B, Network<B>>()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nag_enables_nesterov_without_dampening() {
        let cfg = OptimizerSettings {
            kind: OptimizerKind::Nag,
            momentum: 0.9,
            weight_decay: 1e-4,
        }
        .config();
        let momentum = cfg.momentum.unwrap();
        assert!(momentum.nesterov);
        assert_eq!(momentum.dampening, 0.0);
        assert!(cfg.weight_decay.is_some());
    }

    #[test]
    fn test_zero_momentum_and_decay_are_disabled() {
        let cfg = OptimizerSettings {
            kind: OptimizerKind::Sgd,
            momentum: 0.0,
            weight_decay: 0.0,
        }
        .config();
        assert!(cfg.momentum.is_none());
        assert!(cfg.weight_decay.is_none());
    }
}
