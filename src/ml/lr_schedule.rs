// ============================================================
// Layer 5 - Learning Rate Schedule
// ============================================================
// Per-iteration learning rate, a pure function of (epoch, batch):
//
//   epochs [0, warmup)    linear ramp warmup_lr → base_lr
//   afterwards            step | poly | cosine decay
//
// Step mode multiplies base_lr by `decay_factor` once for every
// decay epoch already reached. Poly and cosine interpolate from
// base_lr down to target_lr over the post-warmup iterations.
//
// Resuming needs nothing but the epoch number.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LrMode {
    #[default]
    Step,
    Poly,
    Cosine,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LrSchedule {
    pub mode: LrMode,
    pub base_lr: f64,
    pub target_lr: f64,
    pub iters_per_epoch: usize,
    pub num_epochs: usize,
    /// Zero-based epochs at which step mode decays
    pub decay_epochs: Vec<usize>,
    pub decay_factor: f64,
    pub power: f64,
    pub warmup_epochs: usize,
    pub warmup_lr: f64,
}

impl LrSchedule {
    /// Learning rate for batch `iter` of zero-based epoch `epoch`.
    pub fn lr(&self, epoch: usize, iter: usize) -> f64 {
        let iters = self.iters_per_epoch.max(1);
        let t = (epoch * iters + iter) as f64;
        let warmup_total = (self.warmup_epochs * iters) as f64;

        if epoch < self.warmup_epochs {
            return self.warmup_lr + (self.base_lr - self.warmup_lr) * t / warmup_total;
        }

        match self.mode {
            LrMode::Step => {
                let count = self.decay_epochs.iter().filter(|&&e| e <= epoch).count();
                self.base_lr * self.decay_factor.powi(count as i32)
            }
            LrMode::Poly | LrMode::Cosine => {
                let total = (self.num_epochs * iters) as f64 - warmup_total;
                let p = if total > 0.0 {
                    ((t - warmup_total) / total).clamp(0.0, 1.0)
                } else {
                    1.0
                };
                let span = self.base_lr - self.target_lr;
                let factor = match self.mode {
                    LrMode::Poly => (1.0 - p).powf(self.power),
                    _ => (1.0 + (PI * p).cos()) / 2.0,
                };
                self.target_lr + span * factor
            }
        }
    }
}

/// Decay epochs from either a fixed period or a comma-separated list.
///
/// With `period > 0` the result is `period, 2 * period, ...` below
/// `num_epochs`; otherwise `list` is parsed. Returns zero-based epochs.
pub fn decay_epochs(period: usize, list: &str, num_epochs: usize) -> anyhow::Result<Vec<usize>> {
    if period > 0 {
        return Ok((1..)
            .map(|i| i * period)
            .take_while(|&e| e < num_epochs)
            .collect());
    }
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .map_err(|e| anyhow::anyhow!("Invalid decay epoch '{}': {}", s, e))
        })
        .collect()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn schedule(mode: LrMode) -> LrSchedule {
        LrSchedule {
            mode,
            base_lr: 0.1,
            target_lr: 0.0,
            iters_per_epoch: 10,
            num_epochs: 10,
            decay_epochs: vec![4, 8],
            decay_factor: 0.1,
            power: 2.0,
            warmup_epochs: 0,
            warmup_lr: 0.0,
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_step_decays_at_configured_epochs() {
        let s = schedule(LrMode::Step);
        assert!(close(s.lr(0, 0), 0.1));
        assert!(close(s.lr(3, 9), 0.1));
        assert!(close(s.lr(4, 0), 0.01));
        assert!(close(s.lr(8, 5), 0.001));
    }

    #[test]
    fn test_warmup_ramp() {
        let mut s = schedule(LrMode::Step);
        s.warmup_epochs = 2;
        s.warmup_lr = 0.0;
        assert!(close(s.lr(0, 0), 0.0));
        assert!(close(s.lr(1, 0), 0.05));
        assert!(close(s.lr(2, 0), 0.1));
    }

    #[test]
    fn test_poly_endpoints() {
        let s = schedule(LrMode::Poly);
        assert!(close(s.lr(0, 0), 0.1));
        // halfway: 0.1 * 0.5^2
        assert!(close(s.lr(5, 0), 0.025));
        assert!(s.lr(9, 9) < 1e-3);
    }

    #[test]
    fn test_cosine_endpoints_with_warmup() {
        let mut s = schedule(LrMode::Cosine);
        s.warmup_epochs = 2;
        s.target_lr = 0.01;
        assert!(close(s.lr(2, 0), 0.1));
        // post-warmup midpoint is epoch 6
        assert!(close(s.lr(6, 0), 0.055));
        assert!(s.lr(9, 9) >= 0.01);
    }

    #[test]
    fn test_decay_period_expansion() {
        assert_eq!(decay_epochs(3, "40,60", 10).unwrap(), vec![3, 6, 9]);
        assert_eq!(decay_epochs(0, "40, 60", 100).unwrap(), vec![40, 60]);
        assert!(decay_epochs(0, "4,x", 10).is_err());
        assert!(decay_epochs(0, "", 10).unwrap().is_empty());
    }
}
