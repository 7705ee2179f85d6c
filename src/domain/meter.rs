// ============================================================
// Layer 3 - Average Meter
// ============================================================
// Keeps a running weighted average of a per-batch statistic.
//
// The training loop feeds it one value per batch together with
// the number of samples that value was computed over, so the
// average is per-sample even when the last batch is short:
//
//   avg = sum(val_i * n_i) / sum(n_i)
//
// Reference: Rust Book §5 (Structs and Methods)

use serde::{Deserialize, Serialize};

/// Computes and stores the average and current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AverageMeter {
    /// The most recent value passed to `update`
    pub val: f64,

    /// Weighted sum of every value seen since the last reset
    pub sum: f64,

    /// Total weight (number of samples) seen since the last reset
    pub count: usize,

    /// `sum / count`, or 0.0 before the first update
    pub avg: f64,
}

impl AverageMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `val` as the mean over `n` samples.
    pub fn update(&mut self, val: f64, n: usize) {
        self.val = val;
        self.sum += val * n as f64;
        self.count += n;
        if self.count > 0 {
            self.avg = self.sum / self.count as f64;
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weighted_average() {
        let mut m = AverageMeter::new();
        m.update(1.0, 3);
        m.update(0.0, 1);
        assert_eq!(m.count, 4);
        assert!((m.avg - 0.75).abs() < 1e-12);
        assert_eq!(m.val, 0.0);
    }

    #[test]
    fn test_zero_weight_update_keeps_average() {
        let mut m = AverageMeter::new();
        m.update(0.5, 2);
        m.update(10.0, 0);
        assert!((m.avg - 0.5).abs() < 1e-12);
        assert_eq!(m.val, 10.0);
    }
}
