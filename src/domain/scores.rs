// ============================================================
// Layer 3 - Epoch Scores
// ============================================================
// The four numbers recorded at the end of every epoch, and the
// selector that picks which of them decides the "best" model.
//
// The column order is fixed because it is also the column order
// of score.log:
//
//   Val.Top1  Train.Top1  Val.Top5  Train.Loss
//
// Every score is an error or a loss, so smaller is always better.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scores collected after the validation phase of one epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochScores {
    pub val_top1_err: f64,
    pub train_top1_err: f64,
    pub val_top5_err: f64,
    pub train_loss: f64,
}

impl EpochScores {
    /// Column names in score.log order
    pub const NAMES: [&'static str; 4] = ["Val.Top1", "Train.Top1", "Val.Top5", "Train.Loss"];

    /// Values in score.log order
    pub fn values(&self) -> [f64; 4] {
        [
            self.val_top1_err,
            self.train_top1_err,
            self.val_top5_err,
            self.train_loss,
        ]
    }

    pub fn get(&self, kind: ScoreKind) -> f64 {
        self.values()[kind.index()]
    }
}

/// Which score drives best-checkpoint selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ScoreKind {
    ValTop1,
    TrainTop1,
    #[default]
    ValTop5,
    TrainLoss,
}

impl ScoreKind {
    pub fn index(self) -> usize {
        match self {
            ScoreKind::ValTop1 => 0,
            ScoreKind::TrainTop1 => 1,
            ScoreKind::ValTop5 => 2,
            ScoreKind::TrainLoss => 3,
        }
    }

    pub fn name(self) -> &'static str {
        EpochScores::NAMES[self.index()]
    }

    /// Strict improvement: equal values do not replace the best.
    pub fn improves(self, candidate: f64, best: f64) -> bool {
        candidate < best
    }
}

impl fmt::Display for ScoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EpochScores {
        EpochScores {
            val_top1_err: 0.4,
            train_top1_err: 0.5,
            val_top5_err: 0.2,
            train_loss: 2.3,
        }
    }

    #[test]
    fn test_get_follows_column_order() {
        let s = sample();
        assert_eq!(s.get(ScoreKind::ValTop1), 0.4);
        assert_eq!(s.get(ScoreKind::TrainTop1), 0.5);
        assert_eq!(s.get(ScoreKind::ValTop5), 0.2);
        assert_eq!(s.get(ScoreKind::TrainLoss), 2.3);
    }

    #[test]
    fn test_improvement_is_strict() {
        assert!(ScoreKind::ValTop5.improves(0.1, 0.2));
        assert!(!ScoreKind::ValTop5.improves(0.2, 0.2));
        assert!(!ScoreKind::ValTop5.improves(0.3, 0.2));
    }

    #[test]
    fn test_default_is_val_top5() {
        assert_eq!(ScoreKind::default(), ScoreKind::ValTop5);
        assert_eq!(ScoreKind::default().to_string(), "Val.Top5");
    }
}
