// ============================================================
// Layer 3 - Training Progress
// ============================================================
// How far a run has got and the best score seen so far.
// This is the part of a checkpoint that is not tensors:
// it is what lets a restarted process pick up where the
// previous one stopped.

use serde::{Deserialize, Serialize};

/// Best value of the selected score and the epoch it was reached at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BestScore {
    /// 1-based epoch
    pub epoch: usize,
    pub value: f64,
}

/// Progress after a completed epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingProgress {
    /// Last completed epoch, 1-based
    pub epoch: usize,

    /// None until the first epoch has been scored
    pub best: Option<BestScore>,
}

impl TrainingProgress {
    /// The epoch a resumed run should start at
    pub fn next_epoch(&self) -> usize {
        self.epoch + 1
    }
}
