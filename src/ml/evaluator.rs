// ============================================================
// Layer 5 - Evaluator
// ============================================================
// One pass over the validation split, no gradients:
//
//   for each batch:  logits = model(images)
//                    count top-1 / top-5 hits
//   return (1 - top1_hits / n, 1 - top5_hits / n)
//
// Runs on the inner backend. The trainer hands over
// `model.valid()`, which also puts batch norm in inference mode.

use burn::prelude::*;
use std::time::Instant;

use crate::{
    data::batcher::ImageBatch,
    ml::{
        accuracy::{error_rate, topk_hits},
        models::Network,
    },
};

/// Top-1 and top-5 hit counters over one evaluation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TopKCounter {
    pub top1: usize,
    pub top5: usize,
    pub total: usize,
}

impl TopKCounter {
    pub fn update<B: Backend>(&mut self, logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) {
        let batch = targets.dims()[0];
        let hits = topk_hits(logits, targets, &[1, 5]);
        self.top1 += hits[0];
        self.top5 += hits[1];
        self.total += batch;
    }

    pub fn top1_err(&self) -> f64 {
        error_rate(self.top1, self.total)
    }

    pub fn top5_err(&self) -> f64 {
        error_rate(self.top5, self.total)
    }
}

/// Evaluate `model` over `batches` and return `(top1_err, top5_err)`.
pub fn validate<B: Backend>(
    model: &Network<B>,
    batches: impl Iterator<Item = ImageBatch<B>>,
) -> (f64, f64) {
    let start = Instant::now();
    let mut counter = TopKCounter::default();

    for batch in batches {
        if batch.is_empty() {
            continue;
        }
        let logits = model.forward(batch.images);
        counter.update(logits, batch.targets);
    }

    if counter.total == 0 {
        tracing::warn!("Validation saw no decodable images");
    }
    tracing::debug!(
        "Validated {} samples in {:.2}s",
        counter.total,
        start.elapsed().as_secs_f64()
    );
    (counter.top1_err(), counter.top5_err())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::{backend::NdArray, tensor::TensorData};

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_counter_accumulates() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::from_data(
            TensorData::new(vec![0.9f32, 0.1, 0.2, 0.8], [2, 2]),
            &device,
        );
        let targets = Tensor::<TestBackend, 1, Int>::from_ints([0, 0], &device);

        let mut counter = TopKCounter::default();
        counter.update(logits, targets);
        assert_eq!(counter, TopKCounter { top1: 1, top5: 2, total: 2 });
        assert!((counter.top1_err() - 0.5).abs() < 1e-12);
        assert_eq!(counter.top5_err(), 0.0);
    }

    #[test]
    fn test_nothing_decoded_is_not_a_perfect_score() {
        let device = Default::default();
        let model = crate::ml::registry::build::<TestBackend>("mobilenet0_25", 3, &device).unwrap();
        let empty = ImageBatch {
            images: Tensor::<TestBackend, 4>::zeros([0, 3, 32, 32], &device),
            targets: Tensor::<TestBackend, 1, Int>::zeros([0], &device),
        };
        let (top1, top5) = validate(&model, vec![empty].into_iter());
        assert!(top1.is_nan());
        assert!(top5.is_nan());
    }

    #[test]
    fn test_validate_skips_empty_batches() {
        let device = Default::default();
        let model = crate::ml::registry::build::<TestBackend>("mobilenet0_25", 3, &device).unwrap();
        let empty = ImageBatch {
            images: Tensor::<TestBackend, 4>::zeros([0, 3, 32, 32], &device),
            targets: Tensor::<TestBackend, 1, Int>::zeros([0], &device),
        };
        let full = ImageBatch {
            images: Tensor::<TestBackend, 4>::zeros([4, 3, 32, 32], &device),
            targets: Tensor::<TestBackend, 1, Int>::from_ints([0, 1, 2, 0], &device),
        };
        let (top1, top5) = validate(&model, vec![empty, full].into_iter());
        assert!((0.0..=1.0).contains(&top1));
        // 3 classes: every target is within the top 5
        assert_eq!(top5, 0.0);
    }
}
