// Top-k hit counting for classification logits.

use burn::{prelude::*, tensor::ElementConversion};

/// For each `k` in `ks`, count the samples whose target is among the
/// `k` highest-scoring classes. `k` is clamped to `[1, num_classes]`.
///
/// output: [batch, num_classes], targets: [batch]
pub fn topk_hits<B: Backend>(
    output: Tensor<B, 2>,
    targets: Tensor<B, 1, Int>,
    ks: &[usize],
) -> Vec<usize> {
    let [batch, classes] = output.dims();
    if batch == 0 || classes == 0 {
        return vec![0; ks.len()];
    }

    let clamp = |k: usize| k.clamp(1, classes);
    let max_k = ks.iter().copied().map(clamp).max().unwrap_or(1);

    let (_, top) = output.topk_with_indices(max_k, 1);
    let hits = top
        .equal(targets.reshape([batch, 1]).expand([batch, max_k]))
        .int();

    ks.iter()
        .map(|&k| {
            let count = hits
                .clone()
                .slice([0..batch, 0..clamp(k)])
                .sum()
                .into_scalar()
                .elem::<i64>();
            count as usize
        })
        .collect()
}

/// Error rate given a hit count. NaN when nothing was counted.
pub fn error_rate(hits: usize, total: usize) -> f64 {
    if total == 0 {
        return f64::NAN;
    }
    1.0 - hits as f64 / total as f64
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::{backend::NdArray, tensor::TensorData};

    type TestBackend = NdArray<f32>;

    fn batch() -> (Tensor<TestBackend, 2>, Tensor<TestBackend, 1, Int>) {
        let device = Default::default();
        // rank of each class per row, highest first:
        //   row 0: 2, 0, 1, 3
        //   row 1: 3, 1, 2, 0
        //   row 2: 0, 1, 2, 3
        let logits = TensorData::new(
            vec![
                0.3f32, 0.2, 0.9, 0.1, //
                0.0, 0.5, 0.4, 0.8, //
                0.9, 0.7, 0.5, 0.1,
            ],
            [3, 4],
        );
        let output = Tensor::<TestBackend, 2>::from_data(logits, &device);
        let targets = Tensor::<TestBackend, 1, Int>::from_ints([2, 2, 3], &device);
        (output, targets)
    }

    #[test]
    fn test_top1_and_top3() {
        let (output, targets) = batch();
        // row 0 hit at rank 1, row 1 at rank 3, row 2 at rank 4
        assert_eq!(topk_hits(output, targets, &[1, 3]), vec![1, 2]);
    }

    #[test]
    fn test_k_clamped_to_class_count() {
        let (output, targets) = batch();
        assert_eq!(topk_hits(output, targets, &[1, 5]), vec![1, 3]);
    }

    #[test]
    fn test_error_rate() {
        assert!((error_rate(3, 4) - 0.25).abs() < 1e-12);
        assert!(error_rate(0, 0).is_nan());
    }
}
