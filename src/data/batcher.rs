// ============================================================
// Layer 4 - Image Batcher
// ============================================================
// Implements Burn's Batcher trait to turn a Vec<ImageRecord>
// into tensors:
//
//   Input:  N image paths with labels
//   Output: ImageBatch { images: [N', 3, S, S], targets: [N'] }
//
// Decoding and augmentation happen here, on the data loader's
// worker threads. N' < N when some files fail to decode; those
// are logged and dropped.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
    tensor::TensorData,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{
    marker::PhantomData,
    sync::{Arc, Mutex},
};

use crate::data::{
    dataset::ImageRecord,
    transform::{Normalize, Transform},
};

// ─── ImageBatch ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct ImageBatch<B: Backend> {
    /// Normalised pixels, shape [batch, 3, size, size]
    pub images: Tensor<B, 4>,

    /// Class indices, shape [batch]
    pub targets: Tensor<B, 1, Int>,
}

impl<B: Backend> ImageBatch<B> {
    pub fn len(&self) -> usize {
        self.targets.dims()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ─── ImageBatcher ─────────────────────────────────────────────────────────────
/// Holds the transform pipeline and the augmentation RNG.
/// Clones share the seed RNG so seeding the batcher seeds every worker.
#[derive(Clone, Debug)]
pub struct ImageBatcher<B: Backend> {
    transform: Transform,
    normalize: Normalize,
    rng: Arc<Mutex<StdRng>>,
    _backend: PhantomData<fn() -> B>,
}

impl<B: Backend> ImageBatcher<B> {
    pub fn new(transform: Transform, seed: u64) -> Self {
        Self {
            transform,
            normalize: Normalize::default(),
            rng: Arc::new(Mutex::new(StdRng::seed_from_u64(seed))),
            _backend: PhantomData,
        }
    }

    fn load(&self, record: &ImageRecord) -> Option<Vec<f32>> {
        let img = match image::open(&record.path) {
            Ok(img) => img.to_rgb8(),
            Err(e) => {
                tracing::warn!("Failed to decode '{}': {}", record.path.display(), e);
                return None;
            }
        };
        let mut rng = StdRng::seed_from_u64(self.next_seed());
        Some(self.transform.apply(&img, &self.normalize, &mut rng))
    }

    /// Per-image seed drawn from the shared RNG. The lock is held only
    /// for this draw, so workers transform images in parallel.
    fn next_seed(&self) -> u64 {
        // A poisoned lock still holds a usable RNG
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        rng.gen()
    }
}

impl<B: Backend> Batcher<B, ImageRecord, ImageBatch<B>> for ImageBatcher<B> {
    fn batch(&self, items: Vec<ImageRecord>, device: &B::Device) -> ImageBatch<B> {
        let size = self.transform.output_size() as usize;

        let mut pixels = Vec::with_capacity(items.len() * 3 * size * size);
        let mut labels: Vec<i32> = Vec::with_capacity(items.len());
        for record in &items {
            if let Some(chw) = self.load(record) {
                pixels.extend_from_slice(&chw);
                labels.push(record.label as i32);
            }
        }

        let n = labels.len();
        let images = Tensor::<B, 4>::from_data(TensorData::new(pixels, [n, 3, size, size]), device);
        let targets = Tensor::<B, 1, Int>::from_ints(labels.as_slice(), device);

        ImageBatch { images, targets }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use image::RgbImage;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_batch_shapes_and_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.png");
        RgbImage::from_pixel(20, 12, image::Rgb([10, 200, 30])).save(&good).unwrap();
        let bad = dir.path().join("bad.png");
        std::fs::write(&bad, b"not a png").unwrap();

        let batcher = ImageBatcher::<TestBackend>::new(Transform::eval(10, 8), 0);
        let items = vec![
            ImageRecord { path: good.clone(), label: 3 },
            ImageRecord { path: bad, label: 1 },
            ImageRecord { path: good, label: 0 },
        ];
        let batch = batcher.batch(items, &Default::default());

        assert_eq!(batch.images.dims(), [2, 3, 8, 8]);
        assert_eq!(batch.len(), 2);
        let labels: Vec<i64> = batch.targets.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(labels, vec![3, 0]);
    }

    #[test]
    fn test_augmentation_follows_the_seed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.png");
        RgbImage::from_fn(40, 30, |x, y| image::Rgb([(x * 6) as u8, (y * 8) as u8, 90]))
            .save(&path)
            .unwrap();
        let items = || vec![ImageRecord { path: path.clone(), label: 0 }; 3];
        let pixels = |batcher: &ImageBatcher<TestBackend>| -> Vec<f32> {
            batcher.batch(items(), &Default::default()).images.into_data().to_vec().unwrap()
        };

        let a = ImageBatcher::<TestBackend>::new(Transform::train(16), 11);
        let b = ImageBatcher::<TestBackend>::new(Transform::train(16), 11);
        assert_eq!(pixels(&a), pixels(&b));

        // Clones draw from one shared sequence, so worker batches differ
        let shared = a.clone();
        assert_ne!(pixels(&a), pixels(&shared));
    }

    #[test]
    fn test_workers_batch_concurrently() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.png");
        RgbImage::from_pixel(24, 24, image::Rgb([1, 2, 3])).save(&path).unwrap();
        let batcher = ImageBatcher::<TestBackend>::new(Transform::train(8), 5);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let batcher = batcher.clone();
                let path = path.clone();
                std::thread::spawn(move || {
                    let items = vec![ImageRecord { path, label: 2 }; 4];
                    batcher.batch(items, &Default::default()).images.dims()
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), [4, 3, 8, 8]);
        }
    }
}
