// ============================================================
// Layer 2 - EvaluateUseCase
// ============================================================
// One validation pass with trained weights:
//
//   Step 1: Index val/ (with train/'s class list when present)
//   Step 2: Build the network, load --resume or --pretrained
//   Step 3: Validate and log top-1 / top-5 error
//
// Runs on the plain backend, no autodiff.

use anyhow::{bail, Result};
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, NdArray, Wgpu},
    data::dataloader::DataLoaderBuilder,
    prelude::*,
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Instant};

use crate::{
    application::train_use_case::{log_env, resolve_num_classes},
    data::{batcher::ImageBatcher, dataset::ImageFolder, transform::Transform},
    infra::checkpoint::{load_model, read_meta, resolve_stem},
    ml::{evaluator::validate, registry},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluateConfig {
    pub data_dir: PathBuf,
    pub model: String,
    pub pretrained: Option<PathBuf>,
    pub resume: Option<PathBuf>,
    pub num_gpus: usize,
    pub num_workers: usize,
    pub batch_size: usize,
    pub seed: u64,
    pub input_size: u32,
    pub resize_value: u32,
    pub num_classes: Option<usize>,
}

/// Validation errors of one evaluation run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluateReport {
    pub top1_err: f64,
    pub top5_err: f64,
}

pub struct EvaluateUseCase {
    config: EvaluateConfig,
}

impl EvaluateUseCase {
    pub fn new(config: EvaluateConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<EvaluateReport> {
        if self.config.num_gpus == 0 {
            let device = NdArrayDevice::Cpu;
            log_env("ndarray", &device);
            self.execute_on::<NdArray>(device)
        } else {
            let device = WgpuDevice::default();
            log_env("wgpu", &device);
            self.execute_on::<Wgpu>(device)
        }
    }

    pub fn execute_on<B: Backend>(&self, device: B::Device) -> Result<EvaluateReport> {
        let cfg = &self.config;
        if cfg.resume.is_none() && cfg.pretrained.is_none() {
            bail!("Evaluation needs trained weights: pass --resume or --pretrained");
        }
        B::seed(&device, cfg.seed);

        // ── Step 1: Validation split ──────────────────────────────────────────
        let val_set = if cfg.data_dir.join("train").is_dir() {
            ImageFolder::open_splits(&cfg.data_dir)?.1
        } else {
            ImageFolder::open(cfg.data_dir.join("val"), None)?
        };
        let mut num_classes = resolve_num_classes(cfg.num_classes, val_set.num_classes())?;

        // ── Step 2: Network + weights ─────────────────────────────────────────
        let weights = match &cfg.resume {
            Some(path) => {
                let stem = resolve_stem(path);
                let meta = read_meta(&stem)?;
                if cfg.num_classes.is_none() {
                    num_classes = num_classes.max(meta.num_classes);
                }
                meta.check(&cfg.model, num_classes)?;
                stem
            }
            None => cfg.pretrained.clone().unwrap_or_default(),
        };
        let model = registry::build::<B>(&cfg.model, num_classes, &device)?;
        let model = load_model(model, &weights, &device)?;
        tracing::info!("Loaded '{}' weights from '{}'", cfg.model, weights.display());

        // ── Step 3: Validate ──────────────────────────────────────────────────
        let batcher = ImageBatcher::<B>::new(Transform::eval(cfg.resize_value, cfg.input_size), cfg.seed);
        let mut builder = DataLoaderBuilder::new(batcher).batch_size(cfg.batch_size.max(1));
        if cfg.num_workers > 0 {
            builder = builder.num_workers(cfg.num_workers);
        }
        let loader = builder.build(val_set);

        let tic = Instant::now();
        let (top1_err, top5_err) = validate(&model, loader.iter());
        tracing::info!("Test: err-top1={:.4}\terr-top5={:.4}", top1_err, top5_err);
        tracing::info!("Time cost: {:.4} sec", tic.elapsed().as_secs_f64());

        Ok(EvaluateReport { top1_err, top5_err })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: PathBuf) -> EvaluateConfig {
        EvaluateConfig {
            data_dir: dir,
            model: "resnet10".to_string(),
            pretrained: None,
            resume: None,
            num_gpus: 0,
            num_workers: 0,
            batch_size: 2,
            seed: 0,
            input_size: 32,
            resize_value: 36,
            num_classes: None,
        }
    }

    #[test]
    fn test_requires_weights() {
        let dir = tempfile::tempdir().unwrap();
        let err = EvaluateUseCase::new(config(dir.path().to_path_buf()))
            .execute_on::<NdArray<f32>>(Default::default())
            .unwrap_err();
        assert!(err.to_string().contains("--resume"));
    }

    #[test]
    fn test_missing_checkpoint_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let class_dir = dir.path().join("val/cat");
        std::fs::create_dir_all(&class_dir).unwrap();
        image::RgbImage::new(8, 8).save(class_dir.join("a.png")).unwrap();

        let cfg = EvaluateConfig {
            resume: Some(dir.path().join("missing_last-0001")),
            ..config(dir.path().to_path_buf())
        };
        assert!(EvaluateUseCase::new(cfg)
            .execute_on::<NdArray<f32>>(Default::default())
            .is_err());
    }
}
