// ============================================================
// Layer 2 - TrainUseCase
// ============================================================
// Runs a training job in order:
//
//   Step 1: Seed the backend                   (Layer 5 - ml)
//   Step 2: Index train/ and val/              (Layer 4 - data)
//   Step 3: Build the network by name          (Layer 5 - ml)
//   Step 4: Load pretrained weights, or resume
//           model + optimizer + progress       (Layer 6 - infra)
//   Step 5: Open the checkpoint saver, save
//           train_config.json                  (Layer 6 - infra)
//   Step 6: Build the LR schedule              (Layer 5 - ml)
//   Step 7: Run the epoch loop                 (Layer 5 - ml)
//
// Reference: Burn Book §5 (Training)

use anyhow::{bail, Result};
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, Autodiff, NdArray, Wgpu},
    data::dataset::Dataset,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{
    data::dataset::ImageFolder,
    domain::{progress::BestScore, scores::{EpochScores, ScoreKind}},
    infra::{
        checkpoint::{
            load_model, load_optimizer, read_meta, resolve_stem, save_json, CheckpointSaver,
            SaverSettings,
        },
        env_stats::EnvStats,
    },
    ml::{
        lr_schedule::{decay_epochs, LrMode, LrSchedule},
        optimizer::{OptimizerKind, OptimizerSettings},
        registry,
        trainer::{iters_per_epoch, TrainSettings, Trainer},
    },
};

pub const TRAIN_CONFIG_FILE_NAME: &str = "train_config.json";

// ─── Training Configuration ──────────────────────────────────────────────────
/// Every knob of a training run. Saved as train_config.json.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub data_dir: PathBuf,
    pub model: String,
    pub pretrained: Option<PathBuf>,
    pub resume: Option<PathBuf>,
    /// 0 selects the CPU backend
    pub num_gpus: usize,
    pub num_workers: usize,
    pub batch_size: usize,
    pub num_epochs: usize,
    /// 1-based; replaced by the checkpoint's next epoch when resuming
    pub start_epoch: usize,
    pub optimizer: OptimizerKind,
    pub lr: f64,
    pub lr_mode: LrMode,
    pub lr_decay: f64,
    pub lr_decay_period: usize,
    pub lr_decay_epoch: String,
    pub target_lr: f64,
    pub poly_power: f64,
    pub warmup_lr: f64,
    pub warmup_epochs: usize,
    pub momentum: f64,
    pub wd: f64,
    pub log_interval: usize,
    pub save_interval: usize,
    /// None disables checkpoints and the log file
    pub save_dir: Option<PathBuf>,
    pub logging_file_name: String,
    pub seed: u64,
    pub best_metric: ScoreKind,
    pub attempt: usize,
    pub input_size: u32,
    pub resize_value: u32,
    /// Taken from the dataset when None
    pub num_classes: Option<usize>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("../imgclsmob_data/imagenet"),
            model: String::new(),
            pretrained: None,
            resume: None,
            num_gpus: 0,
            num_workers: 4,
            batch_size: 32,
            num_epochs: 3,
            start_epoch: 1,
            optimizer: OptimizerKind::Nag,
            lr: 0.1,
            lr_mode: LrMode::Step,
            lr_decay: 0.1,
            lr_decay_period: 0,
            lr_decay_epoch: "40,60".to_string(),
            target_lr: 1e-8,
            poly_power: 2.0,
            warmup_lr: 0.0,
            warmup_epochs: 0,
            momentum: 0.9,
            wd: 1e-4,
            log_interval: 50,
            save_interval: 4,
            save_dir: None,
            logging_file_name: "train.log".to_string(),
            seed: 0,
            best_metric: ScoreKind::ValTop5,
            attempt: 1,
            input_size: 224,
            resize_value: 256,
            num_classes: None,
        }
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainReport {
    pub start_epoch: usize,
    pub best: Option<BestScore>,
    pub last_scores: Option<EpochScores>,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Pick the backend from `num_gpus` and run.
    pub fn execute(&self) -> Result<TrainReport> {
        if self.config.num_gpus == 0 {
            let device = NdArrayDevice::Cpu;
            log_env("ndarray", &device);
            self.execute_on::<Autodiff<NdArray>>(device)
        } else {
            if self.config.num_gpus > 1 {
                tracing::warn!(
                    "{} GPUs requested, training runs on a single device",
                    self.config.num_gpus
                );
            }
            let device = WgpuDevice::default();
            log_env("wgpu", &device);
            self.execute_on::<Autodiff<Wgpu>>(device)
        }
    }

    pub fn execute_on<B: AutodiffBackend>(&self, device: B::Device) -> Result<TrainReport> {
        let cfg = &self.config;

        // ── Step 1: Seed ──────────────────────────────────────────────────────
        B::seed(&device, cfg.seed);

        // ── Step 2: Datasets ──────────────────────────────────────────────────
        let (train_set, val_set) = ImageFolder::open_splits(&cfg.data_dir)?;
        let num_classes = resolve_num_classes(cfg.num_classes, train_set.num_classes())?;

        // ── Step 3: Network ───────────────────────────────────────────────────
        let mut model = registry::build::<B>(&cfg.model, num_classes, &device)?;
        tracing::info!("Built '{}' with {} classes", cfg.model, num_classes);

        if let Some(path) = &cfg.pretrained {
            model = load_model(model, path, &device)?;
            tracing::info!("Loaded pretrained weights from '{}'", path.display());
        }

        let mut optim = OptimizerSettings {
            kind: cfg.optimizer,
            momentum: cfg.momentum,
            weight_decay: cfg.wd,
        }
        .init::<B>();

        // ── Step 4: Resume ────────────────────────────────────────────────────
        let mut start_epoch = cfg.start_epoch.max(1);
        let mut best = None;
        if let Some(path) = &cfg.resume {
            let stem = resolve_stem(path);
            let meta = read_meta(&stem)?;
            meta.check(&cfg.model, num_classes)?;
            model = load_model(model, &stem, &device)?;
            optim = load_optimizer(optim, &stem, &device)?;
            start_epoch = meta.progress.next_epoch();

            if meta.score == cfg.best_metric {
                best = meta.progress.best;
            } else {
                tracing::warn!(
                    "Checkpoint tracked {} but {} was requested, best score starts over",
                    meta.score,
                    cfg.best_metric
                );
            }
            tracing::info!(
                "Resumed from '{}' (epoch {}, best {:?})",
                stem.display(),
                meta.progress.epoch,
                meta.progress.best
            );
        }
        if start_epoch > cfg.num_epochs {
            tracing::warn!(
                "Start epoch {} is past the last epoch {}, nothing to train",
                start_epoch,
                cfg.num_epochs
            );
        }

        // ── Step 5: Saver ─────────────────────────────────────────────────────
        let mut saver = match &cfg.save_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                save_json(&dir.join(TRAIN_CONFIG_FILE_NAME), cfg)?;
                if cfg.save_interval > 0 {
                    let mut settings =
                        SaverSettings::new(dir, &cfg.model, cfg.save_interval, cfg.num_epochs);
                    settings.score = cfg.best_metric;
                    settings.attempt = cfg.attempt;
                    let mut saver = CheckpointSaver::new(settings)?;
                    saver.restore_best(best);
                    Some(saver)
                } else {
                    None
                }
            }
            None => None,
        };

        // ── Step 6: LR schedule ───────────────────────────────────────────────
        let schedule = LrSchedule {
            mode: cfg.lr_mode,
            base_lr: cfg.lr,
            target_lr: cfg.target_lr,
            iters_per_epoch: iters_per_epoch(train_set.len(), cfg.batch_size),
            num_epochs: cfg.num_epochs,
            decay_epochs: decay_epochs(cfg.lr_decay_period, &cfg.lr_decay_epoch, cfg.num_epochs)?,
            decay_factor: cfg.lr_decay,
            power: cfg.poly_power,
            warmup_epochs: cfg.warmup_epochs,
            warmup_lr: cfg.warmup_lr,
        };

        // ── Step 7: Train ─────────────────────────────────────────────────────
        let settings = TrainSettings {
            model_name: cfg.model.clone(),
            num_classes,
            start_epoch,
            num_epochs: cfg.num_epochs,
            batch_size: cfg.batch_size,
            num_workers: cfg.num_workers,
            log_interval: cfg.log_interval,
            seed: cfg.seed,
            input_size: cfg.input_size,
            resize_value: cfg.resize_value,
        };
        let outcome = Trainer::new(optim, schedule, settings, &device).train_net(
            model,
            train_set,
            val_set,
            saver.as_mut(),
        )?;

        Ok(TrainReport {
            start_epoch,
            best: outcome.best,
            last_scores: outcome.last_scores,
        })
    }
}

/// Class count from the command line, or from the dataset when absent.
pub fn resolve_num_classes(requested: Option<usize>, in_dataset: usize) -> Result<usize> {
    match requested {
        Some(n) if n < in_dataset => bail!(
            "--num-classes {} is smaller than the {} classes found in the dataset",
            n,
            in_dataset
        ),
        Some(n) => Ok(n),
        None => Ok(in_dataset),
    }
}

pub(crate) fn log_env<D: std::fmt::Debug>(backend: &str, device: &D) {
    let stats = EnvStats::collect(backend, format!("{device:?}"));
    tracing::info!("Env_stats:\n{}", stats.to_pretty_json());
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use std::path::Path;

    type TestBackend = Autodiff<NdArray<f32>>;

    fn write_images(dir: &Path, class: &str, count: u32, shade: u8) {
        let class_dir = dir.join(class);
        std::fs::create_dir_all(&class_dir).unwrap();
        for i in 0..count {
            let img = RgbImage::from_fn(20, 16, |x, y| {
                image::Rgb([shade, (x * 10 + i) as u8, (y * 10) as u8])
            });
            img.save(class_dir.join(format!("{i}.png"))).unwrap();
        }
    }

    fn tiny_config(root: &Path) -> TrainConfig {
        let data = root.join("data");
        for (split, count) in [("train", 4), ("val", 2)] {
            write_images(&data.join(split), "dark", count, 20);
            write_images(&data.join(split), "light", count, 230);
        }
        TrainConfig {
            data_dir: data,
            model: "mobilenet0_25".to_string(),
            num_workers: 0,
            batch_size: 4,
            num_epochs: 2,
            lr: 0.01,
            log_interval: 1,
            save_interval: 1,
            save_dir: Some(root.join("ckpt")),
            seed: 3,
            input_size: 32,
            resize_value: 36,
            ..TrainConfig::default()
        }
    }

    #[test]
    fn test_resolve_num_classes() {
        assert_eq!(resolve_num_classes(None, 7).unwrap(), 7);
        assert_eq!(resolve_num_classes(Some(10), 7).unwrap(), 10);
        assert!(resolve_num_classes(Some(5), 7).is_err());
    }

    #[test]
    fn test_config_json_round_trip_keeps_defaults() {
        let cfg = TrainConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(json.contains("\"lr_mode\":\"step\""));
        assert!(json.contains("\"optimizer\":\"nag\""));
        assert!(json.contains("\"best_metric\":\"val-top5\""));
        let back: TrainConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn test_train_then_resume() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = tiny_config(dir.path());
        let ckpt = dir.path().join("ckpt");

        let report = TrainUseCase::new(cfg.clone())
            .execute_on::<TestBackend>(Default::default())
            .unwrap();
        assert_eq!(report.start_epoch, 1);
        let best = report.best.unwrap();
        assert!(best.epoch == 1 || best.epoch == 2);

        assert!(ckpt.join(TRAIN_CONFIG_FILE_NAME).exists());
        assert!(ckpt.join("imagenet_mobilenet0_25_last-0001.json").exists());
        assert!(ckpt.join("imagenet_mobilenet0_25_last-0002.json").exists());
        let score_log = std::fs::read_to_string(ckpt.join("score.log")).unwrap();
        assert_eq!(score_log.lines().count(), 3);

        let eval = crate::application::evaluate_use_case::EvaluateUseCase::new(
            crate::application::evaluate_use_case::EvaluateConfig {
                data_dir: cfg.data_dir.clone(),
                model: cfg.model.clone(),
                pretrained: None,
                resume: Some(ckpt.join("imagenet_mobilenet0_25_last-0002")),
                num_gpus: 0,
                num_workers: 0,
                batch_size: 3,
                seed: 0,
                input_size: 32,
                resize_value: 36,
                num_classes: None,
            },
        )
        .execute_on::<NdArray<f32>>(Default::default())
        .unwrap();
        assert!((0.0..=1.0).contains(&eval.top1_err));
        // two classes: the true label is always within the top five
        assert_eq!(eval.top5_err, 0.0);

        // Resume from any file of the last checkpoint and run one more epoch
        let resumed = TrainConfig {
            num_epochs: 3,
            resume: Some(ckpt.join("imagenet_mobilenet0_25_last-0002.json")),
            attempt: 2,
            ..cfg
        };
        let report = TrainUseCase::new(resumed)
            .execute_on::<TestBackend>(Default::default())
            .unwrap();
        assert_eq!(report.start_epoch, 3);
        assert!(report.best.unwrap().value <= best.value);

        assert!(ckpt.join("imagenet_mobilenet0_25_last-0003.json").exists());
        assert!(!ckpt.join("imagenet_mobilenet0_25_last-0001.json").exists());
        let score_log = std::fs::read_to_string(ckpt.join("score.log")).unwrap();
        assert_eq!(score_log.lines().count(), 4);
        assert!(score_log.lines().last().unwrap().starts_with("2\t3\t"));
    }

    #[test]
    fn test_resume_with_wrong_model_fails() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = TrainConfig {
            num_epochs: 1,
            ..tiny_config(dir.path())
        };
        TrainUseCase::new(cfg.clone())
            .execute_on::<TestBackend>(Default::default())
            .unwrap();

        let wrong = TrainConfig {
            model: "resnet10".to_string(),
            resume: Some(dir.path().join("ckpt/imagenet_mobilenet0_25_last-0001")),
            ..cfg
        };
        let err = TrainUseCase::new(wrong)
            .execute_on::<TestBackend>(Default::default())
            .unwrap_err();
        assert!(err.to_string().contains("resnet10"));
    }
}
