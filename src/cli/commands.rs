// ============================================================
// Layer 1 - CLI Commands and Arguments
// ============================================================
// Subcommands:
//   train     train a model, optionally resuming a checkpoint
//   evaluate  validate trained weights once
//   models    list every model name the registry knows
//
// Flag names and defaults follow the usual ImageNet training
// scripts (--lr-mode, --lr-decay-epoch, --save-interval, ...).
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::{
    application::{evaluate_use_case::EvaluateConfig, train_use_case::TrainConfig},
    domain::scores::ScoreKind,
    ml::{lr_schedule::LrMode, optimizer::OptimizerKind},
};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a model on an ImageNet-style image folder
    Train(TrainArgs),

    /// Evaluate trained weights on the validation split
    Evaluate(EvaluateArgs),

    /// List available model names
    Models,
}

/// Flags shared by train and evaluate.
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Dataset root with train/ and val/ class folders
    #[arg(long, default_value = "../imgclsmob_data/imagenet")]
    pub data_dir: PathBuf,

    /// Model name, see the `models` subcommand
    #[arg(long)]
    pub model: String,

    /// Model weights file to start from
    #[arg(long)]
    pub pretrained: Option<PathBuf>,

    /// Checkpoint stem (or any of its files) to resume from
    #[arg(long)]
    pub resume: Option<PathBuf>,

    /// Number of GPUs, 0 runs on the CPU
    #[arg(long, default_value_t = 0)]
    pub num_gpus: usize,

    /// Data loader worker threads
    #[arg(short = 'j', long = "num-data-workers", default_value_t = 4)]
    pub num_workers: usize,

    /// Training batch size per device
    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    /// Random seed, negative picks one at random
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    pub seed: i64,

    /// Directory for checkpoints and logs, empty disables both
    #[arg(long, default_value = "")]
    pub save_dir: String,

    /// Log file name inside the save dir
    #[arg(long, default_value = "train.log")]
    pub logging_file_name: String,

    /// Side of the square network input
    #[arg(long, default_value_t = 224)]
    pub input_size: u32,

    /// Shorter-side resize before the evaluation center crop
    #[arg(long, default_value_t = 256)]
    pub resize_value: u32,

    /// Number of classes, taken from the dataset when omitted
    #[arg(long)]
    pub num_classes: Option<usize>,
}

impl CommonArgs {
    pub fn save_dir(&self) -> Option<PathBuf> {
        let dir = self.save_dir.trim();
        (!dir.is_empty()).then(|| PathBuf::from(dir))
    }
}

#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Number of training epochs
    #[arg(long, default_value_t = 3)]
    pub num_epochs: usize,

    /// First epoch (1-based), overridden by --resume
    #[arg(long, default_value_t = 1)]
    pub start_epoch: usize,

    #[arg(long = "optimizer-name", value_enum, default_value_t = OptimizerKind::Nag)]
    pub optimizer: OptimizerKind,

    /// Base learning rate
    #[arg(long, default_value_t = 0.1)]
    pub lr: f64,

    #[arg(long, value_enum, default_value_t = LrMode::Step)]
    pub lr_mode: LrMode,

    /// Step mode decay factor
    #[arg(long, default_value_t = 0.1)]
    pub lr_decay: f64,

    /// Decay every N epochs, 0 uses --lr-decay-epoch
    #[arg(long, default_value_t = 0)]
    pub lr_decay_period: usize,

    /// Comma-separated epochs to decay at
    #[arg(long, default_value = "40,60")]
    pub lr_decay_epoch: String,

    /// Final learning rate of poly and cosine modes
    #[arg(long, default_value_t = 1e-8)]
    pub target_lr: f64,

    #[arg(long, default_value_t = 2.0)]
    pub poly_power: f64,

    /// Learning rate at the start of warmup
    #[arg(long, default_value_t = 0.0)]
    pub warmup_lr: f64,

    #[arg(long, default_value_t = 0)]
    pub warmup_epochs: usize,

    #[arg(long, default_value_t = 0.9)]
    pub momentum: f64,

    /// Weight decay
    #[arg(long, default_value_t = 1e-4)]
    pub wd: f64,

    /// Batches between progress lines
    #[arg(long, default_value_t = 50)]
    pub log_interval: usize,

    /// Epochs between checkpoints, 0 disables checkpointing
    #[arg(long, default_value_t = 4)]
    pub save_interval: usize,

    /// Score that selects the best checkpoint
    #[arg(long, value_enum, default_value_t = ScoreKind::ValTop5)]
    pub best_metric: ScoreKind,

    /// Attempt number written to score.log
    #[arg(long, default_value_t = 1)]
    pub attempt: usize,
}

#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

/// Resolve `--seed`: negative values draw a random seed.
pub fn init_seed(seed: i64) -> u64 {
    u64::try_from(seed).unwrap_or_else(|_| rand::random::<u32>() as u64)
}

impl TrainArgs {
    /// Build the run config with an already resolved seed.
    pub fn into_config(self, seed: u64) -> TrainConfig {
        let save_dir = self.common.save_dir();
        let c = self.common;
        TrainConfig {
            data_dir: c.data_dir,
            model: c.model,
            pretrained: c.pretrained,
            resume: c.resume,
            num_gpus: c.num_gpus,
            num_workers: c.num_workers,
            batch_size: c.batch_size,
            num_epochs: self.num_epochs,
            start_epoch: self.start_epoch,
            optimizer: self.optimizer,
            lr: self.lr,
            lr_mode: self.lr_mode,
            lr_decay: self.lr_decay,
            lr_decay_period: self.lr_decay_period,
            lr_decay_epoch: self.lr_decay_epoch,
            target_lr: self.target_lr,
            poly_power: self.poly_power,
            warmup_lr: self.warmup_lr,
            warmup_epochs: self.warmup_epochs,
            momentum: self.momentum,
            wd: self.wd,
            log_interval: self.log_interval,
            save_interval: self.save_interval,
            save_dir,
            logging_file_name: c.logging_file_name,
            seed,
            best_metric: self.best_metric,
            attempt: self.attempt,
            input_size: c.input_size,
            resize_value: c.resize_value,
            num_classes: c.num_classes,
        }
    }
}

impl EvaluateArgs {
    pub fn into_config(self, seed: u64) -> EvaluateConfig {
        let c = self.common;
        EvaluateConfig {
            data_dir: c.data_dir,
            model: c.model,
            pretrained: c.pretrained,
            resume: c.resume,
            num_gpus: c.num_gpus,
            num_workers: c.num_workers,
            batch_size: c.batch_size,
            seed,
            input_size: c.input_size,
            resize_value: c.resize_value,
            num_classes: c.num_classes,
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    fn parse(args: &[&str]) -> Commands {
        let mut argv = vec!["imgcls-train"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap().command
    }

    #[test]
    fn test_train_defaults_match_config_defaults() {
        let Commands::Train(args) = parse(&["train", "--model", "resnet18"]) else {
            panic!("expected train");
        };
        let cfg = args.into_config(7);
        let expected = TrainConfig {
            model: "resnet18".to_string(),
            seed: 7,
            ..TrainConfig::default()
        };
        assert_eq!(cfg, expected);
    }

    #[test]
    fn test_train_flags() {
        let Commands::Train(args) = parse(&[
            "train",
            "--model",
            "menet108_8x1_g3",
            "-j",
            "2",
            "--optimizer-name",
            "sgd",
            "--lr-mode",
            "cosine",
            "--best-metric",
            "val-top1",
            "--save-dir",
            "runs/a",
            "--seed",
            "-1",
        ]) else {
            panic!("expected train");
        };
        assert_eq!(args.common.seed, -1);
        let cfg = args.into_config(1);
        assert_eq!(cfg.num_workers, 2);
        assert_eq!(cfg.optimizer, OptimizerKind::Sgd);
        assert_eq!(cfg.lr_mode, LrMode::Cosine);
        assert_eq!(cfg.best_metric, ScoreKind::ValTop1);
        assert_eq!(cfg.save_dir, Some(PathBuf::from("runs/a")));
    }

    #[test]
    fn test_unknown_optimizer_rejected() {
        let argv = ["imgcls-train", "train", "--model", "resnet18", "--optimizer-name", "adam"];
        assert!(Cli::try_parse_from(argv).is_err());
    }

    #[test]
    fn test_init_seed() {
        assert_eq!(init_seed(42), 42);
        assert!(init_seed(-1) <= u32::MAX as u64);
    }
}
