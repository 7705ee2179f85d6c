// ============================================================
// Layer 5 - Training Loop
// ============================================================
// Manual train + validation loop over burn's DataLoader and SGD.
//
//   optional: validate once when resuming (start_epoch > 1)
//   for epoch in start_epoch..=num_epochs:
//       train_epoch   lr per batch from LrSchedule,
//                     forward → cross-entropy → backward → step
//       validate      model.valid() on the inner backend
//       saver         checkpoints, score.log, best_map.log
//
// Training runs on the autodiff backend B; validation runs on
// B::InnerBackend with a second batcher, so no graph is recorded
// and batch norm uses its running statistics.
//
// Reference: Burn Book §5 (Custom Training Loop)

use anyhow::Result;
use burn::{
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    nn::loss::{CrossEntropyLoss, CrossEntropyLossConfig},
    optim::{GradientsParams, Optimizer},
    prelude::*,
    tensor::{backend::AutodiffBackend, ElementConversion},
};
use std::time::Instant;

use crate::{
    data::{
        batcher::{ImageBatch, ImageBatcher},
        dataset::ImageFolder,
        transform::Transform,
    },
    domain::{meter::AverageMeter, progress::BestScore, scores::EpochScores},
    infra::checkpoint::{CheckpointSaver, TrainingSnapshot},
    ml::{
        accuracy::topk_hits, evaluator::validate, lr_schedule::LrSchedule, models::Network,
        optimizer::NetworkOptimizer,
    },
};

/// Loop and loader settings for one training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainSettings {
    pub model_name: String,
    pub num_classes: usize,
    /// 1-based, inclusive
    pub start_epoch: usize,
    pub num_epochs: usize,
    pub batch_size: usize,
    pub num_workers: usize,
    pub log_interval: usize,
    pub seed: u64,
    pub input_size: u32,
    pub resize_value: u32,
}

/// What a finished run hands back.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainOutcome {
    pub best: Option<BestScore>,
    /// Scores of the last epoch that ran
    pub last_scores: Option<EpochScores>,
}

pub struct Trainer<B: AutodiffBackend> {
    optim: NetworkOptimizer<B>,
    schedule: LrSchedule,
    settings: TrainSettings,
    loss: CrossEntropyLoss<B>,
    params_logged: bool,
}

/// Number of batches per epoch, rounding the last partial batch up.
pub fn iters_per_epoch(num_samples: usize, batch_size: usize) -> usize {
    num_samples.div_ceil(batch_size.max(1))
}

impl<B: AutodiffBackend> Trainer<B> {
    pub fn new(
        optim: NetworkOptimizer<B>,
        schedule: LrSchedule,
        settings: TrainSettings,
        device: &B::Device,
    ) -> Self {
        Self {
            optim,
            schedule,
            settings,
            loss: CrossEntropyLossConfig::new().init(device),
            params_logged: false,
        }
    }

    /// One pass over the training batches of zero-based `epoch`.
    /// Returns the model and `(top1_err, mean_loss)`.
    pub fn train_epoch(
        &mut self,
        mut model: Network<B>,
        epoch: usize,
        batches: impl Iterator<Item = ImageBatch<B>>,
    ) -> (Network<B>, f64, f64) {
        let tic = Instant::now();
        let mut btic = Instant::now();
        let mut acc_top1 = AverageMeter::new();
        let mut loss_sum = 0.0;
        let mut num_batches = 0usize;
        let mut num_samples = 0usize;
        let mut interval_samples = 0usize;

        for (i, batch) in batches.enumerate() {
            if batch.is_empty() {
                tracing::warn!("Epoch[{}] Batch [{}] has no decodable images, skipping", epoch + 1, i);
                continue;
            }
            if !self.params_logged {
                tracing::info!("Number of model parameters: {}", model.num_params());
                self.params_logged = true;
            }

            let lr = self.schedule.lr(epoch, i);
            let n = batch.len();

            let logits = model.forward(batch.images);
            let loss = self.loss.forward(logits.clone(), batch.targets.clone());
            let hits = topk_hits(logits.detach(), batch.targets, &[1])[0];

            loss_sum += loss.clone().into_scalar().elem::<f64>();
            acc_top1.update(hits as f64 / n as f64, n);
            num_batches += 1;
            num_samples += n;
            interval_samples += n;

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = self.optim.step(lr, model, grads);

            if self.settings.log_interval > 0 && (i + 1) % self.settings.log_interval == 0 {
                let speed = interval_samples as f64 / btic.elapsed().as_secs_f64().max(1e-9);
                tracing::info!(
                    "Epoch[{}] Batch [{}]\tSpeed: {:.2} samples/sec\ttop1-err={:.4}\tlr={:.4}",
                    epoch + 1,
                    i,
                    speed,
                    1.0 - acc_top1.avg,
                    lr
                );
                btic = Instant::now();
                interval_samples = 0;
            }
        }

        let (err_top1, train_loss) = if num_batches > 0 {
            (1.0 - acc_top1.avg, loss_sum / num_batches as f64)
        } else {
            (f64::NAN, f64::NAN)
        };
        let elapsed = tic.elapsed().as_secs_f64();

        tracing::info!(
            "[Epoch {}] training: err-top1={:.4}\tloss={:.4}",
            epoch + 1,
            err_top1,
            train_loss
        );
        tracing::info!(
            "[Epoch {}] speed: {:.2} samples/sec\ttime cost: {:.2} sec",
            epoch + 1,
            num_samples as f64 / elapsed.max(1e-9),
            elapsed
        );

        (model, err_top1, train_loss)
    }

    /// Run every epoch from `start_epoch` to `num_epochs`.
    pub fn train_net(
        mut self,
        mut model: Network<B>,
        train_set: ImageFolder,
        val_set: ImageFolder,
        mut saver: Option<&mut CheckpointSaver>,
    ) -> Result<TrainOutcome> {
        let s = self.settings.clone();
        let batch_size = s.batch_size.max(1);

        // Training loader (autodiff backend, augmenting, shuffled)
        let train_batcher = ImageBatcher::<B>::new(Transform::train(s.input_size), s.seed);
        let mut train_builder = DataLoaderBuilder::new(train_batcher)
            .batch_size(batch_size)
            .shuffle(s.seed);
        if s.num_workers > 0 {
            train_builder = train_builder.num_workers(s.num_workers);
        }
        let train_loader = train_builder.build(train_set);

        // Validation loader (inner backend, deterministic)
        let val_batcher = ImageBatcher::<B::InnerBackend>::new(
            Transform::eval(s.resize_value, s.input_size),
            s.seed,
        );
        let mut val_builder = DataLoaderBuilder::new(val_batcher).batch_size(batch_size);
        if s.num_workers > 0 {
            val_builder = val_builder.num_workers(s.num_workers);
        }
        let val_loader = val_builder.build(val_set);

        if s.start_epoch > 1 {
            tracing::info!("Start training from [Epoch {}]", s.start_epoch);
            let (err_top1, err_top5) = validate(&model.valid(), val_loader.iter());
            tracing::info!(
                "[Epoch {}] validation: err-top1={:.4}\terr-top5={:.4}",
                s.start_epoch - 1,
                err_top1,
                err_top5
            );
        }

        let gtic = Instant::now();
        let mut last_scores = None;
        for epoch in s.start_epoch..=s.num_epochs {
            let (trained, train_top1_err, train_loss) =
                self.train_epoch(model, epoch - 1, train_loader.iter());
            model = trained;

            let (val_top1_err, val_top5_err) = validate(&model.valid(), val_loader.iter());
            tracing::info!(
                "[Epoch {}] validation: err-top1={:.4}\terr-top5={:.4}",
                epoch,
                val_top1_err,
                val_top5_err
            );

            let scores = EpochScores {
                val_top1_err,
                train_top1_err,
                val_top5_err,
                train_loss,
            };
            if let Some(saver) = saver.as_deref_mut() {
                let snapshot = TrainingSnapshot {
                    model: &model,
                    optim: &self.optim,
                    model_name: &s.model_name,
                    num_classes: s.num_classes,
                    score: saver.score(),
                };
                saver.epoch_end(epoch, &scores, &snapshot)?;
            }
            last_scores = Some(scores);
        }

        tracing::info!("Total time cost: {:.2} sec", gtic.elapsed().as_secs_f64());
        let best = saver.as_deref().and_then(CheckpointSaver::best);
        if let Some(saver) = saver.as_deref() {
            if let Some(best) = best {
                tracing::info!("Best {}: {:.4} at {} epoch", saver.score(), best.value, best.epoch);
            }
            if let Some(stem) = saver.best_stems().last() {
                tracing::info!("Best checkpoint: '{}'", stem.display());
            }
            if let Some(stem) = saver.last_stems().last() {
                tracing::info!("Resume from: '{}'", stem.display());
            }
        }

        Ok(TrainOutcome {
            best,
            last_scores,
        })
    }
}
