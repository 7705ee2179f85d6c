// ============================================================
// Layer 6 - Checkpoints
// ============================================================
// Saving, rolling retention and restoring of training state.
//
// One checkpoint = three files sharing a stem:
//
//   imagenet_resnet18_last-0004.mpk        model record
//   imagenet_resnet18_last-0004-optim.mpk  optimizer record
//   imagenet_resnet18_last-0004.json       CheckpointMeta
//
// CheckpointSaver runs after every validated epoch:
//   1. epoch % save_interval == 0 or final epoch
//        → write a "last" checkpoint, keep the newest `last_count`
//   2. selected score strictly improved (first epoch always does)
//        → copy the last checkpoint (or write one) to a "best"
//          stem, keep the newest `best_count`, append best_map.log
//   3. append the epoch's scores to score.log
//
// Existing stems in the directory are picked up on construction,
// so a resumed run keeps pruning checkpoints of the previous one.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use burn::{
    module::Module,
    optim::Optimizer,
    record::{DefaultRecorder, FileRecorder, Recorder},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, VecDeque},
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

use crate::{
    domain::{
        progress::{BestScore, TrainingProgress},
        scores::{EpochScores, ScoreKind},
        traits::CheckpointWriter,
    },
    infra::metrics::{BestLog, ScoreLog, BEST_MAP_LOG_FILE_NAME, SCORE_LOG_FILE_NAME},
    ml::{models::Network, optimizer::NetworkOptimizer},
};

const OPTIM_SUFFIX: &str = "-optim";
const META_EXTENSION: &str = "json";

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint metadata '{0}' not found")]
    MissingMeta(PathBuf),

    #[error("checkpoint was trained as '{found}' but '{expected}' was requested")]
    ModelMismatch { expected: String, found: String },

    #[error("checkpoint has {found} classes but {expected} were requested")]
    ClassMismatch { expected: usize, found: usize },
}

// ─── CheckpointMeta ───────────────────────────────────────────────────────────
/// JSON side-car written next to every checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMeta {
    pub model: String,
    pub num_classes: usize,
    #[serde(flatten)]
    pub progress: TrainingProgress,
    pub score: ScoreKind,
    pub version: String,
}

impl CheckpointMeta {
    /// Refuse a checkpoint produced for another model or class count.
    pub fn check(&self, model: &str, num_classes: usize) -> Result<(), CheckpointError> {
        if !self.model.eq_ignore_ascii_case(model) {
            return Err(CheckpointError::ModelMismatch {
                expected: model.to_string(),
                found: self.model.clone(),
            });
        }
        if self.num_classes != num_classes {
            return Err(CheckpointError::ClassMismatch {
                expected: num_classes,
                found: self.num_classes,
            });
        }
        Ok(())
    }
}

/// Accept a stem or any file of a checkpoint and return the stem.
pub fn resolve_stem(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return path.to_path_buf();
    };
    let stem = name
        .strip_suffix(".mpk")
        .map(|s| s.strip_suffix(OPTIM_SUFFIX).unwrap_or(s))
        .or_else(|| name.strip_suffix(".json"))
        .unwrap_or(name);
    path.with_file_name(stem)
}

fn with_suffix(stem: &Path, suffix: &str) -> PathBuf {
    let mut name = stem.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(suffix);
    stem.with_file_name(name)
}

pub fn meta_path(stem: &Path) -> PathBuf {
    with_suffix(stem, &format!(".{META_EXTENSION}"))
}

pub fn read_meta(stem: &Path) -> Result<CheckpointMeta> {
    let path = meta_path(stem);
    if !path.exists() {
        return Err(CheckpointError::MissingMeta(path).into());
    }
    let json = fs::read_to_string(&path)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("Malformed checkpoint metadata '{}'", path.display()))
}

/// Load model weights from `path` (a stem or the `.mpk` file).
pub fn load_model<B: Backend>(
    model: Network<B>,
    path: &Path,
    device: &B::Device,
) -> Result<Network<B>> {
    let stem = resolve_stem(path);
    let record = DefaultRecorder::new()
        .load(stem.clone(), device)
        .with_context(|| format!("Cannot load model weights '{}'", stem.display()))?;
    Ok(model.load_record(record))
}

pub fn load_optimizer<B: AutodiffBackend>(
    optim: NetworkOptimizer<B>,
    stem: &Path,
    device: &B::Device,
) -> Result<NetworkOptimizer<B>> {
    let path = with_suffix(stem, OPTIM_SUFFIX);
    let record = Recorder::<B>::load(&DefaultRecorder::new(), path.clone(), device)
        .with_context(|| format!("Cannot load optimizer state '{}'", path.display()))?;
    Ok(optim.load_record(record))
}

/// Write a serialisable run configuration as pretty JSON.
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("Cannot write '{}'", path.display()))?;
    tracing::debug!("Saved '{}'", path.display());
    Ok(())
}

// ─── TrainingSnapshot ─────────────────────────────────────────────────────────
/// Borrowed view of the live training state, written as one checkpoint.
pub struct TrainingSnapshot<'a, B: AutodiffBackend> {
    pub model: &'a Network<B>,
    pub optim: &'a NetworkOptimizer<B>,
    pub model_name: &'a str,
    pub num_classes: usize,
    pub score: ScoreKind,
}

impl<B: AutodiffBackend> CheckpointWriter for TrainingSnapshot<'_, B> {
    fn write(&self, stem: &Path, progress: &TrainingProgress) -> Result<()> {
        let recorder = DefaultRecorder::new();
        recorder
            .record(self.model.clone().into_record(), stem.to_path_buf())
            .with_context(|| format!("Failed to save model to '{}'", stem.display()))?;
        Recorder::<B>::record(&recorder, self.optim.to_record(), with_suffix(stem, OPTIM_SUFFIX))
            .with_context(|| format!("Failed to save optimizer to '{}'", stem.display()))?;

        let meta = CheckpointMeta {
            model: self.model_name.to_string(),
            num_classes: self.num_classes,
            progress: *progress,
            score: self.score,
            version: env!("CARGO_PKG_VERSION").to_string(),
        };
        save_json(&meta_path(stem), &meta)
    }

    fn artifact_paths(&self, stem: &Path) -> Vec<PathBuf> {
        let ext = <DefaultRecorder as FileRecorder<B>>::file_extension();
        vec![
            with_suffix(stem, &format!(".{ext}")),
            with_suffix(stem, &format!("{OPTIM_SUFFIX}.{ext}")),
            meta_path(stem),
        ]
    }
}

// ─── CheckpointSaver ──────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq)]
pub struct SaverSettings {
    pub dir: PathBuf,
    /// e.g. `imagenet_resnet18`
    pub prefix: String,
    pub save_interval: usize,
    pub num_epochs: usize,
    pub last_count: usize,
    pub best_count: usize,
    pub score: ScoreKind,
    pub attempt: usize,
}

impl SaverSettings {
    pub fn new(dir: impl Into<PathBuf>, model: &str, save_interval: usize, num_epochs: usize) -> Self {
        Self {
            dir: dir.into(),
            prefix: format!("imagenet_{model}"),
            save_interval,
            num_epochs,
            last_count: 2,
            best_count: 2,
            score: ScoreKind::default(),
            attempt: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Last,
    Best,
}

impl Slot {
    fn tag(self) -> &'static str {
        match self {
            Slot::Last => "last",
            Slot::Best => "best",
        }
    }
}

pub struct CheckpointSaver {
    settings: SaverSettings,
    last: VecDeque<PathBuf>,
    best_stems: VecDeque<PathBuf>,
    best: Option<BestScore>,
    score_log: ScoreLog,
    best_log: BestLog,
}

impl CheckpointSaver {
    pub fn new(settings: SaverSettings) -> Result<Self> {
        fs::create_dir_all(&settings.dir)
            .with_context(|| format!("Cannot create '{}'", settings.dir.display()))?;

        let last = scan_stems(&settings.dir, &settings.prefix, Slot::Last)?;
        let best_stems = scan_stems(&settings.dir, &settings.prefix, Slot::Best)?;
        if !last.is_empty() || !best_stems.is_empty() {
            tracing::info!(
                "Found {} last and {} best checkpoints in '{}'",
                last.len(),
                best_stems.len(),
                settings.dir.display()
            );
        }

        let score_log = ScoreLog::open(settings.dir.join(SCORE_LOG_FILE_NAME), settings.attempt)?;
        let best_log = BestLog::new(settings.dir.join(BEST_MAP_LOG_FILE_NAME));

        Ok(Self {
            settings,
            last,
            best_stems,
            best: None,
            score_log,
            best_log,
        })
    }

    /// Seed best tracking from a resumed checkpoint.
    pub fn restore_best(&mut self, best: Option<BestScore>) {
        self.best = best;
    }

    pub fn best(&self) -> Option<BestScore> {
        self.best
    }

    pub fn score(&self) -> ScoreKind {
        self.settings.score
    }

    pub fn last_stems(&self) -> impl Iterator<Item = &Path> {
        self.last.iter().map(PathBuf::as_path)
    }

    pub fn best_stems(&self) -> impl Iterator<Item = &Path> {
        self.best_stems.iter().map(PathBuf::as_path)
    }

    fn stem(&self, slot: Slot, epoch: usize) -> PathBuf {
        self.settings
            .dir
            .join(format!("{}_{}-{:04}", self.settings.prefix, slot.tag(), epoch))
    }

    /// Record one finished epoch. `epoch` is 1-based.
    pub fn epoch_end<W: CheckpointWriter>(
        &mut self,
        epoch: usize,
        scores: &EpochScores,
        writer: &W,
    ) -> Result<()> {
        let kind = self.settings.score;
        let value = scores.get(kind);
        let improved = if value.is_finite() {
            self.best.map_or(true, |b| kind.improves(value, b.value))
        } else {
            tracing::warn!("Epoch {} has no {} score, best stays unchanged", epoch, kind);
            false
        };
        if improved {
            self.best = Some(BestScore { epoch, value });
        }
        let progress = TrainingProgress { epoch, best: self.best };

        let interval = self.settings.save_interval.max(1);
        let mut written = None;
        if epoch % interval == 0 || epoch == self.settings.num_epochs {
            let stem = self.stem(Slot::Last, epoch);
            writer.write(&stem, &progress)?;
            tracing::info!("Saved checkpoint '{}'", stem.display());
            push_and_prune(&mut self.last, stem.clone(), self.settings.last_count, writer)?;
            written = Some(stem);
        }

        if improved {
            let stem = self.stem(Slot::Best, epoch);
            match &written {
                Some(source) => copy_checkpoint(source, &stem, writer)?,
                None => writer.write(&stem, &progress)?,
            }
            push_and_prune(&mut self.best_stems, stem, self.settings.best_count, writer)?;
            self.best_log.log(epoch, value)?;
            tracing::info!("New best {}: {:.4} at epoch {}", kind, value, epoch);
        }

        self.score_log.log(epoch, scores)
    }
}

fn push_and_prune<W: CheckpointWriter>(
    stems: &mut VecDeque<PathBuf>,
    stem: PathBuf,
    keep: usize,
    writer: &W,
) -> Result<()> {
    stems.retain(|s| s != &stem);
    stems.push_back(stem);
    while stems.len() > keep {
        let Some(old) = stems.pop_front() else { break };
        for path in writer.artifact_paths(&old) {
            if path.exists() {
                fs::remove_file(&path)
                    .with_context(|| format!("Cannot remove '{}'", path.display()))?;
            }
        }
        tracing::debug!("Removed checkpoint '{}'", old.display());
    }
    Ok(())
}

fn copy_checkpoint<W: CheckpointWriter>(from: &Path, to: &Path, writer: &W) -> Result<()> {
    for (src, dst) in writer.artifact_paths(from).into_iter().zip(writer.artifact_paths(to)) {
        fs::copy(&src, &dst)
            .with_context(|| format!("Cannot copy '{}' to '{}'", src.display(), dst.display()))?;
    }
    Ok(())
}

/// Stems `<prefix>_<slot>-<digits>` present in `dir`, oldest epoch first.
fn scan_stems(dir: &Path, prefix: &str, slot: Slot) -> Result<VecDeque<PathBuf>> {
    let head = format!("{}_{}-", prefix, slot.tag());
    let mut found = BTreeMap::new();

    let entries = fs::read_dir(dir).with_context(|| format!("Cannot read '{}'", dir.display()))?;
    for entry in entries.filter_map(|e| e.ok()) {
        let name = entry.file_name();
        let Some(rest) = name.to_str().and_then(|n| n.strip_prefix(&head)) else {
            continue;
        };
        let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
        if let Ok(epoch) = digits.parse::<usize>() {
            found.insert(epoch, dir.join(format!("{head}{digits}")));
        }
    }
    Ok(found.into_values().collect())
}
