// ============================================================
// Layer 3 - Core Traits (Abstractions)
// ============================================================
// The checkpoint saver decides when and under which name to
// save. A CheckpointWriter decides what goes into the files.
//
// Implementations:
//   - infra::checkpoint::TrainingSnapshot → model + optimizer + meta
//   - test writers                         → one marker file per stem
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::domain::progress::TrainingProgress;

// ─── CheckpointWriter ─────────────────────────────────────────────────────────
/// Anything that can persist one checkpoint under a path stem.
///
/// A stem is a path without extension, e.g.
/// `checkpoints/imagenet_resnet18_last-0004`. Every file a writer
/// produces must be listed by `artifact_paths` for the same stem so
/// the saver can copy and delete checkpoints as a unit.
pub trait CheckpointWriter {
    /// Write every artifact for `stem`, embedding `progress`.
    fn write(&self, stem: &Path, progress: &TrainingProgress) -> Result<()>;

    /// All files `write` creates for `stem`.
    fn artifact_paths(&self, stem: &Path) -> Vec<PathBuf>;
}
