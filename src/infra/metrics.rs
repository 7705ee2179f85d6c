// ============================================================
// Layer 6 - Score Logs
// ============================================================
// Two append-only, tab-separated text files in the save dir:
//
//   score.log     one row per epoch, header written once
//     Attempt  Epoch  Val.Top1  Train.Top1  Val.Top5  Train.Loss
//     1        1      0.912000  0.954000    0.781000  6.402100
//
//   best_map.log  one row per new best
//     1        0.781000
//
// Both survive restarts: rows from a resumed run are appended
// below the previous run's rows, and the attempt column tells
// the runs apart.
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::domain::scores::EpochScores;

pub const SCORE_LOG_FILE_NAME: &str = "score.log";
pub const BEST_MAP_LOG_FILE_NAME: &str = "best_map.log";

fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Cannot open '{}' for appending", path.display()))?;
    writeln!(f, "{line}").with_context(|| format!("Cannot write to '{}'", path.display()))?;
    Ok(())
}

/// Per-epoch score table.
#[derive(Debug, Clone)]
pub struct ScoreLog {
    path: PathBuf,
    attempt: usize,
}

impl ScoreLog {
    /// Open `path`, writing the header if the file is new or empty.
    pub fn open(path: impl Into<PathBuf>, attempt: usize) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let is_new = fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(true);
        if is_new {
            let header = format!("Attempt\tEpoch\t{}", EpochScores::NAMES.join("\t"));
            append_line(&path, &header)?;
            tracing::debug!("Created score log: '{}'", path.display());
        }

        Ok(Self { path, attempt })
    }

    pub fn log(&self, epoch: usize, scores: &EpochScores) -> Result<()> {
        let values: Vec<String> = scores.values().iter().map(|v| format!("{v:.6}")).collect();
        append_line(
            &self.path,
            &format!("{}\t{}\t{}", self.attempt, epoch, values.join("\t")),
        )
    }
}

/// Epoch → value of every new best.
#[derive(Debug, Clone)]
pub struct BestLog {
    path: PathBuf,
}

impl BestLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn log(&self, epoch: usize, value: f64) -> Result<()> {
        append_line(&self.path, &format!("{epoch}\t{value:.6}"))
    }
}
