// ============================================================
// Layer 6 - Logging Setup
// ============================================================
// Installs the global tracing subscriber:
//
//   stdout               always, with ANSI colours
//   <save_dir>/<file>    when a save dir is given, plain text,
//                        appended across runs
//
// A run that appends to a non-empty log first writes a separator
// line so consecutive runs are easy to tell apart.
//
// Filtering follows RUST_LOG, with this crate at `info` by default.

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_SEPARATOR: &str = "--------------------------------";

/// Open (or create) the log file, writing a separator if it already has content.
pub fn open_log_file(dir: &Path, file_name: &str) -> Result<(PathBuf, fs::File)> {
    fs::create_dir_all(dir).with_context(|| format!("Cannot create '{}'", dir.display()))?;
    let path = dir.join(file_name);
    let has_content = fs::metadata(&path).map(|m| m.len() > 0).unwrap_or(false);

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Cannot open log file '{}'", path.display()))?;
    if has_content {
        writeln!(file, "{LOG_SEPARATOR}")?;
    }
    Ok((path, file))
}

/// Install the subscriber. Returns the log file path, if any.
pub fn init_logging(save_dir: Option<&Path>, file_name: &str) -> Result<Option<PathBuf>> {
    let filter = EnvFilter::from_default_env().add_directive("imgcls_train=info".parse()?);

    let (path, file_layer) = match save_dir {
        Some(dir) => {
            let (path, file) = open_log_file(dir, file_name)?;
            let layer = fmt::layer().with_ansi(false).with_writer(Mutex::new(file));
            (Some(path), Some(layer))
        }
        None => (None, None),
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init();
    if installed.is_err() {
        tracing::debug!("A global subscriber is already installed");
    }
    Ok(path)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_separator_only_between_runs() {
        let dir = tempfile::tempdir().unwrap();

        let (path, mut f) = open_log_file(dir.path(), "train.log").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
        writeln!(f, "first run").unwrap();
        drop(f);

        open_log_file(dir.path(), "train.log").unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, format!("first run\n{LOG_SEPARATOR}\n"));
    }
}
