// ============================================================
// Layer 4 - Image Folder Dataset
// ============================================================
// Indexes a directory laid out one sub-directory per class:
//
//   imagenet/
//     train/
//       n01440764/  *.JPEG
//       n01443537/  *.JPEG
//       ...
//     val/
//       n01440764/  *.JPEG
//       ...
//
// Class indices come from the sorted names of the train/ class
// directories. The val/ split reuses that list so label 7 means
// the same class in both splits even if val/ is missing a class.
//
// Only paths are indexed here. Pixels are decoded lazily by the
// batcher, inside the data loader's worker threads.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

use anyhow::{bail, Context, Result};
use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use walkdir::WalkDir;

/// File extensions accepted as images (compared lowercase).
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "ppm", "bmp", "pgm", "tif", "tiff", "webp",
];

/// One labelled image on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub path: PathBuf,
    pub label: usize,
}

/// A labelled set of image paths.
/// Cloning is cheap: the record list is shared.
#[derive(Debug, Clone)]
pub struct ImageFolder {
    classes: Arc<Vec<String>>,
    records: Arc<Vec<ImageRecord>>,
}

impl ImageFolder {
    /// Index `root`.
    ///
    /// With `classes == None` the class list is discovered from the
    /// sub-directories of `root`. With `Some(list)` only directories
    /// named in the list are indexed, each with its index in `list`.
    pub fn open(root: impl AsRef<Path>, classes: Option<&[String]>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let classes: Vec<String> = match classes {
            Some(list) => list.to_vec(),
            None => discover_classes(&root)?,
        };
        if classes.is_empty() {
            bail!("No class directories found in '{}'", root.display());
        }

        let index: HashMap<&str, usize> = classes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();

        let mut records = Vec::new();
        for class_dir in list_dirs(&root)? {
            let Some(name) = class_dir.file_name().and_then(|s| s.to_str()) else {
                continue;
            };
            let Some(&label) = index.get(name) else {
                tracing::warn!(
                    "Skipping '{}': class '{}' is not in the training class list",
                    class_dir.display(),
                    name
                );
                continue;
            };

            let mut paths: Vec<PathBuf> = WalkDir::new(&class_dir)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .filter(|p| has_image_extension(p))
                .collect();
            paths.sort();

            records.extend(paths.into_iter().map(|path| ImageRecord { path, label }));
        }

        if records.is_empty() {
            bail!("No images found under '{}'", root.display());
        }

        tracing::info!(
            "Indexed {} images in {} classes from '{}'",
            records.len(),
            classes.len(),
            root.display()
        );

        Ok(Self {
            classes: Arc::new(classes),
            records: Arc::new(records),
        })
    }

    /// Open `<data_dir>/train` and `<data_dir>/val` with a shared class list.
    pub fn open_splits(data_dir: impl AsRef<Path>) -> Result<(Self, Self)> {
        let data_dir = data_dir.as_ref();
        let train = Self::open(data_dir.join("train"), None)?;
        let val = Self::open(data_dir.join("val"), Some(train.classes()))?;
        Ok((train, val))
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }
}

impl Dataset<ImageRecord> for ImageFolder {
    fn get(&self, index: usize) -> Option<ImageRecord> {
        self.records.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

fn discover_classes(root: &Path) -> Result<Vec<String>> {
    let mut names: Vec<String> = list_dirs(root)?
        .iter()
        .filter_map(|p| p.file_name().and_then(|s| s.to_str()).map(str::to_string))
        .collect();
    names.sort();
    Ok(names)
}

fn list_dirs(root: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(root)
        .with_context(|| format!("Cannot read dataset directory '{}'", root.display()))?;
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    Ok(dirs)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn records(ds: &ImageFolder) -> Vec<ImageRecord> {
        (0..ds.len()).filter_map(|i| ds.get(i)).collect()
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_classes_sorted_and_extensions_filtered() {
        let dir = tempfile::tempdir().unwrap();
        let train = dir.path().join("train");
        touch(&train.join("zebra/a.JPEG"));
        touch(&train.join("zebra/notes.txt"));
        touch(&train.join("ant/nested/b.png"));
        touch(&train.join("ant/c.jpg"));

        let ds = ImageFolder::open(&train, None).unwrap();
        assert_eq!(ds.classes(), &["ant".to_string(), "zebra".to_string()]);
        assert_eq!(ds.len(), 3);

        let labels: Vec<usize> = records(&ds).iter().map(|r| r.label).collect();
        assert_eq!(labels, vec![0, 0, 1]);
        assert!(records(&ds).iter().all(|r| r.path.extension().unwrap() != "txt"));
    }

    #[test]
    fn test_val_reuses_train_classes() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("train/cat/1.png"));
        touch(&dir.path().join("train/dog/1.png"));
        touch(&dir.path().join("val/dog/1.png"));
        touch(&dir.path().join("val/emu/1.png"));

        let (train, val) = ImageFolder::open_splits(dir.path()).unwrap();
        assert_eq!(train.num_classes(), 2);
        assert_eq!(val.num_classes(), 2);
        // emu/ is unknown to the training split and gets skipped
        assert_eq!(val.len(), 1);
        assert_eq!(val.get(0).unwrap().label, 1);
    }

    #[test]
    fn test_empty_split_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("train/cat")).unwrap();
        assert!(ImageFolder::open(dir.path().join("train"), None).is_err());
        assert!(ImageFolder::open(dir.path().join("missing"), None).is_err());
    }
}
