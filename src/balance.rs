//! Class balancing for pairwise training.
//!
//! Both classes of a pair are truncated to the size of the smaller one, then
//! copied into a per-pair scratch directory that the trainer reads from.

use crate::corpus::{is_image_file, ClassImages};
use crate::pairs::{ClassLabel, ClassPair};
use rand::seq::index::sample;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use thiserror::Error;

/// Errors that can occur while balancing or materializing a pair
#[derive(Error, Debug)]
pub enum BalanceError {
    #[error("Class has no usable images: {label}")]
    InsufficientData { label: ClassLabel },

    #[error("Cannot balance a class against itself: {0}")]
    SameClass(ClassLabel),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// How the larger class is truncated to the common size
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceStrategy {
    /// Keep the first `min` files in file-name order
    #[default]
    Prefix,
    /// Pick `min` files with a seeded RNG, then restore file-name order
    Seeded(u64),
}

/// Two equal-length file lists, one per class of a pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalancedDataset {
    /// Pair the files belong to
    pub pair: ClassPair,
    /// Files of `pair.first()`
    pub first_files: Vec<PathBuf>,
    /// Files of `pair.second()`
    pub second_files: Vec<PathBuf>,
}

impl BalancedDataset {
    /// Files per class
    #[must_use]
    pub fn per_class(&self) -> usize {
        self.first_files.len()
    }

    /// Files across both classes
    #[must_use]
    pub fn total(&self) -> usize {
        self.first_files.len() + self.second_files.len()
    }
}

fn truncate(items: &[PathBuf], count: usize, strategy: BalanceStrategy) -> Vec<PathBuf> {
    match strategy {
        BalanceStrategy::Prefix => items.iter().take(count).cloned().collect(),
        BalanceStrategy::Seeded(seed) => {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut picked = sample(&mut rng, items.len(), count).into_vec();
            picked.sort_unstable();
            picked.into_iter().map(|i| items[i].clone()).collect()
        }
    }
}

/// Truncate two classes to `min(len a, len b)` files each.
///
/// Pure: the inputs are not modified and the result depends only on the
/// inputs and the strategy.
///
/// # Errors
///
/// Returns `InsufficientData` if either class has no images, and `SameClass`
/// if both classes carry the same label.
pub fn balance(
    class_a: &ClassImages,
    class_b: &ClassImages,
    strategy: BalanceStrategy,
) -> Result<BalancedDataset, BalanceError> {
    for class in [class_a, class_b] {
        if class.is_empty() {
            return Err(BalanceError::InsufficientData {
                label: class.label.clone(),
            });
        }
    }
    let pair = ClassPair::new(class_a.label.clone(), class_b.label.clone())
        .ok_or_else(|| BalanceError::SameClass(class_a.label.clone()))?;

    let count = class_a.len().min(class_b.len());

    Ok(BalancedDataset {
        pair,
        first_files: truncate(&class_a.files, count, strategy),
        second_files: truncate(&class_b.files, count, strategy),
    })
}

/// Directories a balanced pair was copied into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedDataset {
    /// Root holding one subdirectory per class
    pub root: PathBuf,
    /// Directory of `pair.first()`
    pub first_dir: PathBuf,
    /// Directory of `pair.second()`
    pub second_dir: PathBuf,
}

fn clear_dir(dir: &Path) -> std::io::Result<()> {
    if dir.exists() {
        std::fs::remove_dir_all(dir)?;
    }
    std::fs::create_dir_all(dir)
}

fn copy_into(files: &[PathBuf], dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    for file in files {
        if let Some(name) = file.file_name() {
            std::fs::copy(file, dir.join(name))?;
        }
    }
    Ok(())
}

/// Copy a balanced dataset into `<destination>/<first>` and
/// `<destination>/<second>`.
///
/// Anything already under `destination` is removed first, so afterwards each
/// class directory holds exactly the balanced count.
///
/// # Errors
///
/// Returns an error if the destination cannot be cleared or a file cannot be
/// copied.
pub fn materialize(
    dataset: &BalancedDataset,
    destination: &Path,
) -> Result<MaterializedDataset, BalanceError> {
    clear_dir(destination)?;

    let first_dir = destination.join(dataset.pair.first().as_str());
    let second_dir = destination.join(dataset.pair.second().as_str());
    copy_into(&dataset.first_files, &first_dir)?;
    copy_into(&dataset.second_files, &second_dir)?;

    tracing::debug!(
        pair = %dataset.pair,
        per_class = dataset.per_class(),
        destination = %destination.display(),
        "Materialized balanced dataset"
    );

    Ok(MaterializedDataset {
        root: destination.to_path_buf(),
        first_dir,
        second_dir,
    })
}

/// Count image files in a materialized class directory
///
/// # Errors
///
/// Returns an error if the directory cannot be read.
pub fn count_images(dir: &Path) -> std::io::Result<usize> {
    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        if is_image_file(&entry?.path()) {
            count += 1;
        }
    }
    Ok(count)
}

/// Sweep-scoped scratch directory.
///
/// Every pair gets its own subdirectory, so no two pairs share mutable
/// filesystem state. The whole area is deleted when the value is dropped,
/// on success and on failure alike.
#[derive(Debug)]
pub struct ScratchArea {
    dir: TempDir,
}

impl ScratchArea {
    /// Create a scratch area under `parent`, or the system temp directory
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(parent: Option<&Path>) -> std::io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("ovo_scratch_");
        let dir = match parent {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };
        Ok(Self { dir })
    }

    /// Root of the scratch area
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Isolated directory for one pair (not created until materialized)
    #[must_use]
    pub fn pair_dir(&self, pair: &ClassPair) -> PathBuf {
        self.dir
            .path()
            .join(format!("{}_vs_{}", pair.first(), pair.second()))
    }

    /// Remove one pair's directory once its training is done
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be removed.
    pub fn release(&self, pair: &ClassPair) -> std::io::Result<()> {
        let dir = self.pair_dir(pair);
        if dir.exists() {
            std::fs::remove_dir_all(dir)?;
        }
        Ok(())
    }
}
