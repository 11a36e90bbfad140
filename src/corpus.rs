//! Training-resource corpus loading.
//!
//! A resource directory holds one subdirectory per class; the subdirectory
//! name is the class label and the images directly inside it are the class
//! members. Only `jpg`, `jpeg` and `png` files (any case) are counted.

#![allow(clippy::missing_const_for_fn)]

use crate::pairs::ClassLabel;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during corpus loading
#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("Resource directory not found: {0}")]
    NotFound(String),

    #[error("Resource path is not a directory: {0}")]
    NotADirectory(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Recognized image file extensions (compared case-insensitively)
pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Check whether a path has a recognized image extension
#[must_use]
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

fn label_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with('.'))
}

/// Images belonging to one class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassImages {
    /// Class label (directory name)
    pub label: ClassLabel,
    /// Path to the class directory
    pub path: PathBuf,
    /// Image files, sorted by file name
    pub files: Vec<PathBuf>,
}

impl ClassImages {
    /// Scan a class directory for image files
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub fn load(path: &Path) -> Result<Self, CorpusError> {
        Ok(Self {
            label: ClassLabel::new(label_of(path)),
            path: path.to_path_buf(),
            files: list_images(path)?,
        })
    }

    /// Scan a class directory, treating an unreadable one as empty.
    ///
    /// The class still takes part in pair generation; its pairs then fail
    /// individually for lack of data instead of aborting the whole corpus.
    #[must_use]
    pub fn load_or_empty(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Unreadable class directory, treating as empty"
            );
            Self {
                label: ClassLabel::new(label_of(path)),
                path: path.to_path_buf(),
                files: Vec::new(),
            }
        })
    }

    /// Number of images in the class
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if the class has no images
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// List image files directly inside `dir`, sorted by file name
///
/// # Errors
///
/// Returns an error if the directory cannot be read.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>, CorpusError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && !is_hidden(&path) && is_image_file(&path) {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// All classes found under a training-resource directory
#[derive(Debug)]
pub struct ImageCorpus {
    /// Root directory of the corpus
    pub root: PathBuf,
    /// Classes, sorted by label
    pub classes: Vec<ClassImages>,
}

impl ImageCorpus {
    /// Load every class subdirectory of `path`
    ///
    /// # Errors
    ///
    /// Returns an error if the root doesn't exist or cannot be read. A class
    /// subdirectory that cannot be read is kept as an empty class.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CorpusError> {
        let root = path.as_ref().to_path_buf();

        if !root.exists() {
            return Err(CorpusError::NotFound(root.display().to_string()));
        }
        if !root.is_dir() {
            return Err(CorpusError::NotADirectory(root.display().to_string()));
        }

        let mut classes = Vec::new();
        for entry in std::fs::read_dir(&root)? {
            let path = entry?.path();
            if path.is_dir() && !is_hidden(&path) {
                classes.push(ClassImages::load_or_empty(&path));
            }
        }

        // Sort by label for reproducible pair order
        classes.sort_by(|a, b| a.label.cmp(&b.label));

        tracing::debug!(
            root = %root.display(),
            classes = classes.len(),
            "Loaded image corpus"
        );

        Ok(Self { root, classes })
    }

    /// Class labels in sorted order
    #[must_use]
    pub fn labels(&self) -> Vec<ClassLabel> {
        self.classes.iter().map(|c| c.label.clone()).collect()
    }

    /// Look up a class by label
    #[must_use]
    pub fn class(&self, label: &ClassLabel) -> Option<&ClassImages> {
        self.classes.iter().find(|c| &c.label == label)
    }

    /// Number of classes
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Check if the corpus has no classes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Iterate over classes
    pub fn iter(&self) -> impl Iterator<Item = &ClassImages> {
        self.classes.iter()
    }

    /// Compute statistics about the corpus
    #[must_use]
    pub fn stats(&self) -> CorpusStats {
        let sizes = self.classes.iter().map(ClassImages::len);
        CorpusStats {
            total_classes: self.classes.len(),
            total_images: self.classes.iter().map(ClassImages::len).sum(),
            smallest_class: sizes.clone().min().unwrap_or(0),
            largest_class: sizes.max().unwrap_or(0),
            empty_classes: self.classes.iter().filter(|c| c.is_empty()).count(),
        }
    }
}

/// Statistics about the corpus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusStats {
    /// Number of class directories
    pub total_classes: usize,
    /// Number of images across all classes
    pub total_images: usize,
    /// Image count of the smallest class
    pub smallest_class: usize,
    /// Image count of the largest class
    pub largest_class: usize,
    /// Classes without a single image
    pub empty_classes: usize,
}
