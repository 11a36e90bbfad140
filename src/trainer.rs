//! Model-fitting collaborator interface.
//!
//! The training engine itself is external; the orchestrator only needs a
//! [`Trainer`] that turns one balanced pair into a trained artifact plus
//! training/validation accuracy. [`SimulatedTrainer`] is a deterministic
//! stand-in used for dry runs and tests.

use crate::balance::{BalancedDataset, MaterializedDataset};
use crate::metrics::ConfusionMatrix;
use crate::pairs::{ClassLabel, ClassPair};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors reported by a trainer for a single pair
#[derive(Error, Debug)]
pub enum TrainingError {
    #[error("Training failed: {0}")]
    Failed(String),

    #[error("Failed to serialize model artifact: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Parameters forwarded to the training engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingParameters {
    /// Maximum training iterations
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Data augmentations applied during training
    #[serde(default)]
    pub augmentations: Vec<String>,
    /// Feature extractor description
    #[serde(default = "default_feature_extractor")]
    pub feature_extractor: String,
    /// Fraction of each class held out for validation
    #[serde(default = "default_validation_fraction")]
    pub validation_fraction: f64,
    /// Random seed for reproducibility
    #[serde(default = "default_seed")]
    pub seed: u64,
}

const fn default_max_iterations() -> u32 {
    25
}
fn default_feature_extractor() -> String {
    "scenePrint(revision: 1)".to_string()
}
const fn default_validation_fraction() -> f64 {
    0.2
}
const fn default_seed() -> u64 {
    42
}

impl Default for TrainingParameters {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            augmentations: Vec::new(),
            feature_extractor: default_feature_extractor(),
            validation_fraction: default_validation_fraction(),
            seed: default_seed(),
        }
    }
}

impl TrainingParameters {
    /// Human-readable augmentation list, `"none"` when empty
    #[must_use]
    pub fn augmentation_description(&self) -> String {
        if self.augmentations.is_empty() {
            "none".to_string()
        } else {
            self.augmentations.join(", ")
        }
    }
}

/// Everything a trainer needs for one pair
#[derive(Debug, Clone, Copy)]
pub struct TrainingJob<'a> {
    /// Pair being trained (first class is the positive class)
    pub pair: &'a ClassPair,
    /// Balanced source files
    pub dataset: &'a BalancedDataset,
    /// Class directories prepared in the pair's scratch area
    pub materialized: &'a MaterializedDataset,
    /// Engine parameters
    pub parameters: &'a TrainingParameters,
    /// Where the trained artifact must be written
    pub artifact_path: &'a Path,
}

/// What a trainer returns for one pair
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedModel {
    /// Path of the written artifact
    pub artifact_path: PathBuf,
    /// Accuracy on the training split
    pub training_accuracy: f64,
    /// Accuracy on the validation split
    pub validation_accuracy: f64,
    /// Validation confusion matrix over the two classes, if any validation
    /// samples existed
    pub confusion_matrix: Option<ConfusionMatrix>,
}

/// External model-fitting engine
pub trait Trainer {
    /// Short identifier used in logs
    fn name(&self) -> &str {
        "trainer"
    }

    /// Train one binary sub-model
    ///
    /// # Errors
    ///
    /// Returns `TrainingError` if the model cannot be fitted or saved.
    fn train(&self, job: &TrainingJob<'_>) -> Result<TrainedModel, TrainingError>;
}

/// JSON manifest written by [`SimulatedTrainer`] in place of a real model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactManifest {
    /// Positive class
    pub positive_class: ClassLabel,
    /// Negative class
    pub negative_class: ClassLabel,
    /// Iteration budget
    pub max_iterations: u32,
    /// Feature extractor description
    pub feature_extractor: String,
    /// Samples used for training
    pub training_samples: usize,
    /// Samples held out for validation
    pub validation_samples: usize,
    /// Simulated training accuracy
    pub training_accuracy: f64,
    /// Simulated validation accuracy
    pub validation_accuracy: f64,
}

/// Deterministic dry-run trainer.
///
/// Outcomes depend only on the parameters' seed and the pair labels.
#[derive(Debug, Clone)]
pub struct SimulatedTrainer {
    target_accuracy: f64,
}

impl SimulatedTrainer {
    /// Create a simulated trainer with a default target accuracy of 0.9
    #[must_use]
    pub const fn new() -> Self {
        Self {
            target_accuracy: 0.9,
        }
    }

    /// Create a simulated trainer with a custom target accuracy, clamped to
    /// [0, 1]; a non-finite value falls back to the default
    #[must_use]
    pub fn with_target_accuracy(target_accuracy: f64) -> Self {
        if !target_accuracy.is_finite() {
            tracing::warn!(target_accuracy, "Non-finite target accuracy, using default");
            return Self::new();
        }
        Self {
            target_accuracy: target_accuracy.clamp(0.0, 1.0),
        }
    }

    /// Target validation accuracy
    #[must_use]
    pub const fn target_accuracy(&self) -> f64 {
        self.target_accuracy
    }

    fn rng_for(pair: &ClassPair, seed: u64) -> ChaCha8Rng {
        // FNV-1a over both labels keeps the seed stable across builds
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in pair
            .first()
            .as_str()
            .bytes()
            .chain(std::iter::once(0))
            .chain(pair.second().as_str().bytes())
        {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        ChaCha8Rng::seed_from_u64(seed ^ hash)
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn validation_count(files: usize, fraction: f64) -> usize {
        let count = (files as f64 * fraction.clamp(0.0, 1.0)).round() as usize;
        // keep at least one training sample
        count.min(files.saturating_sub(1))
    }
}

impl Default for SimulatedTrainer {
    fn default() -> Self {
        Self::new()
    }
}

impl Trainer for SimulatedTrainer {
    fn name(&self) -> &str {
        "simulated"
    }

    #[allow(clippy::cast_precision_loss)]
    fn train(&self, job: &TrainingJob<'_>) -> Result<TrainedModel, TrainingError> {
        if job.dataset.total() == 0 {
            return Err(TrainingError::Failed(format!(
                "no training images for {}",
                job.pair
            )));
        }

        let mut rng = Self::rng_for(job.pair, job.parameters.seed);
        let training_rate = (self.target_accuracy + 0.05).min(1.0);

        let mut training_samples = 0;
        let mut training_correct = 0;
        let mut matrix = ConfusionMatrix::new();

        let classes = [
            (job.pair.first(), job.pair.second(), job.dataset.first_files.len()),
            (job.pair.second(), job.pair.first(), job.dataset.second_files.len()),
        ];
        for (actual, other, files) in classes {
            let validation = Self::validation_count(files, job.parameters.validation_fraction);
            let training = files - validation;

            training_samples += training;
            training_correct += (0..training).filter(|_| rng.gen_bool(training_rate)).count();

            for _ in 0..validation {
                let predicted = if rng.gen_bool(self.target_accuracy) {
                    actual
                } else {
                    other
                };
                matrix.record(actual, predicted);
            }
        }

        let training_accuracy = if training_samples == 0 {
            0.0
        } else {
            training_correct as f64 / training_samples as f64
        };
        let validation_samples = usize::try_from(matrix.total()).unwrap_or(usize::MAX);
        let validation_accuracy = matrix.accuracy();
        let confusion_matrix = (validation_samples > 0).then_some(matrix);

        let manifest = ArtifactManifest {
            positive_class: job.pair.first().clone(),
            negative_class: job.pair.second().clone(),
            max_iterations: job.parameters.max_iterations,
            feature_extractor: job.parameters.feature_extractor.clone(),
            training_samples,
            validation_samples,
            training_accuracy,
            validation_accuracy,
        };
        if let Some(parent) = job.artifact_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(job.artifact_path, serde_json::to_string_pretty(&manifest)?)?;

        tracing::debug!(
            pair = %job.pair,
            training_samples,
            validation_samples,
            "Simulated training complete"
        );

        Ok(TrainedModel {
            artifact_path: job.artifact_path.to_path_buf(),
            training_accuracy,
            validation_accuracy,
            confusion_matrix,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::balance::{balance, materialize, BalanceStrategy, ScratchArea};
    use crate::corpus::ClassImages;
    use tempfile::TempDir;

    fn class_with(dir: &Path, label: &str, count: usize) -> ClassImages {
        let path = dir.join(label);
        std::fs::create_dir_all(&path).unwrap();
        let files = (0..count)
            .map(|i| {
                let file = path.join(format!("{i}.png"));
                std::fs::write(&file, b"png").unwrap();
                file
            })
            .collect();
        ClassImages {
            label: ClassLabel::new(label),
            path,
            files,
        }
    }

    fn run_simulated(
        per_class: usize,
        parameters: &TrainingParameters,
    ) -> (TempDir, TrainedModel) {
        let dir = TempDir::new().unwrap();
        let a = class_with(dir.path(), "cat", per_class);
        let b = class_with(dir.path(), "dog", per_class);
        let dataset = balance(&a, &b, BalanceStrategy::Prefix).unwrap();

        let scratch = ScratchArea::new(Some(dir.path())).unwrap();
        let materialized = materialize(&dataset, &scratch.pair_dir(&dataset.pair)).unwrap();
        let artifact = dir.path().join("out").join("model.mlmodel");

        let job = TrainingJob {
            pair: &dataset.pair,
            dataset: &dataset,
            materialized: &materialized,
            parameters,
            artifact_path: &artifact,
        };
        let model = SimulatedTrainer::new().train(&job).unwrap();
        (dir, model)
    }

    #[test]
    fn test_training_parameters_default() {
        let params = TrainingParameters::default();
        assert_eq!(params.max_iterations, 25);
        assert_eq!(params.seed, 42);
        assert!((params.validation_fraction - 0.2).abs() < f64::EPSILON);
        assert_eq!(params.augmentation_description(), "none");
    }

    #[test]
    fn test_augmentation_description() {
        let params = TrainingParameters {
            augmentations: vec!["flip".to_string(), "blur".to_string()],
            ..TrainingParameters::default()
        };
        assert_eq!(params.augmentation_description(), "flip, blur");
    }

    #[test]
    fn test_simulated_trainer_writes_artifact() {
        let params = TrainingParameters::default();
        let (_dir, model) = run_simulated(10, &params);

        assert!(model.artifact_path.exists());
        let manifest: ArtifactManifest =
            serde_json::from_str(&std::fs::read_to_string(&model.artifact_path).unwrap()).unwrap();
        assert_eq!(manifest.positive_class.as_str(), "cat");
        assert_eq!(manifest.validation_samples, 4);
        assert_eq!(manifest.training_samples, 16);
    }

    #[test]
    fn test_simulated_trainer_matrix_covers_validation_split() {
        let params = TrainingParameters::default();
        let (_dir, model) = run_simulated(10, &params);

        let matrix = model.confusion_matrix.unwrap();
        assert_eq!(matrix.total(), 4);
        assert_eq!(matrix.row_total(&ClassLabel::new("cat")), 2);
        assert_eq!(matrix.row_total(&ClassLabel::new("dog")), 2);
        assert!((0.0..=1.0).contains(&model.training_accuracy));
    }

    #[test]
    fn test_simulated_trainer_is_deterministic() {
        let params = TrainingParameters::default();
        let (_d1, first) = run_simulated(30, &params);
        let (_d2, second) = run_simulated(30, &params);

        assert_eq!(first.confusion_matrix, second.confusion_matrix);
        assert!((first.training_accuracy - second.training_accuracy).abs() < f64::EPSILON);
    }

    #[test]
    fn test_no_validation_split_means_no_matrix() {
        let params = TrainingParameters {
            validation_fraction: 0.0,
            ..TrainingParameters::default()
        };
        let (_dir, model) = run_simulated(5, &params);
        assert!(model.confusion_matrix.is_none());
        assert!(model.validation_accuracy.abs() < f64::EPSILON);
    }

    #[test]
    fn test_target_accuracy_sanitized() {
        let target = |value: f64| SimulatedTrainer::with_target_accuracy(value).target_accuracy();

        assert!((target(f64::NAN) - 0.9).abs() < f64::EPSILON);
        assert!((target(f64::INFINITY) - 0.9).abs() < f64::EPSILON);
        assert!(target(-3.0).abs() < f64::EPSILON);
        assert!((target(7.0) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_nan_target_accuracy_still_trains() {
        let dir = TempDir::new().unwrap();
        let a = class_with(dir.path(), "cat", 10);
        let b = class_with(dir.path(), "dog", 10);
        let dataset = balance(&a, &b, BalanceStrategy::Prefix).unwrap();
        let scratch = ScratchArea::new(Some(dir.path())).unwrap();
        let materialized = materialize(&dataset, &scratch.pair_dir(&dataset.pair)).unwrap();
        let artifact = dir.path().join("model.mlmodel");
        let params = TrainingParameters::default();

        let job = TrainingJob {
            pair: &dataset.pair,
            dataset: &dataset,
            materialized: &materialized,
            parameters: &params,
            artifact_path: &artifact,
        };
        let model = SimulatedTrainer::with_target_accuracy(f64::NAN).train(&job).unwrap();
        assert_eq!(model.confusion_matrix.unwrap().total(), 4);
    }

    #[test]
    fn test_validation_count_keeps_training_sample() {
        assert_eq!(SimulatedTrainer::validation_count(1, 0.5), 0);
        assert_eq!(SimulatedTrainer::validation_count(10, 1.0), 9);
        assert_eq!(SimulatedTrainer::validation_count(10, 0.2), 2);
    }
}
