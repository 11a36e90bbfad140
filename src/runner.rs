//! One-vs-one sweep orchestration.
//!
//! Loads the class corpus, enumerates every class pair, balances and
//! materializes each pair in an isolated scratch directory, hands it to the
//! [`Trainer`] and assembles the [`AggregateReport`]. A failing pair is
//! recorded and the sweep moves on; only a sweep without a single success is
//! an error.

use crate::balance::{balance, materialize, BalanceError, BalanceStrategy, ScratchArea};
use crate::corpus::{CorpusError, ImageCorpus};
use crate::pairs::{artifact_file_name, generate_pairs, is_valid_version, version_tag, ClassPair};
use crate::report::{
    AggregateReport, ClassifierFamily, PairFailure, PairFailureReason, PairTrainingResult,
    ReportBuilder, ReportMetadata,
};
use crate::trainer::{Trainer, TrainingJob, TrainingParameters};
use crate::versioning::create_run_directory;
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Errors that abort a sweep
#[derive(Error, Debug)]
pub enum SweepError {
    #[error("Invalid sweep configuration: {0}")]
    Configuration(String),

    #[error("All {} pair trainings failed", .failures.len())]
    SweepFailed { failures: Vec<PairFailure> },

    #[error("Corpus error: {0}")]
    Corpus(#[from] CorpusError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Runner configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Validation samples needed before an aggregate matrix is reported
    pub min_validation_samples: u64,
    /// How larger classes are truncated
    pub balance: BalanceStrategy,
    /// Extension of written model artifacts
    pub artifact_extension: String,
    /// Parent of the sweep scratch area (system temp dir when unset)
    pub scratch_parent: Option<PathBuf>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            min_validation_samples: 1,
            balance: BalanceStrategy::Prefix,
            artifact_extension: "mlmodel".to_string(),
            scratch_parent: None,
        }
    }
}

/// What to train and where to put it
#[derive(Debug, Clone)]
pub struct SweepRequest {
    /// Model author
    pub author: String,
    /// Base model name used in artifact names
    pub model_name: String,
    /// Model version (`"1"` and `"v1"` are equivalent)
    pub version: String,
    /// Directory holding one subdirectory per class
    pub resources_dir: PathBuf,
    /// Root under which run directories are created
    pub output_dir: PathBuf,
    /// Parameters forwarded to the trainer
    pub parameters: TrainingParameters,
}

impl SweepRequest {
    fn validate(&self) -> Result<(), SweepError> {
        for (field, value) in [
            ("author", &self.author),
            ("model_name", &self.model_name),
            ("version", &self.version),
        ] {
            if value.trim().is_empty() {
                return Err(SweepError::Configuration(format!("{field} must not be empty")));
            }
        }
        if !is_valid_version(&self.version) {
            return Err(SweepError::Configuration(format!(
                "version '{}' cannot be encoded in artifact names",
                self.version
            )));
        }
        Ok(())
    }
}

/// Sequential one-vs-one training sweep
pub struct SweepRunner<T: Trainer> {
    trainer: T,
    config: RunnerConfig,
}

impl<T: Trainer> SweepRunner<T> {
    /// Create a new sweep runner with default configuration
    #[must_use]
    pub fn new(trainer: T) -> Self {
        Self {
            trainer,
            config: RunnerConfig::default(),
        }
    }

    /// Create a new sweep runner with custom configuration
    #[must_use]
    pub const fn with_config(trainer: T, config: RunnerConfig) -> Self {
        Self { trainer, config }
    }

    /// Get current configuration
    #[must_use]
    pub const fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Get the trainer
    #[must_use]
    pub const fn trainer(&self) -> &T {
        &self.trainer
    }

    /// Train one sub-model per class pair and assemble the report
    ///
    /// # Errors
    ///
    /// Returns `Configuration` for fewer than two classes or empty request
    /// fields, `Corpus`/`IoError` when the resources or run directory cannot
    /// be accessed, and `SweepFailed` when no pair produced a model.
    pub fn run(&self, request: &SweepRequest) -> Result<AggregateReport, SweepError> {
        request.validate()?;
        let started = Instant::now();

        let corpus = ImageCorpus::load(&request.resources_dir)?;
        let labels = corpus.labels();
        let pairs = generate_pairs(&labels);
        if pairs.is_empty() {
            return Err(SweepError::Configuration(format!(
                "at least two classes required, found {}",
                labels.len()
            )));
        }

        let run_dir = create_run_directory(&request.output_dir, ClassifierFamily::OneVsOne)?;
        let scratch = ScratchArea::new(self.config.scratch_parent.as_deref())?;

        tracing::info!(
            model = %request.model_name,
            trainer = self.trainer.name(),
            classes = labels.len(),
            pairs = pairs.len(),
            run_index = run_dir.index,
            "Starting one-vs-one sweep"
        );

        let mut results = Vec::with_capacity(pairs.len());
        let mut failures = Vec::new();
        // artifact file name -> pair that claimed it
        let mut claimed: HashMap<String, ClassPair> = HashMap::new();

        for (i, pair) in pairs.iter().enumerate() {
            tracing::info!(pair = %pair, step = i + 1, total = pairs.len(), "Training pair");

            let file_name = artifact_file_name(
                &request.model_name,
                pair,
                &request.version,
                &self.config.artifact_extension,
            );
            let outcome = match claimed.get(&file_name) {
                Some(owner) => Err(PairFailureReason::Preparation(format!(
                    "artifact name {file_name} collides with {owner}"
                ))),
                None => {
                    claimed.insert(file_name.clone(), pair.clone());
                    let artifact_path = run_dir.path.join(&file_name);
                    self.train_pair(&corpus, pair, request, &artifact_path, &scratch)
                }
            };

            match outcome {
                Ok(result) => {
                    tracing::info!(
                        pair = %pair,
                        training_accuracy = result.training_accuracy,
                        validation_accuracy = result.validation_accuracy,
                        "Pair trained"
                    );
                    results.push(result);
                }
                Err(reason) => {
                    tracing::warn!(pair = %pair, reason = %reason, "Pair failed");
                    failures.push(PairFailure {
                        pair: pair.clone(),
                        reason,
                    });
                }
            }

            if let Err(e) = scratch.release(pair) {
                tracing::warn!(pair = %pair, error = %e, "Failed to clean pair scratch directory");
            }
        }

        if results.is_empty() {
            tracing::error!(
                model = %request.model_name,
                failures = failures.len(),
                "No pair produced a model"
            );
            return Err(SweepError::SweepFailed { failures });
        }

        let metadata = ReportMetadata {
            author: request.author.clone(),
            model_name: request.model_name.clone(),
            version: version_tag(&request.version),
            family: ClassifierFamily::OneVsOne,
            generated_at: Utc::now(),
            training_duration: started.elapsed(),
            max_iterations: request.parameters.max_iterations,
            augmentation: request.parameters.augmentation_description(),
            feature_extractor: request.parameters.feature_extractor.clone(),
            class_labels: labels,
            run_index: run_dir.index,
            run_directory: run_dir.path,
            framework_version: env!("CARGO_PKG_VERSION").to_string(),
        };

        let mut builder = ReportBuilder::new(metadata)
            .with_min_validation_samples(self.config.min_validation_samples);
        for result in results {
            builder.add_result(result);
        }
        for failure in failures {
            builder.add_failure(failure);
        }
        let report = builder.build();

        tracing::info!(
            model = %request.model_name,
            trained = report.pair_results().len(),
            failed = report.failures().len(),
            duration_ms = u64::try_from(report.metadata().training_duration.as_millis())
                .unwrap_or(u64::MAX),
            "Sweep complete"
        );

        Ok(report)
    }

    fn train_pair(
        &self,
        corpus: &ImageCorpus,
        pair: &ClassPair,
        request: &SweepRequest,
        artifact_path: &Path,
        scratch: &ScratchArea,
    ) -> Result<PairTrainingResult, PairFailureReason> {
        let (Some(first), Some(second)) = (corpus.class(pair.first()), corpus.class(pair.second()))
        else {
            return Err(PairFailureReason::Preparation(format!(
                "{pair} is not part of the corpus"
            )));
        };

        let dataset = balance(first, second, self.config.balance).map_err(|e| match e {
            BalanceError::InsufficientData { label } => PairFailureReason::InsufficientData(label),
            other => PairFailureReason::Preparation(other.to_string()),
        })?;
        let materialized = materialize(&dataset, &scratch.pair_dir(pair))
            .map_err(|e| PairFailureReason::Preparation(e.to_string()))?;

        let job = TrainingJob {
            pair,
            dataset: &dataset,
            materialized: &materialized,
            parameters: &request.parameters,
            artifact_path,
        };
        let trained = self
            .trainer
            .train(&job)
            .map_err(|e| PairFailureReason::Training(e.to_string()))?;

        let model_name = artifact_path
            .file_stem()
            .map_or_else(String::new, |s| s.to_string_lossy().to_string());

        Ok(PairTrainingResult {
            pair: pair.clone(),
            model_name,
            artifact_path: trained.artifact_path,
            training_accuracy: trained.training_accuracy,
            validation_accuracy: trained.validation_accuracy,
            confusion_matrix: trained.confusion_matrix,
        })
    }
}
