//! # OvO Trainer
//!
//! One-vs-one image-classifier training orchestration with confusion-matrix
//! reporting.
//!
//! Given a resource directory with one subdirectory per class, the sweep
//! trains one binary sub-model for every pair of classes, balancing each pair
//! to the size of its smaller class, and collects the per-pair results into a
//! single report with an aggregate confusion matrix.
//!
//! ## Architecture
//!
//! ```text
//! Resource directory (one folder per class)
//!        ↓
//! Corpus scan (jpg/jpeg/png per class)
//!        ↓
//! Pair generation (C(N,2) class pairs)
//!        ↓
//! Per pair: balance → scratch copy → Trainer
//!        ↓
//! Confusion matrices (per pair, merged)
//!        ↓
//! Report (<Family>_Result_<N>/<Family>_Run_Report_<version>.md)
//! ```
//!
//! The model fitting itself sits behind the [`Trainer`] trait;
//! [`SimulatedTrainer`] is a deterministic stand-in for dry runs.

pub mod balance;
pub mod config;
pub mod corpus;
pub mod metrics;
pub mod pairs;
pub mod report;
pub mod runner;
pub mod trainer;
pub mod versioning;

pub use balance::{
    balance, count_images, materialize, BalanceError, BalanceStrategy, BalancedDataset,
    MaterializedDataset, ScratchArea,
};
pub use config::{BalanceMode, ConfigError, RunnerSettings, SweepConfig};
pub use corpus::{is_image_file, ClassImages, CorpusError, CorpusStats, ImageCorpus};
pub use metrics::{
    class_metric, compute_metrics, macro_f1, render_matrix_graph, BinaryConfusionMatrix,
    ClassMetric, ConfusionMatrix,
};
pub use pairs::{
    artifact_file_name, generate_pairs, is_valid_version, parse_artifact_file_name, version_tag,
    ArtifactName, ClassLabel, ClassPair,
};
pub use report::{
    aggregate_confusion_matrix, AggregateReport, ClassifierFamily, PairFailure,
    PairFailureReason, PairTrainingResult, ReportBuilder, ReportError, ReportMetadata,
    TrainingResult,
};
pub use runner::{RunnerConfig, SweepError, SweepRequest, SweepRunner};
pub use trainer::{
    SimulatedTrainer, TrainedModel, Trainer, TrainingError, TrainingJob, TrainingParameters,
};
pub use versioning::{create_run_directory, next_run_index, run_prefix, RunDirectory};
