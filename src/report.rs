//! Report assembly for training sweeps.
//!
//! Builds the immutable [`AggregateReport`] handed to renderers:
//! - Run metadata (author, model, version, timing, engine settings)
//! - Per-pair sub-model results in pair-generation order
//! - The merged confusion matrix, when enough validation data exists
//! - Pairs that failed and why

use crate::metrics::{
    class_metric, compute_metrics, render_matrix_graph, BinaryConfusionMatrix, ClassMetric,
    ConfusionMatrix,
};
use crate::pairs::{ClassLabel, ClassPair};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as FmtWrite};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use thiserror::Error;

/// Errors that can occur while persisting a report
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to write report: {0}")]
    IoError(#[from] std::io::Error),
}

/// Classifier family a result belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierFamily {
    /// Single two-class model
    Binary,
    /// One model per label, each label against the rest
    MultiLabel,
    /// One model per pair of classes
    OneVsOne,
}

impl ClassifierFamily {
    /// Tag used in directory and report file names
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Binary => "Binary",
            Self::MultiLabel => "MultiLabel",
            Self::OneVsOne => "OvO",
        }
    }
}

impl fmt::Display for ClassifierFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl std::str::FromStr for ClassifierFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "binary" => Ok(Self::Binary),
            "multilabel" | "multi_label" | "multi-label" => Ok(Self::MultiLabel),
            "ovo" | "one_vs_one" | "one-vs-one" => Ok(Self::OneVsOne),
            _ => Err(format!("unknown classifier family: {s}")),
        }
    }
}

/// Capabilities shared by every training result, whatever its family
pub trait TrainingResult {
    /// Family of the classifier that produced the result
    fn family(&self) -> ClassifierFamily;

    /// Model name the result is reported under
    fn model_name(&self) -> &str;

    /// Validation confusion matrix, absent when validation data was
    /// insufficient
    fn confusion_matrix(&self) -> Option<&ConfusionMatrix>;

    /// Per-class metrics; empty without a confusion matrix
    fn class_metrics(&self) -> Vec<ClassMetric> {
        self.confusion_matrix()
            .map(compute_metrics)
            .unwrap_or_default()
    }

    /// Render as markdown
    fn to_markdown(&self) -> String;
}

/// Result of training one pair's sub-model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairTrainingResult {
    /// Pair the model was trained on
    pub pair: ClassPair,
    /// Artifact file stem
    pub model_name: String,
    /// Written model artifact
    pub artifact_path: PathBuf,
    /// Accuracy on the training split
    pub training_accuracy: f64,
    /// Accuracy on the validation split
    pub validation_accuracy: f64,
    /// Validation confusion matrix over the two classes
    pub confusion_matrix: Option<ConfusionMatrix>,
}

impl PairTrainingResult {
    /// Positive class (first of the pair)
    #[must_use]
    pub const fn positive_class(&self) -> &ClassLabel {
        self.pair.first()
    }

    /// Negative class (second of the pair)
    #[must_use]
    pub const fn negative_class(&self) -> &ClassLabel {
        self.pair.second()
    }

    /// Metrics of the positive class
    #[must_use]
    pub fn positive_metric(&self) -> Option<ClassMetric> {
        self.confusion_matrix
            .as_ref()
            .and_then(|m| class_metric(m, self.positive_class()))
    }

    /// Binary view of the matrix with the first class as positive
    #[must_use]
    pub fn binary_matrix(&self) -> Option<BinaryConfusionMatrix> {
        self.confusion_matrix
            .clone()
            .and_then(|m| BinaryConfusionMatrix::new(m, self.positive_class()))
    }

    /// Number of validation samples behind the matrix
    #[must_use]
    pub fn validation_samples(&self) -> u64 {
        self.confusion_matrix.as_ref().map_or(0, ConfusionMatrix::total)
    }
}

impl TrainingResult for PairTrainingResult {
    fn family(&self) -> ClassifierFamily {
        ClassifierFamily::Binary
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn confusion_matrix(&self) -> Option<&ConfusionMatrix> {
        self.confusion_matrix.as_ref()
    }

    fn to_markdown(&self) -> String {
        let mut output = String::new();
        writeln!(output, "### {}", self.pair).ok();
        writeln!(
            output,
            "- Training accuracy: {:.1}%",
            self.training_accuracy * 100.0
        )
        .ok();
        writeln!(
            output,
            "- Validation accuracy: {:.1}%",
            self.validation_accuracy * 100.0
        )
        .ok();

        match self.positive_metric() {
            Some(metric) => {
                writeln!(output, "- Recall ({}): {:.1}%", metric.label, metric.recall * 100.0).ok();
                writeln!(
                    output,
                    "- Precision ({}): {:.1}%",
                    metric.label,
                    metric.precision * 100.0
                )
                .ok();
                writeln!(output, "- F1 score ({}): {:.3}", metric.label, metric.f1).ok();
            }
            None => {
                writeln!(
                    output,
                    "- ⚠️ Confusion matrix skipped: insufficient validation data"
                )
                .ok();
            }
        }
        output
    }
}

/// Why a pair produced no model
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum PairFailureReason {
    /// One class had no usable images
    InsufficientData(ClassLabel),
    /// The balanced files could not be prepared
    Preparation(String),
    /// The trainer reported an error
    Training(String),
}

impl fmt::Display for PairFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientData(label) => write!(f, "class '{label}' has no usable images"),
            Self::Preparation(msg) => write!(f, "dataset preparation failed: {msg}"),
            Self::Training(msg) => write!(f, "training failed: {msg}"),
        }
    }
}

/// A pair that was attempted and failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairFailure {
    /// Pair that failed
    pub pair: ClassPair,
    /// Failure cause
    pub reason: PairFailureReason,
}

impl fmt::Display for PairFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.pair, self.reason)
    }
}

/// Run metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportMetadata {
    /// Model author
    pub author: String,
    /// Model name
    pub model_name: String,
    /// Model version
    pub version: String,
    /// Classifier family
    pub family: ClassifierFamily,
    /// Report generation timestamp
    pub generated_at: DateTime<Utc>,
    /// Wall-clock duration of the sweep
    pub training_duration: Duration,
    /// Iteration budget passed to the trainer
    pub max_iterations: u32,
    /// Data augmentation description
    pub augmentation: String,
    /// Feature extractor description
    pub feature_extractor: String,
    /// Class labels detected in the resources
    pub class_labels: Vec<ClassLabel>,
    /// Sequential run index
    pub run_index: u32,
    /// Run directory holding artifacts and the report
    pub run_directory: PathBuf,
    /// Crate version that produced the report
    pub framework_version: String,
}

/// Merge per-pair matrices into one.
///
/// Returns `None` when no pair has a matrix or when fewer than
/// `min_validation_samples` (at least 1) samples were scored in total.
#[must_use]
pub fn aggregate_confusion_matrix(
    results: &[PairTrainingResult],
    min_validation_samples: u64,
) -> Option<ConfusionMatrix> {
    let mut merged =
        ConfusionMatrix::merged(results.iter().filter_map(|r| r.confusion_matrix.as_ref()));
    merged.retain_observed();

    (merged.total() >= min_validation_samples.max(1)).then_some(merged)
}

/// Complete sweep report. Immutable once built.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateReport {
    metadata: ReportMetadata,
    confusion_matrix: Option<ConfusionMatrix>,
    pair_results: Vec<PairTrainingResult>,
    failures: Vec<PairFailure>,
}

/// Builder for [`AggregateReport`]
pub struct ReportBuilder {
    metadata: ReportMetadata,
    min_validation_samples: u64,
    pair_results: Vec<PairTrainingResult>,
    failures: Vec<PairFailure>,
}

impl ReportBuilder {
    /// Create a new report builder
    #[must_use]
    pub const fn new(metadata: ReportMetadata) -> Self {
        Self {
            metadata,
            min_validation_samples: 1,
            pair_results: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Minimum validation samples needed to report an aggregate matrix
    #[must_use]
    pub const fn with_min_validation_samples(mut self, min: u64) -> Self {
        self.min_validation_samples = min;
        self
    }

    /// Add a successful pair result (kept in insertion order)
    pub fn add_result(&mut self, result: PairTrainingResult) {
        self.pair_results.push(result);
    }

    /// Add a failed pair
    pub fn add_failure(&mut self, failure: PairFailure) {
        self.failures.push(failure);
    }

    /// Build the report
    #[must_use]
    pub fn build(self) -> AggregateReport {
        let confusion_matrix =
            aggregate_confusion_matrix(&self.pair_results, self.min_validation_samples);

        AggregateReport {
            metadata: self.metadata,
            confusion_matrix,
            pair_results: self.pair_results,
            failures: self.failures,
        }
    }
}

/// Table row for the per-pair markdown table
#[derive(Tabled)]
struct PairTableRow {
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Training Acc.")]
    training: String,
    #[tabled(rename = "Validation Acc.")]
    validation: String,
    #[tabled(rename = "Recall")]
    recall: String,
    #[tabled(rename = "Precision")]
    precision: String,
    #[tabled(rename = "F1")]
    f1: String,
}

/// Table row for the per-class markdown table
#[derive(Tabled)]
struct ClassTableRow {
    #[tabled(rename = "Class")]
    class: String,
    #[tabled(rename = "Recall")]
    recall: String,
    #[tabled(rename = "Precision")]
    precision: String,
    #[tabled(rename = "F1")]
    f1: String,
}

fn percent(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: impl ExactSizeIterator<Item = f64>) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    values.sum::<f64>() / n as f64
}

impl AggregateReport {
    /// Run metadata
    #[must_use]
    pub const fn metadata(&self) -> &ReportMetadata {
        &self.metadata
    }

    /// Successful pair results in pair-generation order
    #[must_use]
    pub fn pair_results(&self) -> &[PairTrainingResult] {
        &self.pair_results
    }

    /// Pairs that failed
    #[must_use]
    pub fn failures(&self) -> &[PairFailure] {
        &self.failures
    }

    /// Whether some pairs failed
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Mean training accuracy over successful pairs
    #[must_use]
    pub fn mean_training_accuracy(&self) -> f64 {
        mean(self.pair_results.iter().map(|r| r.training_accuracy))
    }

    /// Mean validation accuracy over successful pairs
    #[must_use]
    pub fn mean_validation_accuracy(&self) -> f64 {
        mean(self.pair_results.iter().map(|r| r.validation_accuracy))
    }

    /// Report file name, e.g. `OvO_Run_Report_v1.md`
    #[must_use]
    pub fn report_file_name(&self) -> String {
        format!(
            "{}_Run_Report_{}.md",
            self.metadata.family.tag(),
            self.metadata.version
        )
    }

    /// Render report as JSON
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write the markdown report into the run directory
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_log(&self) -> Result<PathBuf, ReportError> {
        self.save_log_in(&self.metadata.run_directory)
    }

    /// Write the markdown report into `dir`
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_log_in(&self, dir: &Path) -> Result<PathBuf, ReportError> {
        let path = dir.join(self.report_file_name());
        std::fs::write(&path, self.to_markdown())?;
        tracing::info!(
            model = %self.metadata.model_name,
            path = %path.display(),
            "Saved training report"
        );
        Ok(path)
    }

    /// Write the JSON report next to the markdown one
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn save_json(&self) -> Result<PathBuf, ReportError> {
        let path = self.metadata.run_directory.join(format!(
            "{}_Run_Report_{}.json",
            self.metadata.family.tag(),
            self.metadata.version
        ));
        std::fs::write(&path, self.to_json()?)?;
        Ok(path)
    }

    fn pair_rows(&self) -> Vec<PairTableRow> {
        self.pair_results
            .iter()
            .map(|r| {
                let metric = r.positive_metric();
                PairTableRow {
                    model: r.pair.to_string(),
                    training: percent(r.training_accuracy),
                    validation: percent(r.validation_accuracy),
                    recall: metric.as_ref().map_or_else(|| "-".to_string(), |m| percent(m.recall)),
                    precision: metric
                        .as_ref()
                        .map_or_else(|| "-".to_string(), |m| percent(m.precision)),
                    f1: metric.map_or_else(|| "-".to_string(), |m| format!("{:.3}", m.f1)),
                }
            })
            .collect()
    }
}

impl TrainingResult for AggregateReport {
    fn family(&self) -> ClassifierFamily {
        self.metadata.family
    }

    fn model_name(&self) -> &str {
        &self.metadata.model_name
    }

    fn confusion_matrix(&self) -> Option<&ConfusionMatrix> {
        self.confusion_matrix.as_ref()
    }

    #[allow(clippy::too_many_lines)]
    fn to_markdown(&self) -> String {
        let meta = &self.metadata;
        let mut output = String::new();

        writeln!(output, "# Model Training Report: {}", meta.model_name).ok();
        writeln!(output).ok();

        writeln!(output, "## Model Details").ok();
        writeln!(output).ok();
        writeln!(output, "| Field | Value |").ok();
        writeln!(output, "|-------|-------|").ok();
        writeln!(output, "| Model Name | {} |", meta.model_name).ok();
        writeln!(output, "| Family | {} |", meta.family).ok();
        writeln!(
            output,
            "| Generated | {} |",
            meta.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        )
        .ok();
        writeln!(output, "| Max Iterations | {} |", meta.max_iterations).ok();
        writeln!(output, "| Data Augmentation | {} |", meta.augmentation).ok();
        writeln!(output, "| Feature Extractor | {} |", meta.feature_extractor).ok();
        writeln!(output).ok();

        writeln!(output, "## Training Settings").ok();
        writeln!(output).ok();
        let labels: Vec<&str> = meta.class_labels.iter().map(ClassLabel::as_str).collect();
        writeln!(output, "- Class labels: {}", labels.join(", ")).ok();
        writeln!(output, "- Run: {} #{}", meta.family, meta.run_index).ok();
        writeln!(output).ok();

        writeln!(output, "## Overall Performance").ok();
        writeln!(output).ok();
        writeln!(
            output,
            "- Training duration: {:.2} s",
            meta.training_duration.as_secs_f64()
        )
        .ok();
        writeln!(
            output,
            "- Pairs trained: {} / {}",
            self.pair_results.len(),
            self.pair_results.len() + self.failures.len()
        )
        .ok();
        writeln!(
            output,
            "- Mean training accuracy: {}",
            percent(self.mean_training_accuracy())
        )
        .ok();
        writeln!(
            output,
            "- Mean validation accuracy: {}",
            percent(self.mean_validation_accuracy())
        )
        .ok();
        writeln!(output).ok();

        writeln!(output, "## Individual Model Performance").ok();
        writeln!(output).ok();
        let mut table = Table::new(self.pair_rows());
        table.with(Style::markdown());
        writeln!(output, "{table}").ok();
        writeln!(output).ok();

        match &self.confusion_matrix {
            Some(matrix) => {
                writeln!(output, "## Confusion Matrix").ok();
                writeln!(output).ok();
                writeln!(output, "```text").ok();
                write!(output, "{}", render_matrix_graph(matrix)).ok();
                writeln!(output, "```").ok();
                writeln!(output).ok();

                writeln!(output, "## Per-Class Metrics").ok();
                writeln!(output).ok();
                let rows: Vec<ClassTableRow> = compute_metrics(matrix)
                    .into_iter()
                    .map(|m| ClassTableRow {
                        class: m.label.to_string(),
                        recall: percent(m.recall),
                        precision: percent(m.precision),
                        f1: format!("{:.3}", m.f1),
                    })
                    .collect();
                let mut table = Table::new(rows);
                table.with(Style::markdown());
                writeln!(output, "{table}").ok();
                writeln!(output).ok();
            }
            None => {
                writeln!(
                    output,
                    "⚠️ Confusion matrix skipped: insufficient validation data"
                )
                .ok();
                writeln!(output).ok();
            }
        }

        if !self.failures.is_empty() {
            writeln!(output, "## Failed Pairs").ok();
            writeln!(output).ok();
            for failure in &self.failures {
                writeln!(output, "- {failure}").ok();
            }
            writeln!(output).ok();
        }

        writeln!(output, "## Model Metadata").ok();
        writeln!(output).ok();
        writeln!(output, "- Author: {}", meta.author).ok();
        writeln!(output, "- Version: {}", meta.version).ok();
        writeln!(output, "- Framework Version: {}", meta.framework_version).ok();

        output
    }
}
