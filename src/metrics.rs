//! Confusion-matrix metrics engine.
//!
//! Computes per-class classification metrics from a labelled confusion matrix:
//! - Recall `TP / (TP + FN)`
//! - Precision `TP / (TP + FP)`
//! - F1 `2PR / (P + R)`
//!
//! Every ratio with a zero denominator is 0.0, and all values are clamped to
//! `[0, 1]`. Labels are kept in lexicographic order so output is reproducible.

use crate::pairs::ClassLabel;
use serde::{Deserialize, Serialize};
use std::fmt::Write as FmtWrite;

/// Square count table of actual (row) vs. predicted (column) class.
///
/// Rows and columns share one sorted label list, so every label that appears
/// as a row also appears as a column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    /// Sorted, unique labels
    labels: Vec<ClassLabel>,
    /// Row-major storage: `counts[actual * n + predicted]`
    counts: Vec<u64>,
}

impl ConfusionMatrix {
    /// Create an empty matrix with no labels
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an all-zero matrix over the given labels
    #[must_use]
    pub fn with_labels<I>(labels: I) -> Self
    where
        I: IntoIterator<Item = ClassLabel>,
    {
        let mut labels: Vec<ClassLabel> = labels.into_iter().collect();
        labels.sort();
        labels.dedup();
        let n = labels.len();
        Self {
            labels,
            counts: vec![0; n * n],
        }
    }

    /// Build a matrix from `(actual, predicted)` observations
    #[must_use]
    pub fn from_predictions<'a, I>(observations: I) -> Self
    where
        I: IntoIterator<Item = (&'a ClassLabel, &'a ClassLabel)>,
    {
        let mut matrix = Self::new();
        for (actual, predicted) in observations {
            matrix.record(actual, predicted);
        }
        matrix
    }

    /// Record a single observation
    pub fn record(&mut self, actual: &ClassLabel, predicted: &ClassLabel) {
        self.add(actual, predicted, 1);
    }

    /// Add `count` observations to one cell, registering unseen labels
    pub fn add(&mut self, actual: &ClassLabel, predicted: &ClassLabel, count: u64) {
        self.ensure_label(actual);
        let col = self.ensure_label(predicted);
        // inserting `predicted` may have shifted the row index
        let row = self.ensure_label(actual);
        let n = self.labels.len();
        self.counts[row * n + col] += count;
    }

    /// Labels in lexicographic order
    #[must_use]
    pub fn labels(&self) -> &[ClassLabel] {
        &self.labels
    }

    /// Number of labels
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Check if the matrix has no labels
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Count for an (actual, predicted) cell; 0 for unknown labels
    #[must_use]
    pub fn get(&self, actual: &ClassLabel, predicted: &ClassLabel) -> u64 {
        match (self.index_of(actual), self.index_of(predicted)) {
            (Some(row), Some(col)) => self.cell(row, col),
            _ => 0,
        }
    }

    /// Total number of scored samples
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Number of samples whose actual class is `label`
    #[must_use]
    pub fn row_total(&self, label: &ClassLabel) -> u64 {
        self.index_of(label)
            .map_or(0, |row| (0..self.len()).map(|col| self.cell(row, col)).sum())
    }

    /// Number of samples predicted as `label`
    #[must_use]
    pub fn column_total(&self, label: &ClassLabel) -> u64 {
        self.index_of(label)
            .map_or(0, |col| (0..self.len()).map(|row| self.cell(row, col)).sum())
    }

    /// True positives for `label`
    #[must_use]
    pub fn true_positives(&self, label: &ClassLabel) -> u64 {
        self.get(label, label)
    }

    /// Samples predicted as `label` whose actual class differs
    #[must_use]
    pub fn false_positives(&self, label: &ClassLabel) -> u64 {
        self.column_total(label) - self.true_positives(label)
    }

    /// Samples of class `label` predicted as something else
    #[must_use]
    pub fn false_negatives(&self, label: &ClassLabel) -> u64 {
        self.row_total(label) - self.true_positives(label)
    }

    /// Overall accuracy (trace / total), 0.0 for an empty matrix
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let correct: u64 = (0..self.len()).map(|i| self.cell(i, i)).sum();
        correct as f64 / total as f64
    }

    /// Add every cell of `other` into `self`, extending the label set
    pub fn merge(&mut self, other: &Self) {
        for (row, actual) in other.labels.iter().enumerate() {
            for (col, predicted) in other.labels.iter().enumerate() {
                let count = other.cell(row, col);
                if count > 0 {
                    self.add(actual, predicted, count);
                }
            }
        }
    }

    /// Sum several matrices cell by cell
    #[must_use]
    pub fn merged<'a, I>(matrices: I) -> Self
    where
        I: IntoIterator<Item = &'a Self>,
    {
        let mut merged = Self::new();
        for matrix in matrices {
            merged.merge(matrix);
        }
        merged
    }

    /// Drop labels that were never an actual nor a predicted class
    pub fn retain_observed(&mut self) {
        let keep: Vec<ClassLabel> = self
            .labels
            .iter()
            .filter(|l| self.row_total(l) > 0 || self.column_total(l) > 0)
            .cloned()
            .collect();
        if keep.len() == self.labels.len() {
            return;
        }

        let mut pruned = Self::with_labels(keep.iter().cloned());
        for actual in &keep {
            for predicted in &keep {
                let count = self.get(actual, predicted);
                if count > 0 {
                    pruned.add(actual, predicted, count);
                }
            }
        }
        *self = pruned;
    }

    fn index_of(&self, label: &ClassLabel) -> Option<usize> {
        self.labels.binary_search(label).ok()
    }

    fn cell(&self, row: usize, col: usize) -> u64 {
        self.counts[row * self.labels.len() + col]
    }

    fn ensure_label(&mut self, label: &ClassLabel) -> usize {
        match self.labels.binary_search(label) {
            Ok(idx) => idx,
            Err(pos) => {
                let old_n = self.labels.len();
                let new_n = old_n + 1;
                let shift = |i: usize| if i < pos { i } else { i + 1 };

                let mut counts = vec![0; new_n * new_n];
                for row in 0..old_n {
                    for col in 0..old_n {
                        counts[shift(row) * new_n + shift(col)] = self.counts[row * old_n + col];
                    }
                }
                self.labels.insert(pos, label.clone());
                self.counts = counts;
                pos
            }
        }
    }
}

/// Per-class metrics derived from a [`ConfusionMatrix`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetric {
    /// Class the metrics describe
    pub label: ClassLabel,
    /// Correctly predicted samples of this class
    pub true_positives: u64,
    /// Other classes predicted as this class
    pub false_positives: u64,
    /// This class predicted as another class
    pub false_negatives: u64,
    /// `TP / (TP + FN)`
    pub recall: f64,
    /// `TP / (TP + FP)`
    pub precision: f64,
    /// Harmonic mean of precision and recall
    pub f1: f64,
}

#[allow(clippy::cast_precision_loss)]
fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        (numerator as f64 / denominator as f64).clamp(0.0, 1.0)
    }
}

fn harmonic_mean(precision: f64, recall: f64) -> f64 {
    let sum = precision + recall;
    if sum <= 0.0 {
        0.0
    } else {
        (2.0 * precision * recall / sum).clamp(0.0, 1.0)
    }
}

/// Metrics for one label, or `None` if the label is not in the matrix
#[must_use]
pub fn class_metric(matrix: &ConfusionMatrix, label: &ClassLabel) -> Option<ClassMetric> {
    matrix.index_of(label)?;

    let tp = matrix.true_positives(label);
    let fp = matrix.false_positives(label);
    let fn_ = matrix.false_negatives(label);
    let recall = ratio(tp, tp + fn_);
    let precision = ratio(tp, tp + fp);

    Some(ClassMetric {
        label: label.clone(),
        true_positives: tp,
        false_positives: fp,
        false_negatives: fn_,
        recall,
        precision,
        f1: harmonic_mean(precision, recall),
    })
}

/// Compute recall, precision and F1 for every label, in lexicographic order.
///
/// An empty matrix yields an empty vector.
#[must_use]
pub fn compute_metrics(matrix: &ConfusionMatrix) -> Vec<ClassMetric> {
    matrix
        .labels()
        .iter()
        .filter_map(|label| class_metric(matrix, label))
        .collect()
}

/// Macro-averaged F1 over all labels, 0.0 for an empty matrix
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn macro_f1(matrix: &ConfusionMatrix) -> f64 {
    let metrics = compute_metrics(matrix);
    if metrics.is_empty() {
        return 0.0;
    }
    metrics.iter().map(|m| m.f1).sum::<f64>() / metrics.len() as f64
}

const MATRIX_CORNER: &str = "Actual\\Predicted";

/// Render the matrix as a fixed-width text grid for human display.
///
/// ```text
/// Actual\Predicted | cat              | dog
/// -----------------+------------------+-----------------
/// cat              |                8 |                1
/// dog              |                2 |                9
/// ```
#[must_use]
pub fn render_matrix_graph(matrix: &ConfusionMatrix) -> String {
    if matrix.is_empty() {
        return String::new();
    }

    let n = matrix.len();
    let width = matrix
        .labels()
        .iter()
        .map(|l| l.as_str().chars().count())
        .chain(matrix.counts.iter().map(|c| c.to_string().len()))
        .chain(std::iter::once(MATRIX_CORNER.chars().count()))
        .max()
        .unwrap_or(0);

    let mut output = String::new();

    let mut header = format!("{MATRIX_CORNER:<width$}");
    for label in matrix.labels() {
        write!(header, " | {:<width$}", label.as_str()).ok();
    }
    writeln!(output, "{}", header.trim_end()).ok();

    let separator = vec!["-".repeat(width); n + 1].join("-+-");
    writeln!(output, "{separator}").ok();

    for (row, actual) in matrix.labels().iter().enumerate() {
        let mut line = format!("{:<width$}", actual.as_str());
        for col in 0..n {
            write!(line, " | {:>width$}", matrix.cell(row, col)).ok();
        }
        writeln!(output, "{line}").ok();
    }

    output
}

/// Two-class confusion matrix with a designated positive label.
///
/// Metrics are those of the positive label, computed by the same formula
/// [`compute_metrics`] applies to every label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BinaryConfusionMatrix {
    matrix: ConfusionMatrix,
    positive: ClassLabel,
    negative: ClassLabel,
}

impl BinaryConfusionMatrix {
    /// View a two-label matrix as binary; `None` unless the matrix has
    /// exactly two labels and `positive` is one of them
    #[must_use]
    pub fn new(matrix: ConfusionMatrix, positive: &ClassLabel) -> Option<Self> {
        if matrix.len() != 2 || matrix.index_of(positive).is_none() {
            return None;
        }
        let negative = matrix.labels().iter().find(|l| *l != positive)?.clone();
        Some(Self {
            matrix,
            positive: positive.clone(),
            negative,
        })
    }

    /// Build from raw counts; `None` if both labels are equal
    #[must_use]
    pub fn from_counts(
        positive: ClassLabel,
        negative: ClassLabel,
        true_positives: u64,
        false_positives: u64,
        false_negatives: u64,
        true_negatives: u64,
    ) -> Option<Self> {
        if positive == negative {
            return None;
        }
        let mut matrix = ConfusionMatrix::with_labels([positive.clone(), negative.clone()]);
        matrix.add(&positive, &positive, true_positives);
        matrix.add(&negative, &positive, false_positives);
        matrix.add(&positive, &negative, false_negatives);
        matrix.add(&negative, &negative, true_negatives);
        Some(Self {
            matrix,
            positive,
            negative,
        })
    }

    /// Positive label
    #[must_use]
    pub const fn positive(&self) -> &ClassLabel {
        &self.positive
    }

    /// Negative label
    #[must_use]
    pub const fn negative(&self) -> &ClassLabel {
        &self.negative
    }

    /// Underlying two-label matrix
    #[must_use]
    pub const fn matrix(&self) -> &ConfusionMatrix {
        &self.matrix
    }

    /// Metrics of the positive label
    #[must_use]
    pub fn metric(&self) -> ClassMetric {
        class_metric(&self.matrix, &self.positive).unwrap_or_else(|| ClassMetric {
            label: self.positive.clone(),
            true_positives: 0,
            false_positives: 0,
            false_negatives: 0,
            recall: 0.0,
            precision: 0.0,
            f1: 0.0,
        })
    }

    /// Recall of the positive label
    #[must_use]
    pub fn recall(&self) -> f64 {
        self.metric().recall
    }

    /// Precision of the positive label
    #[must_use]
    pub fn precision(&self) -> f64 {
        self.metric().precision
    }

    /// F1 score of the positive label
    #[must_use]
    pub fn f1_score(&self) -> f64 {
        self.metric().f1
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn label(name: &str) -> ClassLabel {
        ClassLabel::new(name)
    }

    fn binary_example() -> BinaryConfusionMatrix {
        BinaryConfusionMatrix::from_counts(label("P"), label("N"), 8, 2, 1, 9).unwrap()
    }

    #[test]
    fn test_binary_metrics_known_values() {
        let binary = binary_example();
        assert!((binary.recall() - 8.0 / 9.0).abs() < 1e-12);
        assert!((binary.precision() - 0.8).abs() < 1e-12);
        assert!((binary.f1_score() - 0.842).abs() < 1e-3);
    }

    #[test]
    fn test_binary_matches_general_formula() {
        let binary = binary_example();
        let general = compute_metrics(binary.matrix());
        let positive = general.iter().find(|m| m.label == label("P")).unwrap();
        assert_eq!(&binary.metric(), positive);
    }

    #[test]
    fn test_binary_requires_two_distinct_labels() {
        assert!(BinaryConfusionMatrix::from_counts(label("A"), label("A"), 1, 0, 0, 1).is_none());

        let three = ConfusionMatrix::with_labels([label("a"), label("b"), label("c")]);
        assert!(BinaryConfusionMatrix::new(three, &label("a")).is_none());

        let two = ConfusionMatrix::with_labels([label("a"), label("b")]);
        assert!(BinaryConfusionMatrix::new(two.clone(), &label("z")).is_none());
        let binary = BinaryConfusionMatrix::new(two, &label("b")).unwrap();
        assert_eq!(binary.negative(), &label("a"));
    }

    #[test]
    fn test_zero_occurrence_label_is_all_zero() {
        let mut matrix = ConfusionMatrix::with_labels([label("ghost"), label("cat")]);
        matrix.record(&label("cat"), &label("cat"));

        let ghost = class_metric(&matrix, &label("ghost")).unwrap();
        assert_eq!(ghost.true_positives, 0);
        assert!(ghost.recall.abs() < f64::EPSILON);
        assert!(ghost.precision.abs() < f64::EPSILON);
        assert!(ghost.f1.abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_matrix_yields_no_metrics() {
        let matrix = ConfusionMatrix::new();
        assert!(compute_metrics(&matrix).is_empty());
        assert_eq!(matrix.total(), 0);
        assert!(matrix.accuracy().abs() < f64::EPSILON);
        assert!(macro_f1(&matrix).abs() < f64::EPSILON);
        assert!(render_matrix_graph(&matrix).is_empty());
    }

    #[test]
    fn test_multiclass_counts() {
        let (a, b, c) = (label("a"), label("b"), label("c"));
        let observations = [
            (&a, &a),
            (&a, &a),
            (&a, &b),
            (&b, &b),
            (&b, &c),
            (&c, &c),
            (&c, &a),
        ];
        let matrix = ConfusionMatrix::from_predictions(observations);

        assert_eq!(matrix.total(), 7);
        assert_eq!(matrix.true_positives(&a), 2);
        assert_eq!(matrix.false_positives(&a), 1);
        assert_eq!(matrix.false_negatives(&a), 1);
        assert!((matrix.accuracy() - 4.0 / 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_metrics_sorted_lexicographically() {
        let (zebra, apple, mango) = (label("zebra"), label("apple"), label("mango"));
        let matrix = ConfusionMatrix::from_predictions([
            (&zebra, &zebra),
            (&apple, &mango),
            (&mango, &apple),
        ]);
        let metrics = compute_metrics(&matrix);
        let names: Vec<&str> = metrics.iter().map(|m| m.label.as_str()).collect();
        assert_eq!(names, vec!["apple", "mango", "zebra"]);
    }

    #[test]
    fn test_metrics_stay_in_unit_interval() {
        let (a, b) = (label("a"), label("b"));
        let mut matrix = ConfusionMatrix::new();
        matrix.add(&a, &a, 1_000);
        matrix.add(&a, &b, 3);
        matrix.add(&b, &a, 17);
        for metric in compute_metrics(&matrix) {
            for value in [metric.recall, metric.precision, metric.f1] {
                assert!((0.0..=1.0).contains(&value));
            }
        }
    }

    #[test]
    fn test_merge_sums_cells() {
        let (a, b, c) = (label("a"), label("b"), label("c"));
        let mut ab = ConfusionMatrix::new();
        ab.add(&a, &a, 4);
        ab.add(&a, &b, 1);
        ab.add(&b, &b, 5);

        let mut ac = ConfusionMatrix::new();
        ac.add(&a, &a, 3);
        ac.add(&c, &a, 2);
        ac.add(&c, &c, 6);

        let merged = ConfusionMatrix::merged([&ab, &ac]);
        assert_eq!(merged.labels(), &[a.clone(), b.clone(), c.clone()]);
        assert_eq!(merged.get(&a, &a), 7);
        assert_eq!(merged.get(&a, &b), 1);
        assert_eq!(merged.get(&c, &a), 2);
        assert_eq!(merged.get(&b, &c), 0);
        assert_eq!(merged.total(), ab.total() + ac.total());
    }

    #[test]
    fn test_adding_label_preserves_existing_cells() {
        let (b, d, a) = (label("b"), label("d"), label("a"));
        let mut matrix = ConfusionMatrix::new();
        matrix.add(&b, &d, 3);
        matrix.add(&d, &d, 4);
        // inserting "a" shifts every existing index
        matrix.add(&a, &b, 1);

        assert_eq!(matrix.get(&b, &d), 3);
        assert_eq!(matrix.get(&d, &d), 4);
        assert_eq!(matrix.get(&a, &b), 1);
        assert_eq!(matrix.total(), 8);
    }

    #[test]
    fn test_retain_observed_drops_unused_labels() {
        let (used, unused) = (label("used"), label("unused"));
        let mut matrix = ConfusionMatrix::with_labels([used.clone(), unused]);
        matrix.add(&used, &used, 2);
        matrix.retain_observed();

        assert_eq!(matrix.labels(), &[used.clone()]);
        assert_eq!(matrix.get(&used, &used), 2);
    }

    #[test]
    fn test_render_matrix_graph_is_aligned() {
        let binary = binary_example();
        let graph = render_matrix_graph(binary.matrix());
        let lines: Vec<&str> = graph.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("Actual\\Predicted"));
        assert!(lines[1].chars().all(|c| c == '-' || c == '+'));
        // N sorts before P; row N is [TN, FP], row P is [FN, TP]
        assert!(lines[2].starts_with('N'));
        assert!(lines[2].ends_with('2'));
        assert!(lines[3].starts_with('P'));
        assert!(lines[3].ends_with('8'));
        assert_eq!(lines[2].len(), lines[3].len());
        assert_eq!(lines[1].len(), lines[2].len());
    }

    #[test]
    fn test_render_does_not_affect_metrics() {
        let binary = binary_example();
        let before = compute_metrics(binary.matrix());
        let _ = render_matrix_graph(binary.matrix());
        assert_eq!(before, compute_metrics(binary.matrix()));
    }
}
