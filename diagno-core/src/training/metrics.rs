//! Holdout evaluation: accuracy, confusion matrix, per-class report.

use serde::{Deserialize, Serialize};

/// Summary persisted as `model_metrics.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Holdout accuracy in `[0, 1]`.
    pub accuracy: f64,
    pub total_diseases: usize,
    pub total_symptoms: usize,
    pub training_samples: usize,
    pub testing_samples: usize,
    pub model_type: String,
    pub kernel: String,
}

impl ModelMetrics {
    pub fn accuracy_summary(&self) -> AccuracySummary {
        AccuracySummary {
            accuracy: round2(self.accuracy * 100.0),
            accuracy_decimal: self.accuracy,
        }
    }
}

/// Accuracy as a percentage and as a fraction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccuracySummary {
    /// Percentage, two decimals.
    pub accuracy: f64,
    pub accuracy_decimal: f64,
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Holdout confusion matrix; `matrix[actual][predicted]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub labels: Vec<String>,
    pub matrix: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    /// Tally `(actual, predicted)` class index pairs.
    pub fn from_predictions(labels: &[String], actual: &[usize], predicted: &[usize]) -> Self {
        let n = labels.len();
        let mut matrix = vec![vec![0; n]; n];
        for (&a, &p) in actual.iter().zip(predicted) {
            if a < n && p < n {
                matrix[a][p] += 1;
            }
        }
        Self {
            labels: labels.to_vec(),
            matrix,
        }
    }

    pub fn total(&self) -> usize {
        self.matrix.iter().flatten().sum()
    }

    pub fn correct(&self) -> usize {
        (0..self.matrix.len()).map(|i| self.matrix[i][i]).sum()
    }

    /// Fraction of correct predictions; 0 for an empty matrix.
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            self.correct() as f64 / total as f64
        }
    }

    /// Precision, recall, F1 and support per label. Undefined ratios are 0.
    pub fn class_reports(&self) -> Vec<ClassReport> {
        let n = self.labels.len();
        (0..n)
            .map(|c| {
                let tp = self.matrix[c][c] as f64;
                let support: usize = self.matrix[c].iter().sum();
                let predicted: usize = (0..n).map(|r| self.matrix[r][c]).sum();
                let precision = ratio(tp, predicted as f64);
                let recall = ratio(tp, support as f64);
                let f1_score = ratio(2.0 * precision * recall, precision + recall);
                ClassReport {
                    label: self.labels[c].clone(),
                    precision,
                    recall,
                    f1_score,
                    support,
                }
            })
            .collect()
    }
}

fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 { 0.0 } else { num / den }
}

/// Classification report row for one label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassReport {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Holdout evaluation persisted as `confusion_matrix.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub confusion_matrix: ConfusionMatrix,
    pub per_class: Vec<ClassReport>,
}

impl EvaluationReport {
    pub fn new(confusion_matrix: ConfusionMatrix) -> Self {
        let per_class = confusion_matrix.class_reports();
        Self {
            confusion_matrix,
            per_class,
        }
    }

    /// Unweighted mean F1 across labels.
    pub fn macro_f1(&self) -> f64 {
        if self.per_class.is_empty() {
            return 0.0;
        }
        self.per_class.iter().map(|r| r.f1_score).sum::<f64>() / self.per_class.len() as f64
    }
}
