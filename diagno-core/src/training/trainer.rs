//! Fit a classifier on a labeled dataset and evaluate it on a holdout split.

use crate::config::TrainingConfig;
use crate::data::Dataset;
use crate::error::DiagnoError;
use crate::features::{FeatureSchema, FeatureVector};
use crate::training::classifier::{Classifier, ProbabilisticClassifier};
use crate::training::metrics::{ConfusionMatrix, EvaluationReport, ModelMetrics};
use crate::training::split::stratified_split;
use std::time::Instant;

/// Probabilities must sum to 1 within this tolerance.
const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// A fitted classifier together with the schema and label order it was fitted on.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedModel {
    pub schema: FeatureSchema,
    /// Class index → disease name, ascending.
    pub labels: Vec<String>,
    pub classifier: Classifier,
}

impl TrainedModel {
    pub fn predict_proba(&self, x: &FeatureVector) -> Result<Vec<f64>, DiagnoError> {
        let proba = self.classifier.predict_proba(x)?;
        if proba.len() != self.labels.len() {
            return Err(DiagnoError::inference(format!(
                "model returned {} probabilities for {} labels",
                proba.len(),
                self.labels.len()
            )));
        }
        Ok(proba)
    }
}

/// Everything one training run produces.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub model: TrainedModel,
    pub metrics: ModelMetrics,
    pub evaluation: EvaluationReport,
}

/// Split, fit and evaluate.
pub fn train(dataset: &Dataset, config: &TrainingConfig) -> Result<TrainingOutcome, DiagnoError> {
    if dataset.is_empty() {
        return Err(DiagnoError::training("Cannot train on an empty dataset"));
    }
    let start = Instant::now();

    let labels: Vec<String> = dataset.class_counts().into_keys().collect();
    let schema = FeatureSchema::from_dataset(dataset);
    let x = schema.encode_dataset(dataset)?;
    let y: Vec<usize> = dataset
        .rows()
        .iter()
        .map(|row| {
            labels
                .binary_search(&row.label)
                .map_err(|_| DiagnoError::training(format!("unindexed label '{}'", row.label)))
        })
        .collect::<Result<_, _>>()?;

    let split = stratified_split(&y, &labels, config.test_fraction, config.seed)?;
    let x_train: Vec<FeatureVector> = split.train.iter().map(|&i| x[i].clone()).collect();
    let y_train: Vec<usize> = split.train.iter().map(|&i| y[i]).collect();

    let mut classifier = config.classifier.build();
    classifier.fit(&x_train, &y_train, labels.len())?;

    let mut actual = Vec::with_capacity(split.test.len());
    let mut predicted = Vec::with_capacity(split.test.len());
    for &i in &split.test {
        let proba = classifier.predict_proba(&x[i])?;
        check_distribution(&proba)?;
        actual.push(y[i]);
        predicted.push(crate::training::classifier::argmax(&proba));
    }

    let confusion = ConfusionMatrix::from_predictions(&labels, &actual, &predicted);
    let family = classifier.family();
    let metrics = ModelMetrics {
        accuracy: confusion.accuracy(),
        total_diseases: labels.len(),
        total_symptoms: schema.symptom_count(),
        training_samples: split.train.len(),
        testing_samples: split.test.len(),
        model_type: family.model_type.to_string(),
        kernel: family.kernel.to_string(),
    };
    let evaluation = EvaluationReport::new(confusion);

    tracing::info!(
        accuracy = metrics.accuracy,
        macro_f1 = evaluation.macro_f1(),
        classes = metrics.total_diseases,
        symptoms = metrics.total_symptoms,
        train = metrics.training_samples,
        test = metrics.testing_samples,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Model trained"
    );

    Ok(TrainingOutcome {
        model: TrainedModel {
            schema,
            labels,
            classifier,
        },
        metrics,
        evaluation,
    })
}

fn check_distribution(proba: &[f64]) -> Result<(), DiagnoError> {
    let sum: f64 = proba.iter().sum();
    if proba.iter().any(|p| !p.is_finite() || *p < 0.0) || (sum - 1.0).abs() > PROBABILITY_TOLERANCE
    {
        return Err(DiagnoError::training(format!(
            "classifier produced an invalid distribution (sum {sum})"
        )));
    }
    Ok(())
}
