//! Ranked disease prediction from a symptom set.

use crate::error::DiagnoError;
use crate::knowledge::{DiseaseInfo, KnowledgeBase};
use crate::training::metrics::round2;
use crate::training::trainer::TrainedModel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// A disease and its confidence as a percentage with two decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseaseConfidence {
    pub disease: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub primary_prediction: DiseaseConfidence,
    /// Highest-confidence diseases, best first.
    pub top_predictions: Vec<DiseaseConfidence>,
    /// Every known disease → confidence percentage.
    pub all_predictions: BTreeMap<String, f64>,
    /// The symptoms as submitted.
    pub symptoms_analyzed: Vec<String>,
    /// Metadata of the primary disease; empty when none was authored.
    pub disease_info: DiseaseInfo,
    pub timestamp: DateTime<Utc>,
}

/// Immutable model + reference data; one instance serves many requests.
#[derive(Debug, Clone)]
pub struct Predictor {
    model: TrainedModel,
    knowledge: Arc<KnowledgeBase>,
    top_k: usize,
}

impl Predictor {
    pub fn new(model: TrainedModel, knowledge: Arc<KnowledgeBase>, top_k: usize) -> Self {
        Self {
            model,
            knowledge,
            top_k: top_k.max(1),
        }
    }

    pub fn model(&self) -> &TrainedModel {
        &self.model
    }

    pub fn knowledge(&self) -> &Arc<KnowledgeBase> {
        &self.knowledge
    }

    /// Predict from symptom keys. Keys outside the schema are ignored.
    pub fn predict<S: AsRef<str>>(&self, symptoms: &[S]) -> Result<PredictionResult, DiagnoError> {
        if symptoms.is_empty() {
            return Err(DiagnoError::EmptyInput);
        }

        let x = self.model.schema.encode(symptoms);
        let known = x.active_indices().len();
        if known == 0 {
            tracing::debug!(submitted = symptoms.len(), "No submitted symptom is in the schema");
        }

        let proba = self.model.predict_proba(&x)?;
        if proba.iter().any(|p| !p.is_finite()) {
            return Err(DiagnoError::inference("model produced non-finite probabilities"));
        }

        let ranked = rank(&proba);
        let entry = |idx: usize| DiseaseConfidence {
            disease: self.model.labels[idx].clone(),
            confidence: round2(proba[idx] * 100.0),
        };
        let primary_prediction = entry(ranked[0]);
        let top_predictions = ranked.iter().take(self.top_k).map(|&i| entry(i)).collect();
        let all_predictions = self
            .model
            .labels
            .iter()
            .zip(&proba)
            .map(|(label, p)| (label.clone(), round2(p * 100.0)))
            .collect();
        let disease_info = self
            .knowledge
            .get(&primary_prediction.disease)
            .map(|r| r.info.clone())
            .unwrap_or_default();

        tracing::debug!(
            disease = %primary_prediction.disease,
            confidence = primary_prediction.confidence,
            known,
            "Prediction"
        );

        Ok(PredictionResult {
            primary_prediction,
            top_predictions,
            all_predictions,
            symptoms_analyzed: unique_in_order(symptoms),
            disease_info,
            timestamp: Utc::now(),
        })
    }
}

/// Submitted keys without repeats, in first-seen order.
fn unique_in_order<S: AsRef<str>>(symptoms: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    symptoms
        .iter()
        .map(AsRef::as_ref)
        .filter(|s| seen.insert(*s))
        .map(str::to_string)
        .collect()
}

/// Class indices by probability descending. Labels are stored in ascending
/// order, so equal probabilities fall back to the alphabetically first label.
fn rank(proba: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..proba.len()).collect();
    order.sort_by(|&a, &b| proba[b].total_cmp(&proba[a]).then(a.cmp(&b)));
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureSchema;
    use crate::knowledge::DiseaseRecord;
    use crate::training::classifier::{ClassifierConfig, ProbabilisticClassifier};
    use pretty_assertions::assert_eq;

    fn predictor(top_k: usize) -> Predictor {
        let schema = FeatureSchema::new(["a", "b", "c", "d", "e", "f", "g", "h"]);
        let labels: Vec<String> = ["Alpha", "Beta", "Delta", "Gamma"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let patterns: [&[&str]; 4] = [&["a", "b"], &["c", "d"], &["e", "f"], &["g", "h"]];
        let mut x = Vec::new();
        let mut y = Vec::new();
        for (class, p) in patterns.iter().enumerate() {
            for _ in 0..4 {
                x.push(schema.encode(*p));
                y.push(class);
            }
        }
        let mut classifier = ClassifierConfig::default().build();
        classifier.fit(&x, &y, 4).unwrap();
        let kb = KnowledgeBase::new(vec![DiseaseRecord::new("Alpha", &["a", "b"]).with_info(
            DiseaseInfo {
                description: "first".into(),
                ..DiseaseInfo::default()
            },
        )])
        .unwrap();
        Predictor::new(
            TrainedModel {
                schema,
                labels,
                classifier,
            },
            Arc::new(kb),
            top_k,
        )
    }

    #[test]
    fn test_empty_input() {
        let empty: [&str; 0] = [];
        assert!(matches!(
            predictor(3).predict(&empty),
            Err(DiagnoError::EmptyInput)
        ));
    }

    #[test]
    fn test_repeated_symptoms_reported_once() {
        let p = predictor(3);
        let repeated = p.predict(&["b", "a", "b", "a"]).unwrap();
        assert_eq!(repeated.symptoms_analyzed, vec!["b", "a"]);
        assert_eq!(repeated.all_predictions, p.predict(&["a", "b"]).unwrap().all_predictions);
    }

    #[test]
    fn test_prediction_shape() {
        let result = predictor(3).predict(&["a", "b"]).unwrap();
        assert_eq!(result.primary_prediction.disease, "Alpha");
        assert_eq!(result.top_predictions.len(), 3);
        assert_eq!(result.top_predictions[0], result.primary_prediction);
        assert_eq!(result.all_predictions.len(), 4);
        assert_eq!(result.symptoms_analyzed, vec!["a", "b"]);
        assert_eq!(result.disease_info.description, "first");

        let total: f64 = result.all_predictions.values().sum();
        assert!((total - 100.0).abs() < 0.1);
        for pair in result.top_predictions.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
    }

    #[test]
    fn test_unknown_only_still_predicts() {
        let result = predictor(3).predict(&["not_a_real_symptom"]).unwrap();
        assert_eq!(result.all_predictions.len(), 4);
    }

    #[test]
    fn test_unauthored_disease_has_empty_info() {
        let result = predictor(3).predict(&["c", "d"]).unwrap();
        assert_eq!(result.primary_prediction.disease, "Beta");
        assert!(result.disease_info.is_empty());
        assert_eq!(serde_json::to_value(&result.disease_info).unwrap(), serde_json::json!({}));
    }

    #[test]
    fn test_top_k_capped_by_classes() {
        let result = predictor(10).predict(&["e"]).unwrap();
        assert_eq!(result.top_predictions.len(), 4);
    }

    #[test]
    fn test_rank_ties_prefer_lower_index() {
        assert_eq!(rank(&[0.25, 0.5, 0.25]), vec![1, 0, 2]);
        assert_eq!(rank(&[0.5, 0.5]), vec![0, 1]);
    }
}
