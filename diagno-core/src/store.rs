//! Prediction report history behind an injected store.

use crate::error::DiagnoError;
use crate::inference::PredictionResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

/// A saved prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    /// Whoever requested the prediction; opaque to this crate.
    pub owner: String,
    pub prediction: String,
    pub symptoms: Vec<String>,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

impl Report {
    pub fn from_prediction(owner: impl Into<String>, result: &PredictionResult) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner: owner.into(),
            prediction: result.primary_prediction.disease.clone(),
            symptoms: result.symptoms_analyzed.clone(),
            confidence: result.primary_prediction.confidence,
            timestamp: result.timestamp,
        }
    }
}

/// Storage for prediction reports.
pub trait ReportStore: Send + Sync {
    fn put(&self, report: Report) -> Result<(), DiagnoError>;

    fn get(&self, id: &Uuid) -> Option<Report>;

    /// Reports of `owner`, newest first.
    fn list(&self, owner: &str) -> Vec<Report>;
}

/// Process-local store, mainly for tests and single-process deployments.
pub struct InMemoryReportStore {
    reports: Mutex<HashMap<Uuid, Report>>,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self {
            reports: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryReportStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportStore for InMemoryReportStore {
    fn put(&self, report: Report) -> Result<(), DiagnoError> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(report.id, report);
        Ok(())
    }

    fn get(&self, id: &Uuid) -> Option<Report> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    fn list(&self, owner: &str) -> Vec<Report> {
        let mut reports: Vec<Report> = self
            .reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|r| r.owner == owner)
            .cloned()
            .collect();
        reports.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(a.id.cmp(&b.id)));
        reports
    }
}
