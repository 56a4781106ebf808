//! # diagno-core: symptom-based disease prediction
//!
//! Turns an authored disease knowledge base into a synthetic training set,
//! fits a probabilistic classifier on it, persists versioned artifacts and
//! serves ranked predictions from a hot-swappable model.
//!
//! ## Flow
//!
//! 1. [`knowledge`]: diseases, core symptoms, metadata, extended associations
//! 2. [`data`]: synthetic dataset generation and augmentation
//! 3. [`features`]: canonical symptom schema and fixed-width encoding
//! 4. [`training`]: stratified split, classifiers, evaluation, batch pipeline
//! 5. [`artifacts`]: run directories and the `current.json` pointer
//! 6. [`inference`] / [`service`]: prediction and the long-lived service

// Foundation
pub mod config;
pub mod error;
pub mod persistence;

// Reference data and datasets
pub mod data;
pub mod knowledge;

// Model lifecycle
pub mod artifacts;
pub mod features;
pub mod training;

// Serving
pub mod inference;
pub mod service;
pub mod store;

// Re-exports
pub use artifacts::{ArtifactBundle, ArtifactStore, RunManifest};
pub use config::{DiagnoConfig, load_config};
pub use data::{Dataset, augment_with_extended, synthesize_base};
pub use error::{DiagnoError, ErrorKind};
pub use features::{FeatureSchema, FeatureVector};
pub use inference::{DiseaseConfidence, PredictionResult, Predictor};
pub use knowledge::{
    DiseaseInfo, DiseaseRecord, DiseaseSummary, ExtendedAssociations, KnowledgeBase,
    display_name, normalize_key,
};
pub use service::DiagnosisService;
pub use store::{InMemoryReportStore, Report, ReportStore};
pub use training::{
    AccuracySummary, ClassifierConfig, ModelMetrics, PipelineRun, TrainingOutcome, run_pipeline,
    train,
};

/// Read a dataset previously exported as CSV.
pub fn load_dataset_csv(path: &std::path::Path) -> Result<Dataset, DiagnoError> {
    Dataset::read_csv(path)
}
