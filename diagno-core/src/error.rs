//! Error types for the diagno-core crate.

use serde::Serialize;
use thiserror::Error;

/// Top-level error type for pipeline and serving operations.
#[derive(Debug, Error)]
pub enum DiagnoError {
    #[error("No symptoms provided")]
    EmptyInput,

    #[error("Disease not found: {0}")]
    DiseaseNotFound(String),

    #[error("Class '{label}' has {count} row(s); a stratified split needs at least 2")]
    InsufficientClassSamples { label: String, count: usize },

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Retrain failed: {0}")]
    Retrain(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Extended symptoms already injected: {}", .0.join(", "))]
    AlreadyAugmented(Vec<String>),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Stable, collaborator-facing classification of a [`DiagnoError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    EmptyInput,
    DiseaseNotFound,
    InsufficientClassSamples,
    SchemaMismatch,
    InferenceFailure,
    RetrainFailure,
    InvalidData,
    Configuration,
    Internal,
}

impl DiagnoError {
    pub fn training(msg: impl Into<String>) -> Self {
        Self::Training(msg.into())
    }

    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::Dataset(msg.into())
    }

    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn schema_mismatch(msg: impl Into<String>) -> Self {
        Self::SchemaMismatch(msg.into())
    }

    pub fn not_found(name: impl Into<String>) -> Self {
        Self::DiseaseNotFound(name.into())
    }

    /// Map this error onto the kind a request layer reports to its callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyInput => ErrorKind::EmptyInput,
            Self::DiseaseNotFound(_) => ErrorKind::DiseaseNotFound,
            Self::InsufficientClassSamples { .. } => ErrorKind::InsufficientClassSamples,
            Self::SchemaMismatch(_) => ErrorKind::SchemaMismatch,
            Self::Inference(_) => ErrorKind::InferenceFailure,
            Self::Retrain(_) => ErrorKind::RetrainFailure,
            Self::Training(_) | Self::Dataset(_) | Self::AlreadyAugmented(_) => {
                ErrorKind::InvalidData
            }
            Self::Config(_) => ErrorKind::Configuration,
            Self::Io(_) | Self::Serde(_) => ErrorKind::Internal,
        }
    }
}
