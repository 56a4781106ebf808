//! Serving-side prediction.

pub mod predictor;

pub use predictor::{DiseaseConfidence, PredictionResult, Predictor};

/// Ranked predictions returned when not configured otherwise.
pub const DEFAULT_TOP_K: usize = 3;
