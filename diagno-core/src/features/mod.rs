//! Feature encoding for symptom sets.

pub mod schema;

pub use schema::{FeatureSchema, FeatureVector};
