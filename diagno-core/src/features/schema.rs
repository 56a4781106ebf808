//! Fixed-width feature schema shared by training and inference.

use crate::data::Dataset;
use crate::error::DiagnoError;
use crate::knowledge::SymptomKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Binary feature vector laid out in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: Vec<f64>,
}

impl FeatureVector {
    pub fn zeros(width: usize) -> Self {
        Self {
            values: vec![0.0; width],
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Positions holding a non-zero value.
    pub fn active_indices(&self) -> Vec<usize> {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, v)| **v != 0.0)
            .map(|(i, _)| i)
            .collect()
    }

    fn set(&mut self, idx: usize) {
        self.values[idx] = 1.0;
    }
}

/// Ordered symptom keys with a precomputed key → position map.
///
/// Serializes as a plain JSON array of keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "Vec<String>", try_from = "Vec<String>")]
pub struct FeatureSchema {
    keys: Vec<SymptomKey>,
    index: HashMap<SymptomKey, usize>,
}

impl PartialEq for FeatureSchema {
    fn eq(&self, other: &Self) -> bool {
        self.keys == other.keys
    }
}

impl Eq for FeatureSchema {}

impl FeatureSchema {
    /// Canonical schema: the sorted, de-duplicated key set.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut keys: Vec<SymptomKey> = keys.into_iter().map(Into::into).collect();
        keys.sort();
        keys.dedup();
        let index = keys
            .iter()
            .enumerate()
            .map(|(i, k)| (k.clone(), i))
            .collect();
        Self { keys, index }
    }

    /// Keep `keys` in exactly the given order, as stored by a training run.
    pub fn from_ordered(keys: Vec<SymptomKey>) -> Result<Self, DiagnoError> {
        let mut index = HashMap::with_capacity(keys.len());
        for (i, key) in keys.iter().enumerate() {
            if index.insert(key.clone(), i).is_some() {
                return Err(DiagnoError::schema_mismatch(format!(
                    "duplicate symptom key '{key}' in schema"
                )));
            }
        }
        Ok(Self { keys, index })
    }

    /// Canonical schema over every column of `dataset`.
    pub fn from_dataset(dataset: &Dataset) -> Self {
        Self::new(dataset.columns().iter().cloned())
    }

    pub fn symptom_count(&self) -> usize {
        self.keys.len()
    }

    pub fn keys(&self) -> &[SymptomKey] {
        &self.keys
    }

    pub fn position(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Encode a symptom set. Keys outside the schema are ignored.
    pub fn encode<I, S>(&self, selected: I) -> FeatureVector
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut vector = FeatureVector::zeros(self.keys.len());
        for key in selected {
            if let Some(idx) = self.position(key.as_ref()) {
                vector.set(idx);
            }
        }
        vector
    }

    /// Encode every dataset row in schema order.
    pub fn encode_dataset(&self, dataset: &Dataset) -> Result<Vec<FeatureVector>, DiagnoError> {
        let mapping: Vec<usize> = dataset
            .columns()
            .iter()
            .map(|col| {
                self.position(col).ok_or_else(|| {
                    DiagnoError::schema_mismatch(format!("dataset column '{col}' is not in schema"))
                })
            })
            .collect::<Result<_, _>>()?;

        Ok(dataset
            .rows()
            .iter()
            .map(|row| {
                let mut vector = FeatureVector::zeros(self.keys.len());
                for (col, &v) in row.values.iter().enumerate() {
                    if v == 1 {
                        vector.set(mapping[col]);
                    }
                }
                vector
            })
            .collect())
    }

    /// SHA-256 over the ordered keys; identifies a schema across artifacts.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for key in &self.keys {
            hasher.update(key.as_bytes());
            hasher.update(b"\n");
        }
        format!("{:x}", hasher.finalize())
    }
}

impl From<FeatureSchema> for Vec<String> {
    fn from(schema: FeatureSchema) -> Self {
        schema.keys
    }
}

impl TryFrom<Vec<String>> for FeatureSchema {
    type Error = DiagnoError;

    fn try_from(keys: Vec<String>) -> Result<Self, Self::Error> {
        Self::from_ordered(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn schema() -> FeatureSchema {
        FeatureSchema::new(["fever", "cough", "fatigue", "cough"])
    }

    #[test]
    fn test_canonical_order() {
        let s = schema();
        assert_eq!(s.keys(), &["cough", "fatigue", "fever"]);
        assert_eq!(s.symptom_count(), 3);
        assert_eq!(s.position("fever"), Some(2));
    }

    #[test]
    fn test_encode_ignores_unknown() {
        let s = schema();
        assert_eq!(s.encode(["not_a_real_symptom"]).as_slice(), &[0.0, 0.0, 0.0]);
        assert_eq!(s.encode(["fever", "rash"]).as_slice(), &[0.0, 0.0, 1.0]);
        assert_eq!(s.symptom_count(), 3);
    }

    #[test]
    fn test_encode_order_independent() {
        let s = schema();
        assert_eq!(s.encode(["fever", "cough"]), s.encode(["cough", "fever", "cough"]));
    }

    #[test]
    fn test_json_is_plain_array() {
        let json = serde_json::to_string(&schema()).unwrap();
        assert_eq!(json, r#"["cough","fatigue","fever"]"#);
        let back: FeatureSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(back, schema());
    }

    #[test]
    fn test_from_ordered_preserves_order() {
        let s = FeatureSchema::from_ordered(vec!["b".into(), "a".into()]).unwrap();
        assert_eq!(s.keys(), &["b", "a"]);
        assert_ne!(s.fingerprint(), FeatureSchema::new(["a", "b"]).fingerprint());
        assert!(serde_json::from_str::<FeatureSchema>(r#"["a","a"]"#).is_err());
    }

    #[test]
    fn test_encode_dataset_reorders_columns() {
        let mut ds = Dataset::new(vec!["fever".into(), "cough".into()]).unwrap();
        ds.push_row("Flu", &["fever"]).unwrap();
        let s = FeatureSchema::from_dataset(&ds);
        let rows = s.encode_dataset(&ds).unwrap();
        assert_eq!(rows[0].as_slice(), &[0.0, 1.0]);
        assert_eq!(rows[0].active_indices(), vec![1]);
    }

    #[test]
    fn test_encode_dataset_rejects_foreign_columns() {
        let ds = Dataset::new(vec!["rash".into()]).unwrap();
        assert!(schema().encode_dataset(&ds).is_err());
    }
}
