//! Disease/symptom knowledge base and the extended association table.
//!
//! The knowledge base is authored reference data: each disease carries an
//! ordered list of core symptom keys plus free-text metadata. The extended
//! association table adds per-disease symptom inclusion probabilities that are
//! only consulted while synthesizing training data.

use crate::config::ArtifactConfig;
use crate::error::DiagnoError;
use crate::persistence::{atomic_write_json, load_json, load_required_json};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

/// Normalized symptom identifier (lowercase, underscore separated).
pub type SymptomKey = String;

pub const DISEASE_INFO_FILE: &str = "disease_info.json";
pub const DISEASE_SYMPTOMS_FILE: &str = "disease_symptoms.json";
pub const EXTENDED_SYMPTOMS_FILE: &str = "extended_symptoms.json";

const BUILTIN_DISEASES: &str = include_str!("../data/diseases.json");
const BUILTIN_EXTENDED: &str = include_str!("../data/extended_symptoms.json");

/// Free-text metadata attached to a disease.
///
/// Empty fields are skipped on output, so the metadata of a disease nobody
/// authored serializes as `{}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiseaseInfo {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prevention: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub treatment: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub medicines: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diet: Vec<String>,
}

impl DiseaseInfo {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A disease with its core symptoms and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseaseRecord {
    pub name: String,
    pub symptoms: Vec<SymptomKey>,
    #[serde(flatten)]
    pub info: DiseaseInfo,
}

impl DiseaseRecord {
    pub fn new(name: impl Into<String>, symptoms: &[&str]) -> Self {
        Self {
            name: name.into(),
            symptoms: symptoms.iter().map(|s| s.to_string()).collect(),
            info: DiseaseInfo::default(),
        }
    }

    pub fn with_info(mut self, info: DiseaseInfo) -> Self {
        self.info = info;
        self
    }
}

/// Listing entry returned to collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseaseSummary {
    pub name: String,
    pub description: String,
    pub severity: String,
}

/// Immutable set of authored disease records.
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeBase {
    records: Vec<DiseaseRecord>,
}

impl KnowledgeBase {
    /// Build a knowledge base, rejecting duplicate names and malformed keys.
    ///
    /// Records are kept sorted by name, so synthesis walks them in the same
    /// order whatever source they came from. Duplicate symptoms within one
    /// record are collapsed, keeping the first occurrence.
    pub fn new(records: Vec<DiseaseRecord>) -> Result<Self, DiagnoError> {
        let mut names = HashSet::new();
        let mut cleaned = Vec::with_capacity(records.len());
        for mut record in records {
            if record.name.trim().is_empty() {
                return Err(DiagnoError::config("disease name must not be empty"));
            }
            if !names.insert(record.name.clone()) {
                return Err(DiagnoError::config(format!(
                    "duplicate disease '{}'",
                    record.name
                )));
            }
            let mut seen = HashSet::new();
            record.symptoms.retain(|s| seen.insert(s.clone()));
            if let Some(bad) = record.symptoms.iter().find(|s| !is_normalized(s)) {
                return Err(DiagnoError::config(format!(
                    "symptom key '{bad}' of '{}' is not normalized (expected '{}')",
                    record.name,
                    normalize_key(bad)
                )));
            }
            cleaned.push(record);
        }
        cleaned.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Self { records: cleaned })
    }

    /// The 20 diseases shipped with the crate.
    pub fn builtin() -> Result<Self, DiagnoError> {
        let records: Vec<DiseaseRecord> = serde_json::from_str(BUILTIN_DISEASES)?;
        Self::new(records)
    }

    /// Join a disease → symptoms table with a disease → metadata table.
    ///
    /// A disease present in only one table still becomes a record; one without
    /// symptoms is valid for serving but rejected by dataset synthesis.
    pub fn from_tables(
        symptoms: BTreeMap<String, Vec<SymptomKey>>,
        mut info: BTreeMap<String, DiseaseInfo>,
    ) -> Result<Self, DiagnoError> {
        let mut records: Vec<DiseaseRecord> = symptoms
            .into_iter()
            .map(|(name, symptoms)| {
                let info = info.remove(&name).unwrap_or_default();
                DiseaseRecord {
                    name,
                    symptoms,
                    info,
                }
            })
            .collect();
        records.extend(info.into_iter().map(|(name, info)| DiseaseRecord {
            name,
            symptoms: Vec::new(),
            info,
        }));
        Self::new(records)
    }

    /// Load from a metadata file and an optional symptom mapping file.
    pub fn load(info_path: &Path, symptoms_path: Option<&Path>) -> Result<Self, DiagnoError> {
        let info: BTreeMap<String, DiseaseInfo> = load_required_json(info_path)?;
        let symptoms: BTreeMap<String, Vec<SymptomKey>> = match symptoms_path {
            Some(path) => load_json(path)?.unwrap_or_default(),
            None => BTreeMap::new(),
        };
        let kb = Self::from_tables(symptoms, info)?;
        tracing::debug!(
            path = %info_path.display(),
            diseases = kb.len(),
            "Loaded knowledge base"
        );
        Ok(kb)
    }

    /// Resolve the knowledge base for a deployment.
    ///
    /// Explicit paths win, then files exported into the artifact directory,
    /// then the built-in tables.
    pub fn resolve(config: &ArtifactConfig) -> Result<Self, DiagnoError> {
        let exported_info = config.dir.join(DISEASE_INFO_FILE);
        let exported_symptoms = config.dir.join(DISEASE_SYMPTOMS_FILE);
        let symptoms_path = config
            .disease_symptoms
            .clone()
            .or_else(|| exported_symptoms.exists().then_some(exported_symptoms));

        if let Some(info_path) = &config.disease_info {
            return Self::load(info_path, symptoms_path.as_deref());
        }
        if exported_info.exists() {
            return Self::load(&exported_info, symptoms_path.as_deref());
        }
        tracing::debug!("Using built-in knowledge base");
        Self::builtin()
    }

    /// Write `disease_info.json` and `disease_symptoms.json` into `dir`.
    pub fn export(&self, dir: &Path) -> Result<(), DiagnoError> {
        let info: BTreeMap<&str, &DiseaseInfo> = self
            .records
            .iter()
            .map(|r| (r.name.as_str(), &r.info))
            .collect();
        atomic_write_json(&dir.join(DISEASE_INFO_FILE), &info)?;
        atomic_write_json(&dir.join(DISEASE_SYMPTOMS_FILE), &self.disease_symptoms())?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[DiseaseRecord] {
        &self.records
    }

    pub fn get(&self, name: &str) -> Option<&DiseaseRecord> {
        self.records.iter().find(|r| r.name == name)
    }

    /// Metadata for `name`, or `DiseaseNotFound`.
    pub fn info(&self, name: &str) -> Result<&DiseaseInfo, DiagnoError> {
        self.get(name)
            .map(|r| &r.info)
            .ok_or_else(|| DiagnoError::not_found(name))
    }

    /// Core symptom mapping, keyed by disease name.
    pub fn disease_symptoms(&self) -> BTreeMap<String, Vec<SymptomKey>> {
        self.records
            .iter()
            .filter(|r| !r.symptoms.is_empty())
            .map(|r| (r.name.clone(), r.symptoms.clone()))
            .collect()
    }

    pub fn summaries(&self) -> Vec<DiseaseSummary> {
        self.records
            .iter()
            .map(|r| DiseaseSummary {
                name: r.name.clone(),
                description: r.info.description.clone(),
                severity: r
                    .info
                    .severity
                    .clone()
                    .unwrap_or_else(|| "Unknown".to_string()),
            })
            .collect()
    }

    /// Union of every core symptom key, sorted.
    pub fn symptom_keys(&self) -> BTreeSet<SymptomKey> {
        self.records
            .iter()
            .flat_map(|r| r.symptoms.iter().cloned())
            .collect()
    }
}

/// Per-disease extended symptom inclusion probabilities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtendedAssociations {
    table: BTreeMap<String, BTreeMap<SymptomKey, f64>>,
}

impl ExtendedAssociations {
    /// Build a table, rejecting probabilities outside `[0, 1]`.
    pub fn new(table: BTreeMap<String, BTreeMap<SymptomKey, f64>>) -> Result<Self, DiagnoError> {
        for (disease, weights) in &table {
            for (symptom, &p) in weights {
                if !p.is_finite() || !(0.0..=1.0).contains(&p) {
                    return Err(DiagnoError::config(format!(
                        "probability {p} for '{disease}' / '{symptom}' is outside [0, 1]"
                    )));
                }
                if !is_normalized(symptom) {
                    return Err(DiagnoError::config(format!(
                        "extended symptom key '{symptom}' is not normalized"
                    )));
                }
            }
        }
        Ok(Self { table })
    }

    pub fn builtin() -> Result<Self, DiagnoError> {
        Self::new(serde_json::from_str(BUILTIN_EXTENDED)?)
    }

    /// Load a table from disk. A missing file is not an error.
    pub fn load_optional(path: &Path) -> Result<Option<Self>, DiagnoError> {
        match load_json::<BTreeMap<String, BTreeMap<SymptomKey, f64>>>(path)? {
            Some(table) => Ok(Some(Self::new(table)?)),
            None => {
                tracing::warn!(path = %path.display(), "Extended association table not found");
                Ok(None)
            }
        }
    }

    /// Explicit path, then the artifact directory, then the built-in table.
    pub fn resolve(config: &ArtifactConfig) -> Result<Option<Self>, DiagnoError> {
        if let Some(path) = &config.extended_symptoms {
            return Self::load_optional(path);
        }
        let exported = config.dir.join(EXTENDED_SYMPTOMS_FILE);
        if exported.exists() {
            return Self::load_optional(&exported);
        }
        Self::builtin().map(Some)
    }

    pub fn export(&self, dir: &Path) -> Result<(), DiagnoError> {
        atomic_write_json(&dir.join(EXTENDED_SYMPTOMS_FILE), self)
    }

    pub fn get(&self, disease: &str) -> Option<&BTreeMap<SymptomKey, f64>> {
        self.table.get(disease)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeMap<SymptomKey, f64>)> {
        self.table.iter()
    }

    /// Every symptom key referenced by any disease, sorted.
    pub fn symptom_keys(&self) -> BTreeSet<SymptomKey> {
        self.table
            .values()
            .flat_map(|weights| weights.keys().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Normalize free-form input into a symptom key: `"Body Ache"` → `"body_ache"`.
pub fn normalize_key(raw: &str) -> SymptomKey {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.trim().chars() {
        if ch.is_whitespace() || ch == '-' || ch == '_' {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
        } else {
            out.extend(ch.to_lowercase());
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

pub fn is_normalized(key: &str) -> bool {
    !key.is_empty() && normalize_key(key) == key
}

/// Display form of a symptom key: `"body_ache"` → `"Body Ache"`.
pub fn display_name(key: &str) -> String {
    key.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_knowledge_base() {
        let kb = KnowledgeBase::builtin().unwrap();
        assert_eq!(kb.len(), 20);
        assert!(kb.records().iter().all(|r| r.symptoms.len() == 5));
        let flu = kb.get("Flu").unwrap();
        assert_eq!(flu.symptoms[0], "fever");
        assert_eq!(flu.info.severity.as_deref(), Some("Moderate"));
    }

    #[test]
    fn test_builtin_extended_table() {
        let ext = ExtendedAssociations::builtin().unwrap();
        assert_eq!(ext.len(), 20);
        assert_eq!(ext.get("Common Cold").unwrap()["nasal_congestion"], 0.9);
        assert!(ext.symptom_keys().contains("increased_urination_at_night"));
    }

    #[test]
    fn test_rejects_duplicate_disease() {
        let err = KnowledgeBase::new(vec![
            DiseaseRecord::new("Flu", &["fever"]),
            DiseaseRecord::new("Flu", &["cough"]),
        ])
        .unwrap_err();
        assert!(matches!(err, DiagnoError::Config(_)));
    }

    #[test]
    fn test_rejects_unnormalized_symptom() {
        let err = KnowledgeBase::new(vec![DiseaseRecord::new("Flu", &["Body Ache"])]).unwrap_err();
        assert!(err.to_string().contains("body_ache"));
    }

    #[test]
    fn test_collapses_duplicate_symptoms() {
        let kb =
            KnowledgeBase::new(vec![DiseaseRecord::new("Flu", &["fever", "cough", "fever"])]).unwrap();
        assert_eq!(kb.get("Flu").unwrap().symptoms, vec!["fever", "cough"]);
    }

    #[test]
    fn test_info_not_found() {
        let kb = KnowledgeBase::builtin().unwrap();
        assert!(kb.info("Malaria").is_ok());
        assert!(matches!(
            kb.info("Scurvy"),
            Err(DiagnoError::DiseaseNotFound(name)) if name == "Scurvy"
        ));
    }

    #[test]
    fn test_summaries_default_severity() {
        let kb = KnowledgeBase::new(vec![DiseaseRecord::new("Mystery", &["fever"])]).unwrap();
        let summaries = kb.summaries();
        assert_eq!(summaries[0].severity, "Unknown");
        assert_eq!(summaries[0].description, "");
    }

    #[test]
    fn test_export_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let kb = KnowledgeBase::builtin().unwrap();
        kb.export(dir.path()).unwrap();

        let loaded = KnowledgeBase::load(
            &dir.path().join(DISEASE_INFO_FILE),
            Some(&dir.path().join(DISEASE_SYMPTOMS_FILE)),
        )
        .unwrap();
        assert_eq!(loaded.len(), kb.len());
        assert_eq!(loaded.disease_symptoms(), kb.disease_symptoms());
        assert_eq!(loaded.info("Dengue").unwrap(), kb.info("Dengue").unwrap());
    }

    #[test]
    fn test_from_tables_keeps_info_only_diseases() {
        let mut symptoms = BTreeMap::new();
        symptoms.insert("Flu".to_string(), vec!["fever".to_string()]);
        let mut info = BTreeMap::new();
        info.insert("Rare".to_string(), DiseaseInfo::default());
        let kb = KnowledgeBase::from_tables(symptoms, info).unwrap();
        assert_eq!(kb.len(), 2);
        assert!(kb.get("Rare").unwrap().symptoms.is_empty());
        assert_eq!(kb.disease_symptoms().len(), 1);
    }

    #[test]
    fn test_extended_rejects_bad_probability() {
        let mut weights = BTreeMap::new();
        weights.insert("chills".to_string(), 1.5);
        let mut table = BTreeMap::new();
        table.insert("Flu".to_string(), weights);
        assert!(ExtendedAssociations::new(table).is_err());
    }

    #[test]
    fn test_extended_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let loaded = ExtendedAssociations::load_optional(&dir.path().join("nope.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_empty_info_serializes_as_empty_object() {
        let json = serde_json::to_string(&DiseaseInfo::default()).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn test_normalize_and_display() {
        assert_eq!(normalize_key("  Body Ache "), "body_ache");
        assert_eq!(normalize_key("loss-of__taste"), "loss_of_taste");
        assert!(is_normalized("runny_nose"));
        assert!(!is_normalized("Runny Nose"));
        assert!(!is_normalized(""));
        assert_eq!(display_name("sensitivity_to_light"), "Sensitivity To Light");
        assert_eq!(display_name("fever"), "Fever");
    }
}
