//! Versioned artifact runs and the `current.json` pointer.
//!
//! Layout under the artifact root:
//!
//! ```text
//! <root>/
//!   current.json                  manifest of the active run
//!   disease_info.json             knowledge base export
//!   disease_symptoms.json
//!   extended_symptoms.json
//!   runs/<run_id>/
//!     model.json
//!     symptom_list.json
//!     model_metrics.json
//!     confusion_matrix.json
//!     disease_symptom_dataset.csv
//! ```
//!
//! A run directory is fully written before the pointer is replaced, so
//! readers either see the previous run or the new one.

use crate::data::Dataset;
use crate::error::DiagnoError;
use crate::features::FeatureSchema;
use crate::persistence::{atomic_write_json, load_json, load_required_json};
use crate::training::classifier::{Classifier, ProbabilisticClassifier};
use crate::training::metrics::{EvaluationReport, ModelMetrics};
use crate::training::trainer::{TrainedModel, TrainingOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const MODEL_FILE: &str = "model.json";
pub const SCHEMA_FILE: &str = "symptom_list.json";
pub const METRICS_FILE: &str = "model_metrics.json";
pub const EVALUATION_FILE: &str = "confusion_matrix.json";
pub const DATASET_FILE: &str = "disease_symptom_dataset.csv";
pub const MANIFEST_FILE: &str = "current.json";
const RUNS_DIR: &str = "runs";

/// Pointer to the active run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    /// SHA-256 of the run's symptom schema.
    pub schema_fingerprint: String,
    pub model_type: String,
}

/// Serialized classifier and the label order it indexes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub schema_fingerprint: String,
    pub labels: Vec<String>,
    pub classifier: Classifier,
    pub trained_at: DateTime<Utc>,
}

/// All artifacts of one run, loaded and cross-checked.
#[derive(Debug, Clone)]
pub struct ArtifactBundle {
    pub manifest: RunManifest,
    pub schema: FeatureSchema,
    pub model: ModelArtifact,
    pub metrics: ModelMetrics,
    pub evaluation: Option<EvaluationReport>,
}

impl ArtifactBundle {
    /// Reject a bundle whose pieces disagree with one another.
    pub fn verify(&self) -> Result<(), DiagnoError> {
        let fingerprint = self.schema.fingerprint();
        if fingerprint != self.model.schema_fingerprint {
            return Err(DiagnoError::schema_mismatch(
                "symptom list does not match the schema the model was trained on",
            ));
        }
        if fingerprint != self.manifest.schema_fingerprint {
            return Err(DiagnoError::schema_mismatch(format!(
                "manifest fingerprint differs from run '{}'",
                self.manifest.run_id
            )));
        }
        let width = self.model.classifier.n_features();
        if width != self.schema.symptom_count() {
            return Err(DiagnoError::schema_mismatch(format!(
                "model expects {width} symptoms, schema has {}",
                self.schema.symptom_count()
            )));
        }
        let classes = self.model.classifier.n_classes();
        if classes != self.model.labels.len() {
            return Err(DiagnoError::schema_mismatch(format!(
                "model has {classes} classes but {} labels",
                self.model.labels.len()
            )));
        }
        Ok(())
    }

    pub fn into_trained_model(self) -> TrainedModel {
        TrainedModel {
            schema: self.schema,
            labels: self.model.labels,
            classifier: self.model.classifier,
        }
    }
}

/// Reads and writes artifact runs under a root directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root.join(RUNS_DIR).join(run_id)
    }

    fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    /// Persist a training outcome as a new run and make it current.
    ///
    /// On any write failure the partial run directory is removed and the
    /// existing pointer is left untouched.
    pub fn write_run(
        &self,
        outcome: &TrainingOutcome,
        dataset: Option<&Dataset>,
    ) -> Result<RunManifest, DiagnoError> {
        let now = Utc::now();
        let run_id = format!(
            "{}-{}",
            now.format("%Y%m%dT%H%M%S"),
            &uuid::Uuid::new_v4().simple().to_string()[..8]
        );
        let fingerprint = outcome.model.schema.fingerprint();
        let manifest = RunManifest {
            run_id: run_id.clone(),
            created_at: now,
            schema_fingerprint: fingerprint.clone(),
            model_type: outcome.metrics.model_type.clone(),
        };
        let model = ModelArtifact {
            schema_fingerprint: fingerprint,
            labels: outcome.model.labels.clone(),
            classifier: outcome.model.classifier.clone(),
            trained_at: now,
        };

        let dir = self.run_dir(&run_id);
        let written = (|| -> Result<(), DiagnoError> {
            atomic_write_json(&dir.join(MODEL_FILE), &model)?;
            atomic_write_json(&dir.join(SCHEMA_FILE), &outcome.model.schema)?;
            atomic_write_json(&dir.join(METRICS_FILE), &outcome.metrics)?;
            atomic_write_json(&dir.join(EVALUATION_FILE), &outcome.evaluation)?;
            if let Some(ds) = dataset {
                ds.write_csv(&dir.join(DATASET_FILE))?;
            }
            Ok(())
        })();
        if let Err(e) = written {
            if let Err(cleanup) = std::fs::remove_dir_all(&dir) {
                tracing::warn!(run_id = %run_id, error = %cleanup, "Failed to remove partial run");
            }
            return Err(e);
        }

        atomic_write_json(&self.manifest_path(), &manifest)?;
        tracing::info!(run_id = %run_id, dir = %dir.display(), "Artifacts written");
        Ok(manifest)
    }

    /// The active run, if one has been written.
    pub fn current_manifest(&self) -> Result<Option<RunManifest>, DiagnoError> {
        load_json(&self.manifest_path())
    }

    /// Load and verify the active run.
    pub fn load_current(&self) -> Result<ArtifactBundle, DiagnoError> {
        let manifest = self.current_manifest()?.ok_or_else(|| {
            DiagnoError::config(format!(
                "no trained model under {}; run training first",
                self.root.display()
            ))
        })?;
        self.load_run(manifest)
    }

    /// Load and verify the run named by `manifest`.
    pub fn load_run(&self, manifest: RunManifest) -> Result<ArtifactBundle, DiagnoError> {
        let dir = self.run_dir(&manifest.run_id);
        let schema: FeatureSchema = load_required_json(&dir.join(SCHEMA_FILE))?;
        let model: ModelArtifact = load_required_json(&dir.join(MODEL_FILE))?;
        let metrics: ModelMetrics = load_required_json(&dir.join(METRICS_FILE))?;
        let evaluation: Option<EvaluationReport> = load_json(&dir.join(EVALUATION_FILE))?;

        let bundle = ArtifactBundle {
            manifest,
            schema,
            model,
            metrics,
            evaluation,
        };
        bundle.verify()?;
        tracing::debug!(
            run_id = %bundle.manifest.run_id,
            symptoms = bundle.schema.symptom_count(),
            classes = bundle.model.labels.len(),
            "Loaded artifacts"
        );
        Ok(bundle)
    }

    /// Synthesized dataset of the active run, if it was exported.
    pub fn load_current_dataset(&self) -> Result<Option<Dataset>, DiagnoError> {
        let Some(manifest) = self.current_manifest()? else {
            return Ok(None);
        };
        let path = self.run_dir(&manifest.run_id).join(DATASET_FILE);
        if !path.exists() {
            return Ok(None);
        }
        Dataset::read_csv(&path).map(Some)
    }
}
