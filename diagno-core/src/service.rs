//! Long-lived diagnosis service: one shared, swappable predictor.
//!
//! Reads take a snapshot of the current [`ServingState`] and never block on
//! training. A retrain runs on a blocking worker and swaps the snapshot only
//! after its artifacts are fully written.

use crate::artifacts::{ArtifactBundle, ArtifactStore, RunManifest};
use crate::config::{DiagnoConfig, TrainingConfig};
use crate::error::DiagnoError;
use crate::inference::{PredictionResult, Predictor};
use crate::knowledge::{
    DiseaseInfo, DiseaseSummary, ExtendedAssociations, KnowledgeBase, SymptomKey, display_name,
};
use crate::training::metrics::{AccuracySummary, EvaluationReport, ModelMetrics};
use crate::training::pipeline::{PipelineRun, run_pipeline};
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, PoisonError, RwLock};

/// Everything a request needs, immutable once published.
#[derive(Debug)]
pub struct ServingState {
    pub predictor: Predictor,
    pub metrics: ModelMetrics,
    pub evaluation: Option<EvaluationReport>,
    pub manifest: RunManifest,
}

impl ServingState {
    fn from_bundle(bundle: ArtifactBundle, knowledge: Arc<KnowledgeBase>, top_k: usize) -> Self {
        let metrics = bundle.metrics.clone();
        let evaluation = bundle.evaluation.clone();
        let manifest = bundle.manifest.clone();
        Self {
            predictor: Predictor::new(bundle.into_trained_model(), knowledge, top_k),
            metrics,
            evaluation,
            manifest,
        }
    }

    fn from_run(run: PipelineRun, knowledge: Arc<KnowledgeBase>, top_k: usize) -> Self {
        Self {
            predictor: Predictor::new(run.outcome.model, knowledge, top_k),
            metrics: run.outcome.metrics,
            evaluation: Some(run.outcome.evaluation),
            manifest: run.manifest,
        }
    }
}

#[derive(Debug)]
pub struct DiagnosisService {
    config: DiagnoConfig,
    store: ArtifactStore,
    knowledge: Arc<KnowledgeBase>,
    extended: Option<Arc<ExtendedAssociations>>,
    state: RwLock<Arc<ServingState>>,
}

impl DiagnosisService {
    /// Load reference tables and the current artifacts.
    pub fn open(config: DiagnoConfig) -> Result<Self, DiagnoError> {
        let (knowledge, extended) = Self::load_tables(&config)?;
        let store = ArtifactStore::new(&config.artifacts.dir);
        let bundle = store.load_current()?;
        let state = ServingState::from_bundle(bundle, Arc::clone(&knowledge), config.inference.top_k);
        tracing::info!(run_id = %state.manifest.run_id, "Diagnosis service ready");
        Ok(Self {
            config,
            store,
            knowledge,
            extended,
            state: RwLock::new(Arc::new(state)),
        })
    }

    /// Like [`open`](Self::open), but train first when no run exists yet.
    pub fn open_or_train(config: DiagnoConfig) -> Result<Self, DiagnoError> {
        let store = ArtifactStore::new(&config.artifacts.dir);
        if store.current_manifest()?.is_none() {
            tracing::info!(dir = %store.root().display(), "No trained model found, training");
            let (knowledge, extended) = Self::load_tables(&config)?;
            run_pipeline(&knowledge, extended.as_deref(), &config, &store)?;
        }
        Self::open(config)
    }

    fn load_tables(
        config: &DiagnoConfig,
    ) -> Result<(Arc<KnowledgeBase>, Option<Arc<ExtendedAssociations>>), DiagnoError> {
        let knowledge = Arc::new(KnowledgeBase::resolve(&config.artifacts)?);
        let extended = ExtendedAssociations::resolve(&config.artifacts)?.map(Arc::new);
        Ok((knowledge, extended))
    }

    pub fn config(&self) -> &DiagnoConfig {
        &self.config
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    /// Snapshot of the current serving state.
    pub fn snapshot(&self) -> Arc<ServingState> {
        let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    fn publish(&self, state: ServingState) {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(state);
    }

    /// Symptom keys the current model understands, in schema order.
    pub fn list_symptoms(&self) -> Vec<SymptomKey> {
        self.snapshot().predictor.model().schema.keys().to_vec()
    }

    /// Symptom keys rendered for display (`body_ache` → `Body Ache`).
    pub fn list_symptoms_formatted(&self) -> Vec<String> {
        self.list_symptoms().iter().map(|k| display_name(k)).collect()
    }

    pub fn list_diseases(&self) -> Vec<DiseaseSummary> {
        self.knowledge.summaries()
    }

    pub fn disease_info(&self, name: &str) -> Result<DiseaseInfo, DiagnoError> {
        self.knowledge.info(name).cloned()
    }

    pub fn disease_symptoms(&self) -> BTreeMap<String, Vec<SymptomKey>> {
        self.knowledge.disease_symptoms()
    }

    /// Predict against the current model.
    ///
    /// A panic inside vector construction or the model query is reported as
    /// an inference failure; the service stays usable.
    pub fn predict<S: AsRef<str>>(&self, symptoms: &[S]) -> Result<PredictionResult, DiagnoError> {
        let state = self.snapshot();
        match catch_unwind(AssertUnwindSafe(|| state.predictor.predict(symptoms))) {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(run_id = %state.manifest.run_id, "Prediction panicked");
                Err(DiagnoError::inference("internal error while predicting"))
            }
        }
    }

    pub fn metrics(&self) -> ModelMetrics {
        self.snapshot().metrics.clone()
    }

    pub fn accuracy(&self) -> AccuracySummary {
        self.snapshot().metrics.accuracy_summary()
    }

    pub fn evaluation(&self) -> Option<EvaluationReport> {
        self.snapshot().evaluation.clone()
    }

    pub fn current_run(&self) -> RunManifest {
        self.snapshot().manifest.clone()
    }

    /// Re-read the current run from disk, e.g. after another process trained.
    pub fn reload(&self) -> Result<RunManifest, DiagnoError> {
        let bundle = self.store.load_current()?;
        let state =
            ServingState::from_bundle(bundle, Arc::clone(&self.knowledge), self.config.inference.top_k);
        let manifest = state.manifest.clone();
        self.publish(state);
        tracing::info!(run_id = %manifest.run_id, "Reloaded artifacts");
        Ok(manifest)
    }

    /// Retrain with the configured training settings.
    pub async fn retrain(&self) -> Result<ModelMetrics, DiagnoError> {
        self.retrain_with(self.config.training.clone()).await
    }

    /// Retrain with explicit training settings.
    ///
    /// On failure the previous model keeps serving and the error is
    /// reported as [`DiagnoError::Retrain`].
    pub async fn retrain_with(&self, training: TrainingConfig) -> Result<ModelMetrics, DiagnoError> {
        let mut config = self.config.clone();
        config.training = training;
        let knowledge = Arc::clone(&self.knowledge);
        let extended = self.extended.clone();
        let store = self.store.clone();

        let joined = tokio::task::spawn_blocking(move || {
            run_pipeline(&knowledge, extended.as_deref(), &config, &store)
        })
        .await;

        let run = match joined {
            Ok(Ok(run)) => run,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Retrain failed; keeping current model");
                return Err(DiagnoError::Retrain(e.to_string()));
            }
            Err(e) => {
                tracing::error!(error = %e, "Retrain worker aborted; keeping current model");
                return Err(DiagnoError::Retrain(format!("worker aborted: {e}")));
            }
        };

        let metrics = run.outcome.metrics.clone();
        let state =
            ServingState::from_run(run, Arc::clone(&self.knowledge), self.config.inference.top_k);
        let run_id = state.manifest.run_id.clone();
        self.publish(state);
        tracing::info!(run_id = %run_id, accuracy = metrics.accuracy, "Model swapped");
        Ok(metrics)
    }
}
