//! End-to-end batch job: synthesize, augment, train, persist.

use crate::artifacts::{ArtifactStore, RunManifest};
use crate::config::DiagnoConfig;
use crate::data::{augment_with_extended, synthesize_base};
use crate::error::DiagnoError;
use crate::knowledge::{ExtendedAssociations, KnowledgeBase};
use crate::training::trainer::{TrainingOutcome, train};
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Result of a completed pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub manifest: RunManifest,
    pub outcome: TrainingOutcome,
    /// Seed actually used for synthesis, so the dataset can be regenerated.
    pub synthesis_seed: u64,
}

/// Run the full training pipeline and make its artifacts current.
///
/// Nothing under the store's `current.json` changes unless every step succeeds.
pub fn run_pipeline(
    kb: &KnowledgeBase,
    extended: Option<&ExtendedAssociations>,
    config: &DiagnoConfig,
    store: &ArtifactStore,
) -> Result<PipelineRun, DiagnoError> {
    let synthesis_seed = config.synthesis.seed.unwrap_or_else(rand::random);
    let mut rng = StdRng::seed_from_u64(synthesis_seed);
    tracing::info!(
        diseases = kb.len(),
        samples_per_disease = config.synthesis.samples_per_disease,
        seed = synthesis_seed,
        "Starting training pipeline"
    );

    let mut dataset = synthesize_base(kb, config.synthesis.samples_per_disease, &mut rng)?;
    match extended {
        Some(table) if config.synthesis.augment_extended => {
            dataset = augment_with_extended(dataset, table, &mut rng)?;
        }
        Some(_) => tracing::debug!("Extended augmentation disabled"),
        None => tracing::debug!("No extended association table"),
    }

    let outcome = train(&dataset, &config.training)?;

    let exported = config.artifacts.export_dataset.then_some(&dataset);
    let manifest = store.write_run(&outcome, exported)?;

    // Reference tables follow the run they trained, never a failed one.
    kb.export(store.root())?;
    if let Some(table) = extended {
        table.export(store.root())?;
    }

    Ok(PipelineRun {
        manifest,
        outcome,
        synthesis_seed,
    })
}
