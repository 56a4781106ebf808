//! CLI subcommand handlers. Results go to stdout as pretty JSON.

use crate::Commands;
use crate::ConfigAction;
use diagno_core::{
    ArtifactStore, DiagnoConfig, DiagnosisService, ExtendedAssociations, KnowledgeBase,
    normalize_key, run_pipeline,
};
use serde::Serialize;
use std::path::Path;

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    mut config: DiagnoConfig,
    workspace: &Path,
) -> anyhow::Result<()> {
    match command {
        Commands::Train {
            samples,
            seed,
            no_extended,
        } => {
            if let Some(samples) = samples {
                config.synthesis.samples_per_disease = samples;
            }
            if seed.is_some() {
                config.synthesis.seed = seed;
            }
            if no_extended {
                config.synthesis.augment_extended = false;
            }
            handle_train(config).await
        }
        Commands::Predict { symptoms } => {
            let keys: Vec<String> = symptoms.iter().map(|s| normalize_key(s)).collect();
            let service = DiagnosisService::open(config)?;
            print_json(&service.predict(&keys)?)
        }
        Commands::Symptoms { formatted } => {
            let service = DiagnosisService::open(config)?;
            if formatted {
                print_json(&service.list_symptoms_formatted())
            } else {
                print_json(&service.list_symptoms())
            }
        }
        Commands::Diseases => {
            let knowledge = KnowledgeBase::resolve(&config.artifacts)?;
            print_json(&knowledge.summaries())
        }
        Commands::Info { disease } => {
            let knowledge = KnowledgeBase::resolve(&config.artifacts)?;
            print_json(knowledge.info(&disease)?)
        }
        Commands::Metrics { detailed } => {
            let service = DiagnosisService::open(config)?;
            if detailed {
                print_json(&serde_json::json!({
                    "metrics": service.metrics(),
                    "evaluation": service.evaluation(),
                }))
            } else {
                print_json(&service.metrics())
            }
        }
        Commands::Accuracy => {
            let service = DiagnosisService::open(config)?;
            print_json(&service.accuracy())
        }
        Commands::Dataset { out } => handle_dataset(&config, &out),
        Commands::Config { action } => handle_config(action, &config, workspace),
    }
}

async fn handle_train(config: DiagnoConfig) -> anyhow::Result<()> {
    let knowledge = KnowledgeBase::resolve(&config.artifacts)?;
    let extended = ExtendedAssociations::resolve(&config.artifacts)?;
    let store = ArtifactStore::new(&config.artifacts.dir);

    let run = tokio::task::spawn_blocking(move || {
        run_pipeline(&knowledge, extended.as_ref(), &config, &store)
    })
    .await??;
    tracing::info!(
        run_id = %run.manifest.run_id,
        accuracy = run.outcome.metrics.accuracy,
        "Training complete"
    );

    print_json(&serde_json::json!({
        "run_id": run.manifest.run_id,
        "synthesis_seed": run.synthesis_seed,
        "metrics": run.outcome.metrics,
    }))
}

fn handle_dataset(config: &DiagnoConfig, out: &Path) -> anyhow::Result<()> {
    let store = ArtifactStore::new(&config.artifacts.dir);
    let dataset = store.load_current_dataset()?.ok_or_else(|| {
        anyhow::anyhow!("The current run has no exported dataset; retrain with artifacts.export_dataset = true")
    })?;
    dataset.write_csv(out)?;
    println!(
        "Wrote {} rows x {} symptoms to {}",
        dataset.len(),
        dataset.columns().len(),
        out.display()
    );
    Ok(())
}

fn handle_config(action: ConfigAction, config: &DiagnoConfig, workspace: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_dir = workspace.join(".diagno");
            std::fs::create_dir_all(&config_dir)?;

            let config_path = config_dir.join("config.toml");
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            let toml_str = toml::to_string_pretty(&DiagnoConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            println!("{}", toml::to_string_pretty(config)?);
            Ok(())
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
