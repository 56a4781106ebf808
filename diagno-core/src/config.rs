//! Configuration for the pipeline and the serving side.
//!
//! Uses `figment` for layered configuration: defaults -> user config file ->
//! workspace config file -> explicit file -> environment -> overrides.

use crate::training::classifier::ClassifierConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagnoConfig {
    /// Where artifacts and reference tables live.
    #[serde(default)]
    pub artifacts: ArtifactConfig,
    /// Dataset synthesis settings.
    #[serde(default)]
    pub synthesis: SynthesisConfig,
    /// Split and classifier settings.
    #[serde(default)]
    pub training: TrainingConfig,
    /// Prediction settings.
    #[serde(default)]
    pub inference: InferenceConfig,
}

/// Artifact locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactConfig {
    /// Artifact root; trained runs go under `runs/`.
    #[serde(default = "default_artifact_dir")]
    pub dir: PathBuf,
    /// Disease metadata file (`disease name -> info`).
    #[serde(default)]
    pub disease_info: Option<PathBuf>,
    /// Disease core symptom file (`disease name -> [symptom]`).
    #[serde(default)]
    pub disease_symptoms: Option<PathBuf>,
    /// Extended association table (`disease -> {symptom -> probability}`).
    #[serde(default)]
    pub extended_symptoms: Option<PathBuf>,
    /// Write the synthesized dataset as CSV next to the model.
    #[serde(default = "default_true")]
    pub export_dataset: bool,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            dir: default_artifact_dir(),
            disease_info: None,
            disease_symptoms: None,
            extended_symptoms: None,
            export_dataset: true,
        }
    }
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from(".diagno/models")
}

/// Dataset synthesis configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// Rows generated per disease.
    #[serde(default = "default_samples_per_disease")]
    pub samples_per_disease: usize,
    /// Seed for synthesis; a fresh entropy seed is drawn when unset.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Inject extended symptoms after base synthesis.
    #[serde(default = "default_true")]
    pub augment_extended: bool,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            samples_per_disease: default_samples_per_disease(),
            seed: None,
            augment_extended: true,
        }
    }
}

fn default_samples_per_disease() -> usize {
    crate::data::synth::DEFAULT_SAMPLES_PER_DISEASE
}

/// Training configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Holdout share, strictly between 0 and 1.
    #[serde(default = "default_test_fraction")]
    pub test_fraction: f64,
    /// Seed for the stratified split and classifier initialization.
    #[serde(default = "default_training_seed")]
    pub seed: u64,
    /// Classifier family and hyperparameters.
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_fraction: default_test_fraction(),
            seed: default_training_seed(),
            classifier: ClassifierConfig::default(),
        }
    }
}

fn default_test_fraction() -> f64 {
    0.2
}

fn default_training_seed() -> u64 {
    42
}

/// Inference configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Number of ranked predictions returned.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    crate::inference::DEFAULT_TOP_K
}

fn default_true() -> bool {
    true
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides
/// 2. Environment variables (`DIAGNO_TRAINING__SEED`, `DIAGNO_ARTIFACTS__DIR`, ...)
/// 3. Explicit config file
/// 4. Workspace config (`.diagno/config.toml`)
/// 5. User config (`~/.config/diagno/config.toml`)
/// 6. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    config_file: Option<&Path>,
    overrides: Option<&DiagnoConfig>,
) -> Result<DiagnoConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(DiagnoConfig::default()));

    if let Some(dirs) = directories::ProjectDirs::from("dev", "diagno", "diagno") {
        let user_config = dirs.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(".diagno").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    if let Some(file) = config_file {
        figment = figment.merge(Toml::file(file));
    }

    figment = figment.merge(Env::prefixed("DIAGNO_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    let mut config: DiagnoConfig = figment.extract().map_err(Box::new)?;
    if let Some(ws) = workspace {
        if config.artifacts.dir.is_relative() {
            config.artifacts.dir = ws.join(&config.artifacts.dir);
        }
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = DiagnoConfig::default();
        assert_eq!(config.synthesis.samples_per_disease, 50);
        assert!(config.synthesis.augment_extended);
        assert_eq!(config.training.test_fraction, 0.2);
        assert_eq!(config.training.seed, 42);
        assert_eq!(config.inference.top_k, 3);
        assert_eq!(config.artifacts.dir, PathBuf::from(".diagno/models"));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: DiagnoConfig = toml_from_str(
            r#"
            [training]
            seed = 7
            "#,
        );
        assert_eq!(config.training.seed, 7);
        assert_eq!(config.training.test_fraction, 0.2);
        assert_eq!(config.synthesis.samples_per_disease, 50);
    }

    #[test]
    fn test_workspace_config_file() {
        let dir = TempDir::new().unwrap();
        let cfg_dir = dir.path().join(".diagno");
        std::fs::create_dir_all(&cfg_dir).unwrap();
        std::fs::write(
            cfg_dir.join("config.toml"),
            "[synthesis]\nsamples_per_disease = 12\n\n[inference]\ntop_k = 5\n",
        )
        .unwrap();

        let config = load_config(Some(dir.path()), None, None).unwrap();
        assert_eq!(config.synthesis.samples_per_disease, 12);
        assert_eq!(config.inference.top_k, 5);
        assert_eq!(config.artifacts.dir, dir.path().join(".diagno/models"));
    }

    #[test]
    fn test_overrides_win() {
        let dir = TempDir::new().unwrap();
        let mut overrides = DiagnoConfig::default();
        overrides.training.seed = 99;
        let config = load_config(Some(dir.path()), None, Some(&overrides)).unwrap();
        assert_eq!(config.training.seed, 99);
    }

    fn toml_from_str(s: &str) -> DiagnoConfig {
        Figment::from(Serialized::defaults(DiagnoConfig::default()))
            .merge(Toml::string(s))
            .extract()
            .unwrap()
    }
}
