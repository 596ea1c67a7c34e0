use crate::core::models::model::{ModelError, ReactionModel};
use crate::core::scaling::{LinearForm, LinearScaler, StepEnergetics};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_PREFACTOR: f64 = 1e13;

#[derive(Debug, Error)]
pub enum ModelFileError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Invalid reaction model: {0}")]
    Model(#[from] ModelError),
    #[error("Unknown site '{site}' referenced by species '{species}'")]
    UnknownSite { species: String, site: String },
    #[error("'{item}' has {found} descriptor slopes but the model declares {expected} descriptors")]
    SlopeCount {
        item: String,
        expected: usize,
        found: usize,
    },
    #[error("Temperature must be positive and finite, got {0}")]
    InvalidTemperature(f64),
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LinearFormDef {
    #[serde(default)]
    pub intercept: f64,
    #[serde(default)]
    pub slopes: Vec<f64>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum EnergyDef {
    Constant(f64),
    Linear(LinearFormDef),
}

impl From<&EnergyDef> for LinearForm {
    fn from(def: &EnergyDef) -> Self {
        match def {
            EnergyDef::Constant(value) => LinearForm::constant(*value),
            EnergyDef::Linear(form) => LinearForm::new(form.intercept, form.slopes.clone()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct SiteDef {
    name: String,
    #[serde(default = "default_capacity")]
    capacity: f64,
    #[serde(default)]
    aliases: Vec<String>,
}

fn default_capacity() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct GasDef {
    name: String,
    pressure: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct AdsorbateDef {
    name: String,
    site: String,
    #[serde(default = "zero_energy")]
    formation_energy: EnergyDef,
}

fn zero_energy() -> EnergyDef {
    EnergyDef::Constant(0.0)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct TransitionStateDef {
    name: String,
    site: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct StepDef {
    name: String,
    initial: Vec<String>,
    #[serde(default)]
    transition: Option<Vec<String>>,
    #[serde(rename = "final")]
    final_: Vec<String>,
    #[serde(default = "zero_energy")]
    reaction_energy: EnergyDef,
    #[serde(default)]
    activation_energy: Option<EnergyDef>,
    #[serde(default = "default_prefactor")]
    prefactor: f64,
}

fn tokens(list: &[String]) -> Vec<&str> {
    list.iter().map(String::as_str).collect()
}

fn default_prefactor() -> f64 {
    DEFAULT_PREFACTOR
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct ModelFileDef {
    temperature: f64,
    #[serde(default)]
    descriptor_names: Vec<String>,
    #[serde(default)]
    sites: Vec<SiteDef>,
    #[serde(default)]
    gases: Vec<GasDef>,
    #[serde(default)]
    adsorbates: Vec<AdsorbateDef>,
    #[serde(default)]
    transition_states: Vec<TransitionStateDef>,
    #[serde(default)]
    steps: Vec<StepDef>,
}

/// A reaction model together with the linear scaler that parameterizes it.
#[derive(Debug, Clone)]
pub struct ModelDefinition {
    pub model: ReactionModel,
    pub scaler: LinearScaler,
    pub descriptor_names: Vec<String>,
}

impl ModelDefinition {
    pub fn load(path: &Path) -> Result<Self, ModelFileError> {
        let content = std::fs::read_to_string(path).map_err(|e| ModelFileError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::parse(&content, &path.to_string_lossy())
    }

    /// Parses model-file text; `origin` names the source in error messages.
    pub fn parse(content: &str, origin: &str) -> Result<Self, ModelFileError> {
        let def: ModelFileDef = toml::from_str(content).map_err(|e| ModelFileError::Toml {
            path: origin.to_string(),
            source: e,
        })?;
        Self::from_def(def)
    }

    pub fn dimension(&self) -> usize {
        self.descriptor_names.len()
    }

    fn from_def(def: ModelFileDef) -> Result<Self, ModelFileError> {
        if !def.temperature.is_finite() || def.temperature <= 0.0 {
            return Err(ModelFileError::InvalidTemperature(def.temperature));
        }
        let dimension = def.descriptor_names.len();
        let check_slopes = |item: &str, energy: &EnergyDef| -> Result<LinearForm, ModelFileError> {
            let form = LinearForm::from(energy);
            if form.slopes.len() > dimension {
                return Err(ModelFileError::SlopeCount {
                    item: item.to_string(),
                    expected: dimension,
                    found: form.slopes.len(),
                });
            }
            Ok(form)
        };

        let mut builder = ReactionModel::builder();
        for site in &def.sites {
            let id = builder.add_site(&site.name, site.capacity);
            for alias in &site.aliases {
                builder.add_site_alias(id, alias);
            }
        }
        for gas in &def.gases {
            builder.add_gas(&gas.name, gas.pressure);
        }

        let mut scaler = LinearScaler::new(def.temperature);
        for adsorbate in &def.adsorbates {
            let site = builder
                .find_site(&adsorbate.site)
                .ok_or_else(|| ModelFileError::UnknownSite {
                    species: adsorbate.name.clone(),
                    site: adsorbate.site.clone(),
                })?;
            builder.add_adsorbate(&adsorbate.name, site);
            scaler = scaler.with_formation_energy(check_slopes(&adsorbate.name, &adsorbate.formation_energy)?);
        }
        for ts in &def.transition_states {
            let site = builder
                .find_site(&ts.site)
                .ok_or_else(|| ModelFileError::UnknownSite {
                    species: ts.name.clone(),
                    site: ts.site.clone(),
                })?;
            builder.add_transition_state(&ts.name, site);
        }

        for step in &def.steps {
            let transition = step.transition.as_deref().map(tokens);
            builder.add_step_from_tokens(
                &step.name,
                &tokens(&step.initial),
                transition.as_deref(),
                &tokens(&step.final_),
            )?;
            scaler = scaler.with_step(StepEnergetics {
                reaction_energy: check_slopes(&step.name, &step.reaction_energy)?,
                activation_energy: step
                    .activation_energy
                    .as_ref()
                    .map(|energy| check_slopes(&step.name, energy))
                    .transpose()?,
                prefactor: step.prefactor,
            });
        }

        Ok(Self {
            model: builder.build()?,
            scaler,
            descriptor_names: def.descriptor_names,
        })
    }
}
