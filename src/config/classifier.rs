use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{PipelineError, Result};

/// Versioned classification catalog, read from YAML at startup. The version
/// travels into logs so operators can tell which rule set a run used.
#[derive(Deserialize, Debug, Clone)]
pub struct ClassifierConfig {
    pub version: u32,
    pub rules: Vec<RuleConfig>,
}

/// One classification rule: a regex pattern voting for a category with the
/// given weight.
#[derive(Deserialize, Debug, Clone)]
pub struct RuleConfig {
    pub pattern: String,
    pub category: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

/// Loads and parses the classifier catalog YAML file.
pub fn load_classifier_config<P: AsRef<Path>>(config_path: P) -> Result<ClassifierConfig> {
    let path_ref = config_path.as_ref();
    let config_content = fs::read_to_string(path_ref).map_err(|e| {
        PipelineError::ConfigError(format!(
            "Failed to read classifier config file '{}': {}",
            path_ref.display(),
            e
        ))
    })?;

    serde_yaml::from_str(&config_content).map_err(|e| {
        PipelineError::ConfigError(format!(
            "Failed to parse classifier config YAML from '{}': {}",
            path_ref.display(),
            e
        ))
    })
}
