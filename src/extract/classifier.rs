//! Regex rule catalog for document classification.
//!
//! The catalog is a versioned configuration object loaded once at startup and
//! injected into the extractor, so classification-rule churn never touches
//! the pipeline core.

use regex::Regex;
use std::collections::HashMap;

use crate::config::classifier::ClassifierConfig;
use crate::error::{PipelineError, Result};

/// One compiled classification rule.
#[derive(Debug)]
pub struct CompiledRule {
    pub pattern: Regex,
    pub category: String,
    pub weight: f64,
}

/// An ordered, compiled set of classification rules.
#[derive(Debug)]
pub struct RuleCatalog {
    version: u32,
    rules: Vec<CompiledRule>,
}

impl RuleCatalog {
    /// Compiles every rule in the configuration. A single bad pattern fails
    /// the whole catalog, surfaced as a configuration error at startup.
    pub fn compile(config: &ClassifierConfig) -> Result<Self> {
        let mut rules = Vec::with_capacity(config.rules.len());
        for rule in &config.rules {
            let pattern = Regex::new(&rule.pattern).map_err(|e| {
                PipelineError::ConfigError(format!(
                    "invalid classifier pattern '{}': {}",
                    rule.pattern, e
                ))
            })?;
            rules.push(CompiledRule {
                pattern,
                category: rule.category.clone(),
                weight: rule.weight,
            });
        }
        Ok(RuleCatalog {
            version: config.version,
            rules,
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Scores the text against every rule and returns the winning category
    /// plus a confidence in [0, 1]: the winner's share of the total matched
    /// weight. Returns ("unclassified", 0.0) when nothing matches.
    pub fn classify(&self, text: &str) -> (String, f64) {
        let mut scores: HashMap<&str, f64> = HashMap::new();
        let mut total = 0.0;

        for rule in &self.rules {
            if rule.pattern.is_match(text) {
                *scores.entry(rule.category.as_str()).or_insert(0.0) += rule.weight;
                total += rule.weight;
            }
        }

        let winner = scores
            .iter()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal));

        match winner {
            Some((category, score)) if total > 0.0 => {
                ((*category).to_string(), (score / total).clamp(0.0, 1.0))
            }
            _ => ("unclassified".to_string(), 0.0),
        }
    }
}
