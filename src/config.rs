// Configuration modules: the ingest run configuration, the classifier rule
// catalog, and the CLI argument definitions.

pub mod classifier;
pub mod cli;
pub mod ingest;

pub use classifier::{load_classifier_config, ClassifierConfig, RuleConfig};
pub use cli::Args;
pub use ingest::{load_ingest_config, BreakerConfig, IngestConfig};
