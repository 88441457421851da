use std::path::PathBuf;

use clap::Parser;

// Define command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the ingest run configuration YAML file.
    #[arg(short = 'c', long, default_value = "config/ingest.yaml")]
    pub config: PathBuf,

    /// Path to the classifier catalog YAML file.
    #[arg(long, default_value = "config/classifier.yaml")]
    pub classifier_config: PathBuf,

    /// Override the scan root from the configuration.
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Override the worker count from the configuration.
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Validate both configuration files and exit.
    #[arg(long)]
    pub validate_config: bool,
}
