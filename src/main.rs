use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use docuflow::config::{load_classifier_config, load_ingest_config, Args};
use docuflow::extract::{PlainTextExtractor, RuleCatalog};
use docuflow::stores::{JsonDetailStore, SqliteMetadataStore};
use docuflow::supervisor::Supervisor;

// Exit codes: 0 clean drain, 1 startup/fatal failure, 2 forced stop after
// the drain window.
#[tokio::main]
async fn main() {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(filter).init();

    std::process::exit(run(args).await);
}

async fn run(args: Args) -> i32 {
    let mut config = match load_ingest_config(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "failed to load ingest configuration");
            return 1;
        }
    };
    if let Some(root) = args.root {
        config.root = root;
    }
    if let Some(workers) = args.workers {
        config.workers = workers.max(1);
    }

    let classifier_config = match load_classifier_config(&args.classifier_config) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "failed to load classifier configuration");
            return 1;
        }
    };
    let catalog = match RuleCatalog::compile(&classifier_config) {
        Ok(catalog) => catalog,
        Err(e) => {
            error!(error = %e, "failed to compile classifier catalog");
            return 1;
        }
    };
    info!(
        catalog_version = catalog.version(),
        workers = config.workers,
        "configuration loaded"
    );
    if args.validate_config {
        info!("configuration is valid");
        return 0;
    }

    let metadata = match SqliteMetadataStore::open(&config.metadata_db) {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, path = %config.metadata_db.display(), "failed to open relational store");
            return 1;
        }
    };
    let details = match JsonDetailStore::open(&config.detail_dir) {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, path = %config.detail_dir.display(), "failed to open document store");
            return 1;
        }
    };
    let extractor = PlainTextExtractor::new(catalog);

    let mut supervisor = Supervisor::new(
        config,
        Arc::new(metadata),
        Arc::new(details),
        Arc::new(extractor),
    );

    // First Ctrl-C drains; a second one during the drain forces a stop.
    let shutdown = CancellationToken::new();
    let force = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        let force = force.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
                shutdown.cancel();
            }
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("second shutdown signal received; forcing stop");
                force.cancel();
            }
        });
    }

    match supervisor.run(shutdown, force).await {
        Ok(outcome) if outcome.forced_stop => {
            warn!("run ended with a forced stop; drain was incomplete");
            2
        }
        Ok(_) => 0,
        Err(e) => {
            error!(error = %e, "ingest run failed");
            1
        }
    }
}
