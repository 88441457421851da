// Configuration loading tests: YAML parsing, defaults, validation failures,
// and catalog compilation.

use std::io::Write;

use docuflow::config::{load_classifier_config, load_ingest_config};
use docuflow::error::PipelineError;
use docuflow::extract::RuleCatalog;

fn temp_yaml(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn minimal_ingest_config_gets_defaults() {
    let file = temp_yaml(
        "root: /tmp/inbox\ncompany_id: 3\nmetadata_db: /tmp/meta.db\ndetail_dir: /tmp/details\n",
    );
    let config = load_ingest_config(file.path()).unwrap();

    assert_eq!(config.company_id, 3);
    assert!(config.workers >= 1);
    assert_eq!(config.queue_capacity(), config.workers * 10);
    assert!(config.include_extensions.contains(&"txt".to_string()));
    assert_eq!(config.store_timeout_ms, 5_000);
    assert_eq!(config.drain_timeout_secs, 30);
    assert_eq!(config.breaker.window, 50);
    assert!((config.breaker.failure_threshold - 0.5).abs() < f64::EPSILON);
}

#[test]
fn full_ingest_config_overrides_apply() {
    let file = temp_yaml(
        "root: /srv/scans\ncompany_id: 9\nmetadata_db: /srv/meta.db\ndetail_dir: /srv/details\ninclude_extensions: [txt, csv]\nworkers: 6\nqueue_capacity: 17\nstore_timeout_ms: 1500\ndrain_timeout_secs: 7\nbreaker:\n  window: 20\n  failure_threshold: 0.25\n  cooldown_secs: 5\n",
    );
    let config = load_ingest_config(file.path()).unwrap();

    assert_eq!(config.workers, 6);
    assert_eq!(config.queue_capacity(), 17);
    assert_eq!(config.include_extensions, vec!["txt", "csv"]);
    assert_eq!(config.store_timeout().as_millis(), 1500);
    assert_eq!(config.drain_timeout().as_secs(), 7);
    assert_eq!(config.breaker.window, 20);
    assert_eq!(config.breaker.cooldown().as_secs(), 5);
}

#[test]
fn zero_workers_is_rejected() {
    let file = temp_yaml(
        "root: /tmp/inbox\ncompany_id: 1\nmetadata_db: /tmp/m.db\ndetail_dir: /tmp/d\nworkers: 0\n",
    );
    let err = load_ingest_config(file.path()).unwrap_err();
    assert!(matches!(err, PipelineError::ConfigError(_)));
}

#[test]
fn missing_config_file_is_a_config_error() {
    let err = load_ingest_config("/no/such/ingest.yaml").unwrap_err();
    assert!(matches!(err, PipelineError::ConfigError(_)));
    let err = load_classifier_config("/no/such/classifier.yaml").unwrap_err();
    assert!(matches!(err, PipelineError::ConfigError(_)));
}

#[test]
fn classifier_config_parses_and_defaults_weight() {
    let file = temp_yaml(
        "version: 2\nrules:\n  - pattern: \"(?i)invoice\"\n    category: invoice\n    weight: 2.0\n  - pattern: \"(?i)contract\"\n    category: contract\n",
    );
    let config = load_classifier_config(file.path()).unwrap();
    assert_eq!(config.version, 2);
    assert_eq!(config.rules.len(), 2);
    assert!((config.rules[1].weight - 1.0).abs() < f64::EPSILON);

    let catalog = RuleCatalog::compile(&config).unwrap();
    assert_eq!(catalog.version(), 2);
    let (category, confidence) = catalog.classify("Monthly invoice attached");
    assert_eq!(category, "invoice");
    assert!(confidence > 0.0);
}

#[test]
fn malformed_yaml_is_a_config_error() {
    let file = temp_yaml("version: [not, a, number\n");
    let err = load_classifier_config(file.path()).unwrap_err();
    assert!(matches!(err, PipelineError::ConfigError(_)));
}

#[test]
fn bad_rule_pattern_fails_catalog_compilation() {
    let file = temp_yaml("version: 1\nrules:\n  - pattern: \"(unclosed\"\n    category: broken\n");
    let config = load_classifier_config(file.path()).unwrap();
    assert!(matches!(
        RuleCatalog::compile(&config),
        Err(PipelineError::ConfigError(_))
    ));
}
