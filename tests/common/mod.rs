// Shared fixtures for the integration tests: a scriptable extractor and
// failure-injecting store decorators. Not every binary uses every fixture.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use docuflow::config::{BreakerConfig, IngestConfig};
use docuflow::data_model::{
    DocumentDetail, DocumentRecord, Extraction, ExtractionResult, FinalReport, NewDocumentRecord,
    ProcessingStatus, WorkItem,
};
use docuflow::extract::{ExtractionError, Extractor};
use docuflow::stores::{DetailStore, MetadataStore, StoreError};

/// Test run configuration with short timeouts and the breaker effectively
/// disabled (threshold above 1.0 can never be reached).
pub fn ingest_config(root: PathBuf, metadata_db: PathBuf, detail_dir: PathBuf) -> IngestConfig {
    IngestConfig {
        root,
        company_id: 1,
        metadata_db,
        detail_dir,
        include_extensions: vec!["txt".to_string()],
        workers: 4,
        queue_capacity: None,
        store_timeout_ms: 2_000,
        extract_timeout_ms: 2_000,
        drain_timeout_secs: 10,
        heartbeat_secs: 60,
        max_reconnect_attempts: 2,
        cache_ttl_secs: 600,
        breaker: BreakerConfig {
            window: 1_000,
            failure_threshold: 1.1,
            cooldown_secs: 1,
        },
    }
}

pub fn write_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// An extraction result as the worker pool would hand it to the writer.
pub fn sample_result(path: &Path, content_hash: &str) -> ExtractionResult {
    let mut confidence = HashMap::new();
    confidence.insert("document_type".to_string(), 0.9);
    ExtractionResult {
        item: WorkItem {
            path: path.to_path_buf(),
            size: 64,
            discovered_at: Utc::now(),
        },
        content_hash: content_hash.to_string(),
        mime_type: "text/plain".to_string(),
        extraction: Extraction {
            text: "Invoice No: INV-1\nTotal due: EUR 10".to_string(),
            document_type: "invoice".to_string(),
            entities: Vec::new(),
            confidence,
        },
        worker_id: 0,
        duration: Duration::from_millis(3),
    }
}

/// Extractor driven by a plain function pointer, optionally slowed down to
/// keep work in flight during shutdown tests.
pub struct ScriptedExtractor {
    behavior: fn(&[u8], &str) -> Result<Extraction, ExtractionError>,
    delay: Duration,
}

impl ScriptedExtractor {
    pub fn new(behavior: fn(&[u8], &str) -> Result<Extraction, ExtractionError>) -> Self {
        ScriptedExtractor {
            behavior,
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(
        behavior: fn(&[u8], &str) -> Result<Extraction, ExtractionError>,
        delay: Duration,
    ) -> Self {
        ScriptedExtractor { behavior, delay }
    }
}

#[async_trait]
impl Extractor for ScriptedExtractor {
    fn name(&self) -> &'static str {
        "ScriptedExtractor"
    }

    async fn extract(&self, bytes: &[u8], filename: &str) -> Result<Extraction, ExtractionError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.behavior)(bytes, filename)
    }
}

pub fn passthrough_extraction(bytes: &[u8], _filename: &str) -> Result<Extraction, ExtractionError> {
    Ok(Extraction {
        text: String::from_utf8_lossy(bytes).into_owned(),
        document_type: "invoice".to_string(),
        entities: Vec::new(),
        confidence: HashMap::new(),
    })
}

fn take_token(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// Detail store decorator failing the first `fail_inserts` insert calls.
pub struct FailingDetailStore {
    inner: Arc<dyn DetailStore>,
    fail_inserts: AtomicU32,
}

impl FailingDetailStore {
    pub fn new(inner: Arc<dyn DetailStore>, fail_inserts: u32) -> Self {
        FailingDetailStore {
            inner,
            fail_inserts: AtomicU32::new(fail_inserts),
        }
    }
}

#[async_trait]
impl DetailStore for FailingDetailStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }

    async fn insert(&self, detail: &DocumentDetail) -> Result<String, StoreError> {
        if take_token(&self.fail_inserts) {
            return Err(StoreError::Connection("injected detail failure".to_string()));
        }
        self.inner.insert(detail).await
    }

    async fn get(&self, key: &str) -> Result<Option<DocumentDetail>, StoreError> {
        self.inner.get(key).await
    }
}

/// Detail store decorator failing a seeded fraction of inserts, for the
/// intermittent-degradation scenario.
pub struct IntermittentDetailStore {
    inner: Arc<dyn DetailStore>,
    rate: f64,
    rng: Mutex<StdRng>,
}

impl IntermittentDetailStore {
    pub fn new(inner: Arc<dyn DetailStore>, rate: f64, seed: u64) -> Self {
        IntermittentDetailStore {
            inner,
            rate,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

#[async_trait]
impl DetailStore for IntermittentDetailStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }

    async fn insert(&self, detail: &DocumentDetail) -> Result<String, StoreError> {
        let roll: f64 = self.rng.lock().unwrap().gen();
        if roll < self.rate {
            return Err(StoreError::Connection(
                "injected intermittent failure".to_string(),
            ));
        }
        self.inner.insert(detail).await
    }

    async fn get(&self, key: &str) -> Result<Option<DocumentDetail>, StoreError> {
        self.inner.get(key).await
    }
}

/// Detail store that is simply down. Used for the fail-fast startup path.
pub struct DownDetailStore;

#[async_trait]
impl DetailStore for DownDetailStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Err(StoreError::Connection("store is down".to_string()))
    }

    async fn insert(&self, _detail: &DocumentDetail) -> Result<String, StoreError> {
        Err(StoreError::Connection("store is down".to_string()))
    }

    async fn get(&self, _key: &str) -> Result<Option<DocumentDetail>, StoreError> {
        Err(StoreError::Connection("store is down".to_string()))
    }
}

/// Metadata store decorator injecting failures into selected operations.
pub struct FlakyMetadataStore {
    inner: Arc<dyn MetadataStore>,
    fail_inserts: AtomicU32,
    fail_mark_processed: AtomicU32,
}

impl FlakyMetadataStore {
    pub fn new(inner: Arc<dyn MetadataStore>) -> Self {
        FlakyMetadataStore {
            inner,
            fail_inserts: AtomicU32::new(0),
            fail_mark_processed: AtomicU32::new(0),
        }
    }

    pub fn fail_next_inserts(self, n: u32) -> Self {
        self.fail_inserts.store(n, Ordering::SeqCst);
        self
    }

    pub fn fail_next_mark_processed(self, n: u32) -> Self {
        self.fail_mark_processed.store(n, Ordering::SeqCst);
        self
    }
}

#[async_trait]
impl MetadataStore for FlakyMetadataStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }

    async fn find_by_identity(
        &self,
        filename: &str,
        content_hash: &str,
    ) -> Result<Option<DocumentRecord>, StoreError> {
        self.inner.find_by_identity(filename, content_hash).await
    }

    async fn insert_pending(&self, record: &NewDocumentRecord) -> Result<i64, StoreError> {
        if take_token(&self.fail_inserts) {
            return Err(StoreError::Connection("injected insert failure".to_string()));
        }
        self.inner.insert_pending(record).await
    }

    async fn mark_processed(&self, id: i64, detail_key: &str) -> Result<(), StoreError> {
        if take_token(&self.fail_mark_processed) {
            return Err(StoreError::Connection(
                "injected backfill failure".to_string(),
            ));
        }
        self.inner.mark_processed(id, detail_key).await
    }

    async fn mark_error(&self, id: i64, detail: &str) -> Result<(), StoreError> {
        self.inner.mark_error(id, detail).await
    }

    async fn get(&self, id: i64) -> Result<Option<DocumentRecord>, StoreError> {
        self.inner.get(id).await
    }

    async fn count_by_status(&self, status: ProcessingStatus) -> Result<u64, StoreError> {
        self.inner.count_by_status(status).await
    }

    async fn save_report(&self, report: &FinalReport) -> Result<i64, StoreError> {
        self.inner.save_report(report).await
    }
}
