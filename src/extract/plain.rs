//! Default extractor for plain-text business documents.
//!
//! Decodes UTF-8 text, classifies it through the injected rule catalog, and
//! pulls out the entities the downstream analysis side cares about (amounts,
//! dates, e-mail addresses, invoice numbers). Binary formats belong to an
//! OCR-backed implementation of the same trait.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;

use crate::data_model::{Entity, Extraction};
use crate::extract::{ExtractionError, Extractor, RuleCatalog};

const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "csv", "json", "xml", "html"];

/// Ratio of replacement characters above which a lossy decode is treated as
/// a corrupt document rather than text with a few bad bytes.
const MAX_REPLACEMENT_RATIO: f64 = 0.05;

static AMOUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:USD|EUR|DKK|GBP|\$|€|£)\s?\d[\d.,]*").unwrap());
static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{4}-\d{2}-\d{2}\b|\b\d{2}[./]\d{2}[./]\d{4}\b").unwrap());
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap());
static INVOICE_NO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)invoice\s*(?:no\.?|number|#)\s*:?\s*([A-Z0-9][A-Z0-9-]*)").unwrap());

pub struct PlainTextExtractor {
    catalog: RuleCatalog,
}

impl PlainTextExtractor {
    pub fn new(catalog: RuleCatalog) -> Self {
        PlainTextExtractor { catalog }
    }

    fn decode(bytes: &[u8], filename: &str) -> Result<String, ExtractionError> {
        if bytes.is_empty() {
            return Err(ExtractionError::Corrupt(format!("{}: empty document", filename)));
        }
        if bytes.contains(&0) {
            return Err(ExtractionError::Corrupt(format!(
                "{}: binary content in a text document",
                filename
            )));
        }
        match std::str::from_utf8(bytes) {
            Ok(s) => Ok(s.to_string()),
            Err(_) => {
                let lossy = String::from_utf8_lossy(bytes);
                let replaced = lossy.chars().filter(|c| *c == char::REPLACEMENT_CHARACTER).count();
                let ratio = replaced as f64 / lossy.chars().count().max(1) as f64;
                if ratio > MAX_REPLACEMENT_RATIO {
                    Err(ExtractionError::Corrupt(format!(
                        "{}: {:.0}% of the content is undecodable",
                        filename,
                        ratio * 100.0
                    )))
                } else {
                    Ok(lossy.into_owned())
                }
            }
        }
    }

    fn collect_entities(text: &str) -> Vec<Entity> {
        let mut entities = Vec::new();
        for (regex, kind, confidence) in [
            (&*AMOUNT_RE, "amount", 0.7),
            (&*DATE_RE, "date", 0.8),
            (&*EMAIL_RE, "email", 0.9),
        ] {
            for m in regex.find_iter(text) {
                entities.push(Entity {
                    kind: kind.to_string(),
                    value: m.as_str().to_string(),
                    confidence,
                });
            }
        }
        for caps in INVOICE_NO_RE.captures_iter(text) {
            if let Some(number) = caps.get(1) {
                entities.push(Entity {
                    kind: "invoice_number".to_string(),
                    value: number.as_str().to_string(),
                    confidence: 0.85,
                });
            }
        }
        entities
    }
}

#[async_trait]
impl Extractor for PlainTextExtractor {
    fn name(&self) -> &'static str {
        "PlainTextExtractor"
    }

    async fn extract(&self, bytes: &[u8], filename: &str) -> Result<Extraction, ExtractionError> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        if !TEXT_EXTENSIONS.contains(&extension.as_str()) {
            return Err(ExtractionError::UnsupportedFormat(format!(
                "{}: .{} is not a text format",
                filename, extension
            )));
        }

        let text = Self::decode(bytes, filename)?;
        let (document_type, type_confidence) = self.catalog.classify(&text);
        let entities = Self::collect_entities(&text);

        let mut confidence = HashMap::new();
        confidence.insert("document_type".to_string(), type_confidence);
        for entity in &entities {
            let slot = confidence.entry(entity.kind.clone()).or_insert(0.0);
            if entity.confidence > *slot {
                *slot = entity.confidence;
            }
        }

        Ok(Extraction {
            text,
            document_type,
            entities,
            confidence,
        })
    }
}
