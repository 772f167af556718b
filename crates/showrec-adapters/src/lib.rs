//! Record-bundle loading and per-source normalization of scraped records.
//!
//! Fetching and markup extraction happen upstream; a bundle carries the
//! already-extracted strings for one source capture.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use showrec_core::{ScrapedRecord, SourceBinding, ValidationError};
use thiserror::Error;
use uuid::Uuid;

pub mod dates;

pub use dates::{
    build_partial_date, parse_timezone, DateFragments, DateSide, ParserConfig,
    StandardStringDateParser,
};

pub const CRATE_NAME: &str = "showrec-adapters";

/// Canonical truncation marker for descriptions cut short by a source.
pub const DEFAULT_DESCRIPTION_CUTOFF: &str = "...";

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("bundle {bundle_id} belongs to source `{found}`, expected `{expected}`")]
    SourceMismatch {
        bundle_id: String,
        expected: String,
        found: String,
    },
    #[error("unknown timezone `{0}`")]
    UnknownTimezone(String),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// One capture of a source: the records extracted from it plus provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordBundle {
    pub bundle_id: String,
    pub source_id: String,
    pub captured_from_url: String,
    pub fetched_at: DateTime<Utc>,
    pub extractor_version: String,
    pub records: Vec<ScrapedRecord>,
    #[serde(default)]
    pub notes: Option<String>,
}

pub fn load_record_bundle(path: impl AsRef<Path>) -> Result<RecordBundle> {
    read_json_file(path)
}

fn read_json_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let data = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))
}

/// Stable id for the `index`th record of a bundle, used to reference records in reports.
pub fn deterministic_record_id(bundle: &RecordBundle, index: usize) -> Uuid {
    let key = format!("{}:{}:{}", bundle.source_id, bundle.bundle_id, index);
    Uuid::new_v5(&Uuid::NAMESPACE_URL, key.as_bytes())
}

/// Result of normalizing one bundle record. Invalid records are kept so the
/// caller can report them.
#[derive(Debug, Clone)]
pub struct NormalizedRecord {
    pub record_id: Uuid,
    pub record: Result<ScrapedRecord, ValidationError>,
}

pub trait SourceAdapter: Send + Sync {
    fn source_id(&self) -> &str;

    fn parse_records(&self, bundle: &RecordBundle) -> Result<Vec<NormalizedRecord>, AdapterError>;
}

/// Adapter for sources whose bundles already follow the shared record shape.
#[derive(Debug, Clone)]
pub struct StandardRecordAdapter {
    source_id: String,
    description_cutoff: Option<String>,
    canonical_cutoff: String,
}

impl StandardRecordAdapter {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            description_cutoff: None,
            canonical_cutoff: DEFAULT_DESCRIPTION_CUTOFF.to_string(),
        }
    }

    /// Marker this source appends to truncated descriptions.
    pub fn with_description_cutoff(mut self, cutoff: Option<String>) -> Self {
        self.description_cutoff = cutoff.filter(|c| !c.is_empty());
        self
    }

    pub fn with_canonical_cutoff(mut self, cutoff: impl Into<String>) -> Self {
        self.canonical_cutoff = cutoff.into();
        self
    }

    pub fn normalize(&self, record: &ScrapedRecord) -> ScrapedRecord {
        let name = clean_whitespace(&record.name);
        let mut seen = HashSet::new();
        // The primary name is always one of the alternate names.
        let alt_names = std::iter::once(name.clone())
            .filter(|name| !name.is_empty())
            .chain(record.alt_names.iter().map(|alt| clean_whitespace(alt)))
            // empty names are left for validation to reject
            .filter(|alt| alt.is_empty() || seen.insert(alt.to_lowercase()))
            .collect();

        let mut bindings: Vec<SourceBinding> = Vec::with_capacity(record.bindings.len());
        for binding in &record.bindings {
            let binding = SourceBinding::new(
                binding.source_id.trim(),
                binding.content_tag.trim(),
                binding.url.trim(),
            );
            if !bindings.contains(&binding) {
                bindings.push(binding);
            }
        }

        let mut genres: Vec<String> = Vec::new();
        for genre in record.genres.iter().filter_map(|g| text_or_none(g)) {
            let genre = genre.to_lowercase();
            if !genres.contains(&genre) {
                genres.push(genre);
            }
        }

        let description = record.description.as_deref().and_then(text_or_none).map(|d| {
            match &self.description_cutoff {
                Some(cutoff) => replace_description_cutoff(&d, cutoff, &self.canonical_cutoff),
                None => d,
            }
        });

        ScrapedRecord {
            name,
            alt_names,
            bindings,
            season: record.season.as_deref().map(clean_whitespace),
            show_type: record.show_type,
            external_id: record.external_id,
            dates: record.dates.clone(),
            description,
            thumbnail_id: record.thumbnail_id.as_deref().and_then(text_or_none),
            genres,
            episode_amount: record.episode_amount.filter(|n| *n > 0),
            episode_duration: record.episode_duration.filter(|n| *n > 0),
        }
    }
}

impl SourceAdapter for StandardRecordAdapter {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn parse_records(&self, bundle: &RecordBundle) -> Result<Vec<NormalizedRecord>, AdapterError> {
        if bundle.source_id != self.source_id {
            return Err(AdapterError::SourceMismatch {
                bundle_id: bundle.bundle_id.clone(),
                expected: self.source_id.clone(),
                found: bundle.source_id.clone(),
            });
        }
        Ok(bundle
            .records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                let record = self.normalize(record);
                NormalizedRecord {
                    record_id: deterministic_record_id(bundle, index),
                    record: record.validate().map(|_| record),
                }
            })
            .collect())
    }
}

pub fn adapter_for_source(
    source_id: &str,
    description_cutoff: Option<String>,
    canonical_cutoff: &str,
) -> Box<dyn SourceAdapter> {
    Box::new(
        StandardRecordAdapter::new(source_id)
            .with_description_cutoff(description_cutoff)
            .with_canonical_cutoff(canonical_cutoff),
    )
}

pub fn clean_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn text_or_none(value: &str) -> Option<String> {
    let cleaned = clean_whitespace(value);
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Swaps a trailing `old_cutoff` marker for `new_cutoff`. Descriptions that do
/// not end with the marker are returned trimmed but otherwise unchanged.
pub fn replace_description_cutoff(description: &str, old_cutoff: &str, new_cutoff: &str) -> String {
    let trimmed = description.trim_end();
    if old_cutoff.is_empty() {
        return trimmed.to_string();
    }
    match trimmed.strip_suffix(old_cutoff) {
        Some(body) => format!("{}{}", body.trim_end(), new_cutoff),
        None => trimmed.to_string(),
    }
}
