//! Core domain model for show reconciliation: scraped records, canonical shows,
//! partial airing dates, alternate-name matching and the candidate filter type.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub mod date;
pub mod filter;
pub mod names;

pub use date::{earliest_of, most_specific_of, PartialDate};
pub use filter::{BindingMatch, NameTarget, ShowField, ShowFilter, UrlMatch};
pub use names::{AltNameMatcher, AltNamePattern, NameMatcher, SimilarityMatcher};

pub const CRATE_NAME: &str = "showrec-core";

/// Broadcast format of a show. `Tv` is the primary type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShowType {
    Tv,
    Ova,
    Ona,
    Movie,
    Special,
}

impl ShowType {
    pub const PRIMARY: ShowType = ShowType::Tv;

    pub fn as_str(&self) -> &'static str {
        match self {
            ShowType::Tv => "tv",
            ShowType::Ova => "ova",
            ShowType::Ona => "ona",
            ShowType::Movie => "movie",
            ShowType::Special => "special",
        }
    }

    pub fn is_primary(&self) -> bool {
        *self == Self::PRIMARY
    }
}

impl fmt::Display for ShowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShowType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tv" => Ok(ShowType::Tv),
            "ova" => Ok(ShowType::Ova),
            "ona" => Ok(ShowType::Ona),
            "movie" => Ok(ShowType::Movie),
            "special" => Ok(ShowType::Special),
            other => Err(ValidationError::UnknownShowType(other.to_string())),
        }
    }
}

/// Where one source hosts a show's episodes, e.g. (`crunchyroll`, `sub`, url).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceBinding {
    pub source_id: String,
    pub content_tag: String,
    pub url: String,
}

impl SourceBinding {
    pub fn new(
        source_id: impl Into<String>,
        content_tag: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            content_tag: content_tag.into(),
            url: url.into(),
        }
    }

    /// Same source and content tag, different url: the two shows cannot be the same.
    pub fn conflicts_with(&self, other: &SourceBinding) -> bool {
        self.source_id == other.source_id
            && self.content_tag == other.content_tag
            && self.url != other.url
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawDateFragments {
    #[serde(default)]
    pub date_range: Option<String>,
    #[serde(default)]
    pub season: Option<String>,
    #[serde(default)]
    pub weekday: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedRecord {
    pub name: String,
    pub alt_names: Vec<String>,
    pub bindings: Vec<SourceBinding>,
    #[serde(default)]
    pub season: Option<String>,
    #[serde(default)]
    pub show_type: Option<ShowType>,
    #[serde(default)]
    pub external_id: Option<u32>,
    #[serde(default)]
    pub dates: RawDateFragments,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub thumbnail_id: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub episode_amount: Option<u32>,
    #[serde(default)]
    pub episode_duration: Option<u32>,
}

impl ScrapedRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alt_names: Vec::new(),
            bindings: Vec::new(),
            season: None,
            show_type: None,
            external_id: None,
            dates: RawDateFragments::default(),
            description: None,
            thumbnail_id: None,
            genres: Vec::new(),
            episode_amount: None,
            episode_duration: None,
        }
    }

    /// Rejects records that cannot be resolved. Runs before any query is built.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingName);
        }
        if let Some(index) = self.alt_names.iter().position(|alt| alt.trim().is_empty()) {
            return Err(ValidationError::EmptyAltName { index });
        }
        for (index, binding) in self.bindings.iter().enumerate() {
            let missing = if binding.source_id.trim().is_empty() {
                Some("source_id")
            } else if binding.content_tag.trim().is_empty() {
                Some("content_tag")
            } else if binding.url.trim().is_empty() {
                Some("url")
            } else {
                None
            };
            if let Some(field) = missing {
                return Err(ValidationError::IncompleteBinding { index, field });
            }
        }
        if matches!(&self.season, Some(season) if season.trim().is_empty()) {
            return Err(ValidationError::EmptySeason);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalShow {
    pub id: Uuid,
    pub name: String,
    pub alt_names: Vec<String>,
    pub bindings: Vec<SourceBinding>,
    pub season: Option<String>,
    pub show_type: Option<ShowType>,
    pub external_id: Option<u32>,
    #[serde(default)]
    pub airing_start: PartialDate,
    #[serde(default)]
    pub airing_end: PartialDate,
    pub description: Option<String>,
    pub thumbnail_id: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    pub episode_amount: Option<u32>,
    pub episode_duration: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CanonicalShow {
    pub fn field_is_set(&self, field: ShowField) -> bool {
        match field {
            ShowField::Season => self.season.is_some(),
            ShowField::ShowType => self.show_type.is_some(),
            ShowField::ExternalId => self.external_id.is_some(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("record is missing a primary name")]
    MissingName,
    #[error("alternate name #{index} is empty")]
    EmptyAltName { index: usize },
    #[error("source binding #{index} is missing {field}")]
    IncompleteBinding { index: usize, field: &'static str },
    #[error("season label is present but empty")]
    EmptySeason,
    #[error("unknown show type `{0}`")]
    UnknownShowType(String),
}
