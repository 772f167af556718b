//! Store-agnostic predicate over canonical shows.
//!
//! Store adapters translate a [`ShowFilter`] into whatever their backend speaks.
//! Semantics are two-valued: an unset field never equals a value, so
//! `Not(ShowTypeEquals(Tv))` holds for a show whose type is unset.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ShowType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShowField {
    Season,
    ShowType,
    ExternalId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NameTarget {
    Name,
    AltNames,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UrlMatch {
    Equals(String),
    NotEquals(String),
}

impl UrlMatch {
    pub fn accepts(&self, url: &str) -> bool {
        match self {
            UrlMatch::Equals(expected) => url == expected,
            UrlMatch::NotEquals(expected) => url != expected,
        }
    }
}

/// Matches a show holding at least one binding with these properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingMatch {
    pub source_id: String,
    pub content_tag: String,
    pub url: UrlMatch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ShowFilter {
    True,
    And(Vec<ShowFilter>),
    Or(Vec<ShowFilter>),
    Not(Box<ShowFilter>),
    /// The target column matches `name` under the store's name matcher, with
    /// the comparison built from `name`.
    NameMatches { target: NameTarget, name: String },
    SeasonEquals(String),
    ShowTypeEquals(ShowType),
    ExternalIdEquals(u32),
    IdEquals(Uuid),
    FieldAbsent(ShowField),
    HasBinding(BindingMatch),
}

impl ShowFilter {
    pub fn and(filters: Vec<ShowFilter>) -> Self {
        ShowFilter::And(filters)
    }

    pub fn or(filters: Vec<ShowFilter>) -> Self {
        ShowFilter::Or(filters)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(filter: ShowFilter) -> Self {
        ShowFilter::Not(Box::new(filter))
    }

    pub fn none_of(filters: Vec<ShowFilter>) -> Self {
        ShowFilter::not(ShowFilter::Or(filters))
    }

    pub fn simplify(self) -> Self {
        match self {
            ShowFilter::And(filters) => {
                let mut filters: Vec<_> = filters
                    .into_iter()
                    .map(ShowFilter::simplify)
                    .filter(|f| *f != ShowFilter::True)
                    .collect();
                match filters.len() {
                    0 => ShowFilter::True,
                    1 => filters.remove(0),
                    _ => ShowFilter::And(filters),
                }
            }
            ShowFilter::Or(filters) => {
                let mut filters: Vec<_> = filters.into_iter().map(ShowFilter::simplify).collect();
                if filters.contains(&ShowFilter::True) {
                    return ShowFilter::True;
                }
                match filters.len() {
                    1 => filters.remove(0),
                    _ => ShowFilter::Or(filters),
                }
            }
            ShowFilter::Not(inner) => ShowFilter::Not(Box::new(inner.simplify())),
            other => other,
        }
    }
}
