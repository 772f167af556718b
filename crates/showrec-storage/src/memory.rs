//! In-memory show store with JSON snapshot persistence.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use showrec_core::{AltNameMatcher, CanonicalShow, NameMatcher, NameTarget, ShowFilter};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;
use uuid::Uuid;

use crate::{ShowCursor, ShowStore, StoreError};

const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct ShowSnapshot {
    schema_version: u32,
    shows: Vec<CanonicalShow>,
}

type PreparedName<'m> = Box<dyn Fn(&str) -> bool + Send + Sync + 'm>;

/// Name predicates of one filter, each compiled once per query.
struct PreparedNames<'m> {
    names: HashMap<String, PreparedName<'m>>,
}

impl<'m> PreparedNames<'m> {
    fn new(filter: &ShowFilter, matcher: &'m dyn NameMatcher) -> Self {
        let mut names = HashMap::new();
        collect_names(filter, matcher, &mut names);
        Self { names }
    }

    fn matches(&self, name: &str, text: &str) -> bool {
        self.names.get(name).is_some_and(|prepared| prepared(text))
    }
}

fn collect_names<'m>(
    filter: &ShowFilter,
    matcher: &'m dyn NameMatcher,
    names: &mut HashMap<String, PreparedName<'m>>,
) {
    match filter {
        ShowFilter::And(filters) | ShowFilter::Or(filters) => {
            for inner in filters {
                collect_names(inner, matcher, names);
            }
        }
        ShowFilter::Not(inner) => collect_names(inner, matcher, names),
        ShowFilter::NameMatches { name, .. } => {
            if !names.contains_key(name) {
                names.insert(name.clone(), matcher.prepare(name));
            }
        }
        _ => {}
    }
}

/// Evaluates a filter against one show using `matcher` for name predicates.
pub fn evaluate(filter: &ShowFilter, show: &CanonicalShow, matcher: &dyn NameMatcher) -> bool {
    evaluate_prepared(filter, show, &PreparedNames::new(filter, matcher))
}

fn evaluate_prepared(filter: &ShowFilter, show: &CanonicalShow, names: &PreparedNames<'_>) -> bool {
    match filter {
        ShowFilter::True => true,
        ShowFilter::And(filters) => filters.iter().all(|f| evaluate_prepared(f, show, names)),
        ShowFilter::Or(filters) => filters.iter().any(|f| evaluate_prepared(f, show, names)),
        ShowFilter::Not(inner) => !evaluate_prepared(inner, show, names),
        ShowFilter::NameMatches {
            target: NameTarget::Name,
            name,
        } => names.matches(name, &show.name),
        ShowFilter::NameMatches {
            target: NameTarget::AltNames,
            name,
        } => show.alt_names.iter().any(|alt| names.matches(name, alt)),
        ShowFilter::SeasonEquals(season) => show.season.as_deref() == Some(season.as_str()),
        ShowFilter::ShowTypeEquals(show_type) => show.show_type == Some(*show_type),
        ShowFilter::ExternalIdEquals(external_id) => show.external_id == Some(*external_id),
        ShowFilter::IdEquals(id) => show.id == *id,
        ShowFilter::FieldAbsent(field) => !show.field_is_set(*field),
        ShowFilter::HasBinding(wanted) => show.bindings.iter().any(|binding| {
            binding.source_id == wanted.source_id
                && binding.content_tag == wanted.content_tag
                && wanted.url.accepts(&binding.url)
        }),
    }
}

#[derive(Clone)]
pub struct MemoryShowStore {
    shows: Vec<CanonicalShow>,
    matcher: Arc<dyn NameMatcher>,
}

impl Default for MemoryShowStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryShowStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryShowStore")
            .field("shows", &self.shows.len())
            .finish()
    }
}

impl MemoryShowStore {
    pub fn new() -> Self {
        Self::with_matcher(Arc::new(AltNameMatcher))
    }

    pub fn with_matcher(matcher: Arc<dyn NameMatcher>) -> Self {
        Self {
            shows: Vec::new(),
            matcher,
        }
    }

    pub fn from_shows(shows: Vec<CanonicalShow>) -> Result<Self, StoreError> {
        let mut store = Self::new();
        for show in shows {
            store.insert(show)?;
        }
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.shows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shows.is_empty()
    }

    pub fn shows(&self) -> &[CanonicalShow] {
        &self.shows
    }

    fn check_external_id(&self, show: &CanonicalShow) -> Result<(), StoreError> {
        let Some(external_id) = show.external_id else {
            return Ok(());
        };
        match self
            .shows
            .iter()
            .find(|other| other.id != show.id && other.external_id == Some(external_id))
        {
            Some(existing) => Err(StoreError::DuplicateExternalId {
                external_id,
                existing: existing.id,
            }),
            None => Ok(()),
        }
    }

    /// Loads a snapshot; a missing file yields an empty store.
    pub async fn load_snapshot(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if !fs::try_exists(path)
            .await
            .with_context(|| format!("checking snapshot path {}", path.display()))?
        {
            return Ok(Self::new());
        }
        let text = fs::read_to_string(path)
            .await
            .with_context(|| format!("reading snapshot {}", path.display()))?;
        let snapshot: ShowSnapshot = serde_json::from_str(&text)
            .with_context(|| format!("parsing snapshot {}", path.display()))?;
        let store = Self::from_shows(snapshot.shows)?;
        info!(path = %path.display(), shows = store.len(), "loaded show snapshot");
        Ok(store)
    }

    /// Writes the snapshot through a temp file and an atomic rename.
    pub async fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let path = path.as_ref();
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating snapshot directory {}", parent.display()))?;

        let bytes = serde_json::to_vec_pretty(&ShowSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            shows: self.shows.clone(),
        })
        .context("serializing show snapshot")?;

        let temp_path = parent.join(format!(".{}.{}.tmp", Uuid::new_v4(), bytes.len()));
        let mut file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await
            .with_context(|| format!("opening temp snapshot file {}", temp_path.display()))?;
        file.write_all(&bytes)
            .await
            .with_context(|| format!("writing temp snapshot file {}", temp_path.display()))?;
        file.flush()
            .await
            .with_context(|| format!("flushing temp snapshot file {}", temp_path.display()))?;
        drop(file);

        if let Err(err) = fs::rename(&temp_path, path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(anyhow::Error::new(err)
                .context(format!(
                    "atomically renaming temp snapshot {} -> {}",
                    temp_path.display(),
                    path.display()
                ))
                .into());
        }
        info!(path = %path.display(), shows = self.shows.len(), "saved show snapshot");
        Ok(())
    }
}

impl ShowStore for MemoryShowStore {
    fn find(&self, filter: &ShowFilter) -> Result<ShowCursor<'_>, StoreError> {
        let filter = filter.clone();
        let names = PreparedNames::new(&filter, self.matcher.as_ref());
        Ok(ShowCursor::new(
            self.shows
                .iter()
                .filter(move |show| evaluate_prepared(&filter, show, &names))
                .cloned(),
        ))
    }

    fn get(&self, id: Uuid) -> Result<Option<CanonicalShow>, StoreError> {
        Ok(self.shows.iter().find(|show| show.id == id).cloned())
    }

    fn insert(&mut self, show: CanonicalShow) -> Result<(), StoreError> {
        if self.shows.iter().any(|existing| existing.id == show.id) {
            return Err(StoreError::DuplicateId(show.id));
        }
        self.check_external_id(&show)?;
        self.shows.push(show);
        Ok(())
    }

    fn update(&mut self, show: CanonicalShow) -> Result<(), StoreError> {
        self.check_external_id(&show)?;
        let slot = self
            .shows
            .iter_mut()
            .find(|existing| existing.id == show.id)
            .ok_or(StoreError::NotFound(show.id))?;
        *slot = show;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use showrec_core::{
        BindingMatch, PartialDate, ShowField, ShowType, SimilarityMatcher, SourceBinding, UrlMatch,
    };
    use tempfile::tempdir;

    fn mk_show(name: &str) -> CanonicalShow {
        let at = Utc.with_ymd_and_hms(2016, 7, 5, 12, 0, 0).single().unwrap();
        CanonicalShow {
            id: Uuid::new_v4(),
            name: name.to_string(),
            alt_names: Vec::new(),
            bindings: Vec::new(),
            season: None,
            show_type: None,
            external_id: None,
            airing_start: PartialDate::empty(),
            airing_end: PartialDate::empty(),
            description: None,
            thumbnail_id: None,
            genres: Vec::new(),
            episode_amount: None,
            episode_duration: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn evaluates_name_and_field_predicates() {
        let mut show = mk_show("Spice and Wolf");
        show.alt_names = vec!["Ookami to Koushinryou".to_string()];
        show.show_type = Some(ShowType::Tv);
        let matcher = AltNameMatcher;

        let by_name = ShowFilter::NameMatches {
            target: NameTarget::Name,
            name: "Spice & Wolf".into(),
        };
        let by_alt = ShowFilter::NameMatches {
            target: NameTarget::AltNames,
            name: "Ookami & Koushinryou".into(),
        };
        assert!(evaluate(&by_name, &show, &matcher));
        assert!(evaluate(&by_alt, &show, &matcher));
        assert!(evaluate(&ShowFilter::FieldAbsent(ShowField::Season), &show, &matcher));
        assert!(!evaluate(&ShowFilter::FieldAbsent(ShowField::ShowType), &show, &matcher));
        assert!(!evaluate(&ShowFilter::not(ShowFilter::ShowTypeEquals(ShowType::Tv)), &show, &matcher));
    }

    #[test]
    fn unset_field_never_equals_a_value() {
        let show = mk_show("Untyped");
        let matcher = AltNameMatcher;
        assert!(!evaluate(&ShowFilter::ShowTypeEquals(ShowType::Tv), &show, &matcher));
        assert!(evaluate(&ShowFilter::not(ShowFilter::ShowTypeEquals(ShowType::Tv)), &show, &matcher));
        assert!(!evaluate(&ShowFilter::ExternalIdEquals(0), &show, &matcher));
    }

    #[test]
    fn binding_predicate_checks_source_tag_and_url() {
        let mut show = mk_show("Erased");
        show.bindings = vec![SourceBinding::new("crunchyroll", "sub", "https://cr/erased")];
        let matcher = AltNameMatcher;
        let differing = ShowFilter::HasBinding(BindingMatch {
            source_id: "crunchyroll".into(),
            content_tag: "sub".into(),
            url: UrlMatch::NotEquals("https://cr/erased-2".into()),
        });
        let same = ShowFilter::HasBinding(BindingMatch {
            source_id: "crunchyroll".into(),
            content_tag: "sub".into(),
            url: UrlMatch::NotEquals("https://cr/erased".into()),
        });
        assert!(evaluate(&differing, &show, &matcher));
        assert!(!evaluate(&same, &show, &matcher));
    }

    #[test]
    fn find_is_lazy_and_uses_configured_matcher() {
        let mut store = MemoryShowStore::with_matcher(Arc::new(SimilarityMatcher { threshold: 0.9 }));
        store.insert(mk_show("Hunter x Hunter")).unwrap();
        store.insert(mk_show("Toradora!")).unwrap();
        let filter = ShowFilter::NameMatches {
            target: NameTarget::Name,
            name: "Hunter X Hunter (2011)".into(),
        };
        let mut cursor = store.find(&filter).unwrap();
        assert_eq!(cursor.next().map(|s| s.name), Some("Hunter x Hunter".to_string()));
        assert!(cursor.next().is_none());
    }

    #[test]
    fn all_yields_every_show_in_insertion_order() {
        let mut store = MemoryShowStore::new();
        store.insert(mk_show("Mushishi")).unwrap();
        store.insert(mk_show("Monster")).unwrap();
        let names: Vec<_> = store.all().unwrap().map(|show| show.name).collect();
        assert_eq!(names, vec!["Mushishi".to_string(), "Monster".to_string()]);
    }

    #[test]
    fn external_ids_stay_unique() {
        let mut store = MemoryShowStore::new();
        let mut a = mk_show("A");
        a.external_id = Some(31240);
        let mut b = mk_show("B");
        b.external_id = Some(31240);
        store.insert(a.clone()).unwrap();
        assert!(matches!(
            store.insert(b),
            Err(StoreError::DuplicateExternalId { external_id: 31240, .. })
        ));
        assert!(matches!(store.insert(a), Err(StoreError::DuplicateId(_))));
    }

    #[test]
    fn update_requires_existing_show() {
        let mut store = MemoryShowStore::new();
        let show = mk_show("Missing");
        assert!(matches!(store.update(show), Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn snapshot_round_trip_keeps_partial_dates_sparse() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("state").join("shows.json");

        let mut show = mk_show("Re:Zero");
        show.airing_start = PartialDate {
            year: Some(2016),
            month: Some(4),
            ..PartialDate::default()
        };
        let store = MemoryShowStore::from_shows(vec![show.clone()]).unwrap();
        store.save_snapshot(&path).await.expect("save");

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains("\"day\""));

        let loaded = MemoryShowStore::load_snapshot(&path).await.expect("load");
        assert_eq!(loaded.shows(), &[show]);
        assert_eq!(loaded.shows()[0].airing_start.day, None);
        assert_eq!(loaded.shows()[0].airing_start.hour, None);
    }

    #[tokio::test]
    async fn missing_snapshot_loads_empty() {
        let dir = tempdir().expect("tempdir");
        let store = MemoryShowStore::load_snapshot(dir.path().join("nope.json"))
            .await
            .expect("load");
        assert!(store.is_empty());
    }
}
