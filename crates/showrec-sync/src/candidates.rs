//! Candidate lookup: which canonical shows could a scraped record describe?

use showrec_core::{
    BindingMatch, CanonicalShow, NameTarget, ScrapedRecord, ShowField, ShowFilter, ShowType,
    UrlMatch, ValidationError,
};
use showrec_storage::{ShowCursor, ShowStore, StoreError};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CandidateError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Builds the store-agnostic candidate predicate for `record`.
///
/// A show is a candidate when it shares a name with the record (either
/// direction) and holds no binding that contradicts the record's bindings,
/// subject to the season/type/external-id restrictions; or when it carries
/// the record's external catalog id. `restrict_id` narrows the whole
/// predicate to a single show.
pub fn build_candidate_filter(
    record: &ScrapedRecord,
    restrict_id: Option<Uuid>,
) -> Result<ShowFilter, ValidationError> {
    record.validate()?;

    let conflicting_bindings = record
        .bindings
        .iter()
        .map(|binding| {
            ShowFilter::HasBinding(BindingMatch {
                source_id: binding.source_id.clone(),
                content_tag: binding.content_tag.clone(),
                url: UrlMatch::NotEquals(binding.url.clone()),
            })
        })
        .collect();

    let shared_name = record
        .alt_names
        .iter()
        .map(|alt| ShowFilter::NameMatches {
            target: NameTarget::Name,
            name: alt.clone(),
        })
        .chain(std::iter::once(ShowFilter::NameMatches {
            target: NameTarget::AltNames,
            name: record.name.clone(),
        }))
        .collect();

    let mut name_clause = vec![
        ShowFilter::none_of(conflicting_bindings),
        ShowFilter::or(shared_name),
    ];
    if let Some(season) = &record.season {
        name_clause.push(ShowFilter::or(vec![
            ShowFilter::SeasonEquals(season.clone()),
            ShowFilter::FieldAbsent(ShowField::Season),
        ]));
    }
    match record.show_type {
        Some(show_type) if show_type.is_primary() => name_clause.push(ShowFilter::or(vec![
            ShowFilter::ShowTypeEquals(ShowType::PRIMARY),
            ShowFilter::FieldAbsent(ShowField::ShowType),
        ])),
        Some(_) => name_clause.push(ShowFilter::not(ShowFilter::ShowTypeEquals(
            ShowType::PRIMARY,
        ))),
        None => {}
    }
    if record.external_id.is_some() {
        name_clause.push(ShowFilter::FieldAbsent(ShowField::ExternalId));
    }

    let mut branches = vec![ShowFilter::and(name_clause)];
    if let Some(external_id) = record.external_id {
        branches.push(ShowFilter::ExternalIdEquals(external_id));
    }

    let filter = match restrict_id {
        Some(id) => ShowFilter::and(vec![ShowFilter::or(branches), ShowFilter::IdEquals(id)]),
        None => ShowFilter::or(branches),
    };
    Ok(filter.simplify())
}

pub fn find_candidates<'s, S: ShowStore + ?Sized>(
    store: &'s S,
    record: &ScrapedRecord,
    restrict_id: Option<Uuid>,
) -> Result<ShowCursor<'s>, CandidateError> {
    let filter = build_candidate_filter(record, restrict_id)?;
    Ok(store.find(&filter)?)
}

/// How many canonical shows a record resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    NoMatch,
    Unique(Box<CanonicalShow>),
    Ambiguous(Vec<CanonicalShow>),
}

impl Resolution {
    /// Drains the cursor. Ambiguous results are never merged by callers.
    pub fn from_cursor(cursor: ShowCursor<'_>) -> Self {
        let mut shows: Vec<CanonicalShow> = cursor.collect();
        match shows.len() {
            0 => Resolution::NoMatch,
            1 => Resolution::Unique(Box::new(shows.remove(0))),
            _ => Resolution::Ambiguous(shows),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Resolution::NoMatch => "no_match",
            Resolution::Unique(_) => "unique",
            Resolution::Ambiguous(_) => "ambiguous",
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use showrec_core::{PartialDate, SourceBinding};
    use showrec_storage::MemoryShowStore;

    use super::*;

    fn mk_show(name: &str, alt_names: &[&str]) -> CanonicalShow {
        let at = Utc.with_ymd_and_hms(2016, 4, 10, 12, 0, 0).single().unwrap();
        CanonicalShow {
            id: Uuid::new_v4(),
            name: name.to_string(),
            alt_names: alt_names.iter().map(|s| s.to_string()).collect(),
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

    fn mk_record(name: &str, alt_names: &[&str]) -> ScrapedRecord {
        let mut record = ScrapedRecord::new(name);
        record.alt_names = alt_names.iter().map(|s| s.to_string()).collect();
        record
    }

    fn resolve(store: &MemoryShowStore, record: &ScrapedRecord) -> Resolution {
        Resolution::from_cursor(find_candidates(store, record, None).expect("candidates"))
    }

    #[test]
    fn record_alt_name_matches_show_name() {
        let show = mk_show("Sword Art Online", &[]);
        let store = MemoryShowStore::from_shows(vec![show.clone()]).unwrap();
        let record = mk_record("SAO", &["sword art online"]);
        assert_eq!(resolve(&store, &record), Resolution::Unique(Box::new(show)));
    }

    #[test]
    fn show_alt_name_matches_record_name() {
        let show = mk_show("Spice and Wolf", &["Ookami to Koushinryou"]);
        let store = MemoryShowStore::from_shows(vec![show.clone()]).unwrap();
        let record = mk_record("Ookami & Koushinryou", &[]);
        assert_eq!(resolve(&store, &record), Resolution::Unique(Box::new(show)));
    }

    #[test]
    fn identical_punctuated_name_resolves_to_stored_show() {
        for name in ["Kimi to, Nami ni Noretara", "Spice (and Wolf)", "Pride/and Prejudice"] {
            let show = mk_show(name, &[name]);
            let store = MemoryShowStore::from_shows(vec![show.clone()]).unwrap();
            let record = mk_record(name, &[name]);
            assert_eq!(resolve(&store, &record), Resolution::Unique(Box::new(show)), "{name}");
        }
    }

    #[test]
    fn conflicting_binding_excludes_same_named_show() {
        let mut show = mk_show("Sword Art Online", &[]);
        show.bindings = vec![SourceBinding::new("crunchyroll", "sub", "https://a.test/sao")];
        let store = MemoryShowStore::from_shows(vec![show]).unwrap();

        let mut record = mk_record("Sword Art Online", &["Sword Art Online"]);
        record.bindings = vec![SourceBinding::new("crunchyroll", "sub", "https://a.test/sao-ii")];
        assert_eq!(resolve(&store, &record), Resolution::NoMatch);

        record.bindings = vec![SourceBinding::new("crunchyroll", "sub", "https://a.test/sao")];
        assert!(matches!(resolve(&store, &record), Resolution::Unique(_)));

        // other content tags do not conflict
        record.bindings = vec![SourceBinding::new("crunchyroll", "dub", "https://a.test/sao-dub")];
        assert!(matches!(resolve(&store, &record), Resolution::Unique(_)));
    }

    #[test]
    fn external_id_matches_regardless_of_name() {
        let mut show = mk_show("Boku dake ga Inai Machi", &[]);
        show.external_id = Some(31043);
        let store = MemoryShowStore::from_shows(vec![show.clone()]).unwrap();

        let mut record = mk_record("ERASED", &["ERASED"]);
        record.external_id = Some(31043);
        assert_eq!(resolve(&store, &record), Resolution::Unique(Box::new(show)));
    }

    #[test]
    fn external_id_mismatch_blocks_name_match() {
        let mut show = mk_show("Erased", &[]);
        show.external_id = Some(1);
        let store = MemoryShowStore::from_shows(vec![show]).unwrap();

        let mut record = mk_record("Erased", &["Erased"]);
        record.external_id = Some(31043);
        assert_eq!(resolve(&store, &record), Resolution::NoMatch);
    }

    #[test]
    fn season_restriction_accepts_equal_or_unset() {
        let mut spring = mk_show("Kiznaiver", &[]);
        spring.season = Some("Spring 2016".into());
        let mut fall = mk_show("Kiznaiver", &[]);
        fall.season = Some("Fall 2016".into());
        let unset = mk_show("Kiznaiver", &[]);
        let store = MemoryShowStore::from_shows(vec![spring.clone(), fall, unset.clone()]).unwrap();

        let mut record = mk_record("Kiznaiver", &["Kiznaiver"]);
        record.season = Some("Spring 2016".into());
        assert_eq!(
            resolve(&store, &record),
            Resolution::Ambiguous(vec![spring, unset])
        );
    }

    #[test]
    fn type_restriction_separates_primary_and_other_types() {
        let mut tv = mk_show("Sword Art Online", &[]);
        tv.show_type = Some(ShowType::Tv);
        let mut special = mk_show("Sword Art Online", &[]);
        special.show_type = Some(ShowType::Special);
        let untyped = mk_show("Sword Art Online", &[]);
        let store =
            MemoryShowStore::from_shows(vec![tv.clone(), special.clone(), untyped.clone()]).unwrap();

        let mut record = mk_record("Sword Art Online", &["Sword Art Online"]);
        record.show_type = Some(ShowType::Tv);
        assert_eq!(
            resolve(&store, &record),
            Resolution::Ambiguous(vec![tv, untyped.clone()])
        );

        record.show_type = Some(ShowType::Movie);
        assert_eq!(
            resolve(&store, &record),
            Resolution::Ambiguous(vec![special, untyped])
        );
    }

    #[test]
    fn restrict_id_narrows_to_one_show() {
        let first = mk_show("Erased", &[]);
        let second = mk_show("Erased", &[]);
        let store = MemoryShowStore::from_shows(vec![first, second.clone()]).unwrap();
        let record = mk_record("Erased", &["Erased"]);

        assert!(matches!(resolve(&store, &record), Resolution::Ambiguous(_)));
        let narrowed = find_candidates(&store, &record, Some(second.id)).unwrap();
        assert_eq!(
            Resolution::from_cursor(narrowed),
            Resolution::Unique(Box::new(second))
        );
    }

    #[test]
    fn invalid_record_is_rejected_before_querying() {
        let store = MemoryShowStore::new();
        let record = mk_record(" ", &[]);
        assert!(matches!(
            find_candidates(&store, &record, None),
            Err(CandidateError::Validation(ValidationError::MissingName))
        ));
    }

    #[test]
    fn filter_shape_for_full_record() {
        let mut record = mk_record("Erased", &["Erased"]);
        record.bindings = vec![SourceBinding::new("crunchyroll", "sub", "https://a.test/erased")];
        record.external_id = Some(31043);
        let filter = build_candidate_filter(&record, None).unwrap();

        let ShowFilter::Or(branches) = filter else {
            panic!("expected top-level Or, got {filter:?}");
        };
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[1], ShowFilter::ExternalIdEquals(31043));
        let ShowFilter::And(clause) = &branches[0] else {
            panic!("expected name clause");
        };
        assert!(clause.contains(&ShowFilter::FieldAbsent(ShowField::ExternalId)));
    }
}
