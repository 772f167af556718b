//! Folding a resolved record into a canonical show.

use chrono::{DateTime, Utc};
use serde::Serialize;
use showrec_core::{earliest_of, most_specific_of, CanonicalShow, PartialDate, ScrapedRecord};
use uuid::Uuid;

/// Start and end airing dates parsed from one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RecordDates {
    pub start: PartialDate,
    pub end: PartialDate,
}

/// Fields of a show touched by a merge, in the order they were changed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct MergeChanges(pub Vec<&'static str>);

impl MergeChanges {
    fn note(&mut self, field: &'static str, changed: bool) {
        if changed {
            self.0.push(field);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub fn new_show(record: &ScrapedRecord, dates: RecordDates, now: DateTime<Utc>) -> CanonicalShow {
    CanonicalShow {
        id: Uuid::new_v4(),
        name: record.name.clone(),
        alt_names: record.alt_names.clone(),
        bindings: record.bindings.clone(),
        season: record.season.clone(),
        show_type: record.show_type,
        external_id: record.external_id,
        airing_start: dates.start,
        airing_end: dates.end,
        description: record.description.clone(),
        thumbnail_id: record.thumbnail_id.clone(),
        genres: record.genres.clone(),
        episode_amount: record.episode_amount,
        episode_duration: record.episode_duration,
        created_at: now,
        updated_at: now,
    }
}

/// An empty side carries no information, so the other side is kept.
pub fn reconcile_start(existing: PartialDate, incoming: PartialDate) -> PartialDate {
    match (existing.is_empty(), incoming.is_empty()) {
        (true, _) => incoming,
        (_, true) => existing,
        _ => earliest_of(existing, incoming),
    }
}

pub fn reconcile_end(existing: PartialDate, incoming: PartialDate) -> PartialDate {
    most_specific_of(existing, incoming)
}

fn fill<T: Clone>(slot: &mut Option<T>, value: &Option<T>) -> bool {
    if slot.is_none() && value.is_some() {
        slot.clone_from(value);
        true
    } else {
        false
    }
}

fn union_names(names: &mut Vec<String>, incoming: impl IntoIterator<Item = String>) -> bool {
    let before = names.len();
    for name in incoming {
        if !names.iter().any(|known| known.eq_ignore_ascii_case(&name)) {
            names.push(name);
        }
    }
    names.len() != before
}

/// Merges `record` into a copy of `show`. Existing values win over incoming
/// ones except for the airing dates, which are reconciled.
pub fn merge_record(
    show: &CanonicalShow,
    record: &ScrapedRecord,
    dates: RecordDates,
    now: DateTime<Utc>,
) -> (CanonicalShow, MergeChanges) {
    let mut merged = show.clone();
    let mut changes = MergeChanges::default();

    let incoming_names = record
        .alt_names
        .iter()
        .cloned()
        .chain(std::iter::once(record.name.clone()));
    changes.note("alt_names", union_names(&mut merged.alt_names, incoming_names));

    let before = merged.bindings.len();
    for binding in &record.bindings {
        if !merged.bindings.contains(binding) {
            merged.bindings.push(binding.clone());
        }
    }
    changes.note("bindings", merged.bindings.len() != before);

    changes.note("season", fill(&mut merged.season, &record.season));
    changes.note("show_type", fill(&mut merged.show_type, &record.show_type));
    changes.note("external_id", fill(&mut merged.external_id, &record.external_id));
    changes.note("description", fill(&mut merged.description, &record.description));
    changes.note("thumbnail_id", fill(&mut merged.thumbnail_id, &record.thumbnail_id));
    changes.note("episode_amount", fill(&mut merged.episode_amount, &record.episode_amount));
    changes.note(
        "episode_duration",
        fill(&mut merged.episode_duration, &record.episode_duration),
    );
    changes.note("genres", union_names(&mut merged.genres, record.genres.iter().cloned()));

    let start = reconcile_start(merged.airing_start, dates.start);
    changes.note("airing_start", start != merged.airing_start);
    merged.airing_start = start;

    let end = reconcile_end(merged.airing_end, dates.end);
    changes.note("airing_end", end != merged.airing_end);
    merged.airing_end = end;

    if !changes.is_empty() {
        merged.updated_at = now;
    }
    (merged, changes)
}
