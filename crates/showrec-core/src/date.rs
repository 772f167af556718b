//! Partial calendar dates and the rule for reconciling two of them.

use std::cmp::Ordering;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A date/time where each component is independently known or unknown.
///
/// Absence is never zero: `hour: Some(0)` is midnight, `hour: None` is "no time
/// was scraped". Absent components are skipped when serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PartialDate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hour: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minute: Option<u32>,
}

impl PartialDate {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn present_fields(&self) -> usize {
        self.components().iter().filter(|c| c.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.present_fields() == 0
    }

    pub fn has_time(&self) -> bool {
        self.hour.is_some() || self.minute.is_some()
    }

    /// Components in comparison priority order.
    pub fn components(&self) -> [Option<i64>; 5] {
        [
            self.year.map(i64::from),
            self.month.map(i64::from),
            self.day.map(i64::from),
            self.hour.map(i64::from),
            self.minute.map(i64::from),
        ]
    }

    pub fn to_naive_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year?, self.month?, self.day?)
    }
}

/// Picks the earlier of two airing dates scraped for the same show.
///
/// The date with fewer known components is moved to the front; components are
/// then compared year first, skipping any level unknown on either side. The
/// front date wins unless a compared level puts the other one strictly earlier,
/// so a sparse date beats a more precise one it cannot be told apart from.
pub fn earliest_of(a: PartialDate, b: PartialDate) -> PartialDate {
    let (a, b) = if a.present_fields() > b.present_fields() {
        (b, a)
    } else {
        (a, b)
    };

    for (left, right) in a.components().into_iter().zip(b.components()) {
        let (Some(left), Some(right)) = (left, right) else {
            continue;
        };
        match left.cmp(&right) {
            Ordering::Less => return a,
            Ordering::Greater => return b,
            Ordering::Equal => {}
        }
    }
    a
}

/// Keeps whichever date carries more known components; ties keep `a`.
pub fn most_specific_of(a: PartialDate, b: PartialDate) -> PartialDate {
    if b.present_fields() > a.present_fields() {
        b
    } else {
        a
    }
}
