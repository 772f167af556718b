//! Best-effort airing dates from the string shapes streaming sources publish:
//! `"Apr 2, 2016 to Sep 24, 2016"`, `"Spring 2016"`, `"Saturday"`, `"23:30"`.
//!
//! Nothing here fails. A fragment that is missing, uncertain (`?`) or
//! malformed just leaves its fields absent.

use chrono::{Datelike, Month, NaiveDate, NaiveTime, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use showrec_core::{PartialDate, RawDateFragments};

use crate::{clean_whitespace, AdapterError};

const UNCERTAIN: char = '?';
const RANGE_SEPARATOR: &str = " to ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSide {
    Start,
    End,
}

impl DateSide {
    pub fn index(self) -> usize {
        match self {
            DateSide::Start => 0,
            DateSide::End => 1,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ParserConfig {
    /// Used for sources that do not declare a timezone.
    pub default_timezone: Tz,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            default_timezone: Tz::UTC,
        }
    }
}

pub fn parse_timezone(name: &str) -> Result<Tz, AdapterError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| AdapterError::UnknownTimezone(name.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateFragments {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
    pub hour: Option<u32>,
    pub minute: Option<u32>,
}

/// Turns local fragments into a [`PartialDate`].
///
/// Without a time of day the fragments are kept as local calendar values. Once
/// an hour or minute is known the whole moment is shifted from `timezone` to
/// UTC and every component is read back from the UTC instant, so the date can
/// move across a day (or year) boundary.
pub fn build_partial_date(timezone: Tz, fragments: DateFragments) -> PartialDate {
    let month = fragments.month.filter(|m| (1..=12).contains(m));
    let day = match (fragments.year, month, fragments.day) {
        (Some(year), Some(month), Some(day)) => {
            NaiveDate::from_ymd_opt(year, month, day).map(|_| day)
        }
        (_, _, day) => day.filter(|d| (1..=31).contains(d)),
    };
    let local = PartialDate {
        year: fragments.year,
        month,
        day,
        hour: fragments.hour.filter(|h| *h < 24),
        minute: fragments.minute.filter(|m| *m < 60),
    };
    if !local.has_time() {
        return local;
    }

    let without_time = PartialDate {
        hour: None,
        minute: None,
        ..local
    };
    let Some(date) = local.to_naive_date() else {
        return without_time;
    };
    let Some(time) = NaiveTime::from_hms_opt(local.hour.unwrap_or(0), local.minute.unwrap_or(0), 0)
    else {
        return without_time;
    };
    // Nonexistent local times (spring-forward gaps) keep the date only.
    let Some(instant) = timezone.from_local_datetime(&date.and_time(time)).earliest() else {
        return without_time;
    };
    let utc = instant.with_timezone(&Utc);

    PartialDate {
        year: Some(utc.year()),
        month: Some(utc.month()),
        day: Some(utc.day()),
        hour: local.hour.map(|_| utc.hour()),
        minute: local.minute.map(|_| utc.minute()),
    }
}

pub fn season_start_month(name: &str) -> Option<u32> {
    match name.trim().to_ascii_lowercase().as_str() {
        "winter" => Some(1),
        "spring" => Some(4),
        "summer" => Some(7),
        "fall" | "autumn" => Some(10),
        _ => None,
    }
}

fn parse_month(token: &str) -> Option<u32> {
    token
        .trim_end_matches('.')
        .parse::<Month>()
        .ok()
        .map(|m| m.number_from_month())
}

fn parse_weekday(text: &str) -> Option<Weekday> {
    let token = text.split_whitespace().next()?;
    token
        .parse::<Weekday>()
        .ok()
        .or_else(|| token.strip_suffix(['s', 'S'])?.parse::<Weekday>().ok())
}

/// Day of the first `weekday` on or after the 1st of the month.
fn first_weekday_of_month(year: i32, month: u32, weekday: Weekday) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let offset =
        (7 + weekday.num_days_from_monday() - first.weekday().num_days_from_monday()) % 7;
    Some(1 + offset)
}

fn apply_date_range(fragments: DateFragments, side: DateSide, text: Option<&str>) -> DateFragments {
    let Some(text) = text else {
        return fragments;
    };
    let cleaned = clean_whitespace(text);
    let parts: Vec<&str> = cleaned.split(RANGE_SEPARATOR).collect();
    let part = if parts.len() == 2 {
        parts[side.index()]
    } else {
        parts[0]
    };
    let stripped = part.replace(',', "");
    let tokens: Vec<&str> = stripped.split(' ').filter(|t| !t.is_empty()).collect();
    let Some(last) = tokens.last().copied() else {
        return fragments;
    };

    let certain = |token: &&str| !token.contains(UNCERTAIN);
    DateFragments {
        year: Some(last)
            .filter(certain)
            .and_then(|t| t.parse::<i32>().ok())
            .or(fragments.year),
        month: tokens
            .first()
            .copied()
            .filter(|_| tokens.len() >= 2)
            .filter(certain)
            .and_then(|t| parse_month(t))
            .or(fragments.month),
        day: tokens
            .get(1)
            .copied()
            .filter(|_| tokens.len() >= 3)
            .filter(certain)
            .and_then(|t| t.parse::<u32>().ok())
            .filter(|d| (1..=31).contains(d))
            .or(fragments.day),
        ..fragments
    }
}

fn apply_season(fragments: DateFragments, side: DateSide, text: Option<&str>) -> DateFragments {
    let Some(text) = text.filter(|_| side == DateSide::Start) else {
        return fragments;
    };
    let cleaned = clean_whitespace(text);
    let tokens: Vec<&str> = cleaned.split(' ').collect();
    let [season, year] = tokens.as_slice() else {
        return fragments;
    };
    DateFragments {
        year: fragments.year.or_else(|| year.parse::<i32>().ok()),
        month: fragments.month.or_else(|| season_start_month(season)),
        ..fragments
    }
}

fn apply_weekday(fragments: DateFragments, text: Option<&str>) -> DateFragments {
    let (Some(text), None, Some(month), Some(year)) =
        (text, fragments.day, fragments.month, fragments.year)
    else {
        return fragments;
    };
    DateFragments {
        day: parse_weekday(text).and_then(|weekday| first_weekday_of_month(year, month, weekday)),
        ..fragments
    }
}

fn apply_time(fragments: DateFragments, text: Option<&str>) -> DateFragments {
    let (Some(text), Some(_), Some(_), Some(_)) =
        (text, fragments.day, fragments.month, fragments.year)
    else {
        return fragments;
    };
    let mut parts = text.trim().split(':');
    let hour = parts.next().and_then(|h| h.trim().parse::<u32>().ok());
    let minute = parts
        .next()
        .and_then(|m| m.split_whitespace().next())
        .and_then(|m| m.parse::<u32>().ok());
    match (hour, minute) {
        (Some(hour), Some(minute)) if hour < 24 && minute < 60 => DateFragments {
            hour: Some(hour),
            minute: Some(minute),
            ..fragments
        },
        _ => fragments,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StandardStringDateParser {
    timezone: Tz,
}

impl Default for StandardStringDateParser {
    fn default() -> Self {
        Self::from_config(&ParserConfig::default())
    }
}

impl StandardStringDateParser {
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }

    pub fn from_config(config: &ParserConfig) -> Self {
        Self::new(config.default_timezone)
    }

    /// Parser for a source that may declare its own IANA timezone name.
    pub fn for_source(config: &ParserConfig, timezone: Option<&str>) -> Result<Self, AdapterError> {
        match timezone {
            Some(name) => Ok(Self::new(parse_timezone(name)?)),
            None => Ok(Self::from_config(config)),
        }
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn parse(&self, side: DateSide, fragments: &RawDateFragments) -> PartialDate {
        self.parse_strings(
            side,
            fragments.date_range.as_deref(),
            fragments.season.as_deref(),
            fragments.weekday.as_deref(),
            fragments.time.as_deref(),
        )
    }

    pub fn parse_strings(
        &self,
        side: DateSide,
        date_range: Option<&str>,
        season: Option<&str>,
        weekday: Option<&str>,
        time: Option<&str>,
    ) -> PartialDate {
        let fragments = DateFragments::default();
        let fragments = apply_date_range(fragments, side, date_range);
        let fragments = apply_season(fragments, side, season);
        let fragments = apply_weekday(fragments, weekday);
        let fragments = apply_time(fragments, time);
        build_partial_date(self.timezone, fragments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc() -> StandardStringDateParser {
        StandardStringDateParser::default()
    }

    fn date(
        year: Option<i32>,
        month: Option<u32>,
        day: Option<u32>,
        hour: Option<u32>,
        minute: Option<u32>,
    ) -> PartialDate {
        PartialDate {
            year,
            month,
            day,
            hour,
            minute,
        }
    }

    #[test]
    fn range_start_and_end_sides() {
        let range = Some("Apr 2, 2016 to Sep 24, 2016");
        assert_eq!(
            utc().parse_strings(DateSide::Start, range, None, None, None),
            date(Some(2016), Some(4), Some(2), None, None)
        );
        assert_eq!(
            utc().parse_strings(DateSide::End, range, None, None, None),
            date(Some(2016), Some(9), Some(24), None, None)
        );
    }

    #[test]
    fn single_date_is_used_for_both_sides() {
        let single = Some("  Oct   7,  2015 ");
        let expected = date(Some(2015), Some(10), Some(7), None, None);
        assert_eq!(utc().parse_strings(DateSide::Start, single, None, None, None), expected);
        assert_eq!(utc().parse_strings(DateSide::End, single, None, None, None), expected);
    }

    #[test]
    fn short_ranges_only_fill_available_positions() {
        assert_eq!(
            utc().parse_strings(DateSide::Start, Some("Jan 2017"), None, None, None),
            date(Some(2017), Some(1), None, None, None)
        );
        assert_eq!(
            utc().parse_strings(DateSide::Start, Some("2017"), None, None, None),
            date(Some(2017), None, None, None, None)
        );
    }

    #[test]
    fn uncertain_tokens_are_skipped() {
        assert_eq!(
            utc().parse_strings(DateSide::End, Some("Jan 8, 2016 to ?"), None, None, None),
            PartialDate::empty()
        );
        assert_eq!(
            utc().parse_strings(DateSide::Start, Some("Jan ??, 2016"), None, None, None),
            date(Some(2016), Some(1), None, None, None)
        );
        // Tokens are read by position, so a known day survives an unknown month.
        assert_eq!(
            utc().parse_strings(DateSide::Start, Some("?? 4, 2016"), None, None, None),
            date(Some(2016), None, Some(4), None, None)
        );
    }

    #[test]
    fn malformed_tokens_leave_fields_absent() {
        assert_eq!(
            utc().parse_strings(DateSide::Start, Some("Smarch 40, twenty"), None, None, None),
            PartialDate::empty()
        );
        assert_eq!(
            utc().parse_strings(DateSide::Start, Some("Feb 30, 2016"), None, None, None),
            date(Some(2016), Some(2), None, None, None)
        );
    }

    #[test]
    fn season_gives_year_and_quarter_month_without_day() {
        assert_eq!(
            utc().parse_strings(DateSide::Start, None, Some("Spring 2016"), None, None),
            date(Some(2016), Some(4), None, None, None)
        );
        assert_eq!(
            utc().parse_strings(DateSide::Start, None, Some("Fall  2015"), None, None),
            date(Some(2015), Some(10), None, None, None)
        );
    }

    #[test]
    fn season_only_fills_missing_fields_and_only_on_start_side() {
        assert_eq!(
            utc().parse_strings(DateSide::Start, Some("Mar 2016"), Some("Spring 2016"), None, None),
            date(Some(2016), Some(3), None, None, None)
        );
        assert_eq!(
            utc().parse_strings(DateSide::End, None, Some("Spring 2016"), None, None),
            PartialDate::empty()
        );
        assert_eq!(
            utc().parse_strings(DateSide::Start, None, Some("Spring"), None, None),
            PartialDate::empty()
        );
    }

    #[test]
    fn weekday_needs_month_and_year() {
        // April 2016 starts on a Friday.
        assert_eq!(
            utc().parse_strings(DateSide::Start, None, Some("Spring 2016"), Some("Saturday"), None),
            date(Some(2016), Some(4), Some(2), None, None)
        );
        assert_eq!(
            utc().parse_strings(DateSide::Start, None, Some("Spring 2016"), Some("Fridays"), None),
            date(Some(2016), Some(4), Some(1), None, None)
        );
        assert_eq!(
            utc().parse_strings(DateSide::Start, Some("2016"), None, Some("Saturday"), None),
            date(Some(2016), None, None, None, None)
        );
        assert_eq!(
            utc().parse_strings(DateSide::Start, None, None, Some("Saturday"), None),
            PartialDate::empty()
        );
    }

    #[test]
    fn weekday_does_not_override_a_known_day() {
        assert_eq!(
            utc().parse_strings(DateSide::Start, Some("Apr 9, 2016"), None, Some("Saturday"), None),
            date(Some(2016), Some(4), Some(9), None, None)
        );
    }

    #[test]
    fn time_needs_a_full_date() {
        assert_eq!(
            utc().parse_strings(DateSide::Start, Some("Apr 2, 2016"), None, None, Some("23:30")),
            date(Some(2016), Some(4), Some(2), Some(23), Some(30))
        );
        assert_eq!(
            utc().parse_strings(DateSide::Start, None, Some("Spring 2016"), None, Some("23:30")),
            date(Some(2016), Some(4), None, None, None)
        );
        assert_eq!(
            utc().parse_strings(DateSide::Start, Some("Apr 2, 2016"), None, None, Some("late")),
            date(Some(2016), Some(4), Some(2), None, None)
        );
    }

    #[test]
    fn midnight_is_present_not_absent() {
        assert_eq!(
            utc().parse_strings(DateSide::Start, Some("Apr 2, 2016"), None, None, Some("00:00")),
            date(Some(2016), Some(4), Some(2), Some(0), Some(0))
        );
    }

    #[test]
    fn known_time_shifts_moment_to_utc() {
        let tokyo = StandardStringDateParser::new(parse_timezone("Asia/Tokyo").unwrap());
        assert_eq!(
            tokyo.parse_strings(DateSide::Start, Some("Apr 2, 2016"), None, None, Some("23:30")),
            date(Some(2016), Some(4), Some(2), Some(14), Some(30))
        );
        // crosses back over the day boundary
        assert_eq!(
            tokyo.parse_strings(DateSide::Start, Some("Apr 2, 2016"), None, None, Some("01:30 JST")),
            date(Some(2016), Some(4), Some(1), Some(16), Some(30))
        );
    }

    #[test]
    fn utc_shift_can_change_the_year() {
        let new_york = StandardStringDateParser::new(parse_timezone("America/New_York").unwrap());
        assert_eq!(
            new_york.parse_strings(DateSide::Start, Some("Dec 31, 2016"), None, None, Some("22:00")),
            date(Some(2017), Some(1), Some(1), Some(3), Some(0))
        );
    }

    #[test]
    fn dates_without_time_stay_in_local_calendar() {
        let tokyo = StandardStringDateParser::new(parse_timezone("Asia/Tokyo").unwrap());
        assert_eq!(
            tokyo.parse_strings(DateSide::Start, Some("Apr 2, 2016"), None, None, None),
            date(Some(2016), Some(4), Some(2), None, None)
        );
    }

    #[test]
    fn nonexistent_local_time_keeps_date_only() {
        let new_york = StandardStringDateParser::new(parse_timezone("America/New_York").unwrap());
        assert_eq!(
            new_york.parse_strings(DateSide::Start, Some("Mar 13, 2016"), None, None, Some("02:30")),
            date(Some(2016), Some(3), Some(13), None, None)
        );
    }

    #[test]
    fn source_timezone_falls_back_to_configured_default() {
        let config = ParserConfig::default();
        assert_eq!(StandardStringDateParser::for_source(&config, None).unwrap().timezone(), Tz::UTC);
        assert_eq!(
            StandardStringDateParser::for_source(&config, Some("Asia/Tokyo"))
                .unwrap()
                .timezone(),
            Tz::Asia__Tokyo
        );
        assert!(matches!(
            StandardStringDateParser::for_source(&config, Some("Mars/Olympus")),
            Err(AdapterError::UnknownTimezone(_))
        ));
    }

    #[test]
    fn builder_drops_out_of_range_fragments() {
        let built = build_partial_date(
            Tz::UTC,
            DateFragments {
                year: Some(2016),
                month: Some(13),
                day: Some(2),
                hour: Some(25),
                minute: Some(0),
            },
        );
        // month 13 is dropped, leaving no calendar date to anchor the time to
        assert_eq!(built, date(Some(2016), None, Some(2), None, None));
    }

    #[test]
    fn raw_fragments_are_read_field_by_field() {
        let fragments = RawDateFragments {
            date_range: Some("Apr 2, 2016 to Sep 24, 2016".into()),
            season: Some("Spring 2016".into()),
            weekday: Some("Saturday".into()),
            time: Some("23:30".into()),
        };
        assert_eq!(
            utc().parse(DateSide::Start, &fragments),
            date(Some(2016), Some(4), Some(2), Some(23), Some(30))
        );
        assert_eq!(
            utc().parse(DateSide::End, &fragments),
            date(Some(2016), Some(9), Some(24), Some(23), Some(30))
        );
    }
}
