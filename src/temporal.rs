//! Shallow natural-language temporal parsing (spec §4.8, §8.2 S5).
//! Deliberately narrow: a fixed phrase table plus a `last N
//! days|hours` pattern, not a general date/time parser.

use chrono::{DateTime, Datelike, TimeZone, Utc};

const DAY_MS: i64 = 86_400_000;
const HOUR_MS: i64 = 3_600_000;

#[derive(Debug, Clone, PartialEq)]
pub struct TemporalRange {
    pub after: Option<i64>,
    pub before: Option<i64>,
    pub remaining: String,
}

fn midnight_utc(ms: i64) -> i64 {
    let dt: DateTime<Utc> = Utc.timestamp_millis_opt(ms).single().unwrap_or_else(Utc::now);
    dt.date_naive()
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always a valid time")
        .and_utc()
        .timestamp_millis()
}

fn start_of_week(ms: i64) -> i64 {
    let dt: DateTime<Utc> = Utc.timestamp_millis_opt(ms).single().unwrap_or_else(Utc::now);
    let days_since_monday = dt.weekday().num_days_from_monday() as i64;
    midnight_utc(ms) - days_since_monday * DAY_MS
}

fn start_of_month(ms: i64) -> i64 {
    let dt: DateTime<Utc> = Utc.timestamp_millis_opt(ms).single().unwrap_or_else(Utc::now);
    dt.date_naive()
        .with_day(1)
        .expect("day 1 is always valid")
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always a valid time")
        .and_utc()
        .timestamp_millis()
}

struct Phrase {
    pattern: &'static str,
    range: fn(i64) -> (i64, i64),
}

const PHRASES: &[Phrase] = &[
    Phrase { pattern: "yesterday", range: |now| (midnight_utc(now) - DAY_MS, midnight_utc(now)) },
    Phrase { pattern: "today", range: |now| (midnight_utc(now), now) },
    Phrase { pattern: "this week", range: |now| (start_of_week(now), now) },
    Phrase { pattern: "last week", range: |now| (start_of_week(now) - 7 * DAY_MS, start_of_week(now)) },
    Phrase { pattern: "this month", range: |now| (start_of_month(now), now) },
    Phrase {
        pattern: "last month",
        range: |now| {
            let this_month_start = start_of_month(now);
            let prev_probe = this_month_start - DAY_MS;
            (start_of_month(prev_probe), this_month_start)
        },
    },
];

/// Parse `query` against `now_ms`, returning a `{after, before,
/// remaining}` triple. `remaining` has the matched phrase (and any
/// `last N days|hours` match) stripped, whitespace-collapsed.
pub fn parse_temporal(query: &str, now_ms: i64) -> TemporalRange {
    let lowered = query.to_lowercase();

    if let Some((after, before, matched_len, matched_start)) = match_last_n(&lowered, now_ms) {
        let remaining = strip_span(query, matched_start, matched_len);
        return TemporalRange { after: Some(after), before: Some(before), remaining };
    }

    for phrase in PHRASES {
        if let Some(pos) = lowered.find(phrase.pattern) {
            let (after, before) = (phrase.range)(now_ms);
            let remaining = strip_span(query, pos, phrase.pattern.len());
            return TemporalRange { after: Some(after), before: Some(before), remaining };
        }
    }

    TemporalRange { after: None, before: None, remaining: collapse_whitespace(query) }
}

/// Matches `last <N> day(s)` or `last <N> hour(s)`, case-insensitively.
/// Returns `(after, before, matched_len, matched_start)` in terms of
/// the original (lowercased) string's byte offsets.
fn match_last_n(lowered: &str, now_ms: i64) -> Option<(i64, i64, usize, usize)> {
    let needle = "last ";
    let start = lowered.find(needle)?;
    let rest = &lowered[start + needle.len()..];
    let digits_end = rest.find(|c: char| !c.is_ascii_digit())?;
    if digits_end == 0 {
        return None;
    }
    let n: i64 = rest[..digits_end].parse().ok()?;
    let after_digits = rest[digits_end..].trim_start();
    let unit_ms = if after_digits.starts_with("day") {
        DAY_MS
    } else if after_digits.starts_with("hour") {
        HOUR_MS
    } else {
        return None;
    };

    let unit_word_len = after_digits
        .find(|c: char| !c.is_alphabetic())
        .unwrap_or(after_digits.len());
    let consumed_after_digits = (rest.len() - after_digits.len()) + unit_word_len;
    let matched_len = needle.len() + digits_end + consumed_after_digits;

    Some((now_ms - n * unit_ms, now_ms, matched_len, start))
}

fn strip_span(original: &str, start: usize, len: usize) -> String {
    let mut out = String::with_capacity(original.len());
    out.push_str(&original[..start.min(original.len())]);
    let end = (start + len).min(original.len());
    out.push_str(&original[end..]);
    collapse_whitespace(&out)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: i64 = 1_700_000_000_000;

    #[test]
    fn yesterday_spans_one_day() {
        let r = parse_temporal("what happened yesterday", T0);
        assert_eq!(r.before.unwrap() - r.after.unwrap(), DAY_MS);
    }

    #[test]
    fn last_week_spans_seven_days() {
        let r = parse_temporal("what happened last week", T0);
        assert_eq!(r.before.unwrap() - r.after.unwrap(), 7 * DAY_MS);
    }

    #[test]
    fn no_time_reference_has_no_range() {
        let r = parse_temporal("random query with no time", T0);
        assert!(r.after.is_none());
        assert!(r.before.is_none());
        assert_eq!(r.remaining, "random query with no time");
    }

    #[test]
    fn last_n_days_pattern_is_recognized() {
        let r = parse_temporal("show me last 3 days of trades", T0);
        assert_eq!(r.before.unwrap() - r.after.unwrap(), 3 * DAY_MS);
        assert_eq!(r.remaining, "show me of trades");
    }

    #[test]
    fn last_n_hours_pattern_is_recognized() {
        let r = parse_temporal("updates from last 6 hours", T0);
        assert_eq!(r.before.unwrap() - r.after.unwrap(), 6 * HOUR_MS);
    }

    #[test]
    fn remaining_strips_matched_phrase() {
        let r = parse_temporal("trades yesterday please", T0);
        assert_eq!(r.remaining, "trades please");
    }
}
