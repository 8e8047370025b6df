//! Reference-time date layouts.
//!
//! Site definitions describe dates by writing out a fixed reference instant
//! (`Mon Jan 2 15:04:05 MST 2006`) in the shape the site uses, e.g.
//! `02-Jan-2006 15:04`. This module translates such layouts into chrono
//! `strftime` strings so they can drive both parsing and formatting.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Layout tokens, longest first where prefixes overlap.
const TOKENS: &[(&str, &str)] = &[
    ("January", "%B"),
    ("Jan", "%b"),
    ("Monday", "%A"),
    ("Mon", "%a"),
    ("MST", "%Z"),
    ("2006", "%Y"),
    ("-07:00:00", "%:z"),
    ("-070000", "%z"),
    ("-07:00", "%:z"),
    ("-0700", "%z"),
    ("-07", "%#z"),
    ("Z07:00", "%:z"),
    ("Z0700", "%z"),
    ("Z07", "%#z"),
    (".000000000", "%.9f"),
    (".000000", "%.6f"),
    (".000", "%.3f"),
    (".999999999", "%.f"),
    (".999999", "%.f"),
    (".999", "%.f"),
    ("002", "%j"),
    ("_2", "%e"),
    ("01", "%m"),
    ("02", "%d"),
    ("03", "%I"),
    ("04", "%M"),
    ("05", "%S"),
    ("06", "%y"),
    ("15", "%H"),
    ("PM", "%p"),
    ("pm", "%P"),
    ("1", "%-m"),
    ("2", "%-d"),
    ("3", "%-I"),
    ("4", "%-M"),
    ("5", "%-S"),
];

/// Translate a reference-time layout into a chrono format string.
///
/// Text that is not a layout token is copied literally (with `%` escaped).
pub fn to_chrono_format(layout: &str) -> String {
    let mut out = String::with_capacity(layout.len() * 2);
    let mut rest = layout;

    'outer: while !rest.is_empty() {
        for (token, directive) in TOKENS {
            if rest.starts_with(token) {
                out.push_str(directive);
                rest = &rest[token.len()..];
                continue 'outer;
            }
        }

        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            if c == '%' {
                out.push_str("%%");
            } else {
                out.push(c);
            }
        }
        rest = chars.as_str();
    }

    out
}

/// Parse `value` with a chrono format produced by [`to_chrono_format`].
///
/// Values without zone information are taken as UTC; date-only values land
/// on midnight.
pub fn parse_with_format(value: &str, format: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_str(value, format) {
        return Some(dt);
    }

    let utc = FixedOffset::east_opt(0)?;

    if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
        return Some(utc.from_utc_datetime(&naive));
    }

    NaiveDate::parse_from_str(value, format)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| utc.from_utc_datetime(&naive))
}

/// Format an instant with a reference-time layout.
pub fn format_layout(instant: &DateTime<Utc>, layout: &str) -> String {
    // `%#z` is parse-only in chrono
    let format = to_chrono_format(layout).replace("%#z", "%z");
    instant.format(&format).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_translate_rfc1123z() {
        assert_eq!(
            to_chrono_format("Mon, 02 Jan 2006 15:04:05 -0700"),
            "%a, %d %b %Y %H:%M:%S %z"
        );
    }

    #[test]
    fn test_translate_short_forms() {
        assert_eq!(to_chrono_format("2/1/06 3:04 PM"), "%-d/%-m/%y %-I:%M %p");
        assert_eq!(to_chrono_format("January _2"), "%B %e");
        assert_eq!(to_chrono_format("Monday 100%"), "%A %-m00%%");
    }

    #[test]
    fn test_parse_date_only_is_midnight_utc() {
        let format = to_chrono_format("2006-01-02");
        let parsed = parse_with_format("2016-03-12", &format).unwrap();

        assert_eq!(parsed.year(), 2016);
        assert_eq!(parsed.month(), 3);
        assert_eq!(parsed.day(), 12);
        assert_eq!(parsed.hour(), 0);
        assert_eq!(parsed.offset().local_minus_utc(), 0);
    }

    #[test]
    fn test_parse_keeps_offset() {
        let format = to_chrono_format("2006-01-02 15:04 -0700");
        let parsed = parse_with_format("2016-03-12 10:30 +0200", &format).unwrap();

        assert_eq!(parsed.hour(), 10);
        assert_eq!(parsed.offset().local_minus_utc(), 7200);
    }

    #[test]
    fn test_parse_mismatch() {
        let format = to_chrono_format("2006-01-02");
        assert!(parse_with_format("12/03/2016", &format).is_none());
    }

    #[test]
    fn test_format_layout() {
        let instant = Utc.with_ymd_and_hms(2016, 3, 12, 8, 5, 0).unwrap();
        assert_eq!(format_layout(&instant, "Jan 02 2006"), "Mar 12 2016");
    }
}
