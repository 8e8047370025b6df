//! Relative time phrases ("2 days, 3 hours ago") to absolute instants.

use chrono::{DateTime, Days, Months, TimeDelta, Utc};

use super::FilterError;

/// Lexical token of a relative-time phrase.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'a> {
    Number(&'a str),
    Word(&'a str),
    Punct(&'a str),
}

impl<'a> Token<'a> {
    fn text(&self) -> &'a str {
        match self {
            Token::Number(s) | Token::Word(s) | Token::Punct(s) => *s,
        }
    }
}

/// Split a phrase into numbers, words and single punctuation characters.
fn tokenize(src: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let bytes = src.as_bytes();
    let mut i = 0;

    while i < src.len() {
        let c = match src[i..].chars().next() {
            Some(c) => c,
            None => break,
        };

        if c.is_whitespace() {
            i += c.len_utf8();
            continue;
        }

        let starts_number = c.is_ascii_digit()
            || (c == '.' && bytes.get(i + 1).is_some_and(|b| b.is_ascii_digit()));

        if starts_number {
            let start = i;
            while i < src.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i < src.len() && bytes[i] == b'.' {
                i += 1;
                while i < src.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
            }
            tokens.push(Token::Number(&src[start..i]));
        } else if c.is_alphabetic() || c == '_' {
            let start = i;
            for ch in src[i..].chars() {
                if ch.is_alphanumeric() || ch == '_' {
                    i += ch.len_utf8();
                } else {
                    break;
                }
            }
            tokens.push(Token::Word(&src[start..i]));
        } else {
            tokens.push(Token::Punct(&src[i..i + c.len_utf8()]));
            i += c.len_utf8();
        }
    }

    tokens
}

/// Split `"1.5"` into its whole part and the fraction `0.5`.
fn split_decimal(s: &str) -> Option<(u32, f64)> {
    match s.split_once('.') {
        Some((whole, frac)) => {
            let whole = whole.parse::<u32>().ok()?;
            let frac = format!("0.{frac}").parse::<f64>().ok()?;
            Some((whole, frac))
        }
        None => s.parse::<u32>().ok().map(|whole| (whole, 0.0)),
    }
}

/// Scale a (negative) delta by `fraction`, truncating toward zero.
fn scale(delta: TimeDelta, fraction: f64) -> Option<TimeDelta> {
    match delta.num_nanoseconds() {
        Some(ns) => Some(TimeDelta::nanoseconds((ns as f64 * fraction) as i64)),
        None => TimeDelta::try_milliseconds((delta.num_milliseconds() as f64 * fraction) as i64),
    }
}

/// Move `now` forward by `delta`, failing when either step leaves chrono's range.
fn shift(
    now: DateTime<Utc>,
    delta: Option<TimeDelta>,
    src: &str,
) -> Result<DateTime<Utc>, FilterError> {
    delta
        .and_then(|d| now.checked_add_signed(d))
        .ok_or_else(|| overflow(src))
}

/// Move `now` back by `delta`.
fn back(
    now: DateTime<Utc>,
    delta: Option<TimeDelta>,
    src: &str,
) -> Result<DateTime<Utc>, FilterError> {
    delta
        .and_then(|d| now.checked_sub_signed(d))
        .ok_or_else(|| overflow(src))
}

fn overflow(src: &str) -> FilterError {
    FilterError::TimeAgo {
        input: src.to_string(),
        reason: "time offset out of range".to_string(),
    }
}

/// Evaluate a relative-time phrase against `now`.
///
/// A `week` always counts as exactly seven days whatever quantity precedes it;
/// only the fractional part scales. `timeago_week_ignores_quantity` pins this.
pub fn parse_time_ago(src: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, FilterError> {
    let tokens = tokenize(src);
    let mut iter = tokens.iter();
    let mut now = now;

    while let Some(token) = iter.next() {
        if matches!(token.text(), "," | "ago" | "and") {
            continue;
        }

        let (value, fraction) = split_decimal(token.text()).ok_or_else(|| FilterError::TimeAgo {
            input: src.to_string(),
            reason: format!("failed to parse decimal time {:?}", token.text()),
        })?;

        let unit = iter.next().ok_or_else(|| FilterError::TimeAgo {
            input: src.to_string(),
            reason: format!("expected a time unit after {:?}", token.text()),
        })?;
        let unit_text = unit.text();

        match unit_text.strip_suffix('s').unwrap_or(unit_text) {
            "year" => {
                now = now
                    .checked_sub_months(Months::new(value.saturating_mul(12)))
                    .ok_or_else(|| overflow(src))?;
                if fraction > 0.0 {
                    let one = now
                        .checked_sub_months(Months::new(12))
                        .ok_or_else(|| overflow(src))?;
                    now = shift(now, scale(one.signed_duration_since(now), fraction), src)?;
                }
            }
            "month" => {
                now = now
                    .checked_sub_months(Months::new(value))
                    .ok_or_else(|| overflow(src))?;
                if fraction > 0.0 {
                    let one = now
                        .checked_sub_months(Months::new(1))
                        .ok_or_else(|| overflow(src))?;
                    now = shift(now, scale(one.signed_duration_since(now), fraction), src)?;
                }
            }
            "week" => {
                now = now
                    .checked_sub_days(Days::new(7))
                    .ok_or_else(|| overflow(src))?;
                if fraction > 0.0 {
                    now = shift(now, scale(TimeDelta::days(-7), fraction), src)?;
                }
            }
            "day" => {
                now = now
                    .checked_sub_days(Days::new(value as u64))
                    .ok_or_else(|| overflow(src))?;
                if fraction > 0.0 {
                    now = back(now, TimeDelta::try_minutes((fraction * 1440.0) as i64), src)?;
                }
            }
            "hour" => {
                now = back(now, TimeDelta::try_hours(value as i64), src)?;
                if fraction > 0.0 {
                    now = back(now, TimeDelta::try_seconds((fraction * 3600.0) as i64), src)?;
                }
            }
            "minute" => {
                now = back(now, TimeDelta::try_minutes(value as i64), src)?;
                if fraction > 0.0 {
                    now = back(now, TimeDelta::try_seconds((fraction * 60.0) as i64), src)?;
                }
            }
            "second" => {
                now = back(now, TimeDelta::try_seconds(value as i64), src)?;
            }
            _ => {
                return Err(FilterError::TimeAgo {
                    input: src.to_string(),
                    reason: format!("unsupported unit of time {:?}", unit_text),
                });
            }
        }
    }

    Ok(now)
}
