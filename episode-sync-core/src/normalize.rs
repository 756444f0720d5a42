//! Field normalizers: total functions from a raw cell to a typed value.
//!
//! None of these functions fail. Malformed optional data (a bad date, an
//! unknown boolean, broken JSON) normalizes to `None`, which the payload layer
//! writes as an explicit null. Whether a column is *absent* from the input is
//! decided one level up and carried by [`Field`].

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use serde_json::{json, Value};
use unicode_normalization::UnicodeNormalization;

/// Three-state field value.
///
/// `Absent` leaves the remote value untouched on update, `Null` clears it and
/// `Value` sets it.
#[derive(Debug, Clone, PartialEq)]
pub enum Field<T> {
    Absent,
    Null,
    Value(T),
}

impl<T> Field<T> {
    /// Lifts a normalizer result for a column that is present in the input.
    pub fn present(value: Option<T>) -> Self {
        match value {
            Some(v) => Field::Value(v),
            None => Field::Null,
        }
    }

    /// Runs a normalizer over a present value; a `None` result becomes
    /// [`Field::Null`].
    pub fn normalize<U, F: FnOnce(T) -> Option<U>>(self, f: F) -> Field<U> {
        match self {
            Field::Absent => Field::Absent,
            Field::Null => Field::Null,
            Field::Value(v) => Field::present(f(v)),
        }
    }
}

impl<T: Into<Value>> Field<T> {
    /// `None` for `Absent`, otherwise the JSON to send.
    pub fn into_json(self) -> Option<Value> {
        match self {
            Field::Absent => None,
            Field::Null => Some(Value::Null),
            Field::Value(v) => Some(v.into()),
        }
    }
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static pattern compiles"))
}

/// Normalizes a date to `YYYY-MM-DD`.
///
/// ISO dates pass through verbatim, `M/D/YYYY` is reformatted after a range
/// check, and anything else goes through a set of common formats and is
/// truncated to its (UTC) date.
pub fn parse_date(raw: &str) -> Option<String> {
    static ISO: OnceLock<Regex> = OnceLock::new();
    static US: OnceLock<Regex> = OnceLock::new();

    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if regex(&ISO, r"^\d{4}-\d{2}-\d{2}$").is_match(raw) {
        return Some(raw.to_string());
    }
    if let Some(caps) = regex(&US, r"^(\d{1,2})/(\d{1,2})/(\d{4})$").captures(raw) {
        let month: u32 = caps[1].parse().ok()?;
        let day: u32 = caps[2].parse().ok()?;
        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return None;
        }
        return Some(format!("{}-{:02}-{:02}", &caps[3], month, day));
    }
    parse_loose_date(raw).map(|d| d.format("%Y-%m-%d").to_string())
}

fn parse_loose_date(raw: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date());
        }
    }
    for fmt in ["%Y/%m/%d", "%B %d, %Y", "%b %d, %Y", "%d %B %Y", "%d %b %Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(d);
        }
    }
    None
}

/// `true|1|yes|y` and `false|0|no|n`, case-insensitive. Anything else is unset.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Some(true),
        "false" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}

/// Parses the leading integer of a cell: `"12 min"` is 12, `"3.7"` is 3.
pub fn parse_int(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let sign_len = usize::from(s.starts_with(['-', '+']));
    let digits = s[sign_len..]
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len() - sign_len);
    if digits == 0 {
        return None;
    }
    s[..sign_len + digits].parse().ok()
}

/// Splits on `|` if present, else `;`, else `,`. Entries are trimmed and empty
/// ones dropped; an empty cell gives an empty list so that clearing works.
pub fn parse_list(raw: &str) -> Vec<String> {
    let sep = ['|', ';', ',']
        .into_iter()
        .find(|sep| raw.contains(*sep))
        .unwrap_or(',');
    raw.split(sep)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Structured parse of a JSON cell; blank or invalid input is `None`.
pub fn parse_json(raw: &str) -> Option<Value> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    serde_json::from_str(raw).ok()
}

/// Splits free text on blank lines into paragraph blocks.
pub fn to_blocks(raw: &str) -> Option<Value> {
    static BLANK_LINE: OnceLock<Regex> = OnceLock::new();

    let text = raw.replace("\r\n", "\n");
    let blocks: Vec<Value> = regex(&BLANK_LINE, r"\n[ \t]*\n")
        .split(&text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            json!({
                "type": "paragraph",
                "children": [{ "type": "text", "text": p }],
            })
        })
        .collect();

    if blocks.is_empty() {
        None
    } else {
        Some(Value::Array(blocks))
    }
}

/// Trimmed text; blank is `None`.
pub fn parse_text(raw: &str) -> Option<String> {
    let raw = raw.trim();
    (!raw.is_empty()).then(|| raw.to_string())
}

/// Canonical slug: NFKD-decomposed, stripped to ASCII word characters, spaces
/// and hyphens, lower-cased, with whitespace/underscore/hyphen runs collapsed
/// to one hyphen and no hyphen at either end.
pub fn slugify(raw: &str) -> String {
    static SEPARATORS: OnceLock<Regex> = OnceLock::new();

    let kept: String = raw
        .nfkd()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .collect::<String>()
        .to_lowercase();

    regex(&SEPARATORS, r"[\s_-]+")
        .replace_all(kept.trim(), "-")
        .trim_matches('-')
        .to_string()
}

/// Case-insensitive match against a fixed set; returns the canonical entry.
pub fn parse_enum(raw: &str, allowed: &[&'static str]) -> Option<&'static str> {
    let raw = raw.trim();
    allowed.iter().copied().find(|a| a.eq_ignore_ascii_case(raw))
}
