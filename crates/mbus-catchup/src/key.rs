//! Catch-up record keys.
//!
//! Layout: `<namespace>:<list-name>:<timestamp>:<model>:<action>:<identifier>`
//!
//! The timestamp is decimal seconds since epoch with an optional fraction,
//! e.g. `1370533530.12034`. It is parsed exactly into whole seconds plus
//! nanoseconds so ordering never depends on float rounding.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::fmt;

use crate::error::{KeyParseError, MalformedReason};

pub const KEY_DELIMITER: char = ':';

/// Characters a store's key-listing pattern treats specially.
pub const PATTERN_METACHARS: &[char] = &['*', '?', '[', ']', '\\'];

const KEY_FIELDS: usize = 6;
const NANOS_DIGITS: usize = 9;

// ---------------------------------------------------------------------------
// Timestamp
// ---------------------------------------------------------------------------

/// Timestamp field of a catch-up key.
///
/// Equality and ordering compare the numeric value only; `"5.1"` and `"5.10"`
/// are equal. The parsed text is kept for key rendering.
#[derive(Clone, Debug)]
pub struct RecordTimestamp {
    secs: i64,
    nanos: u32,
    raw: String,
}

impl RecordTimestamp {
    /// Parse `<digits>[.<1..=9 digits>]`. Signs, exponents and blanks are rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        let (int_part, frac_part) = match raw.split_once('.') {
            Some((i, f)) => (i, Some(f)),
            None => (raw, None),
        };
        if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let secs: i64 = int_part.parse().ok()?;

        let nanos = match frac_part {
            None => 0,
            Some(f) => {
                if f.is_empty() || f.len() > NANOS_DIGITS || !f.bytes().all(|b| b.is_ascii_digit())
                {
                    return None;
                }
                let padded = format!("{f:0<width$}", width = NANOS_DIGITS);
                padded.parse().ok()?
            }
        };

        Some(Self {
            secs,
            nanos,
            raw: raw.to_string(),
        })
    }

    /// Render a wall-clock instant with microsecond precision: `<secs>.<6 digits>`.
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        let secs = at.timestamp();
        let micros = at.timestamp_subsec_micros();
        Self {
            secs,
            nanos: micros * 1_000,
            raw: format!("{secs}.{micros:06}"),
        }
    }

    pub fn secs(&self) -> i64 {
        self.secs
    }

    pub fn subsec_nanos(&self) -> u32 {
        self.nanos
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Strictly later than the whole second `secs`.
    ///
    /// `secs.0` is not after `secs`; `secs.00001` is.
    pub fn is_after_secs(&self, secs: i64) -> bool {
        self.secs > secs || (self.secs == secs && self.nanos > 0)
    }
}

impl PartialEq for RecordTimestamp {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RecordTimestamp {}

impl PartialOrd for RecordTimestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RecordTimestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.secs, self.nanos).cmp(&(other.secs, other.nanos))
    }
}

impl fmt::Display for RecordTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// True when `s` can be a namespace or list name: non-empty, no key delimiter
/// and nothing a listing pattern would read as a wildcard.
pub fn is_layout_segment(s: &str) -> bool {
    !s.is_empty() && !s.contains(|c: char| c == KEY_DELIMITER || PATTERN_METACHARS.contains(&c))
}

/// Namespace and list name shared by every key of one catch-up list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyLayout {
    namespace: String,
    list_name: String,
}

impl KeyLayout {
    pub fn new(namespace: impl Into<String>, list_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            list_name: list_name.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn list_name(&self) -> &str {
        &self.list_name
    }

    /// `<namespace>:<list-name>:`
    pub fn list_prefix(&self) -> String {
        format!(
            "{}{KEY_DELIMITER}{}{KEY_DELIMITER}",
            self.namespace, self.list_name
        )
    }

    pub fn key_for(
        &self,
        timestamp: &RecordTimestamp,
        model: &str,
        action: &str,
        identifier: &str,
    ) -> String {
        format!(
            "{}{timestamp}{KEY_DELIMITER}{model}{KEY_DELIMITER}{action}{KEY_DELIMITER}{identifier}",
            self.list_prefix()
        )
    }

    /// Parse a listed key. Fails with a typed reason instead of guessing.
    pub fn parse(&self, raw: &str) -> Result<CandidateKey, KeyParseError> {
        let fields: Vec<&str> = raw.split(KEY_DELIMITER).collect();
        if fields.len() != KEY_FIELDS {
            return Err(KeyParseError::new(
                raw,
                MalformedReason::FieldCount { got: fields.len() },
            ));
        }
        if fields[0] != self.namespace || fields[1] != self.list_name {
            return Err(KeyParseError::new(raw, MalformedReason::ForeignPrefix));
        }

        let timestamp = RecordTimestamp::parse(fields[2])
            .ok_or_else(|| KeyParseError::new(raw, MalformedReason::BadTimestamp))?;

        for (name, value) in [
            ("model", fields[3]),
            ("action", fields[4]),
            ("identifier", fields[5]),
        ] {
            if value.is_empty() {
                return Err(KeyParseError::new(raw, MalformedReason::EmptyField(name)));
            }
        }

        Ok(CandidateKey {
            raw: raw.to_string(),
            timestamp,
            model: fields[3].to_string(),
            action: fields[4].to_string(),
            identifier: fields[5].to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Candidate
// ---------------------------------------------------------------------------

/// Parsed form of a listed key. Lives for one reconciliation pass only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidateKey {
    raw: String,
    pub timestamp: RecordTimestamp,
    pub model: String,
    pub action: String,
    pub identifier: String,
}

impl CandidateKey {
    /// The key exactly as the store listed it.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// `<model>:<action>`
    pub fn channel(&self) -> String {
        format!("{}{KEY_DELIMITER}{}", self.model, self.action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> KeyLayout {
        KeyLayout::new("jupiter", "action_list")
    }

    #[test]
    fn layout_segments_reject_delimiter_and_wildcards() {
        assert!(is_layout_segment("jupiter"));
        assert!(is_layout_segment("action_list-v2"));
        for bad in ["", "a:b", "jupiter*", "jup?ter", "jupiter[eu]", "eu]", "back\\slash"] {
            assert!(!is_layout_segment(bad), "{bad:?} accepted");
        }
    }

    #[test]
    fn parses_all_fields() {
        let k = layout()
            .parse("jupiter:action_list:1370533530.12034:contact:update:106")
            .unwrap();
        assert_eq!(k.timestamp.secs(), 1_370_533_530);
        assert_eq!(k.timestamp.subsec_nanos(), 120_340_000);
        assert_eq!(k.model, "contact");
        assert_eq!(k.action, "update");
        assert_eq!(k.identifier, "106");
        assert_eq!(k.channel(), "contact:update");
    }

    #[test]
    fn wrong_field_count_is_malformed() {
        let err = layout()
            .parse("jupiter:action_list:1370533530.12034:contact:update")
            .unwrap_err();
        assert_eq!(err.reason, MalformedReason::FieldCount { got: 5 });

        let err = layout()
            .parse("jupiter:action_list:1370533530.1:contact:update:1:extra")
            .unwrap_err();
        assert_eq!(err.reason, MalformedReason::FieldCount { got: 7 });
    }

    #[test]
    fn foreign_prefix_is_malformed() {
        let err = layout()
            .parse("saturn:action_list:1370533530.12034:contact:update:106")
            .unwrap_err();
        assert_eq!(err.reason, MalformedReason::ForeignPrefix);
    }

    #[test]
    fn non_decimal_timestamp_is_malformed() {
        for ts in ["", "abc", "-1", "1e9", "1.", ".5", "1.1234567890"] {
            let raw = format!("jupiter:action_list:{ts}:contact:update:1");
            let err = layout().parse(&raw).unwrap_err();
            assert_eq!(err.reason, MalformedReason::BadTimestamp, "ts={ts:?}");
        }
    }

    #[test]
    fn empty_model_is_malformed() {
        let err = layout()
            .parse("jupiter:action_list:1370533530::update:1")
            .unwrap_err();
        assert_eq!(err.reason, MalformedReason::EmptyField("model"));
    }

    #[test]
    fn timestamp_equality_is_numeric() {
        let a = RecordTimestamp::parse("5.1").unwrap();
        let b = RecordTimestamp::parse("5.100").unwrap();
        assert_eq!(a, b);
        assert!(RecordTimestamp::parse("5.01").unwrap() < a);
    }

    #[test]
    fn strictly_after_whole_second() {
        assert!(!RecordTimestamp::parse("100").unwrap().is_after_secs(100));
        assert!(!RecordTimestamp::parse("100.0").unwrap().is_after_secs(100));
        assert!(RecordTimestamp::parse("100.00001").unwrap().is_after_secs(100));
        assert!(RecordTimestamp::parse("101").unwrap().is_after_secs(100));
        assert!(!RecordTimestamp::parse("99.9").unwrap().is_after_secs(100));
    }

    #[test]
    fn datetime_rendering_keeps_micros() {
        let at = DateTime::<Utc>::from_timestamp(1_370_533_530, 120_340_000).unwrap();
        let ts = RecordTimestamp::from_datetime(at);
        assert_eq!(ts.as_str(), "1370533530.120340");
        assert_eq!(ts, RecordTimestamp::parse("1370533530.12034").unwrap());
    }

    #[test]
    fn key_for_round_trips_through_parse() {
        let ts = RecordTimestamp::parse("1370533530.12034").unwrap();
        let key = layout().key_for(&ts, "contact", "update", "106");
        assert_eq!(key, "jupiter:action_list:1370533530.12034:contact:update:106");
        assert_eq!(layout().parse(&key).unwrap().timestamp, ts);
    }
}
