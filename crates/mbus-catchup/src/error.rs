use std::fmt;

// ---------------------------------------------------------------------------
// Malformed keys
// ---------------------------------------------------------------------------

/// Why a listed key could not be parsed into a [`crate::CandidateKey`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MalformedReason {
    /// The key does not split into exactly six `:`-delimited fields.
    FieldCount { got: usize },
    /// Namespace or list-name field does not match the configured layout.
    ForeignPrefix,
    /// The timestamp field is not a decimal `<secs>[.<fraction>]` string.
    BadTimestamp,
    /// A required field is empty.
    EmptyField(&'static str),
}

/// A listed key that does not follow the catch-up key layout.
///
/// Malformed keys are skipped; they never abort a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyParseError {
    pub key: String,
    pub reason: MalformedReason,
}

impl KeyParseError {
    pub(crate) fn new(key: &str, reason: MalformedReason) -> Self {
        Self {
            key: key.to_string(),
            reason,
        }
    }
}

impl fmt::Display for KeyParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            MalformedReason::FieldCount { got } => write!(
                f,
                "malformed catch-up key '{}': expected 6 fields, got {got}",
                self.key
            ),
            MalformedReason::ForeignPrefix => write!(
                f,
                "malformed catch-up key '{}': namespace or list name does not match",
                self.key
            ),
            MalformedReason::BadTimestamp => write!(
                f,
                "malformed catch-up key '{}': timestamp field is not decimal seconds",
                self.key
            ),
            MalformedReason::EmptyField(field) => {
                write!(f, "malformed catch-up key '{}': empty {field}", self.key)
            }
        }
    }
}

impl std::error::Error for KeyParseError {}

// ---------------------------------------------------------------------------
// Run failures
// ---------------------------------------------------------------------------

/// Store operation that failed during a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreOp {
    ListKeys,
    GetValue,
}

impl StoreOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreOp::ListKeys => "list_keys",
            StoreOp::GetValue => "get_value",
        }
    }
}

/// Failure that aborts a whole catch-up run.
///
/// Only [`CatchUpError::Store`] can surface after deliveries were already made.
/// On any variant the caller must not advance the last-success marker.
#[derive(Debug)]
pub enum CatchUpError {
    /// The store handle is unset. Raised before any other work.
    MissingConnection,
    /// The last-success marker could not be read.
    Marker(anyhow::Error),
    /// The store returned an error (not an absent value) for a listing or fetch.
    Store {
        op: StoreOp,
        target: String,
        source: anyhow::Error,
    },
}

impl fmt::Display for CatchUpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatchUpError::MissingConnection => {
                write!(f, "catch-up aborted: store connection is missing")
            }
            CatchUpError::Marker(err) => {
                write!(f, "catch-up aborted: last-success marker unreadable: {err}")
            }
            CatchUpError::Store { op, target, source } => write!(
                f,
                "catch-up aborted: store {} failed for '{target}': {source}",
                op.as_str()
            ),
        }
    }
}

impl std::error::Error for CatchUpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CatchUpError::MissingConnection => None,
            CatchUpError::Marker(err) => Some(err.as_ref()),
            CatchUpError::Store { source, .. } => Some(source.as_ref()),
        }
    }
}
