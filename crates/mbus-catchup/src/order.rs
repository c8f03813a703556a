use tracing::warn;

use crate::error::KeyParseError;
use crate::key::{CandidateKey, KeyLayout};

/// Listed keys split into parsed candidates (ascending by timestamp) and
/// keys that did not follow the layout.
#[derive(Clone, Debug, Default)]
pub struct OrderedKeys {
    pub candidates: Vec<CandidateKey>,
    pub malformed: Vec<KeyParseError>,
}

impl OrderedKeys {
    /// Raw keys in replay order.
    pub fn raw_keys(&self) -> Vec<&str> {
        self.candidates.iter().map(CandidateKey::raw).collect()
    }
}

/// Parse and sort keys by their numeric timestamp.
///
/// The sort is stable: keys with equal timestamps keep listing order.
pub fn order_keys<I>(layout: &KeyLayout, keys: I) -> OrderedKeys
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut out = OrderedKeys::default();
    for key in keys {
        match layout.parse(key.as_ref()) {
            Ok(candidate) => out.candidates.push(candidate),
            Err(err) => {
                warn!(key = %err.key, reason = ?err.reason, "skipping malformed catch-up key");
                out.malformed.push(err);
            }
        }
    }
    out.candidates.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    out
}
