use anyhow::Result;
use tracing::debug;

use crate::key::KeyLayout;
use crate::ports::KeyValueStore;
use crate::prefix::{shared_prefix, PrefixMatch};

/// How a run should query the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScanPlan {
    /// Last success equals now; no key can be newer.
    UpToDate,
    /// List keys matching this suffix-wildcard pattern.
    Pattern(String),
}

/// Narrow the listing to timestamps sharing the leading digits of both times.
///
/// The pattern covers every timestamp between `last_success_secs` and
/// `now_secs`, plus older keys that share the prefix; those are filtered out
/// later. When the two times have a different digit count no prefix is safe
/// and the whole list is scanned.
pub fn plan_scan(layout: &KeyLayout, last_success_secs: i64, now_secs: i64) -> ScanPlan {
    let last = last_success_secs.to_string();
    let now = now_secs.to_string();

    let prefix_len = match shared_prefix(&now, &last) {
        PrefixMatch::Identical => return ScanPlan::UpToDate,
        PrefixMatch::DiffersAt(i) => i,
        PrefixMatch::LengthMismatch => 0,
    };

    ScanPlan::Pattern(format!("{}{}*", layout.list_prefix(), &last[..prefix_len]))
}

/// Execute a scan plan: at most one listing call.
pub fn collect_keys<S: KeyValueStore + ?Sized>(store: &S, plan: &ScanPlan) -> Result<Vec<String>> {
    match plan {
        ScanPlan::UpToDate => Ok(Vec::new()),
        ScanPlan::Pattern(pattern) => {
            let keys = store.list_keys(pattern)?;
            debug!(%pattern, listed = keys.len(), "catch-up scan");
            Ok(keys)
        }
    }
}

/// Candidate keys that may be newer than `last_success_secs`. Unordered.
pub fn collect<S: KeyValueStore + ?Sized>(
    store: &S,
    layout: &KeyLayout,
    last_success_secs: i64,
    now_secs: i64,
) -> Result<Vec<String>> {
    collect_keys(store, &plan_scan(layout, last_success_secs, now_secs))
}
