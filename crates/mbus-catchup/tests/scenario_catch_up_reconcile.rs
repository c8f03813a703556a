//! Scenario: catch-up reconcile over a scripted store
//!
//! # Invariants under test
//!
//! 1. The scan pattern is built from the shared prefix of last success and now.
//! 2. Only records strictly newer than the last-success second are delivered.
//! 3. Deliveries follow ascending timestamp order regardless of listing order.
//! 4. Channels outside the allow list never reach the sink.
//! 5. No marker: zero store calls, zero deliveries.
//! 6. No store handle: MissingConnection before any listing.
//! 7. Expired, malformed and undecodable records are skipped without failing.
//! 8. A store error aborts the run and the phase returns to Idle.
//! 9. Two runs without a marker update deliver the same set twice.

use anyhow::{anyhow, Result};
use std::cell::RefCell;
use std::collections::BTreeMap;

use mbus_catchup::ports::{FixedClock, KeyValueStore, LastSuccessSource};
use mbus_catchup::{
    CatchUpError, CatchUpOutcome, CatchUpReconciler, ChannelAllowList, KeyLayout, RunPhase,
    SkipReason, StoreOp,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ScriptedStore {
    listed: Vec<String>,
    values: BTreeMap<String, String>,
    fail_get: bool,
    calls: RefCell<Vec<String>>,
}

impl ScriptedStore {
    fn with_keys(keys: &[&str]) -> Self {
        let mut s = Self::default();
        for k in keys {
            s.listed.push(k.to_string());
            s.values.insert(k.to_string(), format!("{{\"key\":\"{k}\"}}"));
        }
        s
    }

    fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl KeyValueStore for ScriptedStore {
    fn list_keys(&self, pattern: &str) -> Result<Vec<String>> {
        self.calls.borrow_mut().push(format!("keys {pattern}"));
        Ok(self.listed.clone())
    }

    fn get_value(&self, key: &str) -> Result<Option<String>> {
        self.calls.borrow_mut().push(format!("get {key}"));
        if self.fail_get {
            return Err(anyhow!("connection reset"));
        }
        Ok(self.values.get(key).cloned())
    }
}

struct Marker(Option<i64>);

impl LastSuccessSource for Marker {
    fn last_success(&self) -> Result<Option<i64>> {
        Ok(self.0)
    }
}

const K530: &str = "jupiter:action_list:1370533530.12034:contact:update:106";
const K458: &str = "jupiter:action_list:1370533458.10278:contact:update:107";
const K534: &str = "jupiter:action_list:1370533534.67259:contact:update:103";
const K526: &str = "jupiter:action_list:1370533526.42493:contact:update:108";

fn reconciler<'a>(
    store: Option<&'a ScriptedStore>,
    last_success: Option<i64>,
    now: i64,
    channels: &[&str],
) -> CatchUpReconciler<&'a ScriptedStore, Marker, FixedClock> {
    CatchUpReconciler::new(
        KeyLayout::new("jupiter", "action_list"),
        ChannelAllowList::new(channels.iter().copied()),
        store,
        Marker(last_success),
    )
    .with_clock(FixedClock::at_secs(now))
}

fn run(
    r: &mut CatchUpReconciler<&ScriptedStore, Marker, FixedClock>,
) -> (Result<mbus_catchup::CatchUpReport, CatchUpError>, Vec<(String, String)>) {
    let mut delivered = Vec::new();
    let mut sink = |channel: &str, payload: &str| {
        delivered.push((channel.to_string(), payload.to_string()));
    };
    let result = r.reconcile(&mut sink);
    (result, delivered)
}

// ---------------------------------------------------------------------------
// 1–3. Pattern, recency filter, ordering
// ---------------------------------------------------------------------------

#[test]
fn only_newer_records_are_delivered_in_timestamp_order() {
    let store = ScriptedStore::with_keys(&[K530, K458, K534, K526]);
    let mut r = reconciler(Some(&store), Some(1_370_533_529), 1_370_533_560, &["contact:update"]);

    let (result, delivered) = run(&mut r);
    let report = result.unwrap();

    assert_eq!(report.outcome, CatchUpOutcome::Completed);
    assert_eq!(report.now_secs, 1_370_533_560);
    assert_eq!(report.counts.listed, 4);
    assert_eq!(report.counts.stale, 2);
    assert_eq!(report.counts.delivered, 2);
    assert_eq!(
        report.last_delivered.as_ref().map(|t| t.as_str()),
        Some("1370533534.67259")
    );

    let payloads: Vec<&str> = delivered.iter().map(|(_, p)| p.as_str()).collect();
    let expected = vec![
        format!("{{\"key\":\"{K530}\"}}"),
        format!("{{\"key\":\"{K534}\"}}"),
    ];
    assert_eq!(payloads, expected);
    assert!(delivered.iter().all(|(c, _)| c == "contact:update"));

    let calls = store.calls();
    assert_eq!(calls[0], "keys jupiter:action_list:13705335*");
    assert_eq!(calls.len(), 3, "one listing plus one fetch per surviving record");
}

#[test]
fn record_at_exactly_the_marker_second_is_not_redelivered() {
    let at_marker = "jupiter:action_list:1370533529:contact:update:1";
    let just_after = "jupiter:action_list:1370533529.00001:contact:update:2";
    let store = ScriptedStore::with_keys(&[just_after, at_marker]);
    let mut r = reconciler(Some(&store), Some(1_370_533_529), 1_370_533_560, &["contact:update"]);

    let (result, delivered) = run(&mut r);
    let report = result.unwrap();
    assert_eq!(report.counts.stale, 1);
    assert_eq!(delivered.len(), 1);
    assert!(delivered[0].1.contains(just_after));
}

// ---------------------------------------------------------------------------
// 4. Channel allow list
// ---------------------------------------------------------------------------

#[test]
fn unsubscribed_channel_never_reaches_sink() {
    let contact = "jupiter:action_list:1370533530.12034:contact:update:106";
    let account = "jupiter:action_list:1370533531.5:account:update:1";
    let store = ScriptedStore::with_keys(&[account, contact]);
    let mut r = reconciler(Some(&store), Some(1), 2, &["contact:update"]);

    let (result, delivered) = run(&mut r);
    let report = result.unwrap();

    assert_eq!(report.counts.unsubscribed, 1);
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].0, "contact:update");
    assert!(
        !store.calls().iter().any(|c| c.contains("account")),
        "filtered records are never fetched"
    );
}

// ---------------------------------------------------------------------------
// 5–6. Preconditions
// ---------------------------------------------------------------------------

#[test]
fn missing_marker_is_a_no_op() {
    let store = ScriptedStore::with_keys(&[K530]);
    let mut r = reconciler(Some(&store), None, 1_370_533_560, &["contact:update"]);

    let (result, delivered) = run(&mut r);
    let report = result.unwrap();

    assert_eq!(report.outcome, CatchUpOutcome::Skipped(SkipReason::NoMarker));
    assert!(delivered.is_empty());
    assert!(store.calls().is_empty(), "no store calls without a marker");
}

#[test]
fn marker_equal_to_now_is_up_to_date() {
    let store = ScriptedStore::with_keys(&[K530]);
    let mut r = reconciler(Some(&store), Some(1_370_533_560), 1_370_533_560, &["contact:update"]);

    let (result, delivered) = run(&mut r);
    assert_eq!(
        result.unwrap().outcome,
        CatchUpOutcome::Skipped(SkipReason::UpToDate)
    );
    assert!(delivered.is_empty());
    assert!(store.calls().is_empty());
}

#[test]
fn missing_store_fails_before_collection() {
    let mut r = reconciler(None, Some(1_370_533_529), 1_370_533_560, &["contact:update"]);

    let (result, delivered) = run(&mut r);
    assert!(matches!(result, Err(CatchUpError::MissingConnection)));
    assert!(delivered.is_empty());
    assert_eq!(r.phase(), RunPhase::Idle);
}

#[test]
fn store_can_be_reconnected() {
    let store = ScriptedStore::with_keys(&[K530]);
    let mut r = reconciler(None, Some(1_370_533_529), 1_370_533_560, &["contact:update"]);
    assert!(matches!(run(&mut r).0, Err(CatchUpError::MissingConnection)));

    assert!(r.replace_store(Some(&store)).is_none());
    let (result, delivered) = run(&mut r);
    assert!(result.unwrap().is_completed());
    assert_eq!(delivered.len(), 1);
}

// ---------------------------------------------------------------------------
// 7. Per-key failures are isolated
// ---------------------------------------------------------------------------

#[test]
fn per_key_failures_do_not_abort_the_run() {
    let expired = "jupiter:action_list:1370533531:contact:update:expired";
    let garbage = "jupiter:action_list:not-a-time:contact:update:1";
    let bad_json = "jupiter:action_list:1370533532:contact:update:bad";
    let good = "jupiter:action_list:1370533533:contact:update:good";

    let mut store = ScriptedStore::with_keys(&[good, bad_json, garbage, expired]);
    store.values.remove(expired);
    store.values.insert(bad_json.to_string(), "{not json".to_string());

    let mut r = reconciler(Some(&store), Some(1_370_533_529), 1_370_533_560, &["contact:update"]);
    let (result, delivered) = run(&mut r);
    let report = result.unwrap();

    assert_eq!(report.counts.malformed, 1);
    assert_eq!(report.counts.expired, 1);
    assert_eq!(report.counts.undecodable, 1);
    assert_eq!(report.counts.delivered, 1);
    assert_eq!(delivered.len(), 1);
    assert!(delivered[0].1.contains("good"));
}

// ---------------------------------------------------------------------------
// 8. Store errors abort
// ---------------------------------------------------------------------------

#[test]
fn store_error_aborts_and_resets_phase() {
    let mut store = ScriptedStore::with_keys(&[K530]);
    store.fail_get = true;
    let mut r = reconciler(Some(&store), Some(1_370_533_529), 1_370_533_560, &["contact:update"]);

    let (result, delivered) = run(&mut r);
    match result {
        Err(CatchUpError::Store { op, target, .. }) => {
            assert_eq!(op, StoreOp::GetValue);
            assert_eq!(target, K530);
        }
        other => panic!("expected store error, got {other:?}"),
    }
    assert!(delivered.is_empty());
    assert_eq!(r.phase(), RunPhase::Idle);
}

// ---------------------------------------------------------------------------
// 9. Idempotence without marker update
// ---------------------------------------------------------------------------

#[test]
fn rerun_without_marker_update_redelivers_same_set() {
    let store = ScriptedStore::with_keys(&[K530, K458, K534, K526]);
    let mut r = reconciler(Some(&store), Some(1_370_533_529), 1_370_533_560, &["contact:update"]);

    let (first, a) = run(&mut r);
    let (second, b) = run(&mut r);

    assert_eq!(first.unwrap().counts, second.unwrap().counts);
    assert_eq!(a, b);
    assert_eq!(a.len(), 2);
}
