use serde::de::IgnoredAny;
use tracing::{debug, info, warn};

use crate::channel::ChannelAllowList;
use crate::collect::{collect_keys, plan_scan, ScanPlan};
use crate::error::{CatchUpError, StoreOp};
use crate::key::{KeyLayout, RecordTimestamp};
use crate::order::order_keys;
use crate::ports::{Clock, DeliverySink, KeyValueStore, LastSuccessSink, LastSuccessSource, SystemClock};
use crate::watermark::MarkerAdvance;

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Where a run is. Always [`RunPhase::Idle`] between runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Scanning,
    Ordering,
    Replaying,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// No catch-up has ever succeeded; there is nothing to reconcile against.
    NoMarker,
    /// The marker equals the current second.
    UpToDate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CatchUpOutcome {
    Skipped(SkipReason),
    Completed,
}

/// Per-run tallies. Every listed key lands in exactly one bucket.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CatchUpCounts {
    pub listed: usize,
    pub malformed: usize,
    /// At or before the last-success second.
    pub stale: usize,
    /// Channel not in the allow list.
    pub unsubscribed: usize,
    /// Value gone by the time it was fetched.
    pub expired: usize,
    /// Value is not valid JSON.
    pub undecodable: usize,
    pub delivered: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatchUpReport {
    pub outcome: CatchUpOutcome,
    /// The "now" this run scanned up to; the value to record as last success.
    pub now_secs: i64,
    pub counts: CatchUpCounts,
    /// Timestamp of the last record handed to the sink.
    pub last_delivered: Option<RecordTimestamp>,
}

impl CatchUpReport {
    fn skipped(reason: SkipReason, now_secs: i64) -> Self {
        Self {
            outcome: CatchUpOutcome::Skipped(reason),
            now_secs,
            counts: CatchUpCounts::default(),
            last_delivered: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.outcome == CatchUpOutcome::Completed
    }
}

/// Record a successful run's scan time as the new last-success marker.
///
/// Call only with the `Ok` report of a run; a failed run has no report.
pub fn advance_marker<M: LastSuccessSink + ?Sized>(
    report: &CatchUpReport,
    marker: &M,
) -> anyhow::Result<MarkerAdvance> {
    let advance = marker.record_success(report.now_secs)?;
    if let MarkerAdvance::Regression { current, got } = advance {
        warn!(current, got, "last-success marker not moved backwards");
    }
    Ok(advance)
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// Replays catch-up records a subscriber missed while offline.
///
/// `reconcile` borrows the reconciler mutably, so one instance can never run
/// two passes at once.
pub struct CatchUpReconciler<S, M, C = SystemClock> {
    layout: KeyLayout,
    channels: ChannelAllowList,
    store: Option<S>,
    marker: M,
    clock: C,
    phase: RunPhase,
}

impl<S, M> CatchUpReconciler<S, M, SystemClock>
where
    S: KeyValueStore,
    M: LastSuccessSource,
{
    pub fn new(layout: KeyLayout, channels: ChannelAllowList, store: Option<S>, marker: M) -> Self {
        Self {
            layout,
            channels,
            store,
            marker,
            clock: SystemClock,
            phase: RunPhase::Idle,
        }
    }
}

impl<S, M, C> CatchUpReconciler<S, M, C>
where
    S: KeyValueStore,
    M: LastSuccessSource,
    C: Clock,
{
    pub fn with_clock<C2: Clock>(self, clock: C2) -> CatchUpReconciler<S, M, C2> {
        CatchUpReconciler {
            layout: self.layout,
            channels: self.channels,
            store: self.store,
            marker: self.marker,
            clock,
            phase: self.phase,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn layout(&self) -> &KeyLayout {
        &self.layout
    }

    pub fn channels(&self) -> &ChannelAllowList {
        &self.channels
    }

    /// Swap the store handle (e.g. after a reconnect). Returns the old one.
    pub fn replace_store(&mut self, store: Option<S>) -> Option<S> {
        std::mem::replace(&mut self.store, store)
    }

    /// Run one catch-up pass, delivering missed records to `sink` in order.
    ///
    /// The marker is only read. On `Ok` the caller should record
    /// [`CatchUpReport::now_secs`] (see [`advance_marker`]); on `Err` it must not.
    pub fn reconcile<D: DeliverySink + ?Sized>(
        &mut self,
        sink: &mut D,
    ) -> Result<CatchUpReport, CatchUpError> {
        let result = self.run(sink);
        self.phase = RunPhase::Idle;
        result
    }

    fn run<D: DeliverySink + ?Sized>(&mut self, sink: &mut D) -> Result<CatchUpReport, CatchUpError> {
        let Self {
            layout,
            channels,
            store,
            marker,
            clock,
            phase,
        } = self;

        let store = store.as_ref().ok_or(CatchUpError::MissingConnection)?;
        let now_secs = clock.now_secs();

        let Some(last_success) = marker.last_success().map_err(CatchUpError::Marker)? else {
            debug!("no last-success marker; catch-up skipped");
            return Ok(CatchUpReport::skipped(SkipReason::NoMarker, now_secs));
        };

        // Scanning
        *phase = RunPhase::Scanning;
        let plan = plan_scan(layout, last_success, now_secs);
        let ScanPlan::Pattern(pattern) = &plan else {
            debug!(last_success, "catch-up already up to date");
            return Ok(CatchUpReport::skipped(SkipReason::UpToDate, now_secs));
        };
        let keys = collect_keys(store, &plan).map_err(|source| CatchUpError::Store {
            op: StoreOp::ListKeys,
            target: pattern.clone(),
            source,
        })?;

        // Ordering
        *phase = RunPhase::Ordering;
        let mut counts = CatchUpCounts {
            listed: keys.len(),
            ..CatchUpCounts::default()
        };
        let ordered = order_keys(layout, &keys);
        counts.malformed = ordered.malformed.len();

        // Replaying
        *phase = RunPhase::Replaying;
        let mut last_delivered = None;
        for candidate in ordered.candidates {
            if !candidate.timestamp.is_after_secs(last_success) {
                counts.stale += 1;
                continue;
            }

            let channel = candidate.channel();
            if !channels.contains(&channel) {
                counts.unsubscribed += 1;
                continue;
            }

            let fetched = store
                .get_value(candidate.raw())
                .map_err(|source| CatchUpError::Store {
                    op: StoreOp::GetValue,
                    target: candidate.raw().to_string(),
                    source,
                })?;
            let Some(payload) = fetched else {
                debug!(key = candidate.raw(), "catch-up record expired before fetch");
                counts.expired += 1;
                continue;
            };

            if let Err(err) = serde_json::from_str::<IgnoredAny>(&payload) {
                warn!(key = candidate.raw(), %channel, error = %err, "undecodable catch-up payload skipped");
                counts.undecodable += 1;
                continue;
            }

            sink.deliver(&channel, &payload);
            counts.delivered += 1;
            last_delivered = Some(candidate.timestamp);
        }

        info!(
            last_success,
            now = now_secs,
            listed = counts.listed,
            delivered = counts.delivered,
            malformed = counts.malformed,
            stale = counts.stale,
            unsubscribed = counts.unsubscribed,
            expired = counts.expired,
            undecodable = counts.undecodable,
            "catch-up complete"
        );

        Ok(CatchUpReport {
            outcome: CatchUpOutcome::Completed,
            now_secs,
            counts,
            last_delivered,
        })
    }
}
