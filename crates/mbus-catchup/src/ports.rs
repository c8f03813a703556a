//! Collaborator seams.
//!
//! The reconciler owns no IO. Stores, markers, clocks and the delivery sink are
//! supplied by the caller through these traits.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::cell::Cell;
use std::sync::Arc;

use crate::watermark::MarkerAdvance;

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Read side of the key-value store holding the catch-up list.
pub trait KeyValueStore {
    /// Keys matching a suffix-wildcard pattern (`prefix*`). Order is unspecified.
    fn list_keys(&self, pattern: &str) -> Result<Vec<String>>;

    /// `Ok(None)` when the key is missing or has expired.
    fn get_value(&self, key: &str) -> Result<Option<String>>;
}

/// Write side used by the publishing path.
pub trait RecordWriter {
    fn put_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for &T {
    fn list_keys(&self, pattern: &str) -> Result<Vec<String>> {
        (**self).list_keys(pattern)
    }

    fn get_value(&self, key: &str) -> Result<Option<String>> {
        (**self).get_value(key)
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn list_keys(&self, pattern: &str) -> Result<Vec<String>> {
        (**self).list_keys(pattern)
    }

    fn get_value(&self, key: &str) -> Result<Option<String>> {
        (**self).get_value(key)
    }
}

impl<T: RecordWriter + ?Sized> RecordWriter for &T {
    fn put_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        (**self).put_with_ttl(key, value, ttl_secs)
    }
}

impl<T: RecordWriter + ?Sized> RecordWriter for Arc<T> {
    fn put_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        (**self).put_with_ttl(key, value, ttl_secs)
    }
}

// ---------------------------------------------------------------------------
// Last-success marker
// ---------------------------------------------------------------------------

/// Read access to the last successful catch-up time (whole seconds).
pub trait LastSuccessSource {
    /// `Ok(None)` when no catch-up has ever succeeded.
    fn last_success(&self) -> Result<Option<i64>>;
}

/// Write access to the marker. Used by the caller after a successful run,
/// never by the reconciler.
pub trait LastSuccessSink {
    /// Implementations must refuse to move the marker backwards and report
    /// that as [`MarkerAdvance::Regression`] without writing.
    fn record_success(&self, secs: i64) -> Result<MarkerAdvance>;
}

impl<T: LastSuccessSource + ?Sized> LastSuccessSource for &T {
    fn last_success(&self) -> Result<Option<i64>> {
        (**self).last_success()
    }
}

impl<T: LastSuccessSource + ?Sized> LastSuccessSource for Arc<T> {
    fn last_success(&self) -> Result<Option<i64>> {
        (**self).last_success()
    }
}

impl<T: LastSuccessSink + ?Sized> LastSuccessSink for &T {
    fn record_success(&self, secs: i64) -> Result<MarkerAdvance> {
        (**self).record_success(secs)
    }
}

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

/// Receives every replayed record, once, in ascending timestamp order.
pub trait DeliverySink {
    fn deliver(&mut self, channel: &str, payload: &str);
}

impl<F> DeliverySink for F
where
    F: FnMut(&str, &str),
{
    fn deliver(&mut self, channel: &str, payload: &str) {
        self(channel, payload)
    }
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

pub trait Clock {
    fn now_utc(&self) -> DateTime<Utc>;

    /// Whole seconds since epoch.
    fn now_secs(&self) -> i64 {
        self.now_utc().timestamp()
    }
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now_utc(&self) -> DateTime<Utc> {
        (**self).now_utc()
    }
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now_utc(&self) -> DateTime<Utc> {
        (**self).now_utc()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and replays.
#[derive(Clone, Debug, Default)]
pub struct FixedClock {
    now: Cell<DateTime<Utc>>,
}

impl FixedClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Cell::new(now),
        }
    }

    /// Out-of-range seconds fall back to the epoch.
    pub fn at_secs(secs: i64) -> Self {
        Self::at(DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or_default())
    }

    pub fn set(&self, now: DateTime<Utc>) {
        self.now.set(now);
    }

    pub fn set_secs(&self, secs: i64) {
        self.set(DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or_default());
    }
}

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        self.now.get()
    }
}
