//! Writing side of the catch-up list.
//!
//! Every message published on the bus is also stored under a timestamped key
//! with a TTL so offline subscribers can recover it later.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::debug;

use crate::channel::split_channel;
use crate::key::{KeyLayout, RecordTimestamp, KEY_DELIMITER};
use crate::ports::{Clock, RecordWriter, SystemClock};

/// Records are kept for six hours; a subscriber offline longer loses them.
pub const DEFAULT_RECORD_TTL_SECS: u64 = 6 * 60 * 60;

pub struct CatchUpPublisher<W, C = SystemClock> {
    layout: KeyLayout,
    writer: W,
    clock: C,
    ttl_secs: u64,
}

impl<W: RecordWriter> CatchUpPublisher<W, SystemClock> {
    pub fn new(layout: KeyLayout, writer: W) -> Self {
        Self {
            layout,
            writer,
            clock: SystemClock,
            ttl_secs: DEFAULT_RECORD_TTL_SECS,
        }
    }
}

impl<W: RecordWriter, C: Clock> CatchUpPublisher<W, C> {
    pub fn with_clock<C2: Clock>(self, clock: C2) -> CatchUpPublisher<W, C2> {
        CatchUpPublisher {
            layout: self.layout,
            writer: self.writer,
            clock,
            ttl_secs: self.ttl_secs,
        }
    }

    pub fn with_ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    /// Store `message` as JSON under a key stamped with the current time.
    pub fn record<T: Serialize + ?Sized>(
        &self,
        channel: &str,
        identifier: &str,
        message: &T,
    ) -> Result<String> {
        let at = RecordTimestamp::from_datetime(self.clock.now_utc());
        self.record_at(channel, identifier, message, &at)
    }

    /// Store `message` under an explicit timestamp. Returns the written key.
    pub fn record_at<T: Serialize + ?Sized>(
        &self,
        channel: &str,
        identifier: &str,
        message: &T,
        at: &RecordTimestamp,
    ) -> Result<String> {
        let Some((model, action)) = split_channel(channel) else {
            bail!("catch-up channel must be 'model:action' (got '{channel}')");
        };
        if identifier.is_empty() || identifier.contains(KEY_DELIMITER) {
            bail!("catch-up identifier must be non-empty and contain no '{KEY_DELIMITER}' (got '{identifier}')");
        }
        if self.ttl_secs == 0 {
            bail!("catch-up record ttl must be positive");
        }

        let payload = serde_json::to_string(message).context("serialize catch-up payload")?;
        let key = self.layout.key_for(at, model, action, identifier);
        self.writer
            .put_with_ttl(&key, &payload, self.ttl_secs)
            .with_context(|| format!("write catch-up record {key}"))?;

        debug!(%key, ttl_secs = self.ttl_secs, "catch-up record written");
        Ok(key)
    }
}
