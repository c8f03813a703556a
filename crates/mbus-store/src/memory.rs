use anyhow::{anyhow, bail, Result};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use mbus_catchup::ports::{Clock, KeyValueStore, RecordWriter, SystemClock};

#[derive(Clone, Debug)]
struct Entry {
    value: String,
    /// Whole seconds; `None` never expires.
    expires_at: Option<i64>,
}

impl Entry {
    fn is_expired(&self, now_secs: i64) -> bool {
        self.expires_at.is_some_and(|at| at <= now_secs)
    }
}

/// Suffix-wildcard listing pattern: `prefix*` or an exact key.
enum KeyPattern<'a> {
    Exact(&'a str),
    Prefix(&'a str),
}

impl<'a> KeyPattern<'a> {
    fn parse(pattern: &'a str) -> Result<Self> {
        let (body, wildcard) = match pattern.strip_suffix('*') {
            Some(prefix) => (prefix, true),
            None => (pattern, false),
        };
        if body.contains(|c: char| matches!(c, '*' | '?' | '[')) {
            bail!("unsupported key pattern '{pattern}': only a trailing '*' is allowed");
        }
        Ok(if wildcard {
            KeyPattern::Prefix(body)
        } else {
            KeyPattern::Exact(body)
        })
    }
}

/// In-process key-value store.
///
/// TTLs expire lazily the way a networked store does: an expired key reads as
/// absent but keeps showing up in listings until [`MemoryStore::purge_expired`]
/// runs.
pub struct MemoryStore<C = SystemClock> {
    entries: Mutex<BTreeMap<String, Entry>>,
    clock: C,
}

impl MemoryStore<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for MemoryStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> MemoryStore<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            clock,
        }
    }

    fn entries(&self) -> Result<MutexGuard<'_, BTreeMap<String, Entry>>> {
        self.entries
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))
    }

    /// Store a value with no expiry.
    pub fn insert(&self, key: &str, value: &str) -> Result<()> {
        self.entries()?.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: None,
            },
        );
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.entries()?.remove(key).is_some())
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize> {
        let now = self.clock.now_secs();
        let mut entries = self.entries()?;
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now));
        Ok(before - entries.len())
    }

    /// Entry count, expired-but-unpurged included.
    pub fn len(&self) -> Result<usize> {
        Ok(self.entries()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl<C: Clock> KeyValueStore for MemoryStore<C> {
    fn list_keys(&self, pattern: &str) -> Result<Vec<String>> {
        let pattern = KeyPattern::parse(pattern)?;
        let entries = self.entries()?;
        let keys = match pattern {
            KeyPattern::Exact(key) => entries
                .contains_key(key)
                .then(|| key.to_string())
                .into_iter()
                .collect(),
            KeyPattern::Prefix(prefix) => entries
                .range(prefix.to_string()..)
                .take_while(|(k, _)| k.starts_with(prefix))
                .map(|(k, _)| k.clone())
                .collect(),
        };
        Ok(keys)
    }

    fn get_value(&self, key: &str) -> Result<Option<String>> {
        let now = self.clock.now_secs();
        let entries = self.entries()?;
        Ok(entries
            .get(key)
            .filter(|e| !e.is_expired(now))
            .map(|e| e.value.clone()))
    }
}

impl<C: Clock> RecordWriter for MemoryStore<C> {
    fn put_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let ttl = i64::try_from(ttl_secs).unwrap_or(i64::MAX);
        let expires_at = self.clock.now_secs().saturating_add(ttl);
        self.entries()?.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(expires_at),
            },
        );
        Ok(())
    }
}
