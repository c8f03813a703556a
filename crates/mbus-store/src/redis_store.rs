use anyhow::{anyhow, Context, Result};
use redis::Commands;
use std::sync::{Mutex, MutexGuard};

use mbus_catchup::ports::{KeyValueStore, RecordWriter};

/// Catch-up list stored in Redis.
///
/// Uses one blocking connection; the catch-up run is synchronous and runs once
/// before live delivery starts.
pub struct RedisStore {
    conn: Mutex<redis::Connection>,
}

impl RedisStore {
    pub fn open(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).context("failed to create redis client")?;
        let conn = client
            .get_connection()
            .context("failed to connect to redis")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Delete `key`. Returns whether it existed.
    pub fn remove(&self, key: &str) -> Result<bool> {
        let removed: usize = self
            .conn()?
            .del(key)
            .with_context(|| format!("redis DEL {key}"))?;
        Ok(removed > 0)
    }

    fn conn(&self) -> Result<MutexGuard<'_, redis::Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("redis connection lock poisoned"))
    }
}

impl KeyValueStore for RedisStore {
    fn list_keys(&self, pattern: &str) -> Result<Vec<String>> {
        let keys: Vec<String> = self
            .conn()?
            .keys(pattern)
            .with_context(|| format!("redis KEYS {pattern}"))?;
        Ok(keys)
    }

    fn get_value(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = self
            .conn()?
            .get(key)
            .with_context(|| format!("redis GET {key}"))?;
        Ok(value)
    }
}

impl RecordWriter for RedisStore {
    fn put_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let _: () = self
            .conn()?
            .set_ex(key, value, ttl_secs)
            .with_context(|| format!("redis SET {key} EX {ttl_secs}"))?;
        Ok(())
    }
}
