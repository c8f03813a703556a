//! Typed settings read from the merged config JSON.
//!
//! # Contract
//! - The config stores the store URL's env var NAME (`store.url_env`), never
//!   the URL itself.
//! - Callers resolve the URL once via [`StoreSettings::resolve_url`] and pass
//!   the result into the store constructor.
//! - [`ResolvedStoreUrl`] redacts its value in `Debug` output; errors name the
//!   env var, never its value.

use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;

use mbus_catchup::{
    is_layout_segment, split_channel, ChannelAllowList, KeyLayout, DEFAULT_RECORD_TTL_SECS,
    KEY_DELIMITER, PATTERN_METACHARS,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatchUpSettings {
    pub namespace: String,
    pub list_name: String,
    /// `model:action` entries, as written in the config.
    pub channels: Vec<String>,
    pub record_ttl_secs: u64,
}

impl CatchUpSettings {
    pub fn key_layout(&self) -> KeyLayout {
        KeyLayout::new(self.namespace.clone(), self.list_name.clone())
    }

    pub fn allow_list(&self) -> ChannelAllowList {
        ChannelAllowList::new(self.channels.iter().cloned())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreSettings {
    /// Name of the env var holding the store URL.
    pub url_env: String,
}

/// Store URL read from the environment. Redacted in `Debug`.
#[derive(Clone)]
pub struct ResolvedStoreUrl(String);

impl ResolvedStoreUrl {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ResolvedStoreUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ResolvedStoreUrl(REDACTED)")
    }
}

impl StoreSettings {
    pub fn resolve_url(&self) -> Result<ResolvedStoreUrl> {
        self.resolve_url_with(|name| std::env::var(name).ok())
    }

    /// Resolve through an explicit lookup (tests, alternative secret sources).
    pub fn resolve_url_with<F>(&self, lookup: F) -> Result<ResolvedStoreUrl>
    where
        F: Fn(&str) -> Option<String>,
    {
        match lookup(&self.url_env) {
            Some(url) if !url.trim().is_empty() => Ok(ResolvedStoreUrl(url)),
            Some(_) => bail!("store url env {} is set but empty", self.url_env),
            None => bail!("missing env {}", self.url_env),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarkerSettings {
    pub path: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub catch_up: CatchUpSettings,
    pub store: StoreSettings,
    pub marker: MarkerSettings,
}

impl Settings {
    /// Build from canonical config JSON (produced by `load_layered_yaml*`).
    ///
    /// Required:
    /// - catch_up.namespace, catch_up.list_name (non-empty, no ':', no glob
    ///   metacharacters; both are embedded verbatim in the listing pattern)
    /// - catch_up.channels (non-empty list of "model:action")
    /// - store.url_env
    /// - marker.path
    ///
    /// Optional:
    /// - catch_up.record_ttl_secs (positive integer); default 21600
    pub fn from_config_json(cfg: &Value) -> Result<Self> {
        let namespace = key_segment(cfg, "/catch_up/namespace", "catch_up.namespace")?;
        let list_name = key_segment(cfg, "/catch_up/list_name", "catch_up.list_name")?;

        let raw_channels = cfg
            .pointer("/catch_up/channels")
            .and_then(Value::as_array)
            .context("config missing catch_up.channels")?;
        if raw_channels.is_empty() {
            bail!("catch_up.channels must list at least one 'model:action' channel");
        }
        let mut channels = Vec::with_capacity(raw_channels.len());
        for (i, v) in raw_channels.iter().enumerate() {
            let ch = v
                .as_str()
                .ok_or_else(|| anyhow!("catch_up.channels[{i}] must be a string"))?;
            if split_channel(ch).is_none() {
                bail!("catch_up.channels[{i}] must be 'model:action' (got '{ch}')");
            }
            channels.push(ch.to_string());
        }

        let record_ttl_secs = match cfg.pointer("/catch_up/record_ttl_secs") {
            None | Some(Value::Null) => DEFAULT_RECORD_TTL_SECS,
            Some(v) => match v.as_u64() {
                Some(n) if n > 0 => n,
                _ => bail!("catch_up.record_ttl_secs must be a positive integer (got {v})"),
            },
        };

        let url_env = cfg
            .pointer("/store/url_env")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .context("config missing store.url_env")?;

        let marker_path = cfg
            .pointer("/marker/path")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .context("config missing marker.path")?;

        Ok(Self {
            catch_up: CatchUpSettings {
                namespace,
                list_name,
                channels,
                record_ttl_secs,
            },
            store: StoreSettings {
                url_env: url_env.to_string(),
            },
            marker: MarkerSettings {
                path: PathBuf::from(marker_path),
            },
        })
    }
}

fn key_segment(cfg: &Value, pointer: &str, name: &str) -> Result<String> {
    let s = cfg
        .pointer(pointer)
        .and_then(Value::as_str)
        .with_context(|| format!("config missing {name}"))?;
    if !is_layout_segment(s) {
        let banned: String = PATTERN_METACHARS.iter().collect();
        bail!("{name} must be non-empty and contain none of '{KEY_DELIMITER}{banned}' (got '{s}')");
    }
    Ok(s.to_string())
}
