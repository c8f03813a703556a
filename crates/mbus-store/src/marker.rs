use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;

use mbus_catchup::ports::{LastSuccessSink, LastSuccessSource};
use mbus_catchup::{check_advance, MarkerAdvance};

/// In-process last-success marker.
#[derive(Debug, Default)]
pub struct MemoryMarker {
    secs: Mutex<Option<i64>>,
}

impl MemoryMarker {
    pub fn new(initial: Option<i64>) -> Self {
        Self {
            secs: Mutex::new(initial),
        }
    }
}

impl LastSuccessSource for MemoryMarker {
    fn last_success(&self) -> Result<Option<i64>> {
        let secs = self
            .secs
            .lock()
            .map_err(|_| anyhow!("marker lock poisoned"))?;
        Ok(*secs)
    }
}

impl LastSuccessSink for MemoryMarker {
    fn record_success(&self, secs: i64) -> Result<MarkerAdvance> {
        let mut current = self
            .secs
            .lock()
            .map_err(|_| anyhow!("marker lock poisoned"))?;
        let advance = check_advance(*current, secs);
        if advance.should_write() {
            *current = Some(secs);
        }
        Ok(advance)
    }
}

/// On-disk form of the marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerDocument {
    pub last_success_secs: i64,
    pub recorded_at_utc: DateTime<Utc>,
}

/// Last-success marker persisted as a small JSON document.
///
/// A missing file means no catch-up has ever succeeded.
#[derive(Debug, Clone)]
pub struct FileMarker {
    path: PathBuf,
}

impl FileMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_document(&self) -> Result<Option<MarkerDocument>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("read marker failed: {}", self.path.display()))
            }
        };
        let doc: MarkerDocument = serde_json::from_str(&raw)
            .with_context(|| format!("parse marker failed: {}", self.path.display()))?;
        Ok(Some(doc))
    }

    fn write_document(&self, doc: &MarkerDocument) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create marker dir failed: {}", parent.display()))?;
            }
        }

        // Write-then-rename so a crash never leaves a half-written marker.
        let tmp = self.path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(doc).context("serialize marker failed")?;
        fs::write(&tmp, format!("{json}\n"))
            .with_context(|| format!("write marker failed: {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replace marker failed: {}", self.path.display()))?;
        Ok(())
    }
}

impl LastSuccessSource for FileMarker {
    fn last_success(&self) -> Result<Option<i64>> {
        Ok(self.read_document()?.map(|d| d.last_success_secs))
    }
}

impl LastSuccessSink for FileMarker {
    fn record_success(&self, secs: i64) -> Result<MarkerAdvance> {
        let advance = check_advance(self.last_success()?, secs);
        if advance.should_write() {
            self.write_document(&MarkerDocument {
                last_success_secs: secs,
                recorded_at_utc: Utc::now(),
            })?;
            info!(path = %self.path.display(), last_success = secs, "last-success marker advanced");
        }
        Ok(advance)
    }
}
