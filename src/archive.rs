use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Writes fetched payloads under `<root>/<kind>/<kind>_<id>_<timestamp>.json`.
#[derive(Debug, Clone)]
pub struct RawArchive {
    root: PathBuf,
    enabled: bool,
}

#[derive(Serialize)]
struct Envelope<'a> {
    fetched_at: String,
    kind: &'a str,
    id: &'a str,
    payload: &'a Value,
}

impl RawArchive {
    pub fn new(root: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            root: root.into(),
            enabled,
        }
    }

    pub fn disabled() -> Self {
        Self::new(PathBuf::new(), false)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Archiving is best effort: failures are logged and `None` returned.
    pub fn save(&self, kind: &str, id: &str, payload: &Value) -> Option<PathBuf> {
        if !self.enabled {
            return None;
        }
        match self.write(kind, id, payload) {
            Ok(path) => {
                debug!(path = %path.display(), "archived raw payload");
                Some(path)
            }
            Err(err) => {
                warn!(kind, id, error = %format!("{err:#}"), "failed to archive raw payload");
                None
            }
        }
    }

    fn write(&self, kind: &str, id: &str, payload: &Value) -> Result<PathBuf> {
        let dir = self.root.join(kind);
        fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        let now = Utc::now();
        let path = dir.join(format!(
            "{kind}_{id}_{}.json",
            now.format("%Y%m%d_%H%M%S_%3f")
        ));
        let envelope = Envelope {
            fetched_at: now.to_rfc3339(),
            kind,
            id,
            payload,
        };
        let json = serde_json::to_string_pretty(&envelope).context("serialize raw payload")?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, &path).with_context(|| format!("rename {}", path.display()))?;
        Ok(path)
    }
}
