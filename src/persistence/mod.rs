//! Durable key-value snapshot storage
//!
//! JSON files under a data directory, one per key. This is the durable
//! stand-in for browser local storage: a main state snapshot, a dedicated
//! trades key, the theme string and the saved-strategy library each live
//! under their own key. Save errors are logged and swallowed so a failed
//! flush never takes down the caller; load errors simply yield `None` and
//! the caller keeps its defaults.

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Key for the main state snapshot (minus volatile subtrees)
pub const KEY_STATE: &str = "state";
/// Key for the journal trades array, persisted independently for resilience
pub const KEY_TRADES: &str = "trades";
/// Key for the theme string
pub const KEY_THEME: &str = "theme";
/// Key for the saved-strategy library
pub const KEY_STRATEGIES: &str = "strategies";

/// File-backed key-value store.
#[derive(Debug, Clone)]
pub struct KvStore {
    dir: PathBuf,
}

impl KvStore {
    /// Open (creating the directory if needed). This is the only
    /// persistence operation that reports an error to the caller:
    /// a data dir we cannot create is startup-time misconfiguration.
    pub fn open(dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// Write a value under `key`. Errors are logged, never returned.
    pub fn save(&self, key: &str, value: &Value) {
        let path = self.path_for(key);
        let result = serde_json::to_string_pretty(value)
            .map_err(anyhow::Error::from)
            .and_then(|json| fs::write(&path, json).map_err(anyhow::Error::from));
        match result {
            Ok(()) => debug!(key, "snapshot saved"),
            Err(e) => warn!(key, error = %e, "failed to save snapshot"),
        }
    }

    /// Read the value under `key`, or `None` if missing or unreadable.
    pub fn load(&self, key: &str) -> Option<Value> {
        let path = self.path_for(key);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(_) => return None,
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "failed to parse snapshot, ignoring");
                None
            }
        }
    }

    pub fn remove(&self, key: &str) {
        let _ = fs::remove_file(self.path_for(key));
    }
}

/// Export blob with metadata headers, ready to be written as a download.
pub fn export_blob(kind: &str, payload: Value) -> Value {
    serde_json::json!({
        "exportDate": chrono::Utc::now().to_rfc3339(),
        "version": format!("MarketMind {}", env!("CARGO_PKG_VERSION")),
        "kind": kind,
        "data": payload,
    })
}

/// Write an export blob to disk as pretty JSON.
pub fn write_export(path: impl AsRef<Path>, blob: &Value) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(blob)?;
    fs::write(path.as_ref(), json)?;
    Ok(())
}
