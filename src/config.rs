//! Run configuration loaded from a JSON object of string keys.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{FactbookError, Result};

#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the raw HTML capture tree (`<root>/<YYYY-MM-DD>/<file>.html`).
    pub country_html_root: PathBuf,
    /// Root of the converted tree (`<root>/<YYYY-MM-DD>/<file>.html.json`).
    pub country_json_root: PathBuf,
    /// Destination for `<YYYY-MM-DD>_factbook.json` weekly documents.
    pub weekly_json_root: PathBuf,
}

impl Config {
    /// Load config from `path`. An unreadable or unparseable file is fatal;
    /// a missing key is only logged and defaults to an empty path, so the
    /// consequence surfaces as an IO failure in whichever pipeline needs it.
    pub fn load(path: &Path) -> Result<Config> {
        let bytes = std::fs::read(path).map_err(|e| FactbookError::Config {
            message: format!("cannot read {}: {}", path.display(), e),
        })?;
        let raw: HashMap<String, String> =
            serde_json::from_slice(&bytes).map_err(|e| FactbookError::Config {
                message: format!("cannot parse {}: {}", path.display(), e),
            })?;
        Ok(Config {
            country_html_root: root_value(&raw, "country_html_root"),
            country_json_root: root_value(&raw, "country_json_root"),
            weekly_json_root: root_value(&raw, "weekly_json_root"),
        })
    }
}

fn root_value(raw: &HashMap<String, String>, key: &str) -> PathBuf {
    match raw.get(key) {
        Some(v) => PathBuf::from(v),
        None => {
            warn!("Missing config value: {}", key);
            PathBuf::new()
        }
    }
}

// ── Tests ──
