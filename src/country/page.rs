//! Minimal country page parsing: the country name, capture metadata, and the
//! world page's country list. The source site's deep per-field extraction is
//! out of scope; converted documents carry `data` + `metadata` only.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Value};

use crate::error::{FactbookError, Result};

/// Entries in the world select list with no usable country page behind them.
const FILENAME_BLACKLIST: &[&str] = &["fs.html", "um.html", "fq.html"];

static COUNTRY_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)class=["'][^"']*countryName[^"']*["'][^>]*>\s*([^<]+)"#).unwrap()
});
static REGION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)class=["'][^"']*region[^"']*["'][^>]*>\s*([^<]+)"#).unwrap()
});
static OPTION_VALUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?is)<option[^>]*value=["']([^"']+)["']"#).unwrap());

/// One captured HTML page, parsed.
#[derive(Debug)]
pub struct Page {
    filelocation: PathBuf,
    html: String,
    /// `{data: {...}, metadata: {date, source, nearby_dates}}`, insertion order
    /// preserved end to end.
    pub parsed_data: Value,
}

impl Page {
    /// Read and parse one capture file. The capture date comes from the parent
    /// directory name; the source URL is percent-decoded from the filename.
    /// A page with no recognizable country name is a parse error.
    pub fn new(path: &Path) -> Result<Page> {
        let html = std::fs::read_to_string(path)?;
        let name = country_name(&html).ok_or_else(|| FactbookError::Parse {
            path: path.to_path_buf(),
            message: "country name not found".to_string(),
        })?;

        let date = path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let source = match urlencoding::decode(filename) {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => path.display().to_string(),
        };
        let nearby_dates = nearby_dates_url(&source, path);

        let parsed_data = json!({
            "data": {
                "name": name,
            },
            "metadata": {
                "date": date,
                "source": source,
                "nearby_dates": nearby_dates,
            },
        });

        Ok(Page {
            filelocation: path.to_path_buf(),
            html,
            parsed_data,
        })
    }

    /// Ordered country filenames from the world page's select element,
    /// normalized to `xx.html` and blacklist-filtered.
    pub fn country_list(&self) -> Result<Vec<String>> {
        let mut list = Vec::new();
        for caps in OPTION_VALUE_RE.captures_iter(&self.html) {
            let value = caps[1].trim();
            if value.is_empty() {
                continue;
            }
            let mut filename = value.rsplit('/').next().unwrap_or(value).to_lowercase();
            if !filename.ends_with(".html") && filename.len() == 2 {
                filename.push_str(".html");
            }
            if filename.ends_with(".html") && !FILENAME_BLACKLIST.contains(&filename.as_str()) {
                list.push(filename);
            }
        }
        if list.is_empty() {
            return Err(FactbookError::Parse {
                path: self.filelocation.clone(),
                message: "no country options found".to_string(),
            });
        }
        Ok(list)
    }
}

fn country_name(html: &str) -> Option<String> {
    let raw = COUNTRY_NAME_RE
        .captures(html)
        .or_else(|| REGION_RE.captures(html))
        .map(|c| c[1].trim().to_string())?;
    if raw.is_empty() {
        return None;
    }
    Some(title_case(&raw))
}

/// Lowercase then capitalize each whitespace-separated word.
fn title_case(s: &str) -> String {
    s.to_lowercase()
        .split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Archive URLs carry a 14-digit capture timestamp; wildcarding the time
/// component yields a listing of captures near this one.
fn nearby_dates_url(source: &str, path: &Path) -> String {
    match (source.get(..36), source.get(42..)) {
        (Some(head), Some(tail)) => format!("{}000000*{}", head, tail),
        _ => path.display().to_string(),
    }
}

// ── Tests ──
