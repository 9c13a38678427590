//! Country page resolution with date-scoped caching.
//!
//! A [`Country`] owns every snapshot record for one capture filename and
//! serves "as-of date" lookups over them: the latest snapshot on or before the
//! requested date wins. Parsed pages and converted JSON are cached per
//! snapshot timestamp; [`Country::clear_cache_after`] evicts entries strictly
//! newer than a cutoff so backward-in-time queries stay date-correct even when
//! a later lookup already warmed the cache.

pub mod page;

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::{FactbookError, Result};
use crate::index::{CountrySnapshotRecord, SnapshotIndex};
use page::Page;

/// Parser version tag stamped into every weekly document, tracking output
/// schema provenance.
pub const VERSION: &str = "0.1.0";

/// The distinguished world page listing all countries available for a date.
pub const WORLD_FILENAME: &str = "xx.html";

pub struct Country {
    filename: String,
    records: Vec<CountrySnapshotRecord>,
    pages: BTreeMap<DateTime<Utc>, Page>,
    jsons: BTreeMap<DateTime<Utc>, Value>,
}

/// Owned map filename → [`Country`], passed explicitly to whoever resolves
/// countries. Replaces any notion of a process-global cache.
#[derive(Default)]
pub struct CountryRegistry {
    countries: HashMap<String, Country>,
}

impl CountryRegistry {
    pub fn new() -> CountryRegistry {
        CountryRegistry::default()
    }

    /// Get or create the country for a capture filename. A filename the index
    /// has never seen yields a country with no records; the error surfaces on
    /// lookup, not construction.
    pub fn for_filename(&mut self, index: &SnapshotIndex, filename: &str) -> &mut Country {
        self.countries
            .entry(filename.to_string())
            .or_insert_with(|| Country::new(index, filename))
    }
}

impl Country {
    fn new(index: &SnapshotIndex, filename: &str) -> Country {
        let records = index
            .snapshots_for_country(filename)
            .map(|r| r.to_vec())
            .unwrap_or_default();
        Country {
            filename: filename.to_string(),
            records,
            pages: BTreeMap::new(),
            jsons: BTreeMap::new(),
        }
    }

    /// Latest snapshot record with a timestamp on or before `date`.
    fn record_for_date(&self, date: DateTime<Utc>) -> Result<&CountrySnapshotRecord> {
        if self.records.is_empty() {
            return Err(FactbookError::NoSnapshots {
                country: self.filename.clone(),
            });
        }
        // Records are ascending, so the first hit from the back wins.
        self.records
            .iter()
            .rev()
            .find(|r| r.date.time <= date)
            .ok_or_else(|| FactbookError::NoPageForDate {
                country: self.filename.clone(),
                date,
            })
    }

    /// Parse (or fetch from cache) the most recent page on or before `date`.
    pub fn page_for_date(&mut self, date: DateTime<Utc>) -> Result<&Page> {
        let record = self.record_for_date(date)?.clone();
        if !self.pages.contains_key(&record.date.time) {
            let path = record.date.dir.join(&record.filename);
            let page = Page::new(&path)?;
            self.pages.insert(record.date.time, page);
        }
        Ok(&self.pages[&record.date.time])
    }

    /// Read (or fetch from cache) the converted JSON for the most recent
    /// snapshot on or before `date`, returning it with the country namekey
    /// derived from `data.name`. The converted path re-roots the snapshot
    /// directory from the HTML tree into the JSON tree.
    pub fn json_for_date(
        &mut self,
        date: DateTime<Utc>,
        html_root: &Path,
        json_root: &Path,
    ) -> Result<(Value, String)> {
        let record = self.record_for_date(date)?.clone();
        let rel = record
            .date
            .dir
            .strip_prefix(html_root)
            .unwrap_or(Path::new(&record.date.label));
        let path = json_root.join(rel).join(format!("{}.json", record.filename));

        if !self.jsons.contains_key(&record.date.time) {
            let bytes = std::fs::read(&path)?;
            let value: Value = serde_json::from_slice(&bytes)?;
            self.jsons.insert(record.date.time, value);
        }
        let value = &self.jsons[&record.date.time];
        let name = value
            .pointer("/data/name")
            .and_then(Value::as_str)
            .ok_or(FactbookError::MissingValue {
                path,
                key: "data.name",
            })?;
        Ok((value.clone(), string_to_json_key(name)))
    }

    /// Evict cached pages and JSON strictly newer than `date`. Must run before
    /// a lookup at an earlier date than any previous lookup.
    pub fn clear_cache_after(&mut self, date: DateTime<Utc>) {
        self.pages.retain(|t, _| *t <= date);
        self.jsons.retain(|t, _| *t <= date);
    }

    #[cfg(test)]
    fn cached_json_dates(&self) -> Vec<DateTime<Utc>> {
        self.jsons.keys().copied().collect()
    }
}

/// Canonical JSON key for a country name: punctuation stripped, separators
/// collapsed to single underscores, lowercased.
pub fn string_to_json_key(name: &str) -> String {
    let mut key = String::with_capacity(name.len());
    let mut last_underscore = true;
    for ch in name.chars() {
        match ch {
            ',' | '(' | ')' | '\\' | '\'' | '"' | '.' => {}
            '-' | '/' | '_' => push_sep(&mut key, &mut last_underscore),
            c if c.is_whitespace() => push_sep(&mut key, &mut last_underscore),
            c => {
                key.extend(c.to_lowercase());
                last_underscore = false;
            }
        }
    }
    while key.ends_with('_') {
        key.pop();
    }
    key
}

fn push_sep(key: &mut String, last_underscore: &mut bool) {
    if !*last_underscore {
        key.push('_');
        *last_underscore = true;
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::parse_date_label;

    fn capture(root: &Path, date: &str, filename: &str, html: &str) {
        let dir = root.join(date);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(filename), html).unwrap();
    }

    fn converted(root: &Path, date: &str, filename: &str, json: &str) {
        let dir = root.join(date);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(format!("{}.json", filename)), json).unwrap();
    }

    fn country_html(name: &str) -> String {
        format!(r#"<td class="countryName">{}</td>"#, name)
    }

    #[test]
    fn page_for_date_picks_latest_on_or_before() {
        let tmp = tempfile::tempdir().unwrap();
        capture(tmp.path(), "2020-01-01", "u%2Fbr.html", &country_html("Old Brazil"));
        capture(tmp.path(), "2020-02-01", "u%2Fbr.html", &country_html("New Brazil"));
        let index = SnapshotIndex::build(tmp.path()).unwrap();
        let mut registry = CountryRegistry::new();
        let c = registry.for_filename(&index, "br.html");

        let page = c.page_for_date(parse_date_label("2020-01-15").unwrap()).unwrap();
        assert_eq!(page.parsed_data["data"]["name"], "Old Brazil");
        let page = c.page_for_date(parse_date_label("2020-02-01").unwrap()).unwrap();
        assert_eq!(page.parsed_data["data"]["name"], "New Brazil");
    }

    #[test]
    fn lookup_before_first_snapshot_fails() {
        let tmp = tempfile::tempdir().unwrap();
        capture(tmp.path(), "2020-02-01", "u%2Fbr.html", &country_html("Brazil"));
        let index = SnapshotIndex::build(tmp.path()).unwrap();
        let mut registry = CountryRegistry::new();
        let c = registry.for_filename(&index, "br.html");

        assert!(matches!(
            c.page_for_date(parse_date_label("2020-01-01").unwrap()),
            Err(FactbookError::NoPageForDate { .. })
        ));
    }

    #[test]
    fn unknown_country_fails_on_lookup() {
        let tmp = tempfile::tempdir().unwrap();
        capture(tmp.path(), "2020-01-01", "u%2Fbr.html", &country_html("Brazil"));
        let index = SnapshotIndex::build(tmp.path()).unwrap();
        let mut registry = CountryRegistry::new();
        let c = registry.for_filename(&index, "qq.html");

        assert!(matches!(
            c.page_for_date(parse_date_label("2020-06-01").unwrap()),
            Err(FactbookError::NoSnapshots { .. })
        ));
    }

    #[test]
    fn json_for_date_reads_converted_tree_and_derives_namekey() {
        let tmp = tempfile::tempdir().unwrap();
        let html_root = tmp.path().join("pages");
        let json_root = tmp.path().join("json");
        capture(&html_root, "2020-01-01", "u%2Fks.html", &country_html("x"));
        converted(
            &json_root,
            "2020-01-01",
            "u%2Fks.html",
            r#"{"data": {"name": "Korea, South"}, "metadata": {}}"#,
        );
        let index = SnapshotIndex::build(&html_root).unwrap();
        let mut registry = CountryRegistry::new();
        let c = registry.for_filename(&index, "ks.html");

        let (json, namekey) = c
            .json_for_date(parse_date_label("2020-06-01").unwrap(), &html_root, &json_root)
            .unwrap();
        assert_eq!(namekey, "korea_south");
        assert_eq!(json["data"]["name"], "Korea, South");
    }

    #[test]
    fn json_missing_name_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let html_root = tmp.path().join("pages");
        let json_root = tmp.path().join("json");
        capture(&html_root, "2020-01-01", "u%2Fbr.html", &country_html("x"));
        converted(&json_root, "2020-01-01", "u%2Fbr.html", r#"{"data": {}}"#);
        let index = SnapshotIndex::build(&html_root).unwrap();
        let mut registry = CountryRegistry::new();
        let c = registry.for_filename(&index, "br.html");

        assert!(matches!(
            c.json_for_date(parse_date_label("2020-06-01").unwrap(), &html_root, &json_root),
            Err(FactbookError::MissingValue { .. })
        ));
    }

    #[test]
    fn clear_cache_after_evicts_newer_entries_only() {
        let tmp = tempfile::tempdir().unwrap();
        let html_root = tmp.path().join("pages");
        let json_root = tmp.path().join("json");
        for date in ["2020-01-01", "2020-02-01"] {
            capture(&html_root, date, "u%2Fbr.html", &country_html("x"));
            converted(
                &json_root,
                date,
                "u%2Fbr.html",
                r#"{"data": {"name": "Brazil"}}"#,
            );
        }
        let index = SnapshotIndex::build(&html_root).unwrap();
        let mut registry = CountryRegistry::new();
        let c = registry.for_filename(&index, "br.html");

        // warm both cache entries, newest first
        let feb = parse_date_label("2020-02-15").unwrap();
        let jan = parse_date_label("2020-01-15").unwrap();
        c.json_for_date(feb, &html_root, &json_root).unwrap();
        c.clear_cache_after(jan);
        c.json_for_date(jan, &html_root, &json_root).unwrap();

        let cached = c.cached_json_dates();
        assert_eq!(cached, vec![parse_date_label("2020-01-01").unwrap()]);
    }

    #[test]
    fn namekeys_are_canonical() {
        assert_eq!(string_to_json_key("United States"), "united_states");
        assert_eq!(string_to_json_key("Korea, South"), "korea_south");
        assert_eq!(string_to_json_key("Timor-Leste"), "timor_leste");
        assert_eq!(string_to_json_key("Cote d'Ivoire"), "cote_divoire");
        assert_eq!(
            string_to_json_key("Saint Helena, Ascension, and Tristan da Cunha"),
            "saint_helena_ascension_and_tristan_da_cunha"
        );
        assert_eq!(string_to_json_key("Virgin Islands (U.S.)"), "virgin_islands_us");
    }
}
