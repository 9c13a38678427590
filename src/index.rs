//! Snapshot index: discovers capture dates under the HTML root and builds a
//! reverse index from country filename to its ordered snapshot records.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tracing::warn;

use crate::error::{FactbookError, Result};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Trailing country code plus extension, e.g. `xx.html`. Capture filenames are
/// percent-encoded source URLs and always end in this fixed-length suffix.
pub const COUNTRY_KEY_LEN: usize = 7;

/// One capture directory: `<root>/<YYYY-MM-DD>` parsed to a UTC timestamp.
#[derive(Debug, Clone)]
pub struct SnapshotDate {
    pub dir: PathBuf,
    pub label: String,
    pub time: DateTime<Utc>,
}

/// One captured file for one country on one date.
#[derive(Debug, Clone)]
pub struct CountrySnapshotRecord {
    pub date: SnapshotDate,
    pub filename: String,
}

#[derive(Debug, Default)]
pub struct SnapshotIndex {
    root: PathBuf,
    dates: Vec<SnapshotDate>,
    by_country: HashMap<String, Vec<CountrySnapshotRecord>>,
}

impl SnapshotIndex {
    /// Walk `root` once and build the full index. Entries that do not parse as
    /// dates are unrelated filesystem entries, not errors, and are skipped.
    /// Only an unreadable root itself is fatal.
    pub fn build(root: &Path) -> Result<SnapshotIndex> {
        let mut dates = Vec::new();
        let mut entries: Vec<_> = std::fs::read_dir(root)?.collect::<std::io::Result<_>>()?;
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            // only the root listing itself is fatal; a single entry that
            // cannot be stat'd is skipped like any other unrelated entry
            let is_dir = match entry.file_type() {
                Ok(t) => t.is_dir(),
                Err(e) => {
                    warn!("Error reading entry {}: {}", entry.path().display(), e);
                    continue;
                }
            };
            if !is_dir {
                continue;
            }
            let name = entry.file_name();
            let Some(label) = name.to_str() else { continue };
            let Some(time) = parse_date_label(label) else { continue };
            dates.push(SnapshotDate {
                dir: entry.path(),
                label: label.to_string(),
                time,
            });
        }
        // Stable sort: two directories parsing to the same calendar date are
        // both retained, in name order.
        dates.sort_by_key(|d| d.time);

        // Per-country lists come out ascending because the outer date list is
        // already sorted; no re-sort needed.
        let mut by_country: HashMap<String, Vec<CountrySnapshotRecord>> = HashMap::new();
        for date in &dates {
            let mut files: Vec<_> = match std::fs::read_dir(&date.dir) {
                Ok(rd) => rd.filter_map(|e| e.ok()).collect(),
                Err(e) => {
                    warn!("Error reading capture directory {}: {}", date.dir.display(), e);
                    continue;
                }
            };
            files.sort_by_key(|e| e.file_name());
            for file in files {
                if file.file_type().map(|t| t.is_dir()).unwrap_or(true) {
                    continue;
                }
                let name = file.file_name();
                let Some(filename) = name.to_str() else { continue };
                let Some(key) = country_key(filename) else { continue };
                by_country
                    .entry(key.to_string())
                    .or_default()
                    .push(CountrySnapshotRecord {
                        date: date.clone(),
                        filename: filename.to_string(),
                    });
            }
        }

        Ok(SnapshotIndex {
            root: root.to_path_buf(),
            dates,
            by_country,
        })
    }

    /// Discard the current contents and walk `root` again.
    pub fn rebuild(&mut self, root: &Path) -> Result<()> {
        *self = SnapshotIndex::build(root)?;
        Ok(())
    }

    /// Minimum timestamp among directories that parsed as dates.
    pub fn earliest_date(&self) -> Result<DateTime<Utc>> {
        self.dates
            .first()
            .map(|d| d.time)
            .ok_or_else(|| FactbookError::NoValidDate {
                root: self.root.clone(),
            })
    }

    /// All capture dates, ascending.
    pub fn dates(&self) -> &[SnapshotDate] {
        &self.dates
    }

    /// Number of distinct country keys seen anywhere in the tree.
    pub fn country_count(&self) -> usize {
        self.by_country.len()
    }

    /// Ordered snapshot records for one country key, ascending by date.
    pub fn snapshots_for_country(&self, key: &str) -> Result<&[CountrySnapshotRecord]> {
        self.by_country
            .get(key)
            .map(|v| v.as_slice())
            .ok_or_else(|| FactbookError::NoSnapshots {
                country: key.to_string(),
            })
    }
}

/// Parse a directory name under the fixed `YYYY-MM-DD` layout as UTC midnight.
pub fn parse_date_label(label: &str) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(label, DATE_FORMAT).ok()?;
    Some(date.and_time(NaiveTime::MIN).and_utc())
}

/// Fixed-length suffix of a capture filename, e.g.
/// `https%3A%2F...geos%2Fbr.html` → `br.html`. Shorter names carry no key.
fn country_key(filename: &str) -> Option<&str> {
    if filename.len() < COUNTRY_KEY_LEN {
        return None;
    }
    filename.get(filename.len() - COUNTRY_KEY_LEN..)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn write_tree(root: &Path, entries: &[(&str, &[&str])]) {
        for (dir, files) in entries {
            let d = root.join(dir);
            std::fs::create_dir_all(&d).unwrap();
            for f in *files {
                std::fs::write(d.join(f), "<html></html>").unwrap();
            }
        }
    }

    #[test]
    fn earliest_date_ignores_unparseable_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        write_tree(
            tmp.path(),
            &[
                ("2020-03-14", &["a%2Fbr.html"][..]),
                ("2019-12-30", &["a%2Fbr.html"][..]),
                ("not-a-date", &["a%2Fzz.html"][..]),
                (".cache", &[][..]),
            ],
        );
        let index = SnapshotIndex::build(tmp.path()).unwrap();
        assert_eq!(
            index.earliest_date().unwrap(),
            parse_date_label("2019-12-30").unwrap()
        );
        assert_eq!(index.dates().len(), 2);
        // the unparseable dir contributed no countries either
        assert!(index.snapshots_for_country("zz.html").is_err());
    }

    #[test]
    fn no_valid_date_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        write_tree(tmp.path(), &[("junk", &[][..])]);
        let index = SnapshotIndex::build(tmp.path()).unwrap();
        assert!(matches!(
            index.earliest_date(),
            Err(FactbookError::NoValidDate { .. })
        ));
    }

    #[test]
    fn unreadable_root_is_fatal() {
        assert!(SnapshotIndex::build(Path::new("/nonexistent/pages")).is_err());
    }

    #[test]
    fn snapshots_are_ascending_per_country() {
        let tmp = tempfile::tempdir().unwrap();
        write_tree(
            tmp.path(),
            &[
                ("2020-02-01", &["url%2Fbr.html", "url%2Fus.html"][..]),
                ("2020-01-01", &["url%2Fbr.html"][..]),
                ("2020-03-01", &["url%2Fbr.html"][..]),
            ],
        );
        let index = SnapshotIndex::build(tmp.path()).unwrap();
        let records = index.snapshots_for_country("br.html").unwrap();
        let times: Vec<_> = records.iter().map(|r| r.date.time).collect();
        let mut sorted = times.clone();
        sorted.sort();
        assert_eq!(times, sorted);
        assert_eq!(records.len(), 3);
        assert_eq!(index.snapshots_for_country("us.html").unwrap().len(), 1);
    }

    #[test]
    fn unknown_country_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        write_tree(tmp.path(), &[("2020-01-01", &["url%2Fbr.html"][..])]);
        let index = SnapshotIndex::build(tmp.path()).unwrap();
        assert!(matches!(
            index.snapshots_for_country("xx.html"),
            Err(FactbookError::NoSnapshots { .. })
        ));
    }

    #[test]
    fn short_filenames_carry_no_key() {
        let tmp = tempfile::tempdir().unwrap();
        write_tree(tmp.path(), &[("2020-01-01", &["x.html", "url%2Fbr.html"][..])]);
        let index = SnapshotIndex::build(tmp.path()).unwrap();
        assert_eq!(index.country_count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn broken_top_level_entries_are_skipped_not_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        write_tree(tmp.path(), &[("2020-01-01", &["url%2Fbr.html"][..])]);
        // date-named dangling symlink: metadata is unreliable, listing fails
        std::os::unix::fs::symlink("missing-target", tmp.path().join("2020-09-09")).unwrap();

        let index = SnapshotIndex::build(tmp.path()).unwrap();
        assert_eq!(index.dates().len(), 1);
        assert_eq!(
            index.earliest_date().unwrap(),
            parse_date_label("2020-01-01").unwrap()
        );
    }

    #[test]
    fn rebuild_picks_up_new_directories() {
        let tmp = tempfile::tempdir().unwrap();
        write_tree(tmp.path(), &[("2020-01-01", &["url%2Fbr.html"][..])]);
        let mut index = SnapshotIndex::build(tmp.path()).unwrap();
        assert_eq!(index.dates().len(), 1);

        write_tree(tmp.path(), &[("2020-01-08", &["url%2Fbr.html"][..])]);
        index.rebuild(tmp.path()).unwrap();
        assert_eq!(index.dates().len(), 2);
        assert_eq!(index.snapshots_for_country("br.html").unwrap().len(), 2);
    }
}
