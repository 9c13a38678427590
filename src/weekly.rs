//! Weekly consolidation: one merged document per fully elapsed Monday.
//!
//! Mondays are processed newest first, strictly sequentially. The country
//! cache is invalidated with a cutoff before every lookup, and correctness of
//! those cutoffs depends on dates being visited in strictly decreasing order,
//! so per-country resolution within a date stays sequential too.

use std::time::Instant;

use chrono::{DateTime, Datelike, Duration, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::Config;
use crate::country::{self, CountryRegistry, WORLD_FILENAME};
use crate::error::Result;
use crate::index::{SnapshotIndex, DATE_FORMAT};

const PARSED_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

pub struct WeeklyStats {
    pub weeks: usize,
    pub written: usize,
    pub skipped: usize,
}

/// Serialized with insertion order preserved at every nesting level;
/// `countries` keeps the world page's enumeration order, never re-sorted.
#[derive(Serialize)]
struct WeeklyDocument {
    countries: IndexMap<String, Value>,
    metadata: Metadata,
}

#[derive(Serialize)]
struct Metadata {
    date: String,
    parser_version: &'static str,
    parsed_time: String,
}

pub struct WeeklyAggregator<'a> {
    index: &'a SnapshotIndex,
    config: &'a Config,
    registry: CountryRegistry,
}

impl<'a> WeeklyAggregator<'a> {
    pub fn new(index: &'a SnapshotIndex, config: &'a Config) -> WeeklyAggregator<'a> {
        WeeklyAggregator {
            index,
            config,
            registry: CountryRegistry::new(),
        }
    }

    /// Walk backward one week at a time from the most recent fully elapsed
    /// Monday to the earliest capture date. A failed Monday is logged and
    /// skipped without retry; rerunning replaces, never merges, output files.
    pub fn run(&mut self, now: DateTime<Utc>) -> Result<WeeklyStats> {
        let first = self.index.earliest_date()?;
        info!("Earliest date found is {}", first.format(DATE_FORMAT));

        let mut stats = WeeklyStats {
            weeks: 0,
            written: 0,
            skipped: 0,
        };
        let mut monday = monday_before(now);
        while monday >= first {
            let start = Instant::now();
            match self.aggregate_date(monday) {
                Ok(countries) => {
                    stats.written += 1;
                    info!(
                        "Parsed {} ({} countries) in {:.1}s",
                        monday.format(DATE_FORMAT),
                        countries,
                        start.elapsed().as_secs_f64()
                    );
                }
                Err(e) => {
                    stats.skipped += 1;
                    warn!("Skipping {}: {}", monday.format(DATE_FORMAT), e);
                }
            }
            stats.weeks += 1;
            monday -= Duration::days(7);
        }
        info!(
            "Complete: {} weeks ({} written, {} skipped)",
            stats.weeks, stats.written, stats.skipped
        );
        Ok(stats)
    }

    /// Build and persist one date's document. A world-page failure aborts the
    /// whole date; a per-country failure excludes only that country.
    fn aggregate_date(&mut self, date: DateTime<Utc>) -> Result<usize> {
        let filenames = {
            let world = self.registry.for_filename(self.index, WORLD_FILENAME);
            world.clear_cache_after(date);
            world.page_for_date(date)?.country_list()?
        };

        let mut countries: IndexMap<String, Value> = IndexMap::new();
        for filename in &filenames {
            let c = self.registry.for_filename(self.index, filename);
            c.clear_cache_after(date);
            match c.json_for_date(
                date,
                &self.config.country_html_root,
                &self.config.country_json_root,
            ) {
                Ok((json, namekey)) => {
                    countries.insert(namekey, json);
                }
                Err(e) => {
                    warn!(
                        "Error getting json for {} on {}: {}",
                        filename,
                        date.format(DATE_FORMAT),
                        e
                    );
                }
            }
        }

        let count = countries.len();
        let document = WeeklyDocument {
            countries,
            metadata: Metadata {
                date: date.format(DATE_FORMAT).to_string(),
                parser_version: country::VERSION,
                parsed_time: Utc::now().format(PARSED_TIME_FORMAT).to_string(),
            },
        };
        let content = serde_json::to_string_pretty(&document)?;
        std::fs::create_dir_all(&self.config.weekly_json_root)?;
        let out = self
            .config
            .weekly_json_root
            .join(format!("{}_factbook.json", date.format(DATE_FORMAT)));
        std::fs::write(&out, content)?;
        Ok(count)
    }
}

/// The most recent fully elapsed Monday strictly before `now`'s week position:
/// `(weekday - Monday + 7) mod 7` days back, with 7 instead of 0 when today is
/// a Monday, so the boundary is never "today".
pub fn monday_before(now: DateTime<Utc>) -> DateTime<Utc> {
    let mut days_back = i64::from(now.weekday().num_days_from_monday());
    if days_back == 0 {
        days_back = 7;
    }
    now - Duration::days(days_back)
}

// ── Tests ──
