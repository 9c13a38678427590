//! Parallel HTML → JSON conversion.
//!
//! One work unit per capture file, dispatched on the global rayon pool and
//! joined by the parallel iterator itself. An existing destination file is the
//! only cache check: conversion is deterministic for a given input, so a
//! failed unit leaves nothing behind and is retried naturally on the next run.
//! Regenerating after a parser change requires deleting the converted tree.

use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::country::page::Page;
use crate::error::Result;
use crate::index::parse_date_label;

pub struct ConvertStats {
    pub total: usize,
    pub converted: usize,
    pub skipped: usize,
    pub errors: usize,
}

struct WorkUnit {
    src: PathBuf,
    dst_dir: PathBuf,
    dst: PathBuf,
}

/// Each unit owns its outcome; nothing mutable is shared across workers.
enum Outcome {
    Converted,
    Skipped,
    Failed,
}

/// Convert every unconverted capture under `root` into `output_root`,
/// mirroring the `<date>/<filename>` layout with `.json` appended.
pub fn convert(root: &Path, output_root: &Path) -> Result<ConvertStats> {
    let units = collect_units(root, output_root)?;
    let total = units.len();

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")
            .unwrap()
            .progress_chars("=> "),
    );

    let outcomes: Vec<Outcome> = units
        .par_iter()
        .map(|unit| {
            let outcome = convert_one(unit);
            pb.inc(1);
            outcome
        })
        .collect();
    pb.finish_and_clear();

    let mut stats = ConvertStats {
        total,
        converted: 0,
        skipped: 0,
        errors: 0,
    };
    for outcome in outcomes {
        match outcome {
            Outcome::Converted => stats.converted += 1,
            Outcome::Skipped => stats.skipped += 1,
            Outcome::Failed => stats.errors += 1,
        }
    }
    info!(
        "Converted {} pages ({} skipped, {} errors)",
        stats.converted, stats.skipped, stats.errors
    );
    Ok(stats)
}

/// Walk the date subdirectories of `root` and pair every file with its
/// destination. Only an unreadable root is fatal; an unreadable date
/// directory is logged and skipped, non-date entries are ignored.
fn collect_units(root: &Path, output_root: &Path) -> Result<Vec<WorkUnit>> {
    let mut units = Vec::new();
    let mut dirs: Vec<_> = std::fs::read_dir(root)?.collect::<std::io::Result<_>>()?;
    dirs.sort_by_key(|e| e.file_name());

    for dir in dirs {
        // only the root listing itself is fatal; an entry that cannot be
        // stat'd is skipped like any other non-date entry
        let is_dir = match dir.file_type() {
            Ok(t) => t.is_dir(),
            Err(e) => {
                warn!("Error reading entry {}: {}", dir.path().display(), e);
                continue;
            }
        };
        if !is_dir {
            continue;
        }
        let name = dir.file_name();
        let Some(label) = name.to_str() else { continue };
        if parse_date_label(label).is_none() {
            continue;
        }
        let files_root = dir.path();
        let files = match std::fs::read_dir(&files_root) {
            Ok(rd) => rd,
            Err(e) => {
                warn!("Error reading directory {}: {}", files_root.display(), e);
                continue;
            }
        };
        let dst_dir = output_root.join(label);
        for file in files.filter_map(|e| e.ok()) {
            if file.file_type().map(|t| t.is_dir()).unwrap_or(true) {
                warn!("Unexpected directory {}", file.path().display());
                continue;
            }
            let filename = file.file_name();
            let Some(filename) = filename.to_str() else { continue };
            units.push(WorkUnit {
                src: files_root.join(filename),
                dst_dir: dst_dir.clone(),
                dst: dst_dir.join(format!("{}.json", filename)),
            });
        }
    }
    Ok(units)
}

fn convert_one(unit: &WorkUnit) -> Outcome {
    if unit.dst.exists() {
        return Outcome::Skipped;
    }
    debug!("Parsing {}", unit.src.display());
    let page = match Page::new(&unit.src) {
        Ok(p) => p,
        Err(e) => {
            warn!("Error parsing {}: {}", unit.src.display(), e);
            return Outcome::Failed;
        }
    };
    let content = match serde_json::to_string_pretty(&page.parsed_data) {
        Ok(c) => c,
        Err(e) => {
            warn!("Error serializing {}: {}", unit.src.display(), e);
            return Outcome::Failed;
        }
    };
    if let Err(e) = std::fs::create_dir_all(&unit.dst_dir) {
        warn!("Error creating {}: {}", unit.dst_dir.display(), e);
        return Outcome::Failed;
    }
    if let Err(e) = std::fs::write(&unit.dst, content) {
        warn!("Error writing {}: {}", unit.dst.display(), e);
        return Outcome::Failed;
    }
    Outcome::Converted
}

// ── Tests ──
