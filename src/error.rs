//! Error types shared by the snapshot index and both pipelines.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FactbookError>;

#[derive(Error, Debug)]
pub enum FactbookError {
    /// Unreadable or unparseable config file. Fatal to the run.
    #[error("config error: {message}")]
    Config { message: String },

    /// No directory under the capture root parsed as a date. Fatal to the aggregator.
    #[error("no valid date directory found under {root}")]
    NoValidDate { root: PathBuf },

    /// The country never appears in any capture directory.
    #[error("no snapshots for country {country}")]
    NoSnapshots { country: String },

    /// The country has snapshots, but none on or before the requested date.
    #[error("no snapshot for {country} on or before {date}")]
    NoPageForDate {
        country: String,
        date: DateTime<Utc>,
    },

    #[error("parse error in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// A converted document is missing a value the aggregator needs.
    #[error("missing value {key} in {path}")]
    MissingValue { path: PathBuf, key: &'static str },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
