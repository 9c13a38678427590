//! # factbook_scraper
//!
//! Turns dated HTML captures of the factbook into normalized JSON and merges
//! per-country JSON into one consolidated document per fully elapsed Monday.

pub mod config;
pub mod convert;
pub mod country;
pub mod error;
pub mod index;
pub mod weekly;

pub use error::{FactbookError, Result};
pub use index::SnapshotIndex;
