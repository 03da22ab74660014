//! Intake history over a trailing window of days.
//!
//! Entries are merged from the live journal and the CSV archive.

use crate::journal::IntakeEntry;
use crate::rollup::CsvRow;
use crate::Result;
use chrono::{Duration, Utc};
use csv::ReaderBuilder;
use std::collections::HashSet;
use std::path::Path;

/// Load entries from the last `days` days from both journal and CSV
///
/// Returns entries sorted by `logged_at` (newest first), deduplicated by id.
pub fn load_recent_intake(
    journal_path: &Path,
    csv_path: &Path,
    days: u32,
) -> Result<Vec<IntakeEntry>> {
    let cutoff = Utc::now() - Duration::days(i64::from(days));
    let mut entries = Vec::new();
    let mut seen_ids = HashSet::new();

    // Journal first (most recent)
    for entry in crate::journal::read_entries(journal_path)? {
        if entry.logged_at >= cutoff && seen_ids.insert(entry.id) {
            entries.push(entry);
        }
    }
    tracing::debug!("Loaded {} entries from journal", entries.len());

    if csv_path.exists() {
        let mut csv_count = 0;
        for entry in load_entries_from_csv(csv_path)? {
            if entry.logged_at >= cutoff && seen_ids.insert(entry.id) {
                entries.push(entry);
                csv_count += 1;
            }
        }
        tracing::debug!("Loaded {} entries from CSV", csv_count);
    }

    entries.sort_by(|a, b| b.logged_at.cmp(&a.logged_at));

    tracing::info!(
        "Loaded {} intake entries from last {} days",
        entries.len(),
        days
    );

    Ok(entries)
}

fn load_entries_from_csv(path: &Path) -> Result<Vec<IntakeEntry>> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;

    let mut entries = Vec::new();
    for result in reader.deserialize::<CsvRow>() {
        match result {
            Ok(row) => match IntakeEntry::try_from(row) {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::warn!("Failed to parse CSV row: {}", e),
            },
            Err(e) => tracing::warn!("Failed to deserialize CSV row: {}", e),
        }
    }

    Ok(entries)
}
