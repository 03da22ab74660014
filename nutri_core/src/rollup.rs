//! Long-term intake archive.
//!
//! The JSONL journal is only a staging area: `nutri rollup` moves its entries
//! into an append-only CSV file so the journal stays small.

use crate::journal::{self, IntakeEntry};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// A row in the CSV archive
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct CsvRow {
    id: String,
    name: String,
    calories: f64,
    protein_g: f64,
    carbs_g: f64,
    fat_g: f64,
    logged_at: String,
}

impl From<&IntakeEntry> for CsvRow {
    fn from(entry: &IntakeEntry) -> Self {
        CsvRow {
            id: entry.id.to_string(),
            name: entry.name.clone(),
            calories: entry.calories,
            protein_g: entry.protein_g,
            carbs_g: entry.carbs_g,
            fat_g: entry.fat_g,
            logged_at: entry.logged_at.to_rfc3339(),
        }
    }
}

impl TryFrom<CsvRow> for IntakeEntry {
    type Error = Error;

    fn try_from(row: CsvRow) -> Result<Self> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| Error::Other(format!("Invalid UUID: {}", e)))?;

        let logged_at = DateTime::parse_from_rfc3339(&row.logged_at)
            .map_err(|e| Error::Other(format!("Invalid date: {}", e)))?
            .with_timezone(&Utc);

        Ok(IntakeEntry {
            id,
            name: row.name,
            calories: row.calories,
            protein_g: row.protein_g,
            carbs_g: row.carbs_g,
            fat_g: row.fat_g,
            logged_at,
        })
    }
}

/// Move every journal entry into the CSV archive; returns how many moved.
///
/// The whole pass runs under the journal's exclusive lock, so an append
/// either lands before the read (and is archived) or after the rename (in a
/// fresh journal). Rows reach disk before the journal is moved aside as
/// `<journal>.processed`. A crash in between only repeats rows on the next
/// pass; history drops the repeats by entry id.
pub fn journal_to_csv_and_archive(journal_path: &Path, csv_path: &Path) -> Result<usize> {
    if !journal_path.exists() {
        return Ok(0);
    }

    let lock = journal::open_lock(journal_path)?;
    lock.lock_exclusive()?;
    let moved = archive_locked(journal_path, csv_path);
    lock.unlock()?;

    let moved = moved?;
    if moved > 0 {
        tracing::info!("Rolled {} intake entries into {:?}", moved, csv_path);
    } else {
        tracing::info!("No entries in journal to roll up");
    }
    Ok(moved)
}

fn archive_locked(journal_path: &Path, csv_path: &Path) -> Result<usize> {
    let entries = journal::read_entries_locked(journal_path)?;
    if entries.is_empty() {
        return Ok(0);
    }

    append_rows(csv_path, &entries)?;

    let archived = archive_path(journal_path);
    std::fs::rename(journal_path, &archived)?;
    tracing::debug!("Journal moved aside to {:?}", archived);

    Ok(entries.len())
}

/// Append entries to the CSV, writing headers only into an empty file,
/// and fsync before returning.
fn append_rows(csv_path: &Path, entries: &[IntakeEntry]) -> Result<()> {
    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(csv_path)?;
    let fresh = file.metadata()?.len() == 0;

    {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(fresh)
            .from_writer(&file);
        for entry in entries {
            writer.serialize(CsvRow::from(entry))?;
        }
        writer.flush()?;
    }

    file.sync_all()?;
    Ok(())
}

fn archive_path(journal_path: &Path) -> PathBuf {
    let mut name = journal_path.file_name().unwrap_or_default().to_os_string();
    name.push(".processed");
    journal_path.with_file_name(name)
}

/// Remove archived `.processed` journals from `dir`
pub fn cleanup_processed_journals(dir: &Path) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();

        if path.extension().is_some_and(|ext| ext == "processed") {
            std::fs::remove_file(&path)?;
            tracing::debug!("Removed processed journal: {:?}", path);
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Cleaned up {} processed journal files", count);
    }

    Ok(count)
}
