//! Intake journal.
//!
//! Logged foods are appended to a JSONL (JSON Lines) file with file locking
//! to ensure safe concurrent access.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Macronutrients of a logged item, in grams
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Macros {
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
}

/// One logged food or meal
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct IntakeEntry {
    pub id: Uuid,
    pub name: String,
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    pub logged_at: DateTime<Utc>,
}

impl IntakeEntry {
    /// Create an entry logged now
    pub fn new(name: impl Into<String>, calories: f64, macros: Macros) -> Result<Self> {
        Self::at(name, calories, macros, Utc::now())
    }

    /// Create an entry with an explicit timestamp
    pub fn at(
        name: impl Into<String>,
        calories: f64,
        macros: Macros,
        logged_at: DateTime<Utc>,
    ) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::InvalidEntry("name must not be empty".into()));
        }

        let quantities = [
            ("calories", calories),
            ("protein_g", macros.protein_g),
            ("carbs_g", macros.carbs_g),
            ("fat_g", macros.fat_g),
        ];
        for (label, value) in quantities {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidEntry(format!(
                    "{} must be a non-negative number, got {}",
                    label, value
                )));
            }
        }

        Ok(IntakeEntry {
            id: Uuid::new_v4(),
            name,
            calories,
            protein_g: macros.protein_g,
            carbs_g: macros.carbs_g,
            fat_g: macros.fat_g,
            logged_at,
        })
    }
}

/// Intake sink trait for persisting entries
pub trait IntakeSink {
    fn append(&mut self, entry: &IntakeEntry) -> Result<()>;
}

/// JSONL-based intake sink with file locking
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    /// Create a new JSONL sink for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Ensure the parent directory exists
    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl IntakeSink for JsonlSink {
    fn append(&mut self, entry: &IntakeEntry) -> Result<()> {
        self.ensure_parent_dir()?;

        let lock = open_lock(&self.path)?;
        lock.lock_exclusive()?;

        // Opened only once the lock is held: a rollup may have just moved
        // the previous journal aside.
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        // One write per line so concurrent appenders never interleave
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        let mut writer = std::io::BufWriter::new(&file);
        writer.write_all(line.as_bytes())?;
        writer.flush()?;

        lock.unlock()?;

        tracing::debug!("Appended intake entry {} to journal", entry.id);
        Ok(())
    }
}

/// Sibling file guarding a journal. Appends, reads and rollups lock this
/// rather than the journal, which rollup renames away.
pub(crate) fn lock_path(journal: &Path) -> PathBuf {
    let mut name = journal.file_name().unwrap_or_default().to_os_string();
    name.push(".lock");
    journal.with_file_name(name)
}

pub(crate) fn open_lock(journal: &Path) -> Result<File> {
    let lock = OpenOptions::new()
        .create(true)
        .write(true)
        .open(lock_path(journal))?;
    Ok(lock)
}

/// Read all entries from a journal file
pub fn read_entries(path: &Path) -> Result<Vec<IntakeEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let lock = open_lock(path)?;
    lock.lock_shared()?;
    let entries = read_entries_locked(path);
    lock.unlock()?;
    entries
}

/// Read entries while the caller already holds the journal lock
pub(crate) fn read_entries_locked(path: &Path) -> Result<Vec<IntakeEntry>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let reader = BufReader::new(file);
    let mut entries = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<IntakeEntry>(&line) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                tracing::warn!("Failed to parse intake entry at line {}: {}", line_num + 1, e);
            }
        }
    }

    tracing::debug!("Read {} entries from journal", entries.len());
    Ok(entries)
}
