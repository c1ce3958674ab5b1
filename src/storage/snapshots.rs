use chrono::NaiveDate;
use regex::Regex;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::data::types::DatedSnapshot;
use crate::error::{PipelineError, Result};
use crate::storage::json::{read_json, write_json};
use crate::storage::paths::ProjectPaths;

/// The two latest snapshots on disk, oldest first.
#[derive(Debug, Clone)]
pub struct SnapshotPair {
    pub older_date: NaiveDate,
    pub older: DatedSnapshot,
    pub newer_date: NaiveDate,
    pub newer: DatedSnapshot,
}

/// One JSON file per calendar date under `<project>/sales/`.
pub struct SnapshotStore {
    paths: ProjectPaths,
}

impl SnapshotStore {
    pub fn new(paths: ProjectPaths) -> Self {
        Self { paths }
    }

    /// Write (or overwrite, for today) the snapshot of `date`.
    pub fn save(&self, date: NaiveDate, snapshot: &DatedSnapshot) -> Result<PathBuf> {
        let path = self.paths.snapshot_file(date);
        write_json(&path, snapshot)?;
        info!("Saved snapshot {} ({} buildings)", path.display(), snapshot.len());
        Ok(path)
    }

    pub fn load(&self, date: NaiveDate) -> Result<Option<DatedSnapshot>> {
        read_json(&self.paths.snapshot_file(date))
    }

    /// Dates with a snapshot file, ascending. Fixed-width ISO names sort
    /// chronologically, so filename order is date order.
    pub fn list_dates(&self) -> Result<Vec<NaiveDate>> {
        let dir = self.paths.sales_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PipelineError::io(&dir, e)),
        };

        let pattern = Regex::new(r"^\d{4}-\d{2}-\d{2}\.json$")
            .map_err(|e| PipelineError::Parse(e.to_string()))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| PipelineError::io(&dir, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if pattern.is_match(&name) {
                names.push(name);
            }
        }
        names.sort();

        let mut dates = Vec::with_capacity(names.len());
        for name in names {
            match NaiveDate::parse_from_str(&name[..10], "%Y-%m-%d") {
                Ok(date) => dates.push(date),
                Err(_) => warn!("Ignoring snapshot with impossible date: {}", name),
            }
        }
        Ok(dates)
    }

    /// Fails with `InsufficientHistory` when fewer than two snapshots exist.
    pub fn load_two_most_recent(&self) -> Result<SnapshotPair> {
        let dates = self.list_dates()?;
        let &[.., older_date, newer_date] = dates.as_slice() else {
            return Err(PipelineError::InsufficientHistory { found: dates.len() });
        };

        let load = |date: NaiveDate| -> Result<DatedSnapshot> {
            self.load(date)?
                .ok_or_else(|| PipelineError::io(self.paths.snapshot_file(date), ErrorKind::NotFound.into()))
        };

        Ok(SnapshotPair {
            older_date,
            older: load(older_date)?,
            newer_date,
            newer: load(newer_date)?,
        })
    }
}
