use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::data::types::LedgerEntry;
use crate::error::Result;
use crate::storage::json::{read_json, write_json};
use crate::storage::paths::ProjectPaths;

/// Date-keyed sales ledger. At most one entry per date; always iterated in
/// ascending date order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    entries: BTreeMap<NaiveDate, LedgerEntry>,
}

impl Ledger {
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Later entries win when the input repeats a date.
    pub fn from_entries(entries: impl IntoIterator<Item = LedgerEntry>) -> Self {
        Self {
            entries: entries.into_iter().map(|e| (e.date, e)).collect(),
        }
    }

    /// Insert, replacing any entry already recorded for the same date.
    pub fn upsert(&mut self, entry: LedgerEntry) {
        self.entries.insert(entry.date, entry);
    }

    #[cfg(test)]
    pub fn get(&self, date: NaiveDate) -> Option<&LedgerEntry> {
        self.entries.get(&date)
    }

    pub fn entries(&self) -> impl DoubleEndedIterator<Item = &LedgerEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `<project>/total.json`: a JSON array sorted by date, rewritten wholesale.
pub struct LedgerStore {
    paths: ProjectPaths,
}

impl LedgerStore {
    pub fn new(paths: ProjectPaths) -> Self {
        Self { paths }
    }

    pub fn load(&self) -> Result<Ledger> {
        let path = self.paths.ledger_file();
        let entries: Vec<LedgerEntry> = read_json(&path)?.unwrap_or_default();
        let count = entries.len();
        let ledger = Ledger::from_entries(entries);

        if ledger.is_empty() {
            info!("No ledger entries in {}, starting fresh", path.display());
        } else if ledger.len() != count {
            warn!("{}: collapsed {} duplicate dates", path.display(), count - ledger.len());
        }
        Ok(ledger)
    }

    pub fn save(&self, ledger: &Ledger) -> Result<()> {
        let path = self.paths.ledger_file();
        let entries: Vec<&LedgerEntry> = ledger.entries().collect();
        write_json(&path, &entries)?;
        info!("Saved ledger {} ({} entries)", path.display(), entries.len());
        Ok(())
    }
}
