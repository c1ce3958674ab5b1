use chrono::NaiveDate;
use std::path::{Path, PathBuf};

/// On-disk layout of one project:
///
/// ```text
/// <data_dir>/<project>/sales/<YYYY-MM-DD>.json
/// <data_dir>/<project>/areas/areas.json
/// <data_dir>/<project>/total.json
/// ```
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    root: PathBuf,
}

impl ProjectPaths {
    pub fn new(data_dir: impl AsRef<Path>, project: &str) -> Self {
        Self {
            root: data_dir.as_ref().join(project),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn sales_dir(&self) -> PathBuf {
        self.root.join("sales")
    }

    pub fn snapshot_file(&self, date: NaiveDate) -> PathBuf {
        self.sales_dir().join(format!("{}.json", date.format("%Y-%m-%d")))
    }

    pub fn areas_file(&self) -> PathBuf {
        self.root.join("areas").join("areas.json")
    }

    pub fn ledger_file(&self) -> PathBuf {
        self.root.join("total.json")
    }
}
