use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::config::{HttpConfig, ProjectConfig};
use crate::data::parsers::{parse_building_index, parse_building_status, parse_sales_stats};
use crate::data::portal::Portal;
use crate::data::types::{BuildingSnapshot, DatedSnapshot, SalesStats};
use crate::error::Result;

/// Scrapes one project's building index, status grids and summary stats.
pub struct SnapshotFetcher<'a, P> {
    portal: &'a P,
    project: &'a ProjectConfig,
    http: &'a HttpConfig,
}

impl<'a, P: Portal> SnapshotFetcher<'a, P> {
    pub fn new(portal: &'a P, project: &'a ProjectConfig, http: &'a HttpConfig) -> Self {
        Self {
            portal,
            project,
            http,
        }
    }

    /// building name -> status page URL
    pub async fn fetch_building_index(&self) -> Result<BTreeMap<String, String>> {
        let html = self
            .portal
            .fetch_html(&self.project.index_url, self.http.timeout())
            .await?;
        let index = parse_building_index(&html, &self.project.base_url, &self.project.building_suffix)?;

        info!("Building index: {} buildings", index.len());
        Ok(index)
    }

    pub async fn fetch_building_status(&self, building_name: &str, url: &str) -> Result<BuildingSnapshot> {
        let html = self.portal.fetch_html(url, self.http.timeout()).await?;
        parse_building_status(&html, building_name)
    }

    /// Fetch every building in the bounded pool. A building that fails to
    /// fetch or parse is logged and left out of the result.
    pub async fn fetch_all_statuses(&self, index: &BTreeMap<String, String>) -> DatedSnapshot {
        let results: Vec<_> = stream::iter(index)
            .map(|(name, url)| async move { (name, self.fetch_building_status(name, url).await) })
            .buffer_unordered(self.http.workers())
            .collect()
            .await;

        let mut snapshot = DatedSnapshot::new();
        for (name, result) in results {
            match result {
                Ok(building) => {
                    snapshot.insert(name.clone(), building);
                }
                Err(e) if e.is_recoverable() => warn!("Skipping building {}: {}", name, e),
                Err(e) => warn!("Dropping building {} from this run: {}", name, e),
            }
        }

        info!("Fetched status for {}/{} buildings", snapshot.len(), index.len());
        snapshot
    }

    /// Index plus every status grid, as one dated snapshot.
    pub async fn fetch_snapshot(&self) -> Result<DatedSnapshot> {
        let index = self.fetch_building_index().await?;
        Ok(self.fetch_all_statuses(&index).await)
    }

    /// `Ok(None)` when the summary page has no stats block today.
    pub async fn fetch_sales_stats(&self) -> Result<Option<SalesStats>> {
        let html = self
            .portal
            .fetch_html(&self.project.summary_url, self.http.summary_timeout())
            .await?;
        parse_sales_stats(&html)
    }
}
