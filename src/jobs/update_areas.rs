use tracing::{info, warn};

use crate::data::area_crawler::AreaCrawler;
use crate::data::fetcher::SnapshotFetcher;
use crate::data::portal::Portal;
use crate::data::types::AreaMap;
use crate::error::Result;
use crate::jobs::RunContext;
use crate::storage::areas::AreaMapStore;

/// `update areas <project>`: crawl every unit's floor area and replace the
/// stored area map.
pub async fn build_area_map<P: Portal>(ctx: &RunContext<'_, P>, project: &str) -> Result<AreaMap> {
    let project_config = ctx.config.project(project)?;
    info!("Building area map: project={}", project);

    let index = SnapshotFetcher::new(ctx.portal, project_config, &ctx.config.http)
        .fetch_building_index()
        .await?;
    let areas = AreaCrawler::new(ctx.portal, project_config, &ctx.config.http)
        .crawl(&index)
        .await;

    if areas.is_empty() {
        warn!("Area map for {} is empty", project);
    }
    AreaMapStore::new(ctx.paths(project)).save(&areas)?;

    let units: usize = areas.values().map(|units| units.len()).sum();
    info!("Area map for {}: {} buildings, {} units", project, areas.len(), units);
    Ok(areas)
}
