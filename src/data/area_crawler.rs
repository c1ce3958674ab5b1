use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::config::{HttpConfig, ProjectConfig};
use crate::data::parsers::{parse_floor_area, parse_unit_links};
use crate::data::portal::Portal;
use crate::data::types::AreaMap;
use crate::error::Result;

/// Crawls unit detail pages to build the building -> unit -> floor area map.
pub struct AreaCrawler<'a, P> {
    portal: &'a P,
    project: &'a ProjectConfig,
    http: &'a HttpConfig,
}

impl<'a, P: Portal> AreaCrawler<'a, P> {
    pub fn new(portal: &'a P, project: &'a ProjectConfig, http: &'a HttpConfig) -> Self {
        Self {
            portal,
            project,
            http,
        }
    }

    /// Crawl every building in `index` (building name -> listing URL).
    ///
    /// Buildings run in the bounded pool; unit pages of one building are
    /// fetched one at a time with the configured delay in between.
    pub async fn crawl(&self, index: &BTreeMap<String, String>) -> AreaMap {
        let results: Vec<_> = stream::iter(index)
            .map(|(name, url)| async move { (name, self.crawl_building(name, url).await) })
            .buffer_unordered(self.http.workers())
            .collect()
            .await;

        let mut areas = AreaMap::new();
        for (name, result) in results {
            match result {
                Ok(units) if units.is_empty() => warn!("No unit areas found for {}", name),
                Ok(units) => {
                    areas.insert(name.clone(), units);
                }
                Err(e) => warn!("Skipping building {}: {}", name, e),
            }
        }

        info!("Area map covers {}/{} buildings", areas.len(), index.len());
        areas
    }

    /// unit id -> floor area for one building. Units whose area cannot be
    /// read are dropped, never recorded as zero.
    pub async fn crawl_building(&self, building_name: &str, url: &str) -> Result<BTreeMap<String, f64>> {
        let html = self.portal.fetch_html(url, self.http.timeout()).await?;
        let links = parse_unit_links(&html, &self.project.base_url)?;
        info!("{}: {} unit pages", building_name, links.len());

        let mut units = BTreeMap::new();
        for (i, link) in links.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.http.request_delay()).await;
            }

            let page = match self.portal.fetch_html(&link.url, self.http.timeout()).await {
                Ok(page) => page,
                Err(e) => {
                    warn!("{} {}: {}", building_name, link.unit_id, e);
                    continue;
                }
            };

            match parse_floor_area(&page) {
                Some(area) => {
                    units.insert(link.unit_id.clone(), area);
                }
                None => warn!("{} {}: floor area not found", building_name, link.unit_id),
            }
        }

        Ok(units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::portal::testing::FixturePortal;

    fn project() -> ProjectConfig {
        ProjectConfig {
            index_url: "http://portal.test/index".into(),
            base_url: "http://portal.test".into(),
            summary_url: "http://portal.test/summary".into(),
            building_suffix: "住宅楼".into(),
        }
    }

    fn http() -> HttpConfig {
        HttpConfig {
            request_delay_ms: 0,
            ..HttpConfig::default()
        }
    }

    fn detail(area: &str) -> String {
        format!("<table><tr><td>建筑面积</td><td>{area}</td></tr></table>")
    }

    #[tokio::test]
    async fn test_crawl_drops_unparsable_units() {
        let listing = r#"
            <a href="/ui?pageId=373432&houseId=1">101</a>
            <a href="/ui?pageId=373432&houseId=2">102</a>
            <a href="/ui?pageId=373432&houseId=3">103</a>
        "#;
        let portal = FixturePortal::new()
            .page("http://portal.test/b1", listing)
            .page("http://portal.test/ui?pageId=373432&houseId=1", &detail("89.5平方米"))
            .page("http://portal.test/ui?pageId=373432&houseId=2", &detail("--"));
        let project = project();
        let http = http();
        let crawler = AreaCrawler::new(&portal, &project, &http);

        let index = BTreeMap::from([
            ("1#住宅楼".to_string(), "http://portal.test/b1".to_string()),
            ("2#住宅楼".to_string(), "http://portal.test/missing".to_string()),
        ]);
        let areas = crawler.crawl(&index).await;

        assert_eq!(areas.len(), 1);
        assert_eq!(areas["1#住宅楼"], BTreeMap::from([("101".to_string(), 89.5)]));
    }
}
