pub mod update_areas;
pub mod update_data;

use chrono::{FixedOffset, NaiveDate, Offset, Utc};

use crate::config::Config;
use crate::storage::paths::ProjectPaths;

/// What one invocation works with. Nothing here outlives the run.
pub struct RunContext<'a, P> {
    pub config: &'a Config,
    pub portal: &'a P,
}

impl<'a, P> RunContext<'a, P> {
    pub fn new(config: &'a Config, portal: &'a P) -> Self {
        Self { config, portal }
    }

    pub fn paths(&self, project: &str) -> ProjectPaths {
        ProjectPaths::new(&self.config.system.data_dir, project)
    }
}

/// Current calendar date at a fixed UTC offset (the portal's local day).
pub fn today(utc_offset_hours: i32) -> NaiveDate {
    let offset = FixedOffset::east_opt(utc_offset_hours * 3600).unwrap_or_else(|| Utc.fix());
    Utc::now().with_timezone(&offset).date_naive()
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::BTreeMap;
    use std::path::Path;

    use crate::config::{Config, HttpConfig, ProjectConfig, SystemConfig};

    pub const INDEX_URL: &str = "http://portal.test/index";
    pub const SUMMARY_URL: &str = "http://portal.test/summary";

    pub fn config(data_dir: &Path) -> Config {
        Config {
            system: SystemConfig {
                data_dir: data_dir.to_string_lossy().into_owned(),
                utc_offset_hours: 8,
            },
            http: HttpConfig {
                request_delay_ms: 0,
                ..HttpConfig::default()
            },
            projects: BTreeMap::from([(
                "house".to_string(),
                ProjectConfig {
                    index_url: INDEX_URL.into(),
                    base_url: "http://portal.test".into(),
                    summary_url: SUMMARY_URL.into(),
                    building_suffix: "住宅楼".into(),
                },
            )]),
        }
    }

    pub fn building_url(id: u32) -> String {
        format!("http://portal.test/ui?pageId=320833&buildingId={id}&salePermitId=1")
    }

    pub fn index_page(buildings: &[(u32, &str)]) -> String {
        buildings
            .iter()
            .map(|(id, name)| format!(r#"<a href="/ui?pageId=320833&buildingId={id}&salePermitId=1">{name}</a>"#))
            .collect()
    }

    pub fn grid_page(units: &[(&str, &str)]) -> String {
        let cells: String = units
            .iter()
            .map(|(unit, color)| format!(r#"<td><div style="background:{color}"><a>{unit}</a></div></td>"#))
            .collect();
        format!(r#"<table id="table_Buileing"><tr>{cells}</tr></table>"#)
    }

    pub fn summary_page(units: u64, area: f64, price: f64) -> String {
        format!(
            r#"<table><tr><td>期房签约统计</td></tr><tr><td><table>
                <tr><td>已签约套数</td><td>已签约面积(M2)</td><td>成交均价(￥/M2)</td></tr>
                <tr><td>{units}</td><td>{area}</td><td>{price}</td></tr>
            </table></td></tr></table>"#
        )
    }
}
