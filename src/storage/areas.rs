use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use crate::data::types::AreaMap;
use crate::error::Result;
use crate::storage::json::{read_json, write_json};
use crate::storage::paths::ProjectPaths;

#[derive(Debug, Serialize, Deserialize)]
struct BuildingAreas {
    building_name: String,
    house_data: Vec<UnitArea>,
}

#[derive(Debug, Serialize, Deserialize)]
struct UnitArea {
    house_no: String,
    area: f64,
}

/// `<project>/areas/areas.json`, rebuilt wholesale on every crawl.
pub struct AreaMapStore {
    paths: ProjectPaths,
}

impl AreaMapStore {
    pub fn new(paths: ProjectPaths) -> Self {
        Self { paths }
    }

    /// `Ok(None)` when no crawl has been persisted yet.
    pub fn load(&self) -> Result<Option<AreaMap>> {
        let raw: Option<BTreeMap<String, BuildingAreas>> = read_json(&self.paths.areas_file())?;

        Ok(raw.map(|buildings| {
            buildings
                .into_iter()
                .map(|(name, building)| {
                    let units: BTreeMap<String, f64> = building
                        .house_data
                        .into_iter()
                        .map(|u| (u.house_no, u.area))
                        .collect();
                    (name, units)
                })
                .collect()
        }))
    }

    pub fn save(&self, areas: &AreaMap) -> Result<()> {
        let raw: BTreeMap<&str, BuildingAreas> = areas
            .iter()
            .map(|(name, units)| {
                let house_data = units
                    .iter()
                    .map(|(house_no, area)| UnitArea {
                        house_no: house_no.clone(),
                        area: *area,
                    })
                    .collect();
                (
                    name.as_str(),
                    BuildingAreas {
                        building_name: name.clone(),
                        house_data,
                    },
                )
            })
            .collect();

        let path = self.paths.areas_file();
        write_json(&path, &raw)?;
        info!("Saved area map {} ({} buildings)", path.display(), areas.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::testing::temp_dir;

    #[test]
    fn test_missing_map() {
        let store = AreaMapStore::new(ProjectPaths::new(temp_dir("areas-missing"), "house"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_file_shape() {
        let paths = ProjectPaths::new(temp_dir("areas-shape"), "house");
        let store = AreaMapStore::new(paths.clone());
        let areas = AreaMap::from([(
            "1#住宅楼".to_string(),
            BTreeMap::from([("101".to_string(), 89.5), ("102".to_string(), 120.25)]),
        )]);

        store.save(&areas).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(paths.areas_file()).unwrap()).unwrap();
        assert_eq!(json["1#住宅楼"]["building_name"], "1#住宅楼");
        assert_eq!(json["1#住宅楼"]["house_data"][1]["house_no"], "102");
        assert_eq!(json["1#住宅楼"]["house_data"][1]["area"], 120.25);
        assert_eq!(store.load().unwrap(), Some(areas));
    }
}
