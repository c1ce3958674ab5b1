use std::collections::HashMap;
use tracing::warn;

use crate::data::types::{DatedSnapshot, StatusTransition, UnitStatus};

/// Unit-level status changes between two snapshots.
///
/// Output follows `newer`'s building order, then unit order. A building
/// with no baseline in `older` contributes nothing; a unit missing from its
/// building's baseline is reported with `prev_status = None`.
pub fn diff(older: &DatedSnapshot, newer: &DatedSnapshot) -> Vec<StatusTransition> {
    let mut transitions = Vec::new();

    for (building_name, current) in newer {
        let Some(previous) = older.get(building_name) else {
            warn!("Skipping {}: no baseline in previous snapshot", building_name);
            continue;
        };

        let baseline: HashMap<&str, UnitStatus> = previous
            .units
            .iter()
            .map(|u| (u.unit_id.as_str(), u.status))
            .collect();

        for unit in &current.units {
            let prev_status = baseline.get(unit.unit_id.as_str()).copied();
            if prev_status != Some(unit.status) {
                transitions.push(StatusTransition {
                    building_name: building_name.clone(),
                    unit_id: unit.unit_id.clone(),
                    prev_status,
                    curr_status: unit.status,
                });
            }
        }
    }

    transitions
}
