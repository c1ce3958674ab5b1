use chrono::NaiveDate;

use crate::data::types::{AreaMap, LedgerEntry, SalesStats, SoldUnit, StatusTransition};
use crate::storage::ledger::Ledger;

/// Two decimals, exact halves to even (100.125 -> 100.12).
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Entry to diff today's cumulative stats against.
///
/// If the latest entry is not today's, it is the base. If it is today's (a
/// same-day rerun), the base is the entry before it, so today is never
/// compared against itself.
pub fn find_base_record(ledger: &Ledger, today: NaiveDate) -> Option<&LedgerEntry> {
    let mut newest_first = ledger.entries().rev();
    let latest = newest_first.next()?;
    if latest.date != today {
        return Some(latest);
    }
    newest_first.next()
}

/// Day-over-day change in the cumulative figures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyDelta {
    pub area: f64,
    /// Only present when `area > 0`.
    pub total_price: Option<f64>,
    pub avg_price: Option<f64>,
}

impl DailyDelta {
    pub fn has_new_sales(&self) -> bool {
        self.area > 0.0
    }
}

pub fn compute_delta(today: &SalesStats, base: Option<&LedgerEntry>) -> DailyDelta {
    let (base_area, base_price) = base
        .map(|b| (b.cumulative_signed_area, b.cumulative_avg_price))
        .unwrap_or((0.0, 0.0));

    let area = round2(today.signed_area - base_area);
    if area <= 0.0 {
        return DailyDelta {
            area,
            total_price: None,
            avg_price: None,
        };
    }

    let total_price = round2(today.signed_area * today.avg_price - base_area * base_price);
    DailyDelta {
        area,
        total_price: Some(total_price),
        avg_price: Some(round2(total_price / area)),
    }
}

/// Today's entry from the summary figures alone; `sold_units` starts empty.
pub fn build_entry(date: NaiveDate, stats: &SalesStats, delta: &DailyDelta) -> LedgerEntry {
    LedgerEntry {
        date,
        cumulative_signed_units: stats.signed_units,
        cumulative_signed_area: round2(stats.signed_area),
        cumulative_avg_price: round2(stats.avg_price),
        sold_units: Vec::new(),
        daily_delta_area: delta.has_new_sales().then_some(delta.area),
        daily_delta_total_price: delta.total_price,
        daily_delta_avg_price: delta.avg_price,
    }
}

/// Units that left AVAILABLE, with their floor area (0.0 when unmapped).
pub fn collect_sold_units(transitions: &[StatusTransition], areas: &AreaMap) -> Vec<SoldUnit> {
    transitions
        .iter()
        .filter(|t| t.is_sale())
        .map(|t| SoldUnit {
            building_name: t.building_name.clone(),
            unit_id: t.unit_id.clone(),
            area: areas
                .get(&t.building_name)
                .and_then(|units| units.get(&t.unit_id))
                .copied()
                .unwrap_or(0.0),
        })
        .collect()
}
