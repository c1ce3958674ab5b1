use chrono::NaiveDate;
use tracing::{debug, error, info, warn};

use crate::analysis::differ::diff;
use crate::analysis::reconcile::{build_entry, collect_sold_units, compute_delta, find_base_record};
use crate::data::fetcher::SnapshotFetcher;
use crate::data::portal::Portal;
use crate::data::types::{AreaMap, LedgerEntry, SoldUnit};
use crate::error::{PipelineError, Result};
use crate::jobs::RunContext;
use crate::storage::areas::AreaMapStore;
use crate::storage::ledger::{Ledger, LedgerStore};
use crate::storage::paths::ProjectPaths;
use crate::storage::snapshots::SnapshotStore;

/// `update data <project>`: returns whether today's ledger entry was written.
pub async fn reconcile_ledger<P: Portal>(ctx: &RunContext<'_, P>, project: &str, today: NaiveDate) -> bool {
    info!("Updating sales ledger: project={} date={}", project, today);

    match run_reconciliation(ctx, project, today).await {
        Ok(entry) => {
            info!(
                "Ledger entry {} written: area={} delta={:?} sold_units={}",
                entry.date,
                entry.cumulative_signed_area,
                entry.daily_delta_area,
                entry.sold_units.len()
            );
            true
        }
        Err(e) => {
            error!("Ledger update failed for {}: {}", project, e);
            false
        }
    }
}

/// One reconciliation run.
///
/// The summary figures are committed first; the per-unit scrape only runs
/// when the signed area grew, and its failure leaves that entry in place.
pub async fn run_reconciliation<P: Portal>(
    ctx: &RunContext<'_, P>,
    project: &str,
    today: NaiveDate,
) -> Result<LedgerEntry> {
    let project_config = ctx.config.project(project)?;
    let paths = ctx.paths(project);
    let fetcher = SnapshotFetcher::new(ctx.portal, project_config, &ctx.config.http);

    let stats = fetcher
        .fetch_sales_stats()
        .await?
        .ok_or(PipelineError::StatsUnavailable)?;
    info!(
        "Summary: {} units, {} m², {} per m²",
        stats.signed_units, stats.signed_area, stats.avg_price
    );

    let ledger_store = LedgerStore::new(paths.clone());
    let mut ledger = ledger_store.load()?;

    let base = find_base_record(&ledger, today);
    match base {
        Some(b) => debug!("Base record: {}", b.date),
        None => debug!("No base record, starting from zero"),
    }
    let delta = compute_delta(&stats, base);
    let entry = build_entry(today, &stats, &delta);

    ledger.upsert(entry.clone());
    ledger_store.save(&ledger)?;

    if !delta.has_new_sales() {
        info!("Signed area unchanged (delta {}), skipping unit scrape", delta.area);
        return Ok(entry);
    }

    match detect_sold_units(&fetcher, &paths, today).await {
        Ok(sold) if sold.is_empty() => info!("No unit left AVAILABLE since the previous snapshot"),
        Ok(sold) => return Ok(record_sold_units(&ledger_store, &mut ledger, entry, sold)),
        Err(e) => warn!("Unit scrape gave no sold units: {}", e),
    }

    Ok(entry)
}

/// Rewrite today's entry with its sold units. If that save fails, the
/// summary-only entry already on disk stands and is returned.
fn record_sold_units(
    ledger_store: &LedgerStore,
    ledger: &mut Ledger,
    entry: LedgerEntry,
    sold: Vec<SoldUnit>,
) -> LedgerEntry {
    let with_units = LedgerEntry {
        sold_units: sold,
        ..entry.clone()
    };
    ledger.upsert(with_units.clone());

    match ledger_store.save(ledger) {
        Ok(()) => with_units,
        Err(e) => {
            warn!("Keeping summary-only entry for {}: {}", entry.date, e);
            ledger.upsert(entry.clone());
            entry
        }
    }
}

async fn detect_sold_units<P: Portal>(
    fetcher: &SnapshotFetcher<'_, P>,
    paths: &ProjectPaths,
    today: NaiveDate,
) -> Result<Vec<SoldUnit>> {
    let snapshot = fetcher.fetch_snapshot().await?;
    if snapshot.is_empty() {
        return Err(PipelineError::Parse("status scrape returned no buildings".to_string()));
    }

    let snapshots = SnapshotStore::new(paths.clone());
    snapshots.save(today, &snapshot)?;

    let pair = snapshots.load_two_most_recent()?;
    let transitions = diff(&pair.older, &pair.newer);
    info!(
        "{} status transitions between {} and {}",
        transitions.len(),
        pair.older_date,
        pair.newer_date
    );
    for transition in &transitions {
        debug!("{}", transition);
    }

    let areas = AreaMapStore::new(paths.clone()).load()?.unwrap_or_else(|| {
        warn!("No area map for {}, sold units get area 0", paths.root().display());
        AreaMap::new()
    });

    Ok(collect_sold_units(&transitions, &areas))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::portal::testing::FixturePortal;
    use crate::data::types::{BuildingSnapshot, DatedSnapshot, SalesStats, UnitRecord, UnitStatus};
    use crate::jobs::testing::*;
    use crate::storage::testing::temp_dir;
    use std::collections::BTreeMap;

    const AVAILABLE: &str = "#33CC00";
    const SIGNED: &str = "#FF0000";

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn paths(dir: &std::path::Path) -> ProjectPaths {
        ProjectPaths::new(dir, "house")
    }

    /// Ledger with a day-1 entry of 100 m² at 50000, and a day-1 snapshot
    /// where building A has units 101 and 102 available.
    fn seed(dir: &std::path::Path) {
        let stats = SalesStats {
            signed_units: 10,
            signed_area: 100.0,
            avg_price: 50000.0,
        };
        let entry = build_entry(day(1), &stats, &compute_delta(&stats, None));
        LedgerStore::new(paths(dir)).save(&Ledger::from_entries([entry])).unwrap();

        let snapshot = DatedSnapshot::from([(
            "A#住宅楼".to_string(),
            BuildingSnapshot::new(
                "A#住宅楼",
                vec![
                    UnitRecord::new("101", UnitStatus::Available),
                    UnitRecord::new("102", UnitStatus::Available),
                ],
            ),
        )]);
        SnapshotStore::new(paths(dir)).save(day(1), &snapshot).unwrap();
    }

    fn portal_with_sale() -> FixturePortal {
        FixturePortal::new()
            .page(SUMMARY_URL, &summary_page(11, 105.0, 50500.0))
            .page(INDEX_URL, &index_page(&[(1, "A#住宅楼"), (2, "B#住宅楼")]))
            .page(&building_url(1), &grid_page(&[("101", SIGNED), ("102", AVAILABLE)]))
            .page(&building_url(2), &grid_page(&[("201", SIGNED)]))
    }

    fn assert_delta_sign_law(ledger: &Ledger) {
        for entry in ledger.entries() {
            if !entry.sold_units.is_empty() {
                assert!(entry.daily_delta_area.is_some_and(|a| a > 0.0));
            }
            if entry.daily_delta_area.is_none() {
                assert!(entry.sold_units.is_empty());
            }
        }
    }

    #[tokio::test]
    async fn test_run_with_new_sales() {
        let dir = temp_dir("update-sale");
        seed(&dir);
        let areas = AreaMap::from([("A#住宅楼".to_string(), BTreeMap::from([("101".to_string(), 90.5)]))]);
        AreaMapStore::new(paths(&dir)).save(&areas).unwrap();
        let config = config(&dir);
        let portal = portal_with_sale();
        let ctx = RunContext::new(&config, &portal);

        assert!(reconcile_ledger(&ctx, "house", day(2)).await);

        let ledger = LedgerStore::new(paths(&dir)).load().unwrap();
        let entry = ledger.get(day(2)).unwrap();
        assert_eq!(entry.cumulative_signed_units, 11);
        assert_eq!(entry.daily_delta_area, Some(5.0));
        assert_eq!(entry.daily_delta_total_price, Some(302500.0));
        assert_eq!(entry.daily_delta_avg_price, Some(60500.0));
        assert_eq!(
            entry.sold_units,
            vec![SoldUnit {
                building_name: "A#住宅楼".into(),
                unit_id: "101".into(),
                area: 90.5
            }]
        );
        assert!(SnapshotStore::new(paths(&dir)).load(day(2)).unwrap().is_some());
        assert_delta_sign_law(&ledger);
    }

    #[tokio::test]
    async fn test_same_day_rerun_is_idempotent() {
        let dir = temp_dir("update-rerun");
        seed(&dir);
        let config = config(&dir);
        let portal = portal_with_sale();
        let ctx = RunContext::new(&config, &portal);

        assert!(reconcile_ledger(&ctx, "house", day(2)).await);
        let first = std::fs::read(paths(&dir).ledger_file()).unwrap();
        assert!(reconcile_ledger(&ctx, "house", day(2)).await);
        let second = std::fs::read(paths(&dir).ledger_file()).unwrap();

        assert_eq!(first, second);
        let ledger = LedgerStore::new(paths(&dir)).load().unwrap();
        assert_eq!(ledger.len(), 2);
        // Unit 101 has no mapped area.
        assert_eq!(ledger.get(day(2)).unwrap().sold_units[0].area, 0.0);
        assert_eq!(ledger.get(day(2)).unwrap().daily_delta_area, Some(5.0));
    }

    #[tokio::test]
    async fn test_unchanged_area_skips_scrape() {
        let dir = temp_dir("update-flat");
        seed(&dir);
        let config = config(&dir);
        let portal = FixturePortal::new().page(SUMMARY_URL, &summary_page(10, 100.0, 50000.0));
        let ctx = RunContext::new(&config, &portal);

        assert!(reconcile_ledger(&ctx, "house", day(2)).await);

        assert!(!portal.requested(INDEX_URL));
        let ledger = LedgerStore::new(paths(&dir)).load().unwrap();
        let entry = ledger.get(day(2)).unwrap();
        assert_eq!(entry.daily_delta_area, None);
        assert_eq!(entry.daily_delta_total_price, None);
        assert_eq!(entry.daily_delta_avg_price, None);
        assert!(entry.sold_units.is_empty());
        assert!(SnapshotStore::new(paths(&dir)).load(day(2)).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_stats_leaves_ledger_untouched() {
        let dir = temp_dir("update-nostats");
        seed(&dir);
        let before = std::fs::read(paths(&dir).ledger_file()).unwrap();
        let config = config(&dir);
        let portal = FixturePortal::new().page(SUMMARY_URL, "<table><tr><td>维护中</td></tr></table>");
        let ctx = RunContext::new(&config, &portal);

        assert!(!reconcile_ledger(&ctx, "house", day(2)).await);
        let err = run_reconciliation(&ctx, "house", day(2)).await.unwrap_err();
        assert!(matches!(err, PipelineError::StatsUnavailable));

        assert_eq!(std::fs::read(paths(&dir).ledger_file()).unwrap(), before);
    }

    #[tokio::test]
    async fn test_network_failure_aborts_run() {
        let dir = temp_dir("update-offline");
        let config = config(&dir);
        let portal = FixturePortal::new();
        let ctx = RunContext::new(&config, &portal);

        assert!(!reconcile_ledger(&ctx, "house", day(2)).await);
        assert!(!paths(&dir).ledger_file().exists());
    }

    #[tokio::test]
    async fn test_first_snapshot_keeps_summary_entry() {
        let dir = temp_dir("update-firstsnap");
        let config = config(&dir);
        let portal = portal_with_sale();
        let ctx = RunContext::new(&config, &portal);

        assert!(reconcile_ledger(&ctx, "house", day(2)).await);

        let ledger = LedgerStore::new(paths(&dir)).load().unwrap();
        let entry = ledger.get(day(2)).unwrap();
        assert_eq!(entry.daily_delta_area, Some(105.0));
        assert!(entry.sold_units.is_empty());
        assert_eq!(SnapshotStore::new(paths(&dir)).list_dates().unwrap(), vec![day(2)]);
    }

    #[tokio::test]
    async fn test_failed_status_scrape_keeps_summary_entry() {
        let dir = temp_dir("update-noindex");
        seed(&dir);
        let config = config(&dir);
        let portal = FixturePortal::new().page(SUMMARY_URL, &summary_page(11, 105.0, 50500.0));
        let ctx = RunContext::new(&config, &portal);

        assert!(reconcile_ledger(&ctx, "house", day(2)).await);

        let ledger = LedgerStore::new(paths(&dir)).load().unwrap();
        let entry = ledger.get(day(2)).unwrap();
        assert_eq!(entry.daily_delta_area, Some(5.0));
        assert!(entry.sold_units.is_empty());
        assert_delta_sign_law(&ledger);
    }

    #[test]
    fn test_failed_unit_save_returns_summary_entry() {
        let dir = temp_dir("update-readonly");
        std::fs::write(dir.join("house"), "not a directory").unwrap();
        let store = LedgerStore::new(paths(&dir));
        let stats = SalesStats {
            signed_units: 11,
            signed_area: 105.0,
            avg_price: 50500.0,
        };
        let entry = build_entry(day(2), &stats, &compute_delta(&stats, None));
        let mut ledger = Ledger::from_entries([entry.clone()]);
        let sold = vec![SoldUnit {
            building_name: "A#住宅楼".into(),
            unit_id: "101".into(),
            area: 89.5,
        }];

        let kept = record_sold_units(&store, &mut ledger, entry.clone(), sold);

        assert_eq!(kept, entry);
        assert!(ledger.get(day(2)).unwrap().sold_units.is_empty());
    }

    #[test]
    fn test_unit_save_attaches_sold_units() {
        let dir = temp_dir("update-attach");
        let store = LedgerStore::new(paths(&dir));
        let stats = SalesStats {
            signed_units: 11,
            signed_area: 105.0,
            avg_price: 50500.0,
        };
        let entry = build_entry(day(2), &stats, &compute_delta(&stats, None));
        let mut ledger = Ledger::from_entries([entry.clone()]);
        let sold = vec![SoldUnit {
            building_name: "A#住宅楼".into(),
            unit_id: "101".into(),
            area: 89.5,
        }];

        let saved = record_sold_units(&store, &mut ledger, entry, sold.clone());

        assert_eq!(saved.sold_units, sold);
        assert_eq!(store.load().unwrap().get(day(2)).unwrap().sold_units, sold);
    }

    #[tokio::test]
    async fn test_unknown_project() {
        let dir = temp_dir("update-unknown");
        let config = config(&dir);
        let portal = FixturePortal::new();
        let ctx = RunContext::new(&config, &portal);

        let err = run_reconciliation(&ctx, "warehouse", day(2)).await.unwrap_err();
        assert!(matches!(err, PipelineError::UnknownProject(_)));
    }
}
