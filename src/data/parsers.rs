use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use url::Url;

use crate::data::types::{BuildingSnapshot, SalesStats, UnitRecord, UnitStatus};
use crate::error::{PipelineError, Result};

const BUILDING_LINK_MARKERS: [&str; 3] = ["pageId=320833", "buildingId=", "salePermitId="];
const UNIT_LINK_MARKERS: [&str; 2] = ["pageId=373432", "houseId="];
const STATUS_TABLE: &str = "table#table_Buileing";
const FLOOR_AREA_LABEL: &str = "建筑面积";
const STATS_HEADER: &str = "期房签约统计";
const STATS_SIGNED_UNITS: &str = "已签约套数";
const STATS_SIGNED_AREA: &str = "已签约面积(M2)";
const STATS_AVG_PRICE: &str = "成交均价(￥/M2)";

/// A unit detail page discovered on a building listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitLink {
    pub unit_id: String,
    pub url: String,
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| PipelineError::Parse(format!("bad selector {css}: {e}")))
}

/// Concatenated text of all descendant nodes, each piece trimmed.
fn text_of(element: ElementRef<'_>) -> String {
    element.text().map(str::trim).collect()
}

/// Resolve `href` against the portal base. Detail pages are only served over
/// plain HTTP, so an https result is downgraded.
fn resolve_link(base: &Url, href: &str) -> Result<String> {
    let full = base.join(href)?.to_string();
    Ok(match full.strip_prefix("https://") {
        Some(rest) => format!("http://{rest}"),
        None => full,
    })
}

/// Extract `building name -> listing URL` from the project index page.
pub fn parse_building_index(
    html: &str,
    base_url: &str,
    building_suffix: &str,
) -> Result<BTreeMap<String, String>> {
    let document = Html::parse_document(html);
    let anchors = selector("a[href]")?;
    let base = Url::parse(base_url)?;

    let mut buildings = BTreeMap::new();
    for a in document.select(&anchors) {
        let href = a.value().attr("href").unwrap_or_default();
        let name = text_of(a);

        if BUILDING_LINK_MARKERS.iter().all(|m| href.contains(m)) && name.ends_with(building_suffix) {
            buildings.insert(name, resolve_link(&base, href)?);
        }
    }

    Ok(buildings)
}

/// Read the color-coded status grid of one building.
///
/// Fails with `Parse` when the status table is missing; the caller skips
/// that building.
pub fn parse_building_status(html: &str, building_name: &str) -> Result<BuildingSnapshot> {
    let document = Html::parse_document(html);
    let table_sel = selector(STATUS_TABLE)?;
    let div_sel = selector("div")?;
    let anchor_sel = selector("a")?;

    let table = document.select(&table_sel).next().ok_or_else(|| {
        PipelineError::Parse(format!("{STATUS_TABLE} not found for {building_name}"))
    })?;

    let mut units = Vec::new();
    for cell in table.select(&div_sel) {
        let style = cell.value().attr("style").unwrap_or_default();
        if !style.to_uppercase().contains("BACKGROUND") {
            continue;
        }
        let Some(anchor) = cell.select(&anchor_sel).next() else {
            continue;
        };
        units.push(UnitRecord::new(text_of(anchor), UnitStatus::from_style(style)));
    }

    Ok(BuildingSnapshot::new(building_name, units))
}

/// Collect the unit detail links of a building listing page.
pub fn parse_unit_links(html: &str, base_url: &str) -> Result<Vec<UnitLink>> {
    let document = Html::parse_document(html);
    let anchors = selector("a[href]")?;
    let base = Url::parse(base_url)?;

    let mut links = Vec::new();
    for a in document.select(&anchors) {
        let href = a.value().attr("href").unwrap_or_default();
        if UNIT_LINK_MARKERS.iter().all(|m| href.contains(m)) {
            links.push(UnitLink {
                unit_id: text_of(a),
                url: resolve_link(&base, href)?,
            });
        }
    }

    Ok(links)
}

/// Floor area from a unit detail page: the first number in the right cell
/// of the two-cell row labelled `建筑面积`.
pub fn parse_floor_area(html: &str) -> Option<f64> {
    let document = Html::parse_document(html);
    let rows = Selector::parse("tr").ok()?;
    let cells = Selector::parse("td").ok()?;
    let number = Regex::new(r"([\d.]+)").ok()?;

    for row in document.select(&rows) {
        let tds: Vec<_> = row.select(&cells).collect();
        if tds.len() != 2 || text_of(tds[0]) != FLOOR_AREA_LABEL {
            continue;
        }
        let right = text_of(tds[1]);
        if let Some(cap) = number.captures(&right) {
            return cap[1].parse().ok();
        }
    }

    None
}

fn parse_field<T: FromStr>(fields: &HashMap<String, String>, key: &str) -> Result<T> {
    let raw = fields.get(key).map(|v| v.replace(',', "")).unwrap_or_else(|| "0".to_string());
    raw.trim()
        .parse()
        .map_err(|_| PipelineError::Parse(format!("{key}: not a number: {raw:?}")))
}

/// Cumulative presale stats from the summary page.
///
/// `Ok(None)` means the stats block is absent today; a block that is present
/// but malformed is a `Parse` error.
pub fn parse_sales_stats(html: &str) -> Result<Option<SalesStats>> {
    let document = Html::parse_document(html);
    let td_sel = selector("td")?;
    let tr_sel = selector("tr")?;

    let Some(title) = document
        .select(&td_sel)
        .find(|td| td.text().collect::<String>().contains(STATS_HEADER))
    else {
        return Ok(None);
    };

    let outer = title
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "table")
        .ok_or_else(|| PipelineError::Parse(format!("{STATS_HEADER}: no enclosing table")))?;

    let data_table = outer
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "table")
        .ok_or_else(|| PipelineError::Parse(format!("{STATS_HEADER}: no nested data table")))?;

    let rows: Vec<_> = data_table.select(&tr_sel).collect();
    if rows.len() < 2 {
        return Err(PipelineError::Parse(format!(
            "{STATS_HEADER}: expected header and value rows, found {}",
            rows.len()
        )));
    }

    let headers = rows[0].select(&td_sel).map(text_of);
    let values = rows[1].select(&td_sel).map(text_of);
    let fields: HashMap<String, String> = headers.zip(values).collect();

    Ok(Some(SalesStats {
        signed_units: parse_field(&fields, STATS_SIGNED_UNITS)?,
        signed_area: parse_field(&fields, STATS_SIGNED_AREA)?,
        avg_price: parse_field(&fields, STATS_AVG_PRICE)?,
    }))
}
