use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Sale status of a single unit, as painted on the portal's status grid.
///
/// Serialized with the portal's own labels so snapshot files stay readable
/// by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UnitStatus {
    #[serde(rename = "不可售")]
    Unavailable,
    #[serde(rename = "可售")]
    Available,
    #[serde(rename = "已预订")]
    Reserved,
    #[serde(rename = "已签约")]
    Signed,
    #[serde(rename = "已办理预售项目抵押")]
    Mortgaged,
    #[serde(rename = "网上联机备案")]
    OnlineFiled,
    #[serde(rename = "资格核验中")]
    QualificationPending,
    #[serde(rename = "其他")]
    Other,
}

// Order matters: the first color found in the style wins.
const COLOR_TABLE: [(&str, UnitStatus); 7] = [
    ("#CCCCCC", UnitStatus::Unavailable),
    ("#33CC00", UnitStatus::Available),
    ("#FFCC99", UnitStatus::Reserved),
    ("#FF0000", UnitStatus::Signed),
    ("#FFFF00", UnitStatus::Mortgaged),
    ("#D2691E", UnitStatus::OnlineFiled),
    ("#00FFFF", UnitStatus::QualificationPending),
];

impl UnitStatus {
    /// Map an inline `style` attribute to a status. Unknown colors are `Other`.
    pub fn from_style(style: &str) -> Self {
        let style = style.to_uppercase();
        COLOR_TABLE
            .iter()
            .find(|(color, _)| style.contains(color))
            .map(|(_, status)| *status)
            .unwrap_or(UnitStatus::Other)
    }

    pub fn label(&self) -> &'static str {
        match self {
            UnitStatus::Unavailable => "不可售",
            UnitStatus::Available => "可售",
            UnitStatus::Reserved => "已预订",
            UnitStatus::Signed => "已签约",
            UnitStatus::Mortgaged => "已办理预售项目抵押",
            UnitStatus::OnlineFiled => "网上联机备案",
            UnitStatus::QualificationPending => "资格核验中",
            UnitStatus::Other => "其他",
        }
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitRecord {
    #[serde(rename = "house_no")]
    pub unit_id: String,
    pub status: UnitStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<f64>,
}

impl UnitRecord {
    pub fn new(unit_id: impl Into<String>, status: UnitStatus) -> Self {
        Self {
            unit_id: unit_id.into(),
            status,
            area: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingSnapshot {
    pub building_name: String,
    #[serde(rename = "house_data")]
    pub units: Vec<UnitRecord>,
    #[serde(rename = "status_count", default)]
    pub status_counts: BTreeMap<UnitStatus, usize>,
}

impl BuildingSnapshot {
    /// Build a snapshot and derive its per-status counts from `units`.
    pub fn new(building_name: impl Into<String>, units: Vec<UnitRecord>) -> Self {
        let mut status_counts = BTreeMap::new();
        for unit in &units {
            *status_counts.entry(unit.status).or_insert(0) += 1;
        }

        Self {
            building_name: building_name.into(),
            units,
            status_counts,
        }
    }
}

/// Every building's status grid captured on one calendar date.
pub type DatedSnapshot = BTreeMap<String, BuildingSnapshot>;

/// building name -> unit id -> floor area (m²)
pub type AreaMap = BTreeMap<String, BTreeMap<String, f64>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTransition {
    pub building_name: String,
    pub unit_id: String,
    /// `None` when the unit did not exist in the older snapshot.
    pub prev_status: Option<UnitStatus>,
    pub curr_status: UnitStatus,
}

impl StatusTransition {
    /// A unit leaving AVAILABLE is the only transition counted as a sale.
    pub fn is_sale(&self) -> bool {
        self.prev_status == Some(UnitStatus::Available)
    }
}

impl fmt::Display for StatusTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prev = self.prev_status.map(|s| s.label()).unwrap_or("不存在");
        write!(
            f,
            "{}/{}: {} -> {}",
            self.building_name, self.unit_id, prev, self.curr_status
        )
    }
}

/// Cumulative figures from the portal's summary page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SalesStats {
    pub signed_units: u64,
    pub signed_area: f64,
    pub avg_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoldUnit {
    pub building_name: String,
    #[serde(rename = "house_no")]
    pub unit_id: String,
    pub area: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    #[serde(rename = "日期")]
    pub date: NaiveDate,
    #[serde(rename = "已签约套数")]
    pub cumulative_signed_units: u64,
    #[serde(rename = "已签约面积(M2)")]
    pub cumulative_signed_area: f64,
    #[serde(rename = "成交均价(￥/M2)")]
    pub cumulative_avg_price: f64,
    #[serde(rename = "成交户号", default)]
    pub sold_units: Vec<SoldUnit>,
    #[serde(rename = "面积(M2)", with = "blank_number", default)]
    pub daily_delta_area: Option<f64>,
    #[serde(rename = "总价(￥)", with = "blank_number", default)]
    pub daily_delta_total_price: Option<f64>,
    #[serde(rename = "均价(￥/M2)", with = "blank_number", default)]
    pub daily_delta_avg_price: Option<f64>,
}

/// Absent deltas are stored as `""`; reads accept `""`, null, numbers and
/// numeric strings.
mod blank_number {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_f64(*v),
            None => serializer.serialize_str(""),
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        match Option::<Raw>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Raw::Number(v)) => Ok(Some(v)),
            Some(Raw::Text(s)) if s.trim().is_empty() => Ok(None),
            Some(Raw::Text(s)) => s
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| de::Error::custom(format!("expected number or blank, got {:?}", s))),
        }
    }
}
