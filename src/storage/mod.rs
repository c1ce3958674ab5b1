pub mod areas;
pub mod json;
pub mod ledger;
pub mod paths;
pub mod snapshots;
