pub mod differ;
pub mod reconcile;
