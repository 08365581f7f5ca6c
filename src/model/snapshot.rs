use std::collections::BTreeMap;

use serde::Serialize;

/// Another AI city visible to the planner. Only identity and position —
/// inventory is read lazily (and re-validated under lock) when a trade
/// actually targets the neighbor.
#[derive(Debug, Clone, Serialize)]
pub struct Neighbor {
    pub id: u64,
    pub x: i32,
    pub y: i32,
}

/// Immutable view of one city's world for a single tick.
///
/// Built once by perception, shared by the trade and build planners, then
/// discarded. Never persisted. Reads are non-locking and may be slightly
/// stale; the executor re-validates everything under lock before mutating.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub city: u64,
    pub x: i32,
    pub y: i32,
    pub inventory: BTreeMap<String, i64>,
    pub base_prices: BTreeMap<String, f64>,
    pub neighbors: Vec<Neighbor>,
}

impl Snapshot {
    /// Stock of a resource, zero when absent.
    pub fn amount(&self, resource: &str) -> i64 {
        self.inventory.get(resource).copied().unwrap_or(0)
    }

    /// Global base price of a resource, if the store knows it.
    pub fn base_price(&self, resource: &str) -> Option<f64> {
        self.base_prices.get(resource).copied()
    }
}
