pub mod memory;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{PopBucket, PopulationRow};

pub use memory::MemoryStore;

pub type Inventory = BTreeMap<String, i64>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityRow {
    pub id: u64,
    pub name: String,
    pub x: i32,
    pub y: i32,
    /// Whether the city is driven by the AI engine (vs. player-owned).
    pub ai: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("city {0} not found")]
    CityNotFound(u64),
    #[error("store conflict: {0}")]
    Conflict(String),
    #[error("store backend: {0}")]
    Backend(String),
}

/// Read side of the persistent store. All methods are non-locking and may
/// return slightly stale data; anything the engine intends to mutate must be
/// re-read through a [`StoreTx`] lock first.
pub trait Store {
    fn city(&self, id: u64) -> Result<CityRow, StoreError>;
    fn inventory(&self, id: u64) -> Result<Inventory, StoreError>;
    fn population(&self, id: u64) -> Result<BTreeMap<PopBucket, PopulationRow>, StoreError>;
    fn building_levels(&self, id: u64) -> Result<BTreeMap<String, u32>, StoreError>;
    fn base_prices(&self) -> Result<BTreeMap<String, f64>, StoreError>;
    /// Up to `limit` AI-controlled cities, excluding `exclude` if given.
    /// Selection order is arbitrary but stable for a given store state.
    fn ai_cities(&self, exclude: Option<u64>, limit: usize) -> Result<Vec<CityRow>, StoreError>;
    fn begin(&mut self) -> Result<Box<dyn StoreTx + '_>, StoreError>;
}

/// One open transaction. Locking reads pin the rows they return until
/// commit or rollback; writes are deltas applied atomically on commit.
/// Dropping a transaction without committing discards it.
pub trait StoreTx {
    fn lock_inventory(&mut self, city: u64) -> Result<Inventory, StoreError>;
    fn lock_population(
        &mut self,
        city: u64,
    ) -> Result<BTreeMap<PopBucket, PopulationRow>, StoreError>;
    fn building_level(&mut self, city: u64, building: &str) -> Result<u32, StoreError>;
    /// Adjust a resource amount by delta. Amounts are clamped at zero on
    /// apply; callers are expected to validate sufficiency under lock first.
    fn adjust_resource(&mut self, city: u64, resource: &str, delta: i64)
    -> Result<(), StoreError>;
    fn set_building_level(
        &mut self,
        city: u64,
        building: &str,
        level: u32,
    ) -> Result<(), StoreError>;
    fn add_population_capacity(
        &mut self,
        city: u64,
        bucket: PopBucket,
        delta: u32,
    ) -> Result<(), StoreError>;
    fn reserve_workers(&mut self, city: u64, bucket: PopBucket, count: u32)
    -> Result<(), StoreError>;
    fn commit(self: Box<Self>) -> Result<(), StoreError>;
    fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
