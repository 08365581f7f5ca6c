use std::collections::BTreeMap;

use super::{CityRow, Inventory, Store, StoreError, StoreTx};
use crate::model::{PopBucket, PopulationRow};

/// Full state of one city as held by the reference store.
#[derive(Debug, Clone)]
pub struct CityState {
    pub row: CityRow,
    pub inventory: Inventory,
    pub population: BTreeMap<PopBucket, PopulationRow>,
    pub buildings: BTreeMap<String, u32>,
}

/// In-memory reference implementation of [`Store`].
///
/// Transactions buffer deltas and apply them on commit, so rollback is a
/// drop. Lock and write operations are counted, which lets tests assert
/// that a skipped tick touched nothing.
#[derive(Debug, Default)]
pub struct MemoryStore {
    cities: BTreeMap<u64, CityState>,
    prices: BTreeMap<String, f64>,
    next_id: u64,
    locks: u64,
    writes: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_city(&mut self, name: &str, x: i32, y: i32, ai: bool) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.cities.insert(
            id,
            CityState {
                row: CityRow {
                    id,
                    name: name.to_string(),
                    x,
                    y,
                    ai,
                },
                inventory: BTreeMap::new(),
                population: BTreeMap::new(),
                buildings: BTreeMap::new(),
            },
        );
        id
    }

    /// Insert a city under its existing id, keeping the id allocator ahead
    /// of it. Used when rehydrating a store from persistence.
    pub fn restore_city(&mut self, state: CityState) {
        self.next_id = self.next_id.max(state.row.id);
        self.cities.insert(state.row.id, state);
    }

    pub fn set_base_price(&mut self, resource: &str, price: f64) {
        self.prices.insert(resource.to_string(), price);
    }

    pub fn city_state(&self, id: u64) -> Option<&CityState> {
        self.cities.get(&id)
    }

    pub fn city_state_mut(&mut self, id: u64) -> Option<&mut CityState> {
        self.cities.get_mut(&id)
    }

    pub fn cities(&self) -> impl Iterator<Item = &CityState> {
        self.cities.values()
    }

    pub fn prices(&self) -> &BTreeMap<String, f64> {
        &self.prices
    }

    /// Number of locking reads taken since construction.
    pub fn lock_count(&self) -> u64 {
        self.locks
    }

    /// Number of committed row mutations since construction.
    pub fn write_count(&self) -> u64 {
        self.writes
    }

    fn state(&self, id: u64) -> Result<&CityState, StoreError> {
        self.cities.get(&id).ok_or(StoreError::CityNotFound(id))
    }
}

impl Store for MemoryStore {
    fn city(&self, id: u64) -> Result<CityRow, StoreError> {
        Ok(self.state(id)?.row.clone())
    }

    fn inventory(&self, id: u64) -> Result<Inventory, StoreError> {
        Ok(self.state(id)?.inventory.clone())
    }

    fn population(&self, id: u64) -> Result<BTreeMap<PopBucket, PopulationRow>, StoreError> {
        Ok(self.state(id)?.population.clone())
    }

    fn building_levels(&self, id: u64) -> Result<BTreeMap<String, u32>, StoreError> {
        Ok(self.state(id)?.buildings.clone())
    }

    fn base_prices(&self) -> Result<BTreeMap<String, f64>, StoreError> {
        Ok(self.prices.clone())
    }

    fn ai_cities(&self, exclude: Option<u64>, limit: usize) -> Result<Vec<CityRow>, StoreError> {
        Ok(self
            .cities
            .values()
            .filter(|c| c.row.ai && Some(c.row.id) != exclude)
            .take(limit)
            .map(|c| c.row.clone())
            .collect())
    }

    fn begin(&mut self) -> Result<Box<dyn StoreTx + '_>, StoreError> {
        Ok(Box::new(MemoryTx {
            store: self,
            pending: Vec::new(),
        }))
    }
}

#[derive(Debug)]
enum PendingOp {
    AdjustResource {
        city: u64,
        resource: String,
        delta: i64,
    },
    SetLevel {
        city: u64,
        building: String,
        level: u32,
    },
    AddCapacity {
        city: u64,
        bucket: PopBucket,
        delta: u32,
    },
    ReserveWorkers {
        city: u64,
        bucket: PopBucket,
        count: u32,
    },
}

struct MemoryTx<'a> {
    store: &'a mut MemoryStore,
    pending: Vec<PendingOp>,
}

impl StoreTx for MemoryTx<'_> {
    fn lock_inventory(&mut self, city: u64) -> Result<Inventory, StoreError> {
        self.store.locks += 1;
        self.store.state(city).map(|s| s.inventory.clone())
    }

    fn lock_population(
        &mut self,
        city: u64,
    ) -> Result<BTreeMap<PopBucket, PopulationRow>, StoreError> {
        self.store.locks += 1;
        self.store.state(city).map(|s| s.population.clone())
    }

    fn building_level(&mut self, city: u64, building: &str) -> Result<u32, StoreError> {
        self.store.locks += 1;
        Ok(self
            .store
            .state(city)?
            .buildings
            .get(building)
            .copied()
            .unwrap_or(0))
    }

    fn adjust_resource(
        &mut self,
        city: u64,
        resource: &str,
        delta: i64,
    ) -> Result<(), StoreError> {
        self.store.state(city)?;
        self.pending.push(PendingOp::AdjustResource {
            city,
            resource: resource.to_string(),
            delta,
        });
        Ok(())
    }

    fn set_building_level(
        &mut self,
        city: u64,
        building: &str,
        level: u32,
    ) -> Result<(), StoreError> {
        self.store.state(city)?;
        self.pending.push(PendingOp::SetLevel {
            city,
            building: building.to_string(),
            level,
        });
        Ok(())
    }

    fn add_population_capacity(
        &mut self,
        city: u64,
        bucket: PopBucket,
        delta: u32,
    ) -> Result<(), StoreError> {
        self.store.state(city)?;
        self.pending.push(PendingOp::AddCapacity {
            city,
            bucket,
            delta,
        });
        Ok(())
    }

    fn reserve_workers(
        &mut self,
        city: u64,
        bucket: PopBucket,
        count: u32,
    ) -> Result<(), StoreError> {
        self.store.state(city)?;
        self.pending.push(PendingOp::ReserveWorkers {
            city,
            bucket,
            count,
        });
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTx { store, pending } = *self;
        for op in &pending {
            store.writes += 1;
            match op {
                PendingOp::AdjustResource {
                    city,
                    resource,
                    delta,
                } => {
                    let state = store
                        .cities
                        .get_mut(city)
                        .ok_or(StoreError::CityNotFound(*city))?;
                    let amount = state.inventory.entry(resource.clone()).or_insert(0);
                    *amount = (*amount + delta).max(0);
                }
                PendingOp::SetLevel {
                    city,
                    building,
                    level,
                } => {
                    let state = store
                        .cities
                        .get_mut(city)
                        .ok_or(StoreError::CityNotFound(*city))?;
                    state.buildings.insert(building.clone(), *level);
                }
                PendingOp::AddCapacity {
                    city,
                    bucket,
                    delta,
                } => {
                    let state = store
                        .cities
                        .get_mut(city)
                        .ok_or(StoreError::CityNotFound(*city))?;
                    let row = state
                        .population
                        .entry(*bucket)
                        .or_insert_with(|| PopulationRow::new(0, 0));
                    row.max += delta;
                }
                PendingOp::ReserveWorkers {
                    city,
                    bucket,
                    count,
                } => {
                    let state = store
                        .cities
                        .get_mut(city)
                        .ok_or(StoreError::CityNotFound(*city))?;
                    let row = state.population.get_mut(bucket).ok_or_else(|| {
                        StoreError::Conflict(format!(
                            "reserving workers in uninitialized bucket {bucket:?}"
                        ))
                    })?;
                    row.occupied += count;
                }
            }
        }
        Ok(())
    }

    fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        // Pending deltas are simply dropped.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> (MemoryStore, u64) {
        let mut store = MemoryStore::new();
        let id = store.add_city("Aldburg", 3, 4, true);
        let state = store.city_state_mut(id).unwrap();
        state.inventory.insert("wood".to_string(), 100);
        state
            .population
            .insert(PopBucket::Poor, PopulationRow::new(10, 20));
        (store, id)
    }

    #[test]
    fn rollback_discards_deltas() {
        let (mut store, id) = seeded();
        let mut tx = store.begin().unwrap();
        tx.adjust_resource(id, "wood", -40).unwrap();
        tx.rollback().unwrap();
        assert_eq!(store.inventory(id).unwrap()["wood"], 100);
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn drop_without_commit_discards_deltas() {
        let (mut store, id) = seeded();
        {
            let mut tx = store.begin().unwrap();
            tx.adjust_resource(id, "wood", -40).unwrap();
        }
        assert_eq!(store.inventory(id).unwrap()["wood"], 100);
    }

    #[test]
    fn commit_applies_all_deltas() {
        let (mut store, id) = seeded();
        let mut tx = store.begin().unwrap();
        tx.adjust_resource(id, "wood", -40).unwrap();
        tx.set_building_level(id, "sawmill", 1).unwrap();
        tx.reserve_workers(id, PopBucket::Poor, 1).unwrap();
        tx.commit().unwrap();
        assert_eq!(store.inventory(id).unwrap()["wood"], 60);
        assert_eq!(store.building_levels(id).unwrap()["sawmill"], 1);
        let pop = store.population(id).unwrap()[&PopBucket::Poor];
        assert_eq!(pop.occupied, 1);
        assert_eq!(pop.available(), 9);
        assert_eq!(store.write_count(), 3);
    }

    #[test]
    fn amounts_clamp_at_zero() {
        let (mut store, id) = seeded();
        let mut tx = store.begin().unwrap();
        tx.adjust_resource(id, "wood", -500).unwrap();
        tx.commit().unwrap();
        assert_eq!(store.inventory(id).unwrap()["wood"], 0);
    }

    #[test]
    fn capacity_increase_touches_max_only() {
        let (mut store, id) = seeded();
        let mut tx = store.begin().unwrap();
        tx.add_population_capacity(id, PopBucket::Poor, 5).unwrap();
        tx.commit().unwrap();
        let pop = store.population(id).unwrap()[&PopBucket::Poor];
        assert_eq!(pop.max, 25);
        assert_eq!(pop.current, 10);
    }

    #[test]
    fn locks_are_counted() {
        let (mut store, id) = seeded();
        let mut tx = store.begin().unwrap();
        tx.lock_inventory(id).unwrap();
        tx.lock_population(id).unwrap();
        tx.rollback().unwrap();
        assert_eq!(store.lock_count(), 2);
    }

    #[test]
    fn ai_cities_excludes_and_limits() {
        let mut store = MemoryStore::new();
        let a = store.add_city("A", 0, 0, true);
        store.add_city("B", 1, 0, true);
        store.add_city("C", 2, 0, false);
        store.add_city("D", 3, 0, true);
        let others = store.ai_cities(Some(a), 10).unwrap();
        assert_eq!(others.len(), 2);
        assert!(others.iter().all(|c| c.id != a && c.ai));
        assert_eq!(store.ai_cities(None, 2).unwrap().len(), 2);
    }
}
