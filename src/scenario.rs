//! Fluent construction of [`MemoryStore`] fixtures for tests.

use crate::model::{PopBucket, PopulationRow};
use crate::store::memory::{CityState, MemoryStore};

/// Typed reference to a city in a [`Scenario`], enabling chained field
/// mutation. Call [`.id()`](CityRef::id) to terminate the chain and extract
/// the city id.
pub struct CityRef<'a> {
    scenario: &'a mut Scenario,
    id: u64,
}

impl<'a> CityRef<'a> {
    fn state_mut(&mut self) -> &mut CityState {
        self.scenario.store.city_state_mut(self.id).unwrap()
    }

    pub fn resource(mut self, name: &str, amount: i64) -> Self {
        self.state_mut().inventory.insert(name.to_string(), amount);
        self
    }

    /// Shorthand for the currency resource of the standard ruleset.
    pub fn gold(self, amount: i64) -> Self {
        self.resource("gold", amount)
    }

    pub fn population(mut self, bucket: PopBucket, current: u32, max: u32) -> Self {
        self.state_mut()
            .population
            .insert(bucket, PopulationRow::new(current, max));
        self
    }

    /// Mark `count` citizens of an already-seeded bucket as working.
    pub fn occupied(mut self, bucket: PopBucket, count: u32) -> Self {
        self.state_mut()
            .population
            .get_mut(&bucket)
            .unwrap()
            .occupied = count;
        self
    }

    pub fn building(mut self, name: &str, level: u32) -> Self {
        self.state_mut().buildings.insert(name.to_string(), level);
        self
    }

    pub fn at(mut self, x: i32, y: i32) -> Self {
        let state = self.state_mut();
        state.row.x = x;
        state.row.y = y;
        self
    }

    /// Escape hatch: apply an arbitrary closure to the city state.
    pub fn with(mut self, f: impl FnOnce(&mut CityState)) -> Self {
        f(self.state_mut());
        self
    }

    /// Terminate the chain and return the city id.
    pub fn id(self) -> u64 {
        self.id
    }
}

/// Test fixture builder over a [`MemoryStore`].
#[derive(Default)]
pub struct Scenario {
    store: MemoryStore,
}

impl Scenario {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an AI city at the origin and return a chainable reference.
    pub fn city(&mut self, name: &str) -> CityRef<'_> {
        let id = self.store.add_city(name, 0, 0, true);
        CityRef { scenario: self, id }
    }

    /// Add a city with explicit position and control flag.
    pub fn add_city(&mut self, name: &str, x: i32, y: i32, ai: bool) -> u64 {
        self.store.add_city(name, x, y, ai)
    }

    /// Chainable reference to an existing city.
    pub fn city_mut(&mut self, id: u64) -> CityRef<'_> {
        CityRef { scenario: self, id }
    }

    pub fn base_price(&mut self, resource: &str, price: f64) -> &mut Self {
        self.store.set_base_price(resource, price);
        self
    }

    pub fn build(self) -> MemoryStore {
        self.store
    }
}
