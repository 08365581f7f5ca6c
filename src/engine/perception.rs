use crate::model::{Neighbor, Snapshot};
use crate::store::{Store, StoreError};

/// Build the immutable per-tick view of one city: its own inventory, the
/// global base prices, and up to `max_neighbors` other AI cities. All reads
/// are non-locking; the executor re-validates under lock before mutating.
pub fn perceive(
    store: &dyn Store,
    city: u64,
    max_neighbors: usize,
) -> Result<Snapshot, StoreError> {
    let row = store.city(city)?;
    let inventory = store.inventory(city)?;
    let base_prices = store.base_prices()?;
    let neighbors = store
        .ai_cities(Some(city), max_neighbors)?
        .into_iter()
        .map(|c| Neighbor {
            id: c.id,
            x: c.x,
            y: c.y,
        })
        .collect();
    Ok(Snapshot {
        city,
        x: row.x,
        y: row.y,
        inventory,
        base_prices,
        neighbors,
    })
}
