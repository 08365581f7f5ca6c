pub mod population;
pub mod snapshot;

pub use population::{PopBucket, PopulationRow, ResourceCategory};
pub use snapshot::{Neighbor, Snapshot};
