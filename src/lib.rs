pub mod config;
pub mod db;
pub mod engine;
pub mod flush;
pub mod market;
pub mod model;
pub mod scenario;
pub mod store;
pub mod testutil;

pub use config::{BuildingKind, BuildingSpec, GameConfig};
pub use engine::{
    BatchOptions, BatchReport, CancelFlag, DeficitMemory, TickOptions, TickResult, run_batch,
    run_city_tick,
};
pub use market::{BaseMarket, MarketOracle};
pub use model::{PopBucket, PopulationRow, ResourceCategory, Snapshot};
pub use store::{MemoryStore, Store, StoreError, StoreTx};
