pub mod batch;
pub mod build;
pub mod chain;
pub mod executor;
pub mod memory;
pub mod perception;
pub mod tick;
pub mod trade;

use serde::Serialize;

pub use batch::{BatchReport, CancelFlag, run_batch};
pub use build::{BuildCandidate, BuildPlan, net_production, plan_builds};
pub use chain::find_producer_chain;
pub use executor::{
    BuildFailure, BuildOutcome, TradeFailure, TradeOutcome, execute_build, execute_forced_buy,
    execute_trade,
};
pub use memory::DeficitMemory;
pub use perception::perceive;
pub use tick::run_city_tick;
pub use trade::{TradeAction, TradeKind, plan_trades};

/// Tuning knobs for one city tick. Defaults match the live game servers.
#[derive(Debug, Clone)]
pub struct TickOptions {
    /// Probability that a city acts at all this tick.
    pub p_act: f64,
    pub max_trades_per_tick: usize,
    pub max_neighbors: usize,
    /// Hard cap on units moved in a single planned trade.
    pub max_trade_qty: i64,
    /// Stock level below which a produced resource is considered scarce.
    pub safety_stock: i64,
    /// Minimum sell price as a multiple of the base price.
    pub profit_margin: f64,
    /// Builds with worse payback than this are not taken spontaneously.
    pub payback_threshold: f64,
    /// Depth limit for producer-chain resolution.
    pub max_depth: usize,
    /// Re-read population under a fresh query when the top candidate was
    /// rejected for worker availability.
    pub recheck_population: bool,
    /// Tie-break order applied when several candidates are equally viable.
    pub preferred_buildings: Vec<String>,
}

impl Default for TickOptions {
    fn default() -> Self {
        Self {
            p_act: 1.0,
            max_trades_per_tick: 3,
            max_neighbors: 8,
            max_trade_qty: 50,
            safety_stock: 200,
            profit_margin: 1.05,
            payback_threshold: 500.0,
            max_depth: 4,
            recheck_population: true,
            preferred_buildings: vec![
                "sawmill".to_string(),
                "quarry".to_string(),
                "farm".to_string(),
            ],
        }
    }
}

/// Options for a whole batch run over many cities.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub tick: TickOptions,
    pub max_cities_per_tick: usize,
    /// Fraction of eligible cities that run each batch, sampled per city.
    pub run_percent: f64,
    pub seed: u64,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            tick: TickOptions::default(),
            max_cities_per_tick: 25,
            run_percent: 1.0,
            seed: 0,
        }
    }
}

/// One concrete action the tick decided to attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlannedAction {
    Build { building: String },
    HouseBuild { building: String },
    ChainBuild { building: String, target_resource: String },
    ForcedBuy { resource: String, qty: i64 },
    Trade { kind: TradeKind, resource: String, qty: i64 },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Committed,
    Failed { reason: String },
}

/// One attempted action and how it ended. A tick records every attempt it
/// made, committed or not, so a flush file tells the whole story.
#[derive(Debug, Clone, Serialize)]
pub struct ActionAttempt {
    #[serde(flatten)]
    pub action: PlannedAction,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

/// Outcome of one city's tick.
#[derive(Debug, Clone, Serialize)]
pub struct TickResult {
    pub city: u64,
    /// The probability gate fired before anything was read or locked.
    pub skipped: bool,
    /// At least one attempt committed.
    pub acted: bool,
    pub attempts: Vec<ActionAttempt>,
    pub error: Option<String>,
}

impl TickResult {
    pub fn skipped(city: u64) -> Self {
        Self {
            city,
            skipped: true,
            acted: false,
            attempts: Vec::new(),
            error: None,
        }
    }

    pub fn failed(city: u64, error: String) -> Self {
        Self {
            city,
            skipped: false,
            acted: false,
            attempts: Vec::new(),
            error: Some(error),
        }
    }
}
