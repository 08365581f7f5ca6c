use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::config::GameConfig;
use crate::market::MarketOracle;
use crate::store::Store;

use super::memory::DeficitMemory;
use super::tick::run_city_tick;
use super::{BatchOptions, TickResult};

/// Cooperative cancellation for a running batch. Checked between cities,
/// never mid-transaction, so cancelling leaves no partial mutation behind.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
pub struct BatchReport {
    pub results: Vec<TickResult>,
    pub acted: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// Tick every eligible AI city once, sequentially, with one seeded RNG for
/// the whole batch so a given seed replays the same run over the same
/// store state.
pub fn run_batch(
    store: &mut dyn Store,
    market: &dyn MarketOracle,
    config: &GameConfig,
    memory: &mut DeficitMemory,
    opts: &BatchOptions,
    cancel: &CancelFlag,
) -> Result<BatchReport, crate::store::StoreError> {
    let mut rng = SmallRng::seed_from_u64(opts.seed);
    let cities = store.ai_cities(None, opts.max_cities_per_tick)?;
    let mut results = Vec::with_capacity(cities.len());

    for city in &cities {
        if cancel.is_cancelled() {
            tracing::info!(done = results.len(), total = cities.len(), "batch cancelled");
            break;
        }
        if opts.run_percent < 1.0 && rng.random_range(0.0..1.0) >= opts.run_percent {
            results.push(TickResult::skipped(city.id));
            continue;
        }
        results.push(run_city_tick(
            store, market, config, memory, city.id, &opts.tick, &mut rng,
        ));
    }

    let acted = results.iter().filter(|r| r.acted).count();
    let skipped = results.iter().filter(|r| r.skipped).count();
    let errors = results.iter().filter(|r| r.error.is_some()).count();
    tracing::info!(
        cities = results.len(),
        acted,
        skipped,
        errors,
        "batch complete"
    );
    Ok(BatchReport {
        results,
        acted,
        skipped,
        errors,
    })
}
