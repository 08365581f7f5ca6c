use std::collections::BTreeMap;

use rand::RngCore;

use crate::config::GameConfig;
use crate::market::MarketOracle;
use crate::model::{PopBucket, PopulationRow, ResourceCategory, Snapshot};
use crate::store::Store;

use super::build::{BuildPlan, net_production, plan_builds};
use super::chain::find_producer_chain;
use super::executor::{
    BuildFailure, BuildOutcome, TradeOutcome, execute_build, execute_forced_buy, execute_trade,
};
use super::memory::DeficitMemory;
use super::trade::plan_trades;
use super::{ActionAttempt, AttemptOutcome, PlannedAction, TickOptions, TickResult};

/// Run one autonomous tick for one city: perceive, plan, then attempt
/// actions in priority order until one commits. At most one mutation
/// commits per tick; every attempt, committed or not, is recorded on the
/// result.
pub fn run_city_tick(
    store: &mut dyn Store,
    market: &dyn MarketOracle,
    config: &GameConfig,
    memory: &mut DeficitMemory,
    city: u64,
    opts: &TickOptions,
    rng: &mut dyn RngCore,
) -> TickResult {
    use rand::Rng;
    // The gate fires before any store access, so a skipped city costs
    // nothing: no reads, no locks, no writes.
    if rng.random_range(0.0..1.0) >= opts.p_act {
        return TickResult::skipped(city);
    }

    let snapshot = match super::perceive(store, city, opts.max_neighbors) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::warn!(city, error = %e, "perception failed");
            return TickResult::failed(city, e.to_string());
        }
    };
    let (levels, population) = match (store.building_levels(city), store.population(city)) {
        (Ok(levels), Ok(population)) => (levels, population),
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(city, error = %e, "state read failed");
            return TickResult::failed(city, e.to_string());
        }
    };

    let trades = plan_trades(&snapshot, &config.currency, opts);
    let plan = plan_builds(&snapshot, &levels, &population, config, opts);

    let mut result = TickResult {
        city,
        skipped: false,
        acted: false,
        attempts: Vec::new(),
        error: None,
    };

    let mut selected = select_build(&plan, &snapshot, &levels, &population, config, memory, opts);
    if selected.is_none() && opts.recheck_population && plan.rejected_for_population > 0 {
        // The snapshot may have raced a concurrent batch; a fresh read can
        // unblock the top candidate without waiting a full tick.
        if let Ok(fresh) = store.population(city) {
            let replanned = plan_builds(&snapshot, &levels, &fresh, config, opts);
            selected = select_build(&replanned, &snapshot, &levels, &fresh, config, memory, opts);
        }
    }

    if let Some(building) = selected {
        match execute_build(store, config, city, &building) {
            BuildOutcome::Built { .. } => {
                result.attempts.push(ActionAttempt {
                    action: PlannedAction::Build { building },
                    outcome: AttemptOutcome::Committed,
                });
                result.acted = true;
                memory.clear_city(city);
                return result;
            }
            BuildOutcome::Failed(failure) => {
                result.attempts.push(ActionAttempt {
                    action: PlannedAction::Build {
                        building: building.clone(),
                    },
                    outcome: AttemptOutcome::Failed {
                        reason: failure.reason().to_string(),
                    },
                });
                if let BuildFailure::InsufficientResources { resource, need, have } = failure {
                    memory.remember(city, &resource);
                    let shortfall = need - have;
                    match execute_forced_buy(store, config, &snapshot, &resource, shortfall, opts)
                    {
                        TradeOutcome::Traded { qty, .. } => {
                            result.attempts.push(ActionAttempt {
                                action: PlannedAction::ForcedBuy {
                                    resource: resource.clone(),
                                    qty,
                                },
                                outcome: AttemptOutcome::Committed,
                            });
                            result.acted = true;
                            return result;
                        }
                        TradeOutcome::Failed(trade_failure) => {
                            result.attempts.push(ActionAttempt {
                                action: PlannedAction::ForcedBuy {
                                    resource: resource.clone(),
                                    qty: shortfall,
                                },
                                outcome: AttemptOutcome::Failed {
                                    reason: trade_failure.reason().to_string(),
                                },
                            });
                        }
                    }
                    // Nobody sells the input either; build toward producing
                    // it ourselves.
                    if let Some(chain) = find_producer_chain(
                        &resource,
                        &snapshot.inventory,
                        &levels,
                        &population,
                        config,
                        opts.max_depth,
                    ) {
                        if let Some(first) = chain.first() {
                            match execute_build(store, config, city, first) {
                                BuildOutcome::Built { .. } => {
                                    result.attempts.push(ActionAttempt {
                                        action: PlannedAction::ChainBuild {
                                            building: first.clone(),
                                            target_resource: resource.clone(),
                                        },
                                        outcome: AttemptOutcome::Committed,
                                    });
                                    result.acted = true;
                                    return result;
                                }
                                BuildOutcome::Failed(chain_failure) => {
                                    result.attempts.push(ActionAttempt {
                                        action: PlannedAction::ChainBuild {
                                            building: first.clone(),
                                            target_resource: resource.clone(),
                                        },
                                        outcome: AttemptOutcome::Failed {
                                            reason: chain_failure.reason().to_string(),
                                        },
                                    });
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    // Producers are worker-starved and the bucket is at capacity: housing
    // is the actual bottleneck.
    if !result.acted && plan.rejected_for_population > 0 {
        if let Some(house) = &plan.house_candidate {
            let bucket_full = config
                .bucket_for(house)
                .and_then(|b| population.get(&b))
                .is_some_and(|row| row.is_full());
            if bucket_full {
                match execute_build(store, config, city, house) {
                    BuildOutcome::Built { .. } => {
                        result.attempts.push(ActionAttempt {
                            action: PlannedAction::HouseBuild {
                                building: house.clone(),
                            },
                            outcome: AttemptOutcome::Committed,
                        });
                        result.acted = true;
                        return result;
                    }
                    BuildOutcome::Failed(failure) => {
                        result.attempts.push(ActionAttempt {
                            action: PlannedAction::HouseBuild {
                                building: house.clone(),
                            },
                            outcome: AttemptOutcome::Failed {
                                reason: failure.reason().to_string(),
                            },
                        });
                    }
                }
            }
        }
    }

    if !result.acted {
        if let Some(action) = trades.first() {
            match execute_trade(store, market, config, &snapshot, action, opts) {
                TradeOutcome::Traded { qty, .. } => {
                    result.attempts.push(ActionAttempt {
                        action: PlannedAction::Trade {
                            kind: action.kind,
                            resource: action.resource.clone(),
                            qty,
                        },
                        outcome: AttemptOutcome::Committed,
                    });
                    result.acted = true;
                }
                TradeOutcome::Failed(failure) => {
                    result.attempts.push(ActionAttempt {
                        action: PlannedAction::Trade {
                            kind: action.kind,
                            resource: action.resource.clone(),
                            qty: action.qty,
                        },
                        outcome: AttemptOutcome::Failed {
                            reason: failure.reason().to_string(),
                        },
                    });
                }
            }
        }
    }

    result
}

/// Pick the build to attempt, in descending priority: a producer of a
/// remembered shortage, a producer relieving a common-goods deficit, the
/// configured preference order, then best payback under the threshold.
fn select_build(
    plan: &BuildPlan,
    snapshot: &Snapshot,
    levels: &BTreeMap<String, u32>,
    population: &BTreeMap<PopBucket, PopulationRow>,
    config: &GameConfig,
    memory: &DeficitMemory,
    opts: &TickOptions,
) -> Option<String> {
    let viable = || plan.candidates.iter().filter(|c| c.has_capacity && !c.is_housing);

    let remembered = memory.recall(snapshot.city);
    if !remembered.is_empty() {
        if let Some(candidate) = viable().find(|c| {
            c.produces.iter().any(|r| remembered.contains(&r.as_str()))
        }) {
            return Some(candidate.building.clone());
        }
    }

    let net = net_production(levels, population, config);
    if let Some(candidate) = viable().find(|c| {
        c.produces.iter().any(|r| {
            config.category_of(r) == Some(ResourceCategory::Common)
                && net.get(r).copied().unwrap_or(0.0) < 0.0
        })
    }) {
        return Some(candidate.building.clone());
    }

    for preferred in &opts.preferred_buildings {
        if let Some(candidate) = viable().find(|c| &c.building == preferred) {
            return Some(candidate.building.clone());
        }
    }

    viable()
        .find(|c| c.payback <= opts.payback_threshold)
        .map(|c| c.building.clone())
}
