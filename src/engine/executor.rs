use serde::Serialize;

use crate::config::{BuildingKind, GameConfig};
use crate::market::{MarketOracle, TradeSide};
use crate::model::{PopBucket, Snapshot};
use crate::store::{Store, StoreError};

use super::trade::{TradeAction, TradeKind, buy_threshold, sell_threshold};
use super::TickOptions;

/// Why a build was refused. Every variant names the exact check that
/// failed, re-evaluated under lock, so flush files can be audited against
/// the state the executor actually saw.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum BuildFailure {
    InsufficientResources {
        resource: String,
        need: i64,
        have: i64,
    },
    PopulationNotInitialized {
        bucket: PopBucket,
    },
    PopulationInsufficientSlots {
        bucket: PopBucket,
        need: u32,
        available: u32,
    },
    UnknownBuilding,
    Exception {
        detail: String,
    },
}

impl BuildFailure {
    pub fn reason(&self) -> &'static str {
        match self {
            BuildFailure::InsufficientResources { .. } => "insufficient_resources",
            BuildFailure::PopulationNotInitialized { .. } => "population_not_initialized",
            BuildFailure::PopulationInsufficientSlots { .. } => "population_insufficient_slots",
            BuildFailure::UnknownBuilding => "unknown_building",
            BuildFailure::Exception { .. } => "exception",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub enum BuildOutcome {
    Built { building: String, new_level: u32 },
    Failed(BuildFailure),
}

/// Upgrade one building by one level, validating cost and staffing under
/// lock. Either every delta commits or none does; a failed check rolls the
/// transaction back and reports the first violated constraint.
pub fn execute_build(
    store: &mut dyn Store,
    config: &GameConfig,
    city: u64,
    building: &str,
) -> BuildOutcome {
    match try_build(store, config, city, building) {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!(city, building, error = %e, "build aborted by store");
            BuildOutcome::Failed(BuildFailure::Exception {
                detail: e.to_string(),
            })
        }
    }
}

fn try_build(
    store: &mut dyn Store,
    config: &GameConfig,
    city: u64,
    building: &str,
) -> Result<BuildOutcome, StoreError> {
    let Some(spec) = config.buildings.get(building).cloned() else {
        return Ok(BuildOutcome::Failed(BuildFailure::UnknownBuilding));
    };
    let mut tx = store.begin()?;
    let inventory = tx.lock_inventory(city)?;
    let level = tx.building_level(city, building)?;
    let cost = match config.upgrade_cost(building, level) {
        Some(cost) => cost,
        None => {
            tx.rollback()?;
            return Ok(BuildOutcome::Failed(BuildFailure::UnknownBuilding));
        }
    };

    for (resource, &need) in &cost {
        let have = inventory.get(resource).copied().unwrap_or(0);
        if have < need {
            tx.rollback()?;
            return Ok(BuildOutcome::Failed(BuildFailure::InsufficientResources {
                resource: resource.clone(),
                need,
                have,
            }));
        }
    }

    let bucket = config.bucket_for(building);
    if spec.pop_per_level > 0 {
        let bucket = match bucket {
            Some(bucket) => bucket,
            None => {
                tx.rollback()?;
                return Ok(BuildOutcome::Failed(BuildFailure::UnknownBuilding));
            }
        };
        let population = tx.lock_population(city)?;
        match population.get(&bucket) {
            None => {
                tx.rollback()?;
                return Ok(BuildOutcome::Failed(BuildFailure::PopulationNotInitialized {
                    bucket,
                }));
            }
            Some(row) if row.is_uninitialized() => {
                tx.rollback()?;
                return Ok(BuildOutcome::Failed(BuildFailure::PopulationNotInitialized {
                    bucket,
                }));
            }
            Some(row) if row.available() < spec.pop_per_level => {
                tx.rollback()?;
                return Ok(BuildOutcome::Failed(
                    BuildFailure::PopulationInsufficientSlots {
                        bucket,
                        need: spec.pop_per_level,
                        available: row.available(),
                    },
                ));
            }
            Some(_) => {}
        }
    }

    for (resource, &need) in &cost {
        tx.adjust_resource(city, resource, -need)?;
    }
    tx.set_building_level(city, building, level + 1)?;
    match spec.kind {
        BuildingKind::Housing { bucket } => {
            tx.add_population_capacity(city, bucket, config.pop_per_house)?;
        }
        BuildingKind::Producer => {
            if spec.pop_per_level > 0 {
                if let Some(bucket) = bucket {
                    tx.reserve_workers(city, bucket, spec.pop_per_level)?;
                }
            }
        }
    }
    tx.commit()?;
    tracing::info!(city, building, new_level = level + 1, "building upgraded");
    Ok(BuildOutcome::Built {
        building: building.to_string(),
        new_level: level + 1,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum TradeFailure {
    NoMarketPrice,
    PriceBelowMargin { price: f64, floor: f64 },
    NoBuyer,
    NoSeller,
    TradeFailed { detail: String },
}

impl TradeFailure {
    pub fn reason(&self) -> &'static str {
        match self {
            TradeFailure::NoMarketPrice => "no_market_price",
            TradeFailure::PriceBelowMargin { .. } => "price_below_margin",
            TradeFailure::NoBuyer => "no_buyer",
            TradeFailure::NoSeller => "no_seller",
            TradeFailure::TradeFailed { .. } => "trade_failed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub enum TradeOutcome {
    Traded {
        resource: String,
        qty: i64,
        price: f64,
        counterparty: u64,
    },
    Failed(TradeFailure),
}

/// Execute one planned trade against a neighboring city. Both parties are
/// locked in ascending id order before anything is re-validated, so two
/// cities trading with each other in the same batch cannot deadlock.
pub fn execute_trade(
    store: &mut dyn Store,
    market: &dyn MarketOracle,
    config: &GameConfig,
    snapshot: &Snapshot,
    action: &TradeAction,
    opts: &TickOptions,
) -> TradeOutcome {
    match try_trade(store, market, config, snapshot, action, opts) {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!(city = snapshot.city, resource = %action.resource, error = %e, "trade aborted by store");
            TradeOutcome::Failed(TradeFailure::TradeFailed {
                detail: e.to_string(),
            })
        }
    }
}

fn try_trade(
    store: &mut dyn Store,
    market: &dyn MarketOracle,
    config: &GameConfig,
    snapshot: &Snapshot,
    action: &TradeAction,
    opts: &TickOptions,
) -> Result<TradeOutcome, StoreError> {
    let Some(base) = snapshot.base_price(&action.resource) else {
        return Ok(TradeOutcome::Failed(TradeFailure::NoMarketPrice));
    };
    let side = match action.kind {
        TradeKind::Buy => TradeSide::Buy,
        TradeKind::Sell => TradeSide::Sell,
    };
    let Some(quote) = market.quote(&action.resource, action.qty, side) else {
        return Ok(TradeOutcome::Failed(TradeFailure::NoMarketPrice));
    };
    if action.kind == TradeKind::Sell {
        let floor = base * opts.profit_margin;
        if quote.price < floor {
            return Ok(TradeOutcome::Failed(TradeFailure::PriceBelowMargin {
                price: quote.price,
                floor,
            }));
        }
    }

    // Pick the counterparty from unlocked reads; everything is re-checked
    // under lock below.
    let counterparty = match action.kind {
        TradeKind::Sell => snapshot.neighbors.iter().find(|n| {
            store
                .inventory(n.id)
                .map(|inv| inv.get(&action.resource).copied().unwrap_or(0) < buy_threshold(base))
                .unwrap_or(false)
        }),
        TradeKind::Buy => snapshot.neighbors.iter().find(|n| {
            store
                .inventory(n.id)
                .map(|inv| {
                    let stock = inv.get(&action.resource).copied().unwrap_or(0);
                    stock > sell_threshold(base) && stock >= action.qty
                })
                .unwrap_or(false)
        }),
    };
    let Some(counterparty) = counterparty.map(|n| n.id) else {
        return Ok(TradeOutcome::Failed(match action.kind {
            TradeKind::Sell => TradeFailure::NoBuyer,
            TradeKind::Buy => TradeFailure::NoSeller,
        }));
    };

    let (seller, buyer) = match action.kind {
        TradeKind::Sell => (snapshot.city, counterparty),
        TradeKind::Buy => (counterparty, snapshot.city),
    };
    let total = (quote.price * action.qty as f64).round() as i64;

    let mut tx = store.begin()?;
    let (first, second) = if seller < buyer {
        (seller, buyer)
    } else {
        (buyer, seller)
    };
    let first_inv = tx.lock_inventory(first)?;
    let second_inv = tx.lock_inventory(second)?;
    let (seller_inv, buyer_inv) = if first == seller {
        (&first_inv, &second_inv)
    } else {
        (&second_inv, &first_inv)
    };

    let seller_stock = seller_inv.get(&action.resource).copied().unwrap_or(0);
    if seller_stock < action.qty {
        tx.rollback()?;
        return Ok(TradeOutcome::Failed(TradeFailure::TradeFailed {
            detail: format!(
                "seller {seller} holds {seller_stock} {} of {} needed",
                action.resource, action.qty
            ),
        }));
    }
    let buyer_gold = buyer_inv.get(&config.currency).copied().unwrap_or(0);
    if buyer_gold < total {
        tx.rollback()?;
        return Ok(TradeOutcome::Failed(TradeFailure::TradeFailed {
            detail: format!("buyer {buyer} holds {buyer_gold} gold of {total} needed"),
        }));
    }

    tx.adjust_resource(seller, &action.resource, -action.qty)?;
    tx.adjust_resource(buyer, &action.resource, action.qty)?;
    tx.adjust_resource(buyer, &config.currency, -total)?;
    tx.adjust_resource(seller, &config.currency, total)?;
    tx.commit()?;
    tracing::info!(
        seller,
        buyer,
        resource = %action.resource,
        qty = action.qty,
        total,
        "trade settled"
    );
    Ok(TradeOutcome::Traded {
        resource: action.resource.clone(),
        qty: action.qty,
        price: quote.price,
        counterparty,
    })
}

/// Emergency purchase of a missing construction input at base price, with
/// no margin check and no surplus requirement on the seller. Clamped to
/// what the seller holds and the buyer can pay.
pub fn execute_forced_buy(
    store: &mut dyn Store,
    config: &GameConfig,
    snapshot: &Snapshot,
    resource: &str,
    need: i64,
    _opts: &TickOptions,
) -> TradeOutcome {
    match try_forced_buy(store, config, snapshot, resource, need) {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!(city = snapshot.city, resource, error = %e, "forced buy aborted by store");
            TradeOutcome::Failed(TradeFailure::TradeFailed {
                detail: e.to_string(),
            })
        }
    }
}

fn try_forced_buy(
    store: &mut dyn Store,
    config: &GameConfig,
    snapshot: &Snapshot,
    resource: &str,
    need: i64,
) -> Result<TradeOutcome, StoreError> {
    let Some(base) = snapshot.base_price(resource) else {
        return Ok(TradeOutcome::Failed(TradeFailure::NoMarketPrice));
    };
    let seller = snapshot.neighbors.iter().find(|n| {
        store
            .inventory(n.id)
            .map(|inv| inv.get(resource).copied().unwrap_or(0) > 0)
            .unwrap_or(false)
    });
    let Some(seller) = seller.map(|n| n.id) else {
        return Ok(TradeOutcome::Failed(TradeFailure::NoSeller));
    };
    let buyer = snapshot.city;

    let mut tx = store.begin()?;
    let (first, second) = if seller < buyer {
        (seller, buyer)
    } else {
        (buyer, seller)
    };
    let first_inv = tx.lock_inventory(first)?;
    let second_inv = tx.lock_inventory(second)?;
    let (seller_inv, buyer_inv) = if first == seller {
        (&first_inv, &second_inv)
    } else {
        (&second_inv, &first_inv)
    };

    let stock = seller_inv.get(resource).copied().unwrap_or(0);
    let gold = buyer_inv.get(&config.currency).copied().unwrap_or(0);
    let affordable = (gold as f64 / base).floor() as i64;
    let qty = need.min(stock).min(affordable);
    if qty <= 0 {
        tx.rollback()?;
        return Ok(TradeOutcome::Failed(TradeFailure::NoSeller));
    }
    let total = (base * qty as f64).round() as i64;

    tx.adjust_resource(seller, resource, -qty)?;
    tx.adjust_resource(buyer, resource, qty)?;
    tx.adjust_resource(buyer, &config.currency, -total)?;
    tx.adjust_resource(seller, &config.currency, total)?;
    tx.commit()?;
    tracing::warn!(
        buyer,
        seller,
        resource,
        qty,
        total,
        "forced buy of missing construction input"
    );
    Ok(TradeOutcome::Traded {
        resource: resource.to_string(),
        qty,
        price: base,
        counterparty: seller,
    })
}
