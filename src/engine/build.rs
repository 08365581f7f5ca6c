use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::GameConfig;
use crate::model::{PopBucket, PopulationRow, Snapshot};

use super::TickOptions;

/// Urgency multiplier for a resource whose net per-tick flow is negative.
const URGENCY_DEFICIT: f64 = 2.0;
/// Cap on the scarcity multiplier so a near-empty stockpile cannot dominate
/// every other signal.
const URGENCY_CAP: f64 = 3.0;
/// Dampening applied when stock exceeds [`OVERSTOCK_FACTOR`] safety stocks.
const OVERSTOCK_DAMPEN: f64 = 0.5;
const OVERSTOCK_FACTOR: i64 = 3;

/// One upgrade the city could take this tick, fully costed and ranked.
#[derive(Debug, Clone, Serialize)]
pub struct BuildCandidate {
    pub building: String,
    pub current_level: u32,
    pub cost: BTreeMap<String, i64>,
    pub cost_gold: f64,
    /// Gold value of the building's full output at the next level.
    pub raw_value: f64,
    /// Raw value scaled by the urgency of what the building produces.
    pub adjusted_value: f64,
    /// Ticks to recoup the cost at the adjusted value.
    pub payback: f64,
    pub bucket: PopBucket,
    /// False when the mapped bucket lacks free workers for another level.
    pub has_capacity: bool,
    pub produces: Vec<String>,
    pub priority_boost: f64,
    pub is_housing: bool,
}

/// The full ranked plan plus what was rejected and why, so the tick can
/// decide whether housing is the real bottleneck.
#[derive(Debug, Clone, Serialize)]
pub struct BuildPlan {
    pub candidates: Vec<BuildCandidate>,
    /// Producer upgrades dropped to `has_capacity: false` for lack of
    /// free workers.
    pub rejected_for_population: u32,
    /// Cheapest housing for the bucket that blocked the most producers.
    pub house_candidate: Option<String>,
}

/// Net per-tick flow of every resource at current building levels:
/// production minus recipe input draw minus population upkeep. Negative
/// entries are running deficits.
pub fn net_production(
    levels: &BTreeMap<String, u32>,
    population: &BTreeMap<PopBucket, PopulationRow>,
    config: &GameConfig,
) -> BTreeMap<String, f64> {
    let mut net: BTreeMap<String, f64> = BTreeMap::new();
    for (building, &level) in levels {
        if level == 0 {
            continue;
        }
        let Some(spec) = config.buildings.get(building) else {
            continue;
        };
        for (resource, &rate) in &spec.production {
            let produced = rate * f64::from(level);
            *net.entry(resource.clone()).or_insert(0.0) += produced;
            if let Some(inputs) = config.recipes.get(resource) {
                for (input, &per_unit) in inputs {
                    *net.entry(input.clone()).or_insert(0.0) -= produced * per_unit;
                }
            }
        }
    }
    let total_pop: u32 = population.values().map(|row| row.current).sum();
    for (resource, &per_capita) in &config.upkeep {
        *net.entry(resource.clone()).or_insert(0.0) -= per_capita * f64::from(total_pop);
    }
    net
}

fn urgency_for(resource: &str, net: &BTreeMap<String, f64>, snapshot: &Snapshot, opts: &TickOptions) -> f64 {
    let mut m = 1.0;
    if net.get(resource).copied().unwrap_or(0.0) < 0.0 {
        m *= URGENCY_DEFICIT;
    }
    let stock = snapshot.amount(resource);
    let safety = opts.safety_stock;
    if safety > 0 && stock < safety {
        let scarcity = 1.0 + (safety - stock) as f64 / safety as f64;
        m *= scarcity.min(URGENCY_CAP);
    } else if safety > 0 && stock > safety * OVERSTOCK_FACTOR {
        m *= OVERSTOCK_DAMPEN;
    }
    m
}

/// Rank every possible upgrade. Producers are valued by next-level output
/// at base prices, scaled by the geometric mean of per-output urgency, and
/// ordered by payback. Housing is always buildable (it occupies nobody) but
/// only surfaces as a fallback through `house_candidate`.
///
/// A producer mapped to an uninitialized bucket is dropped outright: worker
/// availability is unknown there, and guessing would let a stale zero admit
/// a build the executor must then refuse.
pub fn plan_builds(
    snapshot: &Snapshot,
    levels: &BTreeMap<String, u32>,
    population: &BTreeMap<PopBucket, PopulationRow>,
    config: &GameConfig,
    opts: &TickOptions,
) -> BuildPlan {
    let net = net_production(levels, population, config);
    let mut candidates = Vec::new();
    let mut rejected_for_population = 0u32;
    let mut rejected_buckets: BTreeMap<PopBucket, u32> = BTreeMap::new();

    for (building, spec) in &config.buildings {
        let current_level = levels.get(building).copied().unwrap_or(0);
        let Some(cost) = config.upgrade_cost(building, current_level) else {
            continue;
        };
        let Some(bucket) = config.bucket_for(building) else {
            continue;
        };
        let cost_gold: f64 = cost
            .iter()
            .map(|(r, &qty)| qty as f64 * snapshot.base_price(r).unwrap_or(1.0))
            .sum();

        if spec.is_housing() {
            candidates.push(BuildCandidate {
                building: building.clone(),
                current_level,
                cost,
                cost_gold,
                raw_value: 0.0,
                adjusted_value: 0.0,
                payback: cost_gold,
                bucket,
                has_capacity: true,
                produces: Vec::new(),
                priority_boost: spec.priority_boost,
                is_housing: true,
            });
            continue;
        }

        let mut raw_value = 0.0;
        let mut urgency_product = 1.0;
        let produces: Vec<String> = spec.production.keys().cloned().collect();
        for (resource, &rate) in &spec.production {
            let price = snapshot.base_price(resource).unwrap_or(1.0);
            raw_value += rate * f64::from(current_level + 1) * price;
            urgency_product *= urgency_for(resource, &net, snapshot, opts);
        }
        let urgency = urgency_product.powf(1.0 / produces.len().max(1) as f64);
        let adjusted_value = raw_value * urgency;
        let payback = cost_gold / adjusted_value.max(1.0);

        let has_capacity = if spec.pop_per_level == 0 {
            true
        } else {
            match population.get(&bucket) {
                Some(row) if row.is_uninitialized() => continue,
                Some(row) => {
                    let fits = row.available() >= spec.pop_per_level;
                    if !fits {
                        rejected_for_population += 1;
                        *rejected_buckets.entry(bucket).or_insert(0) += 1;
                    }
                    fits
                }
                // An absent row reads the same as an uninitialized one.
                None => continue,
            }
        };

        candidates.push(BuildCandidate {
            building: building.clone(),
            current_level,
            cost,
            cost_gold,
            raw_value,
            adjusted_value,
            payback,
            bucket,
            has_capacity,
            produces,
            priority_boost: spec.priority_boost,
            is_housing: false,
        });
    }

    candidates.sort_by(|a, b| {
        b.has_capacity
            .cmp(&a.has_capacity)
            .then(
                b.priority_boost
                    .partial_cmp(&a.priority_boost)
                    .unwrap_or(Ordering::Equal),
            )
            .then(a.payback.partial_cmp(&b.payback).unwrap_or(Ordering::Equal))
    });

    let house_candidate = rejected_buckets
        .iter()
        .max_by_key(|&(_, &count)| count)
        .and_then(|(&bucket, _)| {
            candidates
                .iter()
                .filter(|c| c.is_housing && c.bucket == bucket)
                .min_by(|a, b| {
                    a.cost_gold
                        .partial_cmp(&b.cost_gold)
                        .unwrap_or(Ordering::Equal)
                })
                .map(|c| c.building.clone())
        });

    BuildPlan {
        candidates,
        rejected_for_population,
        house_candidate,
    }
}
