use std::collections::{BTreeMap, BTreeSet};

use crate::config::GameConfig;
use crate::model::{PopBucket, PopulationRow};

/// Absolute ceiling on chain depth, regardless of what the caller asks for.
pub const MAX_CHAIN_DEPTH: usize = 10;

/// Resolve a build order that would eventually produce `resource`: find a
/// producer the city can afford and staff, recursing into the first missing
/// construction input when it cannot. Iterative deepening keeps the result
/// the shortest viable chain; the returned list is in build order, target
/// producer last.
///
/// Returns `None` when nothing produces the resource within the depth
/// limit, which includes cyclic dependency graphs: the visited set refuses
/// to re-enter a resource already on the current path.
pub fn find_producer_chain(
    resource: &str,
    inventory: &BTreeMap<String, i64>,
    levels: &BTreeMap<String, u32>,
    population: &BTreeMap<PopBucket, PopulationRow>,
    config: &GameConfig,
    max_depth: usize,
) -> Option<Vec<String>> {
    let cap = max_depth.min(MAX_CHAIN_DEPTH);
    for depth in 1..=cap {
        let mut visited = BTreeSet::new();
        if let Some(chain) = dfs(resource, inventory, levels, population, config, depth, &mut visited) {
            return Some(chain);
        }
    }
    None
}

fn dfs(
    resource: &str,
    inventory: &BTreeMap<String, i64>,
    levels: &BTreeMap<String, u32>,
    population: &BTreeMap<PopBucket, PopulationRow>,
    config: &GameConfig,
    depth: usize,
    visited: &mut BTreeSet<String>,
) -> Option<Vec<String>> {
    if depth == 0 || !visited.insert(resource.to_string()) {
        return None;
    }
    let result = (|| {
        for building in config.producers_of(resource) {
            let Some(chain) = try_producer(building, inventory, levels, population, config, depth, visited)
            else {
                continue;
            };
            return Some(chain);
        }
        // A processed good with no direct producer candidate may still be
        // reachable through its recipe inputs.
        if let Some(inputs) = config.recipes.get(resource) {
            for input in inputs.keys() {
                if let Some(chain) = dfs(input, inventory, levels, population, config, depth - 1, visited) {
                    return Some(chain);
                }
            }
        }
        None
    })();
    visited.remove(resource);
    result
}

fn try_producer(
    building: &str,
    inventory: &BTreeMap<String, i64>,
    levels: &BTreeMap<String, u32>,
    population: &BTreeMap<PopBucket, PopulationRow>,
    config: &GameConfig,
    depth: usize,
    visited: &mut BTreeSet<String>,
) -> Option<Vec<String>> {
    let spec = config.buildings.get(building)?;
    if spec.pop_per_level > 0 {
        let bucket = config.bucket_for(building)?;
        let row = population.get(&bucket)?;
        if row.is_uninitialized() || row.available() < spec.pop_per_level {
            return None;
        }
    }
    let level = levels.get(building).copied().unwrap_or(0);
    let cost = config.upgrade_cost(building, level)?;
    let missing: Vec<&String> = cost
        .iter()
        .filter(|&(ref r, &need)| inventory.get(*r).copied().unwrap_or(0) < need)
        .map(|(r, _)| r)
        .collect();
    if missing.is_empty() {
        return Some(vec![building.to_string()]);
    }
    // Chase the first missing input that resolves; the rest will be caught
    // on later ticks once this level of the chain is standing.
    for input in missing {
        if let Some(mut chain) = dfs(input, inventory, levels, population, config, depth - 1, visited) {
            chain.push(building.to_string());
            return Some(chain);
        }
    }
    None
}
