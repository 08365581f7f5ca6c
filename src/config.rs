use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{PopBucket, ResourceCategory};

/// Exponent of the per-level cost curve: cost to reach level N+1 is
/// `ceil(base_cost * (N+1)^COST_EXPONENT)` per resource.
pub const COST_EXPONENT: f64 = 1.7;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("building {building} has an empty cost table")]
    EmptyCost { building: String },
    #[error("building {building} uses uncategorized resource {resource}")]
    UncategorizedResource { building: String, resource: String },
    #[error("housing building {building} must not require workers")]
    HousingWithWorkers { building: String },
    #[error("producer {building} produces nothing")]
    IdleProducer { building: String },
    #[error("recipe for {resource} references uncategorized input {input}")]
    UnknownRecipeInput { resource: String, input: String },
    #[error("recipe output {resource} is classified as a common resource")]
    CommonRecipeOutput { resource: String },
}

/// What a building does when upgraded: producers yield resources and
/// occupy workers; housing raises one bucket's capacity instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BuildingKind {
    Producer,
    Housing { bucket: PopBucket },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingSpec {
    /// Base construction cost per resource (level-0 -> level-1 baseline).
    pub base_cost: BTreeMap<String, i64>,
    /// Per-tick production per level, keyed by resource.
    pub production: BTreeMap<String, f64>,
    /// Workers reserved from the mapped bucket per level. Always 0 for housing.
    pub pop_per_level: u32,
    pub kind: BuildingKind,
    /// Flat ranking bonus applied before payback ordering.
    pub priority_boost: f64,
}

impl BuildingSpec {
    pub fn is_housing(&self) -> bool {
        matches!(self.kind, BuildingKind::Housing { .. })
    }
}

/// Static game rules the engine reads but does not own: building specs,
/// resource classification, processing recipes, per-capita upkeep.
///
/// Validated once at load so the planners can assume exact production-table
/// keys and a total category mapping (no name-based inference anywhere).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// Name of the currency resource; excluded from trade planning.
    pub currency: String,
    pub buildings: BTreeMap<String, BuildingSpec>,
    pub categories: BTreeMap<String, ResourceCategory>,
    /// Processed/specialized resource -> inputs consumed per unit produced.
    pub recipes: BTreeMap<String, BTreeMap<String, f64>>,
    /// Per-capita per-tick consumption, summed over all buckets.
    pub upkeep: BTreeMap<String, f64>,
    /// Capacity added to the housing bucket per completed house level.
    pub pop_per_house: u32,
    pub tick_seconds: u64,
}

impl GameConfig {
    /// Cost of raising `building` from `level` to `level + 1`, rounded up
    /// per resource. `None` for unknown buildings.
    pub fn upgrade_cost(&self, building: &str, level: u32) -> Option<BTreeMap<String, i64>> {
        let spec = self.buildings.get(building)?;
        let factor = f64::from(level + 1).powf(COST_EXPONENT);
        Some(
            spec.base_cost
                .iter()
                .map(|(r, &base)| (r.clone(), (base as f64 * factor).ceil() as i64))
                .collect(),
        )
    }

    /// The population bucket a building draws workers from (producers) or
    /// expands (housing). `None` only for invalid configs, which
    /// [`GameConfig::validate`] rejects.
    pub fn bucket_for(&self, building: &str) -> Option<PopBucket> {
        let spec = self.buildings.get(building)?;
        match &spec.kind {
            BuildingKind::Housing { bucket } => Some(*bucket),
            BuildingKind::Producer => spec
                .production
                .keys()
                .filter_map(|r| self.categories.get(r))
                .max()
                .map(|c| c.bucket()),
        }
    }

    /// Building ids whose production table contains `resource`, in sorted
    /// (deterministic) order.
    pub fn producers_of(&self, resource: &str) -> Vec<&str> {
        self.buildings
            .iter()
            .filter(|(_, spec)| spec.production.contains_key(resource))
            .map(|(id, _)| id.as_str())
            .collect()
    }

    pub fn category_of(&self, resource: &str) -> Option<ResourceCategory> {
        self.categories.get(resource).copied()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (id, spec) in &self.buildings {
            if spec.base_cost.is_empty() {
                return Err(ConfigError::EmptyCost {
                    building: id.clone(),
                });
            }
            for resource in spec.base_cost.keys().chain(spec.production.keys()) {
                if !self.categories.contains_key(resource) {
                    return Err(ConfigError::UncategorizedResource {
                        building: id.clone(),
                        resource: resource.clone(),
                    });
                }
            }
            match &spec.kind {
                BuildingKind::Housing { .. } => {
                    if spec.pop_per_level != 0 {
                        return Err(ConfigError::HousingWithWorkers {
                            building: id.clone(),
                        });
                    }
                }
                BuildingKind::Producer => {
                    if spec.production.is_empty() {
                        return Err(ConfigError::IdleProducer {
                            building: id.clone(),
                        });
                    }
                }
            }
        }
        for (output, inputs) in &self.recipes {
            match self.categories.get(output) {
                Some(ResourceCategory::Common) => {
                    return Err(ConfigError::CommonRecipeOutput {
                        resource: output.clone(),
                    });
                }
                Some(_) => {}
                None => {
                    return Err(ConfigError::UnknownRecipeInput {
                        resource: output.clone(),
                        input: output.clone(),
                    });
                }
            }
            for input in inputs.keys() {
                if !self.categories.contains_key(input) {
                    return Err(ConfigError::UnknownRecipeInput {
                        resource: output.clone(),
                        input: input.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// The canonical ruleset used by tests and demos: three common
    /// producers, two processed chains, one specialized chain, and one
    /// house type per bucket.
    pub fn standard() -> Self {
        fn costs(entries: &[(&str, i64)]) -> BTreeMap<String, i64> {
            entries.iter().map(|(r, n)| (r.to_string(), *n)).collect()
        }
        fn rates(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
            entries.iter().map(|(r, n)| (r.to_string(), *n)).collect()
        }
        fn producer(
            cost: &[(&str, i64)],
            production: &[(&str, f64)],
            pop: u32,
            boost: f64,
        ) -> BuildingSpec {
            BuildingSpec {
                base_cost: costs(cost),
                production: rates(production),
                pop_per_level: pop,
                kind: BuildingKind::Producer,
                priority_boost: boost,
            }
        }
        fn housing(cost: &[(&str, i64)], bucket: PopBucket) -> BuildingSpec {
            BuildingSpec {
                base_cost: costs(cost),
                production: BTreeMap::new(),
                pop_per_level: 0,
                kind: BuildingKind::Housing { bucket },
                priority_boost: 0.0,
            }
        }

        let mut buildings = BTreeMap::new();
        buildings.insert(
            "sawmill".to_string(),
            producer(&[("stone", 30)], &[("wood", 5.0)], 1, 1.0),
        );
        buildings.insert(
            "quarry".to_string(),
            producer(&[("wood", 60)], &[("stone", 4.0)], 1, 1.0),
        );
        buildings.insert(
            "farm".to_string(),
            producer(&[("wood", 30)], &[("grain", 6.0)], 1, 1.0),
        );
        buildings.insert(
            "pasture".to_string(),
            producer(&[("wood", 40)], &[("wool", 3.0)], 1, 0.0),
        );
        buildings.insert(
            "weaver".to_string(),
            producer(&[("wood", 50), ("stone", 20)], &[("cloth", 2.0)], 1, 0.0),
        );
        buildings.insert(
            "bakery".to_string(),
            producer(&[("wood", 40), ("stone", 40)], &[("bread", 3.0)], 1, 0.0),
        );
        buildings.insert(
            "glassworks".to_string(),
            producer(&[("stone", 80), ("wood", 40)], &[("glass", 1.0)], 2, 0.0),
        );
        buildings.insert("house".to_string(), housing(&[("wood", 50)], PopBucket::Poor));
        buildings.insert(
            "townhouse".to_string(),
            housing(&[("wood", 80), ("stone", 40)], PopBucket::Burgess),
        );
        buildings.insert(
            "manor".to_string(),
            housing(&[("stone", 120), ("glass", 10)], PopBucket::Patrician),
        );

        let categories = [
            ("wood", ResourceCategory::Common),
            ("stone", ResourceCategory::Common),
            ("grain", ResourceCategory::Common),
            ("wool", ResourceCategory::Common),
            ("cloth", ResourceCategory::Processed),
            ("bread", ResourceCategory::Processed),
            ("glass", ResourceCategory::Specialized),
        ]
        .into_iter()
        .map(|(r, c)| (r.to_string(), c))
        .collect();

        let mut recipes = BTreeMap::new();
        recipes.insert("cloth".to_string(), rates(&[("wool", 2.0)]));
        recipes.insert("bread".to_string(), rates(&[("grain", 2.0)]));
        recipes.insert("glass".to_string(), rates(&[("stone", 1.0), ("wood", 1.0)]));

        GameConfig {
            currency: "gold".to_string(),
            buildings,
            categories,
            recipes,
            upkeep: rates(&[("grain", 0.01), ("bread", 0.002)]),
            pop_per_house: 5,
            tick_seconds: 3600,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_validates() {
        GameConfig::standard().validate().expect("standard ruleset");
    }

    #[test]
    fn cost_curve_is_exponential_and_rounded_up() {
        let config = GameConfig::standard();
        // sawmill base: stone 30. Level 0 -> 1: 30 * 1^1.7 = 30.
        let c0 = config.upgrade_cost("sawmill", 0).unwrap();
        assert_eq!(c0["stone"], 30);
        // Level 1 -> 2: 30 * 2^1.7 = 97.46... -> 98.
        let c1 = config.upgrade_cost("sawmill", 1).unwrap();
        assert_eq!(c1["stone"], 98);
        assert!(config.upgrade_cost("cathedral", 0).is_none());
    }

    #[test]
    fn bucket_follows_highest_produced_category() {
        let config = GameConfig::standard();
        assert_eq!(config.bucket_for("farm"), Some(PopBucket::Poor));
        assert_eq!(config.bucket_for("weaver"), Some(PopBucket::Burgess));
        assert_eq!(config.bucket_for("glassworks"), Some(PopBucket::Patrician));
        // Housing maps to its declared bucket, not to production.
        assert_eq!(config.bucket_for("house"), Some(PopBucket::Poor));
        assert_eq!(config.bucket_for("manor"), Some(PopBucket::Patrician));
    }

    #[test]
    fn producers_lookup_is_exact_match() {
        let config = GameConfig::standard();
        assert_eq!(config.producers_of("wood"), vec!["sawmill"]);
        assert_eq!(config.producers_of("woo"), Vec::<&str>::new());
        assert!(config.producers_of("gold").is_empty());
    }

    #[test]
    fn validation_rejects_uncategorized_production() {
        let mut config = GameConfig::standard();
        config
            .buildings
            .get_mut("farm")
            .unwrap()
            .production
            .insert("silk".to_string(), 1.0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UncategorizedResource { .. })
        ));
    }

    #[test]
    fn validation_rejects_working_housing() {
        let mut config = GameConfig::standard();
        config.buildings.get_mut("house").unwrap().pop_per_level = 1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::HousingWithWorkers { .. })
        ));
    }

    #[test]
    fn validation_rejects_common_recipe_output() {
        let mut config = GameConfig::standard();
        config
            .recipes
            .insert("wood".to_string(), BTreeMap::from([("grain".to_string(), 1.0)]));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::CommonRecipeOutput { .. })
        ));
    }
}
