use serde::{Deserialize, Serialize};

/// The three citizen tiers. Each tier is fed by (and staffs production of)
/// one resource category: common goods employ the poor, processed goods the
/// burgess class, specialized goods the patricians.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PopBucket {
    Poor,
    Burgess,
    Patrician,
}

pub const ALL_BUCKETS: [PopBucket; 3] = [PopBucket::Poor, PopBucket::Burgess, PopBucket::Patrician];

impl PopBucket {
    pub fn as_str(self) -> &'static str {
        match self {
            PopBucket::Poor => "poor",
            PopBucket::Burgess => "burgess",
            PopBucket::Patrician => "patrician",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "poor" => Some(PopBucket::Poor),
            "burgess" => Some(PopBucket::Burgess),
            "patrician" => Some(PopBucket::Patrician),
            _ => None,
        }
    }
}

/// Classification of a resource, declared per-resource in [`GameConfig`]
/// rather than inferred from names.
///
/// [`GameConfig`]: crate::config::GameConfig
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceCategory {
    Common,
    Processed,
    Specialized,
}

impl ResourceCategory {
    /// The population tier that works buildings producing this category.
    pub fn bucket(self) -> PopBucket {
        match self {
            ResourceCategory::Common => PopBucket::Poor,
            ResourceCategory::Processed => PopBucket::Burgess,
            ResourceCategory::Specialized => PopBucket::Patrician,
        }
    }
}

/// One population tier of one city.
///
/// `occupied` is the linear worker occupation: the sum over buildings mapped
/// to this bucket of `level * pop_per_level`. `available` is always derived
/// from current state, never stored, so a stale read cannot leak through a
/// mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationRow {
    pub current: u32,
    pub max: u32,
    pub occupied: u32,
}

impl PopulationRow {
    pub fn new(current: u32, max: u32) -> Self {
        Self {
            current,
            max,
            occupied: 0,
        }
    }

    /// Unoccupied citizens, `current - occupied` clamped at zero.
    pub fn available(&self) -> u32 {
        self.current.saturating_sub(self.occupied)
    }

    /// True when growth is blocked: every slot up to capacity is filled.
    pub fn is_full(&self) -> bool {
        self.max > 0 && self.current >= self.max
    }

    /// A bucket that was never seeded with capacity. Treated as
    /// "availability unknown" by the planner.
    pub fn is_uninitialized(&self) -> bool {
        self.current == 0 && self.max == 0
    }

    /// `0 <= available <= current <= max`.
    pub fn invariant_holds(&self) -> bool {
        self.available() <= self.current && self.current <= self.max
    }
}
