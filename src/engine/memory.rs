use std::collections::VecDeque;

const DEFAULT_CAPACITY: usize = 64;

/// Bounded memory of construction inputs cities failed to afford. On a
/// later tick the build planner favors candidates that would produce a
/// remembered resource, closing the loop on recurring shortages.
#[derive(Debug)]
pub struct DeficitMemory {
    capacity: usize,
    entries: VecDeque<(u64, String)>,
}

impl Default for DeficitMemory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl DeficitMemory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    /// Record a shortage. Duplicates are ignored; when full, the oldest
    /// entry across all cities is evicted.
    pub fn remember(&mut self, city: u64, resource: &str) {
        if self.entries.iter().any(|(c, r)| *c == city && r == resource) {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((city, resource.to_string()));
    }

    /// Shortages recorded for one city, oldest first.
    pub fn recall(&self, city: u64) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(c, _)| *c == city)
            .map(|(_, r)| r.as_str())
            .collect()
    }

    /// Forget everything about a city, called after a successful build.
    pub fn clear_city(&mut self, city: u64) {
        self.entries.retain(|(c, _)| *c != city);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remembers_per_city_without_duplicates() {
        let mut memory = DeficitMemory::default();
        memory.remember(1, "wood");
        memory.remember(1, "wood");
        memory.remember(1, "stone");
        memory.remember(2, "wood");
        assert_eq!(memory.recall(1), vec!["wood", "stone"]);
        assert_eq!(memory.recall(2), vec!["wood"]);
        assert_eq!(memory.len(), 3);
    }

    #[test]
    fn clearing_a_city_leaves_others() {
        let mut memory = DeficitMemory::default();
        memory.remember(1, "wood");
        memory.remember(2, "stone");
        memory.clear_city(1);
        assert!(memory.recall(1).is_empty());
        assert_eq!(memory.recall(2), vec!["stone"]);
    }

    #[test]
    fn oldest_entry_is_evicted_at_capacity() {
        let mut memory = DeficitMemory::new(2);
        memory.remember(1, "wood");
        memory.remember(1, "stone");
        memory.remember(1, "grain");
        assert_eq!(memory.recall(1), vec!["stone", "grain"]);
        assert_eq!(memory.len(), 2);
    }
}
