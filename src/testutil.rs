//! Shared helpers for unit and integration tests.

use rand::SeedableRng;
use rand::rngs::SmallRng;

/// A seeded RNG for tick tests; the same seed replays the same gates.
pub fn tick_rng(seed: u64) -> SmallRng {
    SmallRng::seed_from_u64(seed)
}

/// Assert a float is approximately equal, with a named context message.
pub fn assert_approx(actual: f64, expected: f64, tolerance: f64, msg: &str) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "{msg}: expected ~{expected} (+-{tolerance}), got {actual}"
    );
}
