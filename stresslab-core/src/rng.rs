//! Deterministic seed derivation.
//!
//! A master seed is expanded into one sub-seed per `(label, unit)` pair, where
//! the label names a validation stage and the unit is the index of a
//! simulation, window or scenario within it. Derivation hashes the inputs with
//! BLAKE3, so a unit's seed never depends on the order units are dispatched.

use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RngHierarchy {
    master_seed: u64,
}

impl RngHierarchy {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Derive the seed for unit `unit` of the stage named `label`.
    pub fn sub_seed(&self, label: &str, unit: u64) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(label.as_bytes());
        hasher.update(&unit.to_le_bytes());
        let hash = hasher.finalize();
        let mut head = [0u8; 8];
        head.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(head)
    }

    /// Seeded `StdRng` for one unit.
    pub fn rng_for(&self, label: &str, unit: u64) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(label, unit))
    }
}
