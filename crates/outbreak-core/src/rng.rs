//! Seeded random generators.
//!
//! There is no global generator: graph construction, runs and sweep
//! combinations each get a `SimRng` derived from an explicit seed, so any
//! result can be reproduced from its inputs regardless of which worker
//! computed it.

use rand::SeedableRng;

/// Generator used throughout the simulation.
pub type SimRng = rand::rngs::StdRng;

pub fn seeded(seed: u64) -> SimRng {
    SimRng::seed_from_u64(seed)
}

/// Mix a label into a base seed.
///
/// Stable across platforms and releases, unlike `DefaultHasher`.
pub fn derive_seed(base: u64, label: &str) -> u64 {
    let mut h = base.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    for byte in label.bytes() {
        h ^= byte as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    h ^= h >> 33;
    h = h.wrapping_mul(0xff51afd7ed558ccd);
    h ^= h >> 33;
    h = h.wrapping_mul(0xc4ceb9fe1a85ec53);
    h ^ (h >> 33)
}
