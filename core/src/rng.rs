use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::volume::Vol;

/// Construct a deterministic RNG from a fixed seed.
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Volume with values drawn uniformly from `[-limit, limit)` and zeroed gradients.
pub fn random_vol<R: Rng + ?Sized>(
    rng: &mut R,
    sx: usize,
    sy: usize,
    depth: usize,
    limit: f32,
) -> Vol {
    let mut vol = Vol::zeros(sx, sy, depth);
    for value in vol.w_mut() {
        *value = rng.gen::<f32>() * 2.0 * limit - limit;
    }
    vol
}
