//! Seeded uniform RNG for generated code.
//!
//! One generator per thread; `seed` reseeds only the calling thread's
//! instance. Draws are uniform in `[0, 1)`.

use std::cell::RefCell;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

thread_local! {
    static RNG: RefCell<SmallRng> = RefCell::new(SmallRng::seed_from_u64(0));
}

/// Reseeds the calling thread's generator.
pub fn seed(seed: u32) {
    RNG.with(|rng| *rng.borrow_mut() = SmallRng::seed_from_u64(u64::from(seed)));
}

/// Draws a uniform `f32` in `[0, 1)`.
#[must_use]
pub fn val() -> f32 {
    RNG.with(|rng| rng.borrow_mut().r#gen::<f32>())
}
