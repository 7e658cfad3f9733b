//! Price path generation.
//!
//! A linear ramp from `base_price` to the plateau, a flat plateau, and a
//! manipulation phase overriding part of it, with seeded Gaussian noise
//! added on top.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sextant_types::WAD;

use crate::config::ScenarioConfig;

/// Smallest price the path is floored at, in reference units.
const PRICE_FLOOR: f64 = 1e-9;

/// Noise-free price at `step`.
pub fn clean_price(config: &ScenarioConfig, step: usize) -> f64 {
    let plateau = config.base_price * config.plateau_multiplier;
    let manipulation_end = config.manipulation_start + config.manipulation_steps;
    if (config.manipulation_start..manipulation_end).contains(&step) {
        config.base_price * config.manipulation_multiplier
    } else if step < config.ramp_steps && config.ramp_steps > 1 {
        let progress = step as f64 / (config.ramp_steps - 1) as f64;
        config.base_price + (plateau - config.base_price) * progress
    } else {
        plateau
    }
}

/// Full noisy price path in reference units.
pub fn generate(config: &ScenarioConfig) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    (0..config.steps)
        .map(|step| {
            let noise = standard_normal(&mut rng) * config.noise_std;
            (clean_price(config, step) + noise).max(PRICE_FLOOR)
        })
        .collect()
}

/// Whether `step` falls inside the manipulation phase.
pub fn is_manipulated(config: &ScenarioConfig, step: usize) -> bool {
    step >= config.manipulation_start && step < config.manipulation_start + config.manipulation_steps
}

/// Convert a reference-unit price to WAD.
pub fn to_wad(price: f64) -> u128 {
    (price * WAD as f64) as u128
}

/// Convert a WAD price to reference units.
pub fn from_wad(price: u128) -> f64 {
    price as f64 / WAD as f64
}

/// Box-Muller transform over two uniform draws.
fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}
