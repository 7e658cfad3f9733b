//! Observation records.

use serde::{Deserialize, Serialize};

/// One recorded `(timestamp, price, accumulated log-price)` triple.
///
/// `accumulated_log_price` is the left-Riemann integral of `ln(price)` over
/// time up to `timestamp`: each interval contributes the *previous*
/// observation's log-price multiplied by the elapsed seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    /// Unix timestamp in seconds.
    pub timestamp: u64,
    /// Clamped price in reference-asset units (WAD).
    pub price: u128,
    /// Running integral of `ln(price)` (signed WAD * seconds).
    pub accumulated_log_price: i128,
}

impl Observation {
    /// Create an observation.
    pub fn new(timestamp: u64, price: u128, accumulated_log_price: i128) -> Self {
        Self {
            timestamp,
            price,
            accumulated_log_price,
        }
    }
}
