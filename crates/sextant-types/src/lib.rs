//! # sextant-types
//!
//! Shared domain types used across the Sextant workspace.
//!
//! Prices are WAD fixed-point values (18 fractional decimal digits) held in
//! `u128`; log-domain quantities are signed WAD values held in `i128`.

pub mod asset;
pub mod events;
pub mod feed;
pub mod observation;
pub mod pool;

pub use asset::{AssetId, BlockClock};
pub use events::PriceUpdated;
pub use feed::RoundData;
pub use observation::Observation;
pub use pool::{PoolKind, PoolState};

/// Fixed-point unit: 1.0 expressed with 18 fractional decimal digits.
pub const WAD: u128 = 1_000_000_000_000_000_000;

/// Signed counterpart of [`WAD`] for log-domain arithmetic.
pub const WAD_I: i128 = 1_000_000_000_000_000_000;

/// Number of fractional decimal digits in a WAD value.
pub const WAD_DECIMALS: u8 = 18;

/// Price every asset log is seeded with at registration (1.0).
pub const NEUTRAL_PRICE: u128 = WAD;

/// Seconds in one day.
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Largest price (WAD) an observation may store: `2^96 - 1`.
///
/// Keeps every clamp bound and every `elapsed * ln(price)` product well
/// inside the 128-bit working range.
pub const MAX_PRICE: u128 = (1 << 96) - 1;
