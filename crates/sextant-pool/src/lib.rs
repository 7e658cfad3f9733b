//! # sextant-pool
//!
//! Spot-price strategies for the pool types the oracle can observe.
//!
//! ## Modules
//!
//! - [`weighted`]: Constant-weight pools, ratio of balance/weight terms
//! - [`stable`]: Stable-swap pools, invariant solver and marginal price

pub mod stable;
pub mod weighted;

use serde::{Deserialize, Serialize};
use sextant_math::MathError;
use sextant_oracle::{OracleError, PriceSource};
use sextant_types::{AssetId, PoolState};

pub use stable::{stable_invariant, StablePriceSource};
pub use weighted::WeightedPriceSource;

/// Error types for pool price computation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// The pool state has no balance for the asset.
    #[error("asset {0} is not in the pool")]
    MissingAsset(AssetId),

    /// A balance is zero.
    #[error("asset {0} has a zero balance")]
    ZeroBalance(AssetId),

    /// A weight is zero or missing.
    #[error("asset {0} has no weight")]
    ZeroWeight(AssetId),

    /// The strategy was handed parameters for another pool type.
    #[error("expected a {expected} pool")]
    WrongPoolKind {
        /// Pool type the strategy prices.
        expected: &'static str,
    },

    /// Amplification must be at least 1.
    #[error("invalid amplification coefficient {0}")]
    InvalidAmplification(u128),

    /// A stable pool needs at least two assets.
    #[error("stable pool needs at least two assets, got {0}")]
    TooFewAssets(usize),

    /// Newton iteration for the invariant did not settle.
    #[error("stable invariant did not converge")]
    InvariantDidNotConverge,

    /// Fixed-point failure.
    #[error(transparent)]
    Math(#[from] MathError),
}

/// Convenience result type for pool operations.
pub type Result<T> = std::result::Result<T, PoolError>;

/// Strategy selected once when the oracle is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolPriceSource {
    /// Constant-weight pool pricing.
    Weighted,
    /// Stable-swap pricing.
    Stable,
}

impl PriceSource for PoolPriceSource {
    fn compute_price(
        &self,
        asset: &AssetId,
        reference: &AssetId,
        pool: &PoolState,
    ) -> sextant_oracle::Result<u128> {
        match self {
            PoolPriceSource::Weighted => WeightedPriceSource.compute_price(asset, reference, pool),
            PoolPriceSource::Stable => StablePriceSource.compute_price(asset, reference, pool),
        }
    }
}

/// Wrap a pool failure for the oracle.
pub(crate) fn source_error(asset: &AssetId, err: PoolError) -> OracleError {
    OracleError::PriceSource {
        asset: asset.clone(),
        reason: err.to_string(),
    }
}

/// Balance of `asset`, rejecting missing and zero entries.
pub(crate) fn required_balance(pool: &PoolState, asset: &AssetId) -> Result<u128> {
    match pool.balance(asset) {
        None => Err(PoolError::MissingAsset(asset.clone())),
        Some(0) => Err(PoolError::ZeroBalance(asset.clone())),
        Some(balance) => Ok(balance),
    }
}
