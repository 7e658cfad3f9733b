//! Pool spot-price strategy interface.

use sextant_types::{AssetId, PoolState};

use crate::Result;

/// Computes the instantaneous price of a pool asset from the pool's state.
///
/// Implementations are selected once when the oracle is built and must be
/// pure: the same state always yields the same price.
pub trait PriceSource: Send + Sync {
    /// Price of `asset` in units of `reference`, as a WAD value.
    ///
    /// # Errors
    ///
    /// - [`OracleError::PriceSource`](crate::OracleError::PriceSource) if the
    ///   state does not allow pricing `asset`
    fn compute_price(&self, asset: &AssetId, reference: &AssetId, pool: &PoolState) -> Result<u128>;
}

impl<S: PriceSource + ?Sized> PriceSource for Box<S> {
    fn compute_price(&self, asset: &AssetId, reference: &AssetId, pool: &PoolState) -> Result<u128> {
        (**self).compute_price(asset, reference, pool)
    }
}
