//! Per-update price clamp.
//!
//! The recorded price may move by at most `max_delta` (a WAD fraction) from
//! a reference price per time-step, however far the pool price moved. An
//! attacker therefore has to hold a manipulated price across many
//! consecutive steps to shift a windowed geometric mean materially.
//!
//! Clamping is a silent substitution, not an error.

use sextant_math::wad_mul;
use sextant_types::WAD;

use crate::Result;

/// Inclusive `[low, high]` band around `reference`.
pub fn bounds(reference: u128, max_delta: u128) -> Result<(u128, u128)> {
    let down = WAD.checked_sub(max_delta).ok_or_else(|| {
        crate::OracleError::ArithmeticRange(format!("clamp fraction {max_delta} exceeds 1.0"))
    })?;
    let up = WAD
        .checked_add(max_delta)
        .ok_or_else(|| crate::OracleError::ArithmeticRange("clamp fraction overflow".into()))?;
    Ok((wad_mul(reference, down)?, wad_mul(reference, up)?))
}

/// Clamp `current` into the band allowed around `reference`.
///
/// # Examples
///
/// ```
/// use sextant_oracle::guard::clamp;
/// use sextant_types::WAD;
///
/// let ten_percent = WAD / 10;
/// assert_eq!(clamp(5 * WAD / 4, WAD, ten_percent).unwrap(), 11 * WAD / 10);
/// assert_eq!(clamp(WAD, WAD, ten_percent).unwrap(), WAD);
/// ```
pub fn clamp(current: u128, reference: u128, max_delta: u128) -> Result<u128> {
    let (low, high) = bounds(reference, max_delta)?;
    Ok(current.clamp(low, high))
}
