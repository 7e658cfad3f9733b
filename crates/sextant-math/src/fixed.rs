//! Checked WAD multiplication, division and decimal rescaling.

use ethnum::U256;
use sextant_types::WAD;

use crate::{MathError, Result};

/// Compute `floor(a * b / denominator)` with a 256-bit intermediate product.
///
/// # Errors
///
/// - [`MathError::DivisionByZero`] if `denominator` is zero
/// - [`MathError::Overflow`] if the quotient exceeds `u128::MAX`
pub fn mul_div(a: u128, b: u128, denominator: u128) -> Result<u128> {
    if denominator == 0 {
        return Err(MathError::DivisionByZero("mul_div"));
    }
    let quotient = U256::from(a) * U256::from(b) / U256::from(denominator);
    if quotient > U256::from(u128::MAX) {
        return Err(MathError::Overflow("mul_div"));
    }
    Ok(quotient.as_u128())
}

/// Multiply two WAD values, rounding down.
pub fn wad_mul(a: u128, b: u128) -> Result<u128> {
    mul_div(a, b, WAD)
}

/// Divide two WAD values, rounding down.
pub fn wad_div(a: u128, b: u128) -> Result<u128> {
    mul_div(a, WAD, b)
}

/// `10^exponent` as a `u128`.
///
/// # Errors
///
/// - [`MathError::Overflow`] for exponents above 38
pub fn pow10(exponent: u8) -> Result<u128> {
    10u128
        .checked_pow(u32::from(exponent))
        .ok_or(MathError::Overflow("pow10"))
}

/// Re-express `value` from `from_decimals` fractional digits to `to_decimals`.
///
/// Scaling down truncates.
///
/// # Examples
///
/// ```
/// use sextant_math::rescale;
///
/// assert_eq!(rescale(1_500_000_000_000_000_000, 18, 6).unwrap(), 1_500_000);
/// assert_eq!(rescale(1_500_000, 6, 18).unwrap(), 1_500_000_000_000_000_000);
/// ```
pub fn rescale(value: u128, from_decimals: u8, to_decimals: u8) -> Result<u128> {
    if to_decimals >= from_decimals {
        value
            .checked_mul(pow10(to_decimals - from_decimals)?)
            .ok_or(MathError::Overflow("rescale"))
    } else {
        Ok(value / pow10(from_decimals - to_decimals)?)
    }
}
