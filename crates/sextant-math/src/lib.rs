//! # sextant-math
//!
//! WAD fixed-point arithmetic for the oracle.
//!
//! Every function here is pure integer arithmetic: the same inputs produce
//! the same bits on every platform, which is what lets an observation's
//! accumulated log-price be replayed exactly.
//!
//! ## Modules
//!
//! - [`fixed`]: checked multiply/divide with 256-bit intermediates, decimal rescaling
//! - [`log_exp`]: natural logarithm and exponential of WAD values

pub mod fixed;
pub mod log_exp;

pub use fixed::{mul_div, pow10, rescale, wad_div, wad_mul};
pub use log_exp::{exp_wad, ln_wad};

/// Error types for fixed-point operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MathError {
    /// Result does not fit the output integer width.
    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),

    /// Division by zero.
    #[error("division by zero in {0}")]
    DivisionByZero(&'static str),

    /// Logarithm of zero.
    #[error("logarithm of a non-positive value")]
    NonPositiveLog,
}

/// Convenience result type for fixed-point operations.
pub type Result<T> = std::result::Result<T, MathError>;
