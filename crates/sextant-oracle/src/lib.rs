//! # sextant-oracle
//!
//! Manipulation-resistant time-weighted geometric-mean price oracle.
//!
//! Every trade feeds a fresh spot price per asset into an append-only
//! observation log. Each recorded price is clamped to within a configured
//! fraction of the price in effect at the start of the current time-step,
//! and every entry carries the running integral of `ln(price)` so that the
//! geometric mean over any trailing window is a subtraction, a division and
//! one exponentiation.
//!
//! ## Modules
//!
//! - [`config`]: Immutable oracle configuration
//! - [`guard`]: Per-update price clamp
//! - [`log`]: Per-asset observation log
//! - [`query`]: Binary-search locate and geometric-mean evaluation
//! - [`source`]: Pool spot-price strategy interface
//! - [`events`]: Price-update notification bus
//! - [`oracle`]: The engine bound to one pool
//! - [`feed`]: Third-party price-feed adaptor

pub mod config;
pub mod events;
pub mod feed;
pub mod guard;
pub mod log;
pub mod oracle;
pub mod query;
pub mod source;

pub use config::OracleConfig;
pub use events::EventBus;
pub use feed::{PriceFeed, PriceFeedAdaptor};
pub use log::{ObservationLog, PendingObservation, Recorded, TokenState};
pub use oracle::{GeomeanOracle, LatestObservation};
pub use source::PriceSource;

use sextant_math::MathError;
use sextant_types::AssetId;

/// Error types for oracle operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    /// `register` was called on an oracle that already has assets.
    #[error("oracle is already registered")]
    AlreadyRegistered,

    /// The reference asset is not part of the registered asset set.
    #[error("reference asset {0} is not among the pool assets")]
    ReferenceAssetMissing(AssetId),

    /// The same asset was listed twice at registration.
    #[error("asset {0} listed more than once")]
    DuplicateAsset(AssetId),

    /// The asset has no observation log (unknown, or the reference asset).
    #[error("asset {0} is not registered")]
    AssetNotRegistered(AssetId),

    /// No retained observation precedes the start of the query window.
    #[error("insufficient history: no observation before timestamp {target}")]
    InsufficientHistory {
        /// Start instant of the requested window.
        target: u64,
    },

    /// Window is zero or longer than the configured maximum.
    #[error("invalid period {window}s (must be in 1..={max_window})")]
    InvalidPeriod {
        /// Requested window in seconds.
        window: u64,
        /// Configured maximum window in seconds.
        max_window: u64,
    },

    /// A value does not fit the fixed-point width used for storage or output.
    #[error("arithmetic range error: {0}")]
    ArithmeticRange(String),

    /// A converter feed reported a non-positive price.
    #[error("inconsistent price feed: converter answered {answer}")]
    InconsistentPriceFeed {
        /// The offending answer.
        answer: i128,
    },

    /// A write or query instant precedes the last recorded timestamp.
    #[error("non-monotonic timestamp: {new} < {last}")]
    NonMonotonicTimestamp {
        /// The instant supplied by the caller.
        new: u64,
        /// Timestamp of the last recorded observation.
        last: u64,
    },

    /// Observation index outside the retained log.
    #[error("observation index {index} out of range (log holds {len})")]
    ObservationIndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of retained observations.
        len: usize,
    },

    /// Configuration rejected by validation.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The price source could not price an asset from the pool state.
    #[error("price source failed for {asset}: {reason}")]
    PriceSource {
        /// Asset being priced.
        asset: AssetId,
        /// Strategy-specific failure description.
        reason: String,
    },
}

impl From<MathError> for OracleError {
    fn from(err: MathError) -> Self {
        OracleError::ArithmeticRange(err.to_string())
    }
}

/// Convenience result type for oracle operations.
pub type Result<T> = std::result::Result<T, OracleError>;
