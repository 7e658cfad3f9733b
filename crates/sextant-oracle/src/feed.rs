//! Third-party price-feed adaptor.
//!
//! [`PriceFeedAdaptor`] answers the usual "latest round" price-feed query
//! with the oracle's geometric-mean price over a fixed window. With a
//! converter feed it re-denominates the result through the converter's own
//! latest answer, e.g. `TOKEN/WETH * WETH/USD = TOKEN/USD`.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use sextant_math::{mul_div, pow10};
use sextant_types::{AssetId, RoundData};

use crate::oracle::GeomeanOracle;
use crate::{OracleError, Result};

/// A source of "now" in Unix seconds.
pub type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

/// The external price-feed shape.
pub trait PriceFeed: Send + Sync {
    /// Fractional decimal digits of `answer`.
    fn decimals(&self) -> u8;

    /// Human-readable pair description.
    fn description(&self) -> String;

    /// The most recent round.
    fn latest_round_data(&self) -> Result<RoundData>;
}

/// Stateless view of one asset's windowed geometric mean as a [`PriceFeed`].
#[derive(Clone)]
pub struct PriceFeedAdaptor {
    oracle: Arc<GeomeanOracle>,
    asset: AssetId,
    window: u64,
    converter: Option<Arc<dyn PriceFeed>>,
    clock: Clock,
}

impl GeomeanOracle {
    /// Build a [`PriceFeedAdaptor`] over this oracle, evaluated at wall-clock time.
    ///
    /// # Errors
    ///
    /// - [`OracleError::AssetNotRegistered`] if `asset` has no log
    /// - [`OracleError::InvalidPeriod`] if `window` is outside `1..=max_window`
    pub fn create_price_feed_adaptor(
        self: &Arc<Self>,
        asset: AssetId,
        window: u64,
        converter: Option<Arc<dyn PriceFeed>>,
    ) -> Result<PriceFeedAdaptor> {
        PriceFeedAdaptor::new(Arc::clone(self), asset, window, converter, Arc::new(unix_now))
    }
}

impl PriceFeedAdaptor {
    /// Build an adaptor with an explicit clock.
    ///
    /// # Errors
    ///
    /// - [`OracleError::AssetNotRegistered`] if `asset` has no log
    /// - [`OracleError::InvalidPeriod`] if `window` is outside `1..=max_window`
    pub fn new(
        oracle: Arc<GeomeanOracle>,
        asset: AssetId,
        window: u64,
        converter: Option<Arc<dyn PriceFeed>>,
        clock: Clock,
    ) -> Result<Self> {
        // Fails for unknown assets.
        oracle.get_latest_observation(&asset)?;
        let max_window = oracle.config().max_window;
        if window == 0 || window > max_window {
            return Err(OracleError::InvalidPeriod { window, max_window });
        }
        Ok(Self {
            oracle,
            asset,
            window,
            converter,
            clock,
        })
    }

    /// The asset this adaptor prices.
    pub fn asset(&self) -> &AssetId {
        &self.asset
    }

    /// Averaging window in seconds.
    pub fn window(&self) -> u64 {
        self.window
    }
}

impl PriceFeed for PriceFeedAdaptor {
    fn decimals(&self) -> u8 {
        self.oracle.config().price_decimals
    }

    fn description(&self) -> String {
        let reference = self
            .oracle
            .reference_asset()
            .map(AssetId::to_string)
            .unwrap_or_default();
        match &self.converter {
            Some(converter) => format!(
                "{} / {} geomean {}s via {}",
                self.asset,
                reference,
                self.window,
                converter.description()
            ),
            None => format!("{} / {} geomean {}s", self.asset, reference, self.window),
        }
    }

    fn latest_round_data(&self) -> Result<RoundData> {
        let now = (self.clock)();
        let (mut price, latest) = self
            .oracle
            .get_geomean_price_and_latest(&self.asset, self.window, now)?;

        if let Some(converter) = &self.converter {
            let round = converter.latest_round_data()?;
            if round.answer <= 0 {
                return Err(OracleError::InconsistentPriceFeed {
                    answer: round.answer,
                });
            }
            price = mul_div(price, round.answer.unsigned_abs(), pow10(converter.decimals())?)?;
        }

        let answer = i128::try_from(price).map_err(|_| {
            OracleError::ArithmeticRange(format!("feed answer {price} exceeds i128"))
        })?;
        let round_id = latest.round;
        Ok(RoundData {
            round_id,
            answer,
            started_at: latest.observation.timestamp,
            updated_at: latest.observation.timestamp,
            answered_in_round: round_id,
        })
    }
}

impl std::fmt::Debug for PriceFeedAdaptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceFeedAdaptor")
            .field("asset", &self.asset)
            .field("window", &self.window)
            .field("converter", &self.converter.as_ref().map(|c| c.description()))
            .finish_non_exhaustive()
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
