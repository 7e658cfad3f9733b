//! Replays a price path through the oracle.

use std::collections::{BTreeMap, VecDeque};

use anyhow::Context;
use sextant_oracle::{GeomeanOracle, OracleError};
use sextant_pool::PoolPriceSource;
use sextant_types::{AssetId, BlockClock, PoolKind, PoolState, WAD};

use crate::config::SimConfig;
use crate::scenario::{self, from_wad, to_wad};

/// Asset whose price is simulated.
pub const SIM_ASSET: &str = "TKN";

/// Reference asset.
pub const SIM_REFERENCE: &str = "USD";

/// Depth of the simulated pool on the asset side, WAD.
const POOL_DEPTH: u128 = 1_000 * WAD;

/// One simulated step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    /// Step number, starting at 1.
    pub step: u64,
    /// Block timestamp of the step.
    pub timestamp: u64,
    /// Price implied by the pool.
    pub raw: f64,
    /// Price the oracle recorded after clamping.
    pub recorded: f64,
    /// Arithmetic mean of the last `sliding_window` raw prices.
    pub arithmetic: f64,
    /// Oracle geomean over `window_secs`, once enough history exists.
    pub geometric: Option<f64>,
    /// Whether the step belongs to the manipulation phase.
    pub manipulated: bool,
}

/// Outcome of a full run.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    /// Per-step rows.
    pub steps: Vec<StepReport>,
    /// Largest relative distance of the arithmetic mean from the plateau,
    /// from the start of the manipulation phase onwards.
    pub max_arithmetic_deviation: f64,
    /// Same for the oracle geomean.
    pub max_geometric_deviation: f64,
}

/// Build the oracle the simulator drives, registered at time zero.
pub fn build_oracle(config: &SimConfig) -> anyhow::Result<GeomeanOracle> {
    let mut oracle = GeomeanOracle::new(config.oracle.clone(), PoolPriceSource::Weighted)?;
    oracle.register(
        &[AssetId::from(SIM_ASSET), AssetId::from(SIM_REFERENCE)],
        AssetId::from(SIM_REFERENCE),
        BlockClock::new(0, 0),
    )?;
    Ok(oracle)
}

/// 50/50 pool whose spot price of the asset equals `price` (WAD).
pub fn pool_at(price: u128) -> anyhow::Result<PoolState> {
    let reference_balance = sextant_math::mul_div(price, POOL_DEPTH, WAD)
        .context("pool balance out of range")?;
    let balances = BTreeMap::from([
        (AssetId::from(SIM_ASSET), POOL_DEPTH),
        (AssetId::from(SIM_REFERENCE), reference_balance),
    ]);
    let weights = BTreeMap::from([
        (AssetId::from(SIM_ASSET), WAD / 2),
        (AssetId::from(SIM_REFERENCE), WAD / 2),
    ]);
    Ok(PoolState {
        balances,
        kind: PoolKind::Weighted { weights },
    })
}

/// Feed every step of the scenario through `oracle` and collect the report.
pub fn simulate(oracle: &GeomeanOracle, config: &SimConfig) -> anyhow::Result<Report> {
    let scenario = &config.scenario;
    let asset = AssetId::from(SIM_ASSET);
    let reference = AssetId::from(SIM_REFERENCE);
    let plateau = scenario.base_price * scenario.plateau_multiplier;

    let mut sliding = VecDeque::with_capacity(scenario.sliding_window);
    let mut steps = Vec::with_capacity(scenario.steps);
    let mut max_arithmetic_deviation = 0.0_f64;
    let mut max_geometric_deviation = 0.0_f64;

    for (index, raw) in scenario::generate(scenario).into_iter().enumerate() {
        let step = index as u64 + 1;
        let timestamp = step * scenario.step_secs;
        let pool = pool_at(to_wad(raw))?;
        let updates = oracle
            .on_trade(&asset, &reference, &pool, BlockClock::new(timestamp, step))
            .with_context(|| format!("trade at step {step}"))?;
        let recorded = updates
            .first()
            .map(|update| from_wad(update.price))
            .unwrap_or_default();

        if sliding.len() == scenario.sliding_window {
            sliding.pop_front();
        }
        sliding.push_back(raw);
        let arithmetic = sliding.iter().sum::<f64>() / sliding.len() as f64;

        let geometric = match oracle.get_geomean_price(&asset, scenario.window_secs, timestamp) {
            Ok(price) => Some(from_wad(price)),
            Err(OracleError::InsufficientHistory { .. }) => None,
            Err(err) => return Err(err).with_context(|| format!("geomean at step {step}")),
        };

        if index >= scenario.manipulation_start {
            max_arithmetic_deviation =
                max_arithmetic_deviation.max((arithmetic - plateau).abs() / plateau);
            if let Some(geometric) = geometric {
                max_geometric_deviation =
                    max_geometric_deviation.max((geometric - plateau).abs() / plateau);
            }
        }

        steps.push(StepReport {
            step,
            timestamp,
            raw,
            recorded,
            arithmetic,
            geometric,
            manipulated: scenario::is_manipulated(scenario, index),
        });
    }

    Ok(Report {
        steps,
        max_arithmetic_deviation,
        max_geometric_deviation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScenarioConfig;

    fn quiet_config() -> SimConfig {
        SimConfig {
            scenario: ScenarioConfig {
                noise_std: 0.0,
                ..ScenarioConfig::default()
            },
            ..SimConfig::default()
        }
    }

    #[test]
    fn test_pool_prices_at_target() {
        let pool = pool_at(40 * WAD).expect("pool");
        let price = sextant_pool::WeightedPriceSource
            .spot_price(&AssetId::from(SIM_ASSET), &AssetId::from(SIM_REFERENCE), &pool)
            .expect("price");
        assert_eq!(price, 40 * WAD);
    }

    #[test]
    fn test_geomean_resists_manipulation_better_than_mean() {
        let config = quiet_config();
        let oracle = build_oracle(&config).expect("oracle");
        let report = simulate(&oracle, &config).expect("simulate");

        assert_eq!(report.steps.len(), config.scenario.steps);
        assert!(report.max_geometric_deviation < report.max_arithmetic_deviation);
        // The window starts filling after window_secs.
        assert!(report.steps[0].geometric.is_none());
        assert!(report.steps.last().and_then(|s| s.geometric).is_some());
        assert_eq!(
            report.steps.iter().filter(|s| s.manipulated).count(),
            config.scenario.manipulation_steps
        );
    }

    #[test]
    fn test_recorded_price_never_jumps_more_than_clamp() {
        let config = quiet_config();
        let oracle = build_oracle(&config).expect("oracle");
        let report = simulate(&oracle, &config).expect("simulate");
        let delta = f64::from(config.oracle.max_delta_bps) / 10_000.0;
        for pair in report.steps.windows(2) {
            let ratio = pair[1].recorded / pair[0].recorded;
            assert!(
                ratio <= 1.0 + delta + 1e-9 && ratio >= 1.0 - delta - 1e-9,
                "step {}",
                pair[1].step
            );
        }
    }
}
