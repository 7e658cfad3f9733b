//! Scenario file loading.

use std::path::{Path, PathBuf};

use anyhow::{ensure, Context};
use serde::{Deserialize, Serialize};
use sextant_oracle::OracleConfig;

/// Environment variable naming the scenario file when no argument is given.
pub const SCENARIO_ENV: &str = "SEXTANT_SCENARIO";

/// Complete simulator configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimConfig {
    /// Oracle parameters.
    #[serde(default)]
    pub oracle: OracleConfig,
    /// Price path parameters.
    #[serde(default)]
    pub scenario: ScenarioConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Price path and sampling parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Total number of steps.
    #[serde(default = "default_steps")]
    pub steps: usize,
    /// Seconds between steps.
    #[serde(default = "default_step_secs")]
    pub step_secs: u64,
    /// Starting price in reference units.
    #[serde(default = "default_base_price")]
    pub base_price: f64,
    /// Steps spent moving linearly to the plateau.
    #[serde(default = "default_ramp_steps")]
    pub ramp_steps: usize,
    /// Plateau price as a multiple of `base_price`.
    #[serde(default = "default_plateau_multiplier")]
    pub plateau_multiplier: f64,
    /// First step of the manipulation phase.
    #[serde(default = "default_manipulation_start")]
    pub manipulation_start: usize,
    /// Length of the manipulation phase.
    #[serde(default = "default_manipulation_steps")]
    pub manipulation_steps: usize,
    /// Manipulated price as a multiple of `base_price`.
    #[serde(default = "default_manipulation_multiplier")]
    pub manipulation_multiplier: f64,
    /// Standard deviation of the additive noise, in reference units.
    #[serde(default = "default_noise_std")]
    pub noise_std: f64,
    /// RNG seed for the noise.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Geomean window in seconds.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Sliding-window length of the arithmetic mean, in steps.
    #[serde(default = "default_sliding_window")]
    pub sliding_window: usize,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Level for the `sextant` crates: "trace" | "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions

fn default_steps() -> usize {
    300
}

fn default_step_secs() -> u64 {
    6
}

fn default_base_price() -> f64 {
    20.0
}

fn default_ramp_steps() -> usize {
    60
}

fn default_plateau_multiplier() -> f64 {
    2.0
}

fn default_manipulation_start() -> usize {
    100
}

fn default_manipulation_steps() -> usize {
    30
}

fn default_manipulation_multiplier() -> f64 {
    4.0
}

fn default_noise_std() -> f64 {
    1.0
}

fn default_seed() -> u64 {
    2
}

fn default_window_secs() -> u64 {
    300
}

fn default_sliding_window() -> usize {
    50
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            steps: default_steps(),
            step_secs: default_step_secs(),
            base_price: default_base_price(),
            ramp_steps: default_ramp_steps(),
            plateau_multiplier: default_plateau_multiplier(),
            manipulation_start: default_manipulation_start(),
            manipulation_steps: default_manipulation_steps(),
            manipulation_multiplier: default_manipulation_multiplier(),
            noise_std: default_noise_std(),
            seed: default_seed(),
            window_secs: default_window_secs(),
            sliding_window: default_sliding_window(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl SimConfig {
    /// Load the scenario named by the first CLI argument, else by
    /// `$SEXTANT_SCENARIO`, else the built-in defaults.
    pub fn load() -> anyhow::Result<Self> {
        match Self::scenario_path() {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Parse and validate a scenario file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        let config: SimConfig = toml::from_str(&content)
            .with_context(|| format!("parsing scenario {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject scenarios the simulator cannot run.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.oracle.validate()?;
        let scenario = &self.scenario;
        ensure!(scenario.steps > 0, "steps must be non-zero");
        ensure!(scenario.step_secs > 0, "step_secs must be non-zero");
        ensure!(scenario.base_price > 0.0, "base_price must be positive");
        ensure!(
            scenario.plateau_multiplier > 0.0 && scenario.manipulation_multiplier > 0.0,
            "price multipliers must be positive"
        );
        ensure!(scenario.noise_std >= 0.0, "noise_std must not be negative");
        ensure!(scenario.sliding_window > 0, "sliding_window must be non-zero");
        ensure!(
            scenario.window_secs > 0 && scenario.window_secs <= self.oracle.max_window,
            "window_secs must be in 1..={}",
            self.oracle.max_window
        );
        Ok(())
    }

    fn scenario_path() -> Option<PathBuf> {
        std::env::args_os()
            .nth(1)
            .map(PathBuf::from)
            .or_else(|| std::env::var_os(SCENARIO_ENV).map(PathBuf::from))
    }
}
