//! TOML backtest configuration.
//!
//! Every section and field is optional; a missing value takes the documented
//! default. Data retrieval settings (`[data]`) are consumed only by the data
//! loader; the simulator sees `[risk]` through `simulation_params()`.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use stoplab_core::performance::DEFAULT_TRADING_PERIODS;
use stoplab_core::signals::{AlwaysLong, RsiThreshold, SignalError, SignalGenerator, SmaCrossover};
use stoplab_core::simulator::{SimulationError, SimulationParams};

/// Content hash of a config (hex BLAKE3).
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("invalid signal: {0}")]
    Signal(#[from] SignalError),

    #[error("invalid risk settings: {0}")]
    Risk(#[from] SimulationError),
}

/// Full configuration for one backtest run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BacktestConfig {
    pub data: DataConfig,
    pub signal: SignalConfig,
    pub risk: RiskConfig,
    pub evaluation: EvaluationConfig,
}

/// Where prices come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    #[default]
    Yahoo,
    Csv,
    Synthetic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataConfig {
    pub symbol: String,
    pub start: NaiveDate,
    /// Inclusive; `None` means up to the latest available bar.
    pub end: Option<NaiveDate>,
    pub source: SourceKind,
    /// File or directory of `{SYMBOL}.csv` files. Required when `source = "csv"`.
    pub csv_path: Option<PathBuf>,
    /// Fall back to synthetic prices when the network source fails.
    pub allow_synthetic: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            symbol: "AAPL".into(),
            start: NaiveDate::from_ymd_opt(2022, 1, 1).unwrap_or_default(),
            end: None,
            source: SourceKind::Yahoo,
            csv_path: None,
            allow_synthetic: false,
        }
    }
}

/// Signal generator selection.
///
/// On disk this is a flat `[signal]` table: `type` defaults to
/// `sma_crossover`, unknown keys are rejected, and so are keys that belong to
/// a different signal type (e.g. `period` with `type = "sma_crossover"`).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalConfig {
    SmaCrossover {
        fast: usize,
        slow: usize,
    },
    RsiThreshold {
        period: usize,
        oversold: f64,
        overbought: f64,
    },
    AlwaysLong,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum SignalKind {
    #[default]
    SmaCrossover,
    RsiThreshold,
    AlwaysLong,
}

impl SignalKind {
    fn as_str(self) -> &'static str {
        match self {
            SignalKind::SmaCrossover => "sma_crossover",
            SignalKind::RsiThreshold => "rsi_threshold",
            SignalKind::AlwaysLong => "always_long",
        }
    }
}

/// `[signal]` as written in TOML, before the type picks its keys.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SignalTable {
    #[serde(rename = "type")]
    kind: SignalKind,
    fast: Option<usize>,
    slow: Option<usize>,
    period: Option<usize>,
    oversold: Option<f64>,
    overbought: Option<f64>,
}

impl TryFrom<SignalTable> for SignalConfig {
    type Error = String;

    fn try_from(t: SignalTable) -> Result<Self, Self::Error> {
        let sma_keys = [("fast", t.fast.is_some()), ("slow", t.slow.is_some())];
        let rsi_keys = [
            ("period", t.period.is_some()),
            ("oversold", t.oversold.is_some()),
            ("overbought", t.overbought.is_some()),
        ];

        let (config, foreign): (SignalConfig, Vec<(&str, bool)>) = match t.kind {
            SignalKind::SmaCrossover => (
                SignalConfig::SmaCrossover {
                    fast: t.fast.unwrap_or_else(default_fast),
                    slow: t.slow.unwrap_or_else(default_slow),
                },
                rsi_keys.to_vec(),
            ),
            SignalKind::RsiThreshold => (
                SignalConfig::RsiThreshold {
                    period: t.period.unwrap_or_else(default_rsi_period),
                    oversold: t.oversold.unwrap_or_else(default_oversold),
                    overbought: t.overbought.unwrap_or_else(default_overbought),
                },
                sma_keys.to_vec(),
            ),
            SignalKind::AlwaysLong => (
                SignalConfig::AlwaysLong,
                sma_keys.iter().chain(rsi_keys.iter()).copied().collect(),
            ),
        };

        if let Some((key, _)) = foreign.iter().find(|(_, set)| *set) {
            return Err(format!(
                "`{key}` does not apply to signal type `{}`",
                t.kind.as_str()
            ));
        }
        Ok(config)
    }
}

impl<'de> Deserialize<'de> for SignalConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let table = SignalTable::deserialize(deserializer)?;
        SignalConfig::try_from(table).map_err(serde::de::Error::custom)
    }
}

impl Default for SignalConfig {
    fn default() -> Self {
        SignalConfig::SmaCrossover {
            fast: default_fast(),
            slow: default_slow(),
        }
    }
}

fn default_fast() -> usize {
    20
}
fn default_slow() -> usize {
    50
}
fn default_rsi_period() -> usize {
    14
}
fn default_oversold() -> f64 {
    30.0
}
fn default_overbought() -> f64 {
    70.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RiskConfig {
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub cost_bps: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        let p = SimulationParams::default();
        Self {
            stop_loss_pct: p.stop_loss_pct,
            take_profit_pct: p.take_profit_pct,
            cost_bps: p.cost_bps,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvaluationConfig {
    pub trading_periods_per_year: u32,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            trading_periods_per_year: DEFAULT_TRADING_PERIODS,
        }
    }
}

impl BacktestConfig {
    /// Parse from a TOML string. Does not validate.
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data.symbol.trim().is_empty() {
            return Err(ConfigError::Invalid("data.symbol must not be empty".into()));
        }
        if let Some(end) = self.data.end {
            if end < self.data.start {
                return Err(ConfigError::Invalid(format!(
                    "data.end ({end}) is before data.start ({})",
                    self.data.start
                )));
            }
        }
        if self.data.source == SourceKind::Csv && self.data.csv_path.is_none() {
            return Err(ConfigError::Invalid(
                "data.csv_path is required when data.source = \"csv\"".into(),
            ));
        }
        if self.evaluation.trading_periods_per_year == 0 {
            return Err(ConfigError::Invalid(
                "evaluation.trading_periods_per_year must be >= 1".into(),
            ));
        }
        self.simulation_params()?;
        self.build_signal()?;
        Ok(())
    }

    pub fn simulation_params(&self) -> Result<SimulationParams, ConfigError> {
        Ok(SimulationParams::new(
            self.risk.stop_loss_pct,
            self.risk.take_profit_pct,
            self.risk.cost_bps,
        )?)
    }

    pub fn build_signal(&self) -> Result<Box<dyn SignalGenerator>, ConfigError> {
        let signal: Box<dyn SignalGenerator> = match self.signal {
            SignalConfig::SmaCrossover { fast, slow } => Box::new(SmaCrossover::new(fast, slow)?),
            SignalConfig::RsiThreshold {
                period,
                oversold,
                overbought,
            } => Box::new(RsiThreshold::new(period, oversold, overbought)?),
            SignalConfig::AlwaysLong => Box::new(AlwaysLong),
        };
        Ok(signal)
    }

    /// Same config for a different symbol.
    pub fn with_symbol(&self, symbol: &str) -> Self {
        let mut config = self.clone();
        config.data.symbol = symbol.to_string();
        config
    }

    /// Deterministic hash of the full config. Identical configs share an id.
    pub fn run_id(&self) -> RunId {
        // Plain structs with string keys: serialization cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        blake3::hash(&json).to_hex().to_string()
    }
}
