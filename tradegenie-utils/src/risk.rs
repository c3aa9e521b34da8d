//! Fixed-fractional position sizing.
//!
//! The account risks `risk_percent` of its capital on the distance between
//! entry and stop loss; the lot count follows from the asset's pip value.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{error, warn};

pub const DEFAULT_RISK_PERCENT: f64 = 1.0;
/// Units per standard lot (100,000 for forex).
pub const DEFAULT_LOT_SIZE_MULTIPLIER: f64 = 100_000.0;

/// Pip value per standard lot for the assets the bot ships with.
pub const DEFAULT_PIP_VALUES: [(&str, f64); 2] = [("XAUUSD", 10.0), ("EURUSD", 10.0)];

/// Immutable risk settings handed to [`PositionSizer`].
#[derive(Clone, Debug, PartialEq)]
pub struct RiskConfig {
    pip_values: BTreeMap<String, f64>,
    pub default_risk_percent: f64,
    pub lot_size_multiplier: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PIP_VALUES.iter().map(|(symbol, value)| (*symbol, *value)))
    }
}

impl RiskConfig {
    /// Build a config from `(symbol, pip value per lot)` pairs. Symbols are
    /// stored upper-case so lookups are case-insensitive.
    pub fn new<S: AsRef<str>>(pip_values: impl IntoIterator<Item = (S, f64)>) -> Self {
        let pip_values = pip_values
            .into_iter()
            .map(|(symbol, value)| (normalize_symbol(symbol.as_ref()), value))
            .filter(|(symbol, _)| !symbol.is_empty())
            .collect();

        Self {
            pip_values,
            default_risk_percent: DEFAULT_RISK_PERCENT,
            lot_size_multiplier: DEFAULT_LOT_SIZE_MULTIPLIER,
        }
    }

    pub fn with_default_risk_percent(mut self, percent: f64) -> Self {
        self.default_risk_percent = percent;
        self
    }

    pub fn with_lot_size_multiplier(mut self, multiplier: f64) -> Self {
        self.lot_size_multiplier = multiplier;
        self
    }

    pub fn pip_value(&self, asset_symbol: &str) -> Option<f64> {
        self.pip_values
            .get(&normalize_symbol(asset_symbol))
            .copied()
    }

    pub fn is_supported_asset(&self, asset_symbol: &str) -> bool {
        self.pip_value(asset_symbol).is_some()
    }

    /// Supported asset symbols in alphabetical order.
    pub fn supported_assets(&self) -> impl Iterator<Item = &str> {
        self.pip_values.keys().map(String::as_str)
    }
}

fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_ascii_uppercase()
}

/// A validated sizing result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSize {
    /// Lots, rounded to two decimals.
    pub lots: f64,
    /// Currency amount put at risk (`capital * risk_percent / 100`).
    pub risk_amount: f64,
    /// Loss of one lot if the stop is hit.
    pub risk_per_lot: f64,
    /// `lots` expressed in contract units.
    pub units: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SizingError {
    NonPositiveStopLoss(f64),
    NonPositiveCapital(f64),
    NonPositiveRiskPercent(f64),
    UnknownAsset(String),
    ZeroRiskPerLot,
}

impl fmt::Display for SizingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonPositiveStopLoss(pips) => {
                write!(f, "stop loss must be positive (got {pips} pips)")
            }
            Self::NonPositiveCapital(capital) => {
                write!(f, "capital must be positive (got {capital})")
            }
            Self::NonPositiveRiskPercent(percent) => {
                write!(f, "risk percent must be positive (got {percent})")
            }
            Self::UnknownAsset(symbol) => write!(f, "no pip value configured for `{symbol}`"),
            Self::ZeroRiskPerLot => write!(f, "risk per lot resolved to zero"),
        }
    }
}

impl std::error::Error for SizingError {}

#[derive(Clone, Debug)]
pub struct PositionSizer {
    config: RiskConfig,
}

impl PositionSizer {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Size a position, reporting which input was rejected.
    ///
    /// Checks run in a fixed order and the first failure wins: stop loss,
    /// capital, risk percent, pip value lookup, then per-lot risk.
    pub fn try_position_size(
        &self,
        capital: f64,
        risk_percent: f64,
        stop_loss_pips: f64,
        asset_symbol: &str,
        pip_value_override: Option<f64>,
    ) -> Result<PositionSize, SizingError> {
        // Negated comparisons also reject NaN.
        if !(stop_loss_pips > 0.0) {
            return Err(SizingError::NonPositiveStopLoss(stop_loss_pips));
        }
        if !(capital > 0.0) {
            return Err(SizingError::NonPositiveCapital(capital));
        }
        if !(risk_percent > 0.0) {
            return Err(SizingError::NonPositiveRiskPercent(risk_percent));
        }

        let pip_value = match pip_value_override {
            Some(value) => value,
            None => self
                .config
                .pip_value(asset_symbol)
                .ok_or_else(|| SizingError::UnknownAsset(asset_symbol.trim().to_owned()))?,
        };

        let risk_per_lot = stop_loss_pips * pip_value;
        if !(risk_per_lot > 0.0) {
            return Err(SizingError::ZeroRiskPerLot);
        }

        let risk_amount = capital * (risk_percent / 100.0);
        let lots = round_to_hundredths(risk_amount / risk_per_lot);

        Ok(PositionSize {
            lots,
            risk_amount,
            risk_per_lot,
            units: lots * self.config.lot_size_multiplier,
        })
    }

    /// Lot size for the given risk, or `0.0` when any input is rejected.
    pub fn calculate_position_size(
        &self,
        capital: f64,
        risk_percent: f64,
        stop_loss_pips: f64,
        asset_symbol: &str,
        pip_value_override: Option<f64>,
    ) -> f64 {
        match self.try_position_size(
            capital,
            risk_percent,
            stop_loss_pips,
            asset_symbol,
            pip_value_override,
        ) {
            Ok(size) => size.lots,
            Err(err @ SizingError::UnknownAsset(_)) => {
                error!(%err, asset = asset_symbol, "cannot size position");
                0.0
            }
            Err(err) => {
                warn!(%err, asset = asset_symbol, "rejected position size inputs");
                0.0
            }
        }
    }
}

/// Half-cent ties go to the even cent.
fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}
