use std::fmt;
use std::str::FromStr;

use crate::risk::RiskConfig;

/// Analysis playbook a trade request is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeModule {
    /// H4 + H1 swing structure.
    Swing,
    /// Accumulation / manipulation / distribution, adds an M15 chart.
    Amd,
}

impl TradeModule {
    pub const ALL: [TradeModule; 2] = [TradeModule::Swing, TradeModule::Amd];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Swing => "SWING",
            Self::Amd => "AMD",
        }
    }

    /// Number of chart screenshots the module needs.
    pub fn required_charts(self) -> usize {
        match self {
            Self::Swing => 2,
            Self::Amd => 3,
        }
    }
}

impl fmt::Display for TradeModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeModule {
    type Err = TradeParamsError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|module| module.as_str() == normalized)
            .ok_or(TradeParamsError::UnknownModule(normalized))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeParams {
    pub asset: String,
    pub module: TradeModule,
    pub capital: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TradeParamsError {
    /// Wrong number of arguments.
    Usage,
    UnsupportedAsset(String),
    UnknownModule(String),
    InvalidCapital(String),
}

impl fmt::Display for TradeParamsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usage => f.write_str("usage: /trade [ASSET] [MODULE] [CAPITAL]"),
            Self::UnsupportedAsset(asset) => write!(f, "unsupported asset `{asset}`"),
            Self::UnknownModule(module) => write!(f, "unknown module `{module}`"),
            Self::InvalidCapital(raw) => write!(f, "invalid capital `{raw}`"),
        }
    }
}

impl std::error::Error for TradeParamsError {}

/// Parse `/trade ASSET MODULE CAPITAL` (the command word is optional).
///
/// The asset must have a pip value in `risk`; capital accepts `_` and `,`
/// digit separators and must be positive.
pub fn parse_trade_params(raw: &str, risk: &RiskConfig) -> Result<TradeParams, TradeParamsError> {
    let mut parts: Vec<&str> = raw.split_whitespace().collect();
    if parts
        .first()
        .is_some_and(|first| first.eq_ignore_ascii_case("/trade"))
    {
        parts.remove(0);
    }

    let [asset, module, capital] = parts.as_slice() else {
        return Err(TradeParamsError::Usage);
    };

    let asset = asset.to_ascii_uppercase();
    if !risk.is_supported_asset(&asset) {
        return Err(TradeParamsError::UnsupportedAsset(asset));
    }

    let module = module.parse::<TradeModule>()?;
    let capital = parse_amount(capital)
        .filter(|value| *value > 0.0)
        .ok_or_else(|| TradeParamsError::InvalidCapital((*capital).to_owned()))?;

    Ok(TradeParams {
        asset,
        module,
        capital,
    })
}

fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw.chars().filter(|ch| !matches!(ch, ',' | '_')).collect();
    cleaned.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Parse a pip table like `XAUUSD=10, EURUSD=10`.
///
/// Returns `None` if any entry is malformed so the caller can fall back to
/// its defaults instead of running with a partial table.
pub fn parse_pip_values(raw: &str) -> Option<Vec<(String, f64)>> {
    let mut out = Vec::new();

    for entry in raw.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
        let (symbol, value) = entry.split_once('=')?;
        let symbol = symbol.trim();
        let value = value.trim().parse::<f64>().ok()?;
        if symbol.is_empty() || !value.is_finite() || value <= 0.0 {
            return None;
        }
        out.push((symbol.to_ascii_uppercase(), value));
    }

    if out.is_empty() { None } else { Some(out) }
}

/// Parse a duration like `30s`, `10m`, `1h30m`, `1d`, or plain seconds.
pub fn parse_duration_seconds(raw: &str) -> Option<u64> {
    let compact: String = raw.chars().filter(|ch| !ch.is_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }

    if let Ok(seconds) = compact.parse::<u64>() {
        return (seconds > 0).then_some(seconds);
    }

    let mut total = 0_u64;
    let mut digits = String::new();

    for ch in compact.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }

        let multiplier = match ch.to_ascii_lowercase() {
            's' => 1,
            'm' => 60,
            'h' => 60 * 60,
            'd' => 24 * 60 * 60,
            _ => return None,
        };
        let value = digits.parse::<u64>().ok().filter(|value| *value > 0)?;
        digits.clear();
        total = total.checked_add(value.checked_mul(multiplier)?)?;
    }

    // A trailing bare number after unit segments ("1h30") is ambiguous.
    if !digits.is_empty() {
        return None;
    }

    (total > 0).then_some(total)
}
