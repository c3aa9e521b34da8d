use tracing::warn;

use tradegenie_llm::LlmConfig;
use tradegenie_session::SessionConfig;
use tradegenie_utils::env::{env_bool, env_f64, env_opt};
use tradegenie_utils::parse::parse_pip_values;
use tradegenie_utils::risk::{DEFAULT_LOT_SIZE_MULTIPLIER, DEFAULT_RISK_PERCENT, RiskConfig};

/// Process-wide settings, read once at startup and never mutated.
#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    /// `LLM_ENABLED=false` runs the bot without any provider.
    pub llm_enabled: bool,
    pub llm: LlmConfig,
    pub risk: RiskConfig,
    pub session: SessionConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm_enabled: true,
            llm: LlmConfig::default(),
            risk: RiskConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            llm_enabled: env_bool("LLM_ENABLED", true),
            llm: LlmConfig::from_env(),
            risk: risk_config_from_env(),
            session: SessionConfig::from_env(),
        }
    }
}

fn risk_config_from_env() -> RiskConfig {
    let base = match env_opt("ASSET_PIP_VALUES") {
        Some(raw) => match parse_pip_values(&raw) {
            Some(table) => RiskConfig::new(table),
            None => {
                warn!(value = %raw, "invalid ASSET_PIP_VALUES; using built-in table");
                RiskConfig::default()
            }
        },
        None => RiskConfig::default(),
    };

    base.with_default_risk_percent(positive_or(
        "DEFAULT_RISK_PERCENT",
        env_f64("DEFAULT_RISK_PERCENT", DEFAULT_RISK_PERCENT),
        DEFAULT_RISK_PERCENT,
    ))
    .with_lot_size_multiplier(positive_or(
        "DEFAULT_LOT_SIZE_MULTIPLIER",
        env_f64("DEFAULT_LOT_SIZE_MULTIPLIER", DEFAULT_LOT_SIZE_MULTIPLIER),
        DEFAULT_LOT_SIZE_MULTIPLIER,
    ))
}

fn positive_or(key: &str, value: f64, default: f64) -> f64 {
    if value > 0.0 {
        value
    } else {
        warn!(key, value, "expected a positive number; using default");
        default
    }
}
