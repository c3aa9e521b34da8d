use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use tradegenie_utils::parse::TradeParams;

/// Per-user state of an analysis conversation.
///
/// Only `timestamp` has meaning to the janitor; a record without one never
/// expires. Everything else lives in `fields`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    /// Unix seconds of the last `/analyze`, with sub-second precision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ConversationRecord {
    pub fn started_at(timestamp: f64) -> Self {
        Self {
            timestamp: Some(timestamp),
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Seconds since `timestamp`; timestamps in the future count as fresh.
    pub fn age_secs(&self, now: f64) -> Option<f64> {
        self.timestamp.map(|timestamp| (now - timestamp).max(0.0))
    }

    pub fn apply_trade_params(&mut self, params: &TradeParams) {
        self.fields
            .insert("asset".to_owned(), Value::from(params.asset.as_str()));
        self.fields
            .insert("module".to_owned(), Value::from(params.module.as_str()));
        self.fields
            .insert("capital".to_owned(), Value::from(params.capital));
    }

    pub fn capital(&self) -> Option<f64> {
        self.fields.get("capital").and_then(Value::as_f64)
    }

    pub fn asset(&self) -> Option<&str> {
        self.fields.get("asset").and_then(Value::as_str)
    }

    pub fn module(&self) -> Option<&str> {
        self.fields.get("module").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use tradegenie_utils::parse::{TradeModule, TradeParams};

    use super::ConversationRecord;

    #[test]
    fn trade_params_populate_typed_fields() {
        let mut record = ConversationRecord::started_at(1_700_000_000.0);
        record.apply_trade_params(&TradeParams {
            asset: "XAUUSD".to_owned(),
            module: TradeModule::Amd,
            capital: 25_000.0,
        });

        assert_eq!(record.asset(), Some("XAUUSD"));
        assert_eq!(record.module(), Some("AMD"));
        assert_eq!(record.capital(), Some(25_000.0));
    }

    #[test]
    fn timestamp_is_optional_in_stored_json() {
        let record: ConversationRecord =
            serde_json::from_value(json!({"other": 1})).expect("record without timestamp");
        assert_eq!(record.timestamp, None);
        assert_eq!(record.fields.get("other"), Some(&json!(1)));

        let record: ConversationRecord =
            serde_json::from_value(json!({"timestamp": 42, "capital": 10000.0})).expect("record");
        assert_eq!(record.timestamp, Some(42.0));
        assert_eq!(record.capital(), Some(10_000.0));
        assert!(!record.fields.contains_key("timestamp"));
    }

    #[test]
    fn fractional_timestamps_deserialize() {
        let record: ConversationRecord =
            serde_json::from_value(json!({"timestamp": 1_700_000_000.5, "capital": 1.0}))
                .expect("float timestamp");
        assert_eq!(record.timestamp, Some(1_700_000_000.5));
        assert_eq!(record.age_secs(1_700_000_001.0), Some(0.5));
    }

    #[test]
    fn age_saturates_for_future_timestamps() {
        let record = ConversationRecord::started_at(200.0);
        assert_eq!(record.age_secs(150.0), Some(0.0));
        assert_eq!(record.age_secs(260.0), Some(60.0));
        assert_eq!(ConversationRecord::default().age_secs(260.0), None);
    }
}
