use serde::Deserialize;

use crate::types::Timeframe;

fn default_timestamp_field() -> String {
    "@timestamp".to_string()
}

fn default_spike_height() -> f64 {
    2.0
}

/// The rule algorithm selected by a configuration document's `rule_type` field.
///
/// This is the closed set of variants from the component design; the core
/// crate maps each variant to a concrete `RuleType` implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Blacklist,
    Whitelist,
    Change,
    Any,
    Frequency,
    Flatline,
    Spike,
}

/// Direction a spike rule watches for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpikeType {
    Up,
    Down,
    #[default]
    Both,
}

/// Typed, serde-facing representation of the option mapping a rule is
/// constructed from.
///
/// Deserialization alone does not validate that a document is legal for its
/// `rule_type` — every field here is either universal or `Option`/defaulted
/// so that any document can be parsed. Per-rule required-option validation
/// happens in the core crate's rule constructors, which turn a missing or
/// contradictory option into a configuration error at construction time.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleOptions {
    pub rule_type: RuleKind,

    #[serde(default = "default_timestamp_field")]
    pub timestamp_field: String,

    pub query_key: Option<String>,
    pub compare_key: Option<String>,

    #[serde(default)]
    pub blacklist: Vec<String>,
    #[serde(default)]
    pub whitelist: Vec<String>,
    #[serde(default)]
    pub ignore_null: bool,

    pub num_events: Option<u64>,
    pub timeframe: Option<Timeframe>,
    pub threshold: Option<u64>,

    #[serde(default = "default_spike_height")]
    pub spike_height: f64,
    #[serde(default)]
    pub spike_type: SpikeType,
    #[serde(default)]
    pub threshold_cur: u64,
    #[serde(default)]
    pub threshold_ref: u64,
    #[serde(default)]
    pub alert_on_new_data: bool,
    #[serde(default)]
    pub use_local_time: bool,
}

impl RuleOptions {
    /// Parse a single rule configuration document from TOML.
    pub fn from_toml(s: &str) -> anyhow::Result<Self> {
        toml::from_str(s).map_err(|e| anyhow::anyhow!("invalid rule options: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_blacklist_document() {
        let opts: RuleOptions = RuleOptions::from_toml(
            r#"
            rule_type = "blacklist"
            compare_key = "level"
            blacklist = ["err", "fatal"]
            "#,
        )
        .unwrap();
        assert_eq!(opts.rule_type, RuleKind::Blacklist);
        assert_eq!(opts.timestamp_field, "@timestamp");
        assert_eq!(opts.compare_key.as_deref(), Some("level"));
        assert_eq!(opts.blacklist, vec!["err", "fatal"]);
    }

    #[test]
    fn frequency_document_with_timeframe() {
        let opts: RuleOptions = RuleOptions::from_toml(
            r#"
            rule_type = "frequency"
            num_events = 3
            timeframe = "10s"
            "#,
        )
        .unwrap();
        assert_eq!(opts.num_events, Some(3));
        assert_eq!(
            opts.timeframe.unwrap().as_duration(),
            std::time::Duration::from_secs(10)
        );
    }

    #[test]
    fn spike_defaults() {
        let opts: RuleOptions = RuleOptions::from_toml(
            r#"
            rule_type = "spike"
            timeframe = "10s"
            "#,
        )
        .unwrap();
        assert_eq!(opts.spike_height, 2.0);
        assert_eq!(opts.spike_type, SpikeType::Both);
        assert_eq!(opts.threshold_cur, 0);
        assert_eq!(opts.threshold_ref, 0);
    }

    #[test]
    fn missing_rule_type_is_rejected() {
        assert!(RuleOptions::from_toml("compare_key = \"level\"").is_err());
    }
}
