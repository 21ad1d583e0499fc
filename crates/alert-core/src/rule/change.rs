use std::collections::HashMap;
use std::time::Duration;

use alert_config::RuleOptions;

use crate::error::CoreResult;
use crate::event::{Event, Moment, Value};
use crate::rule::{config_error, summarize, unsupported_mode, CountData, MatchList, RuleType, TermsData, UNPARTITIONED_KEY};

struct KeyState {
    last_value: Value,
    last_seen: Moment,
}

/// Matches when the value of `compare_key` changes between consecutive
/// observations of the same `query_key`.
///
/// Per key, only the most recent `(old, new)` pair is remembered between
/// enqueue and drain: if a key changes twice before the host drains the
/// match list, the earlier transition's `old_value` is overwritten by the
/// later one's.
pub struct ChangeRule {
    ts_field: String,
    query_key: Option<String>,
    compare_key: String,
    ignore_null: bool,
    timeframe: Option<Duration>,
    state: HashMap<String, KeyState>,
    matches: MatchList,
}

impl ChangeRule {
    pub fn new(opts: &RuleOptions) -> CoreResult<Self> {
        let Some(compare_key) = opts.compare_key.clone() else {
            return config_error("change rule requires compare_key");
        };
        Ok(Self {
            ts_field: opts.timestamp_field.clone(),
            query_key: opts.query_key.clone(),
            compare_key,
            ignore_null: opts.ignore_null,
            timeframe: opts.timeframe.map(|t| t.as_duration()),
            state: HashMap::new(),
            matches: MatchList::default(),
        })
    }

    fn key_of(&self, event: &Event) -> String {
        match &self.query_key {
            Some(qk) => event.get(qk).map(|v| v.as_display()).unwrap_or_else(|| UNPARTITIONED_KEY.to_string()),
            None => UNPARTITIONED_KEY.to_string(),
        }
    }

    fn observe(&mut self, event: &Event) {
        let value = event.get(&self.compare_key).cloned().unwrap_or(Value::Null);
        if self.ignore_null && value.is_falsy() {
            return;
        }
        let Some(now) = event.moment(&self.ts_field) else {
            return;
        };
        let key = self.key_of(event);

        let fire = match self.state.get(&key) {
            None => false,
            Some(prev) => {
                let differs = prev.last_value != value;
                let within_timeframe = match self.timeframe {
                    Some(tf) => (now - prev.last_seen).to_std().unwrap_or(Duration::ZERO) <= tf,
                    None => true,
                };
                differs && within_timeframe
            }
        };

        if fire {
            let old_value = self.state.get(&key).unwrap().last_value.clone();
            let mut enriched = event.clone();
            enriched.fields.insert("old_value".to_string(), old_value);
            enriched.fields.insert("new_value".to_string(), value.clone());
            self.matches.add(&self.ts_field, enriched);
        }

        self.state.insert(
            key,
            KeyState {
                last_value: value,
                last_seen: now,
            },
        );
    }
}

impl RuleType for ChangeRule {
    fn add_data(&mut self, events: &[Event]) -> CoreResult<()> {
        for event in events {
            self.observe(event);
        }
        Ok(())
    }

    fn add_count_data(&mut self, _data: CountData) -> CoreResult<()> {
        unsupported_mode("ChangeRule", "add_count_data")
    }

    fn add_terms_data(&mut self, _data: TermsData) -> CoreResult<()> {
        unsupported_mode("ChangeRule", "add_terms_data")
    }

    fn garbage_collect(&mut self, _now: Moment) -> CoreResult<()> {
        Ok(())
    }

    fn matches(&self) -> &[Event] {
        self.matches.as_slice()
    }

    fn drain_matches(&mut self) -> Vec<Event> {
        self.matches.drain()
    }

    fn get_match_str(&self, m: &Event) -> String {
        summarize("change", m, &["old_value", "new_value"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(t: f64, host: &str, status: &str) -> Event {
        Event::new().with("@timestamp", t).with("host", host).with("status", status)
    }

    #[test]
    fn fires_within_timeframe_and_not_beyond() {
        let opts = RuleOptions::from_toml(
            r#"
            rule_type = "change"
            query_key = "host"
            compare_key = "status"
            ignore_null = false
            timeframe = "5s"
            "#,
        )
        .unwrap();
        let mut rule = ChangeRule::new(&opts).unwrap();
        rule.add_data(&[ev(0.0, "A", "up")]).unwrap();
        rule.add_data(&[ev(3.0, "A", "down")]).unwrap();
        rule.add_data(&[ev(20.0, "A", "up")]).unwrap();

        assert_eq!(rule.matches().len(), 1);
        let m = &rule.matches()[0];
        assert_eq!(m.moment("@timestamp").unwrap().timestamp(), 3);
        assert_eq!(m.get("old_value").unwrap().as_display(), "up");
        assert_eq!(m.get("new_value").unwrap().as_display(), "down");
    }

    #[test]
    fn first_observation_never_matches() {
        let opts = RuleOptions::from_toml(
            r#"
            rule_type = "change"
            compare_key = "status"
            "#,
        )
        .unwrap();
        let mut rule = ChangeRule::new(&opts).unwrap();
        rule.add_data(&[ev(0.0, "A", "up")]).unwrap();
        assert!(rule.matches().is_empty());
    }

    #[test]
    fn ignore_null_skips_falsy_values() {
        let opts = RuleOptions::from_toml(
            r#"
            rule_type = "change"
            compare_key = "status"
            ignore_null = true
            "#,
        )
        .unwrap();
        let mut rule = ChangeRule::new(&opts).unwrap();
        rule.add_data(&[ev(0.0, "A", "up")]).unwrap();
        rule.add_data(&[Event::new().with("@timestamp", 1.0)]).unwrap();
        rule.add_data(&[ev(2.0, "A", "down")]).unwrap();
        assert_eq!(rule.matches().len(), 1);
    }
}
