use std::time::Duration;

use alert_config::RuleOptions;

use crate::error::CoreResult;
use crate::event::{Event, Moment};
use crate::rule::frequency::KeyedWindows;
use crate::rule::{config_error, summarize, unsupported_mode, CountData, MatchList, RuleType, TermsData, UNPARTITIONED_KEY};

/// Inverted frequency: fires when an unpartitioned stream's event count
/// falls strictly below `threshold` within `timeframe`, including during
/// total silence (via the tick's synthetic zero-count event).
///
/// Forbids `query_key` — a flatline is evaluated over a single stream.
pub struct FlatlineRule {
    ts_field: String,
    timeframe: Duration,
    threshold: u64,
    window: KeyedWindows,
    first_seen: Option<Moment>,
    matches: MatchList,
}

impl FlatlineRule {
    pub fn new(opts: &RuleOptions) -> CoreResult<Self> {
        if opts.query_key.is_some() {
            return config_error("flatline rule forbids query_key");
        }
        let Some(timeframe) = opts.timeframe.map(|t| t.as_duration()) else {
            return config_error("flatline rule requires timeframe");
        };
        let Some(threshold) = opts.threshold else {
            return config_error("flatline rule requires threshold");
        };
        Ok(Self {
            ts_field: opts.timestamp_field.clone(),
            timeframe,
            threshold,
            window: KeyedWindows::new(opts.timestamp_field.clone(), timeframe),
            first_seen: None,
            matches: MatchList::default(),
        })
    }

    fn check_match(&mut self) {
        let Some(window) = self.window.get(UNPARTITIONED_KEY) else {
            return;
        };
        if window.is_empty() {
            return;
        }
        let Some(most_recent) = window.newest().and_then(|e| e.moment(&self.ts_field)) else {
            return;
        };
        let Some(first_seen) = self.first_seen else {
            return;
        };

        let since_first = (most_recent - first_seen).to_std().unwrap_or(Duration::ZERO);
        if since_first < self.timeframe {
            return; // warmup
        }

        if window.count() < self.threshold {
            let newest = window.newest().cloned();
            self.window.remove(UNPARTITIONED_KEY);
            self.first_seen = None;
            if let Some(event) = newest {
                self.matches.add(&self.ts_field, event);
            }
        }
    }

    fn ingest(&mut self, event: Event, count: u64) {
        if self.window.get(UNPARTITIONED_KEY).is_none_or(|w| w.is_empty()) {
            if let Some(ts) = event.moment(&self.ts_field) {
                self.first_seen.get_or_insert(ts);
            }
        }
        self.window.window_mut(UNPARTITIONED_KEY).append(event, count);
        self.check_match();
    }
}

impl RuleType for FlatlineRule {
    fn add_data(&mut self, events: &[Event]) -> CoreResult<()> {
        for event in events {
            self.ingest(event.clone(), 1);
        }
        Ok(())
    }

    fn add_count_data(&mut self, _data: CountData) -> CoreResult<()> {
        unsupported_mode("FlatlineRule", "add_count_data")
    }

    fn add_terms_data(&mut self, _data: TermsData) -> CoreResult<()> {
        unsupported_mode("FlatlineRule", "add_terms_data")
    }

    fn garbage_collect(&mut self, now: Moment) -> CoreResult<()> {
        self.ingest(Event::at(&self.ts_field, now), 0);
        Ok(())
    }

    fn matches(&self) -> &[Event] {
        self.matches.as_slice()
    }

    fn drain_matches(&mut self) -> Vec<Event> {
        self.matches.drain()
    }

    fn get_match_str(&self, m: &Event) -> String {
        summarize("flatline", m, &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_on_silence_after_warmup() {
        let opts = RuleOptions::from_toml(
            r#"
            rule_type = "flatline"
            threshold = 5
            timeframe = "10s"
            "#,
        )
        .unwrap();
        let mut rule = FlatlineRule::new(&opts).unwrap();
        rule.add_data(&[Event::new().with("@timestamp", 0.0)]).unwrap();
        assert!(rule.matches().is_empty());

        rule.garbage_collect(chrono::DateTime::from_timestamp(11, 0).unwrap()).unwrap();
        assert_eq!(rule.matches().len(), 1);
        assert_eq!(rule.matches()[0].moment("@timestamp").unwrap().timestamp(), 11);
    }

    #[test]
    fn does_not_fire_above_threshold() {
        let opts = RuleOptions::from_toml(
            r#"
            rule_type = "flatline"
            threshold = 2
            timeframe = "10s"
            "#,
        )
        .unwrap();
        let mut rule = FlatlineRule::new(&opts).unwrap();
        for t in 0..5 {
            rule.add_data(&[Event::new().with("@timestamp", t as f64)]).unwrap();
        }
        rule.garbage_collect(chrono::DateTime::from_timestamp(12, 0).unwrap()).unwrap();
        assert!(rule.matches().is_empty());
    }

    #[test]
    fn forbids_query_key() {
        let opts = RuleOptions::from_toml(
            r#"
            rule_type = "flatline"
            query_key = "host"
            threshold = 5
            timeframe = "10s"
            "#,
        )
        .unwrap();
        assert!(FlatlineRule::new(&opts).is_err());
    }
}
