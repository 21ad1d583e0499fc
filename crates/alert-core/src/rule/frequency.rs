use std::collections::HashMap;
use std::time::Duration;

use alert_config::RuleOptions;

use crate::error::CoreResult;
use crate::event::{Event, Moment};
use crate::rule::{config_error, shape_error, summarize, MatchList, RuleType, TermBucket, TermsData, UNPARTITIONED_KEY};
use crate::window::EventWindow;

/// A registry of per-key [`EventWindow`]s, all sized to the same timeframe
/// and projecting through the same timestamp field. Shared by
/// [`FrequencyRule`] and [`crate::rule::FlatlineRule`].
pub(crate) struct KeyedWindows {
    ts_field: String,
    timeframe: Duration,
    windows: HashMap<String, EventWindow>,
}

impl KeyedWindows {
    pub(crate) fn new(ts_field: String, timeframe: Duration) -> Self {
        Self {
            ts_field,
            timeframe,
            windows: HashMap::new(),
        }
    }

    pub(crate) fn window_mut(&mut self, key: &str) -> &mut EventWindow {
        self.windows
            .entry(key.to_string())
            .or_insert_with(|| EventWindow::new(self.ts_field.clone(), self.timeframe))
    }

    pub(crate) fn get(&self, key: &str) -> Option<&EventWindow> {
        self.windows.get(key)
    }

    pub(crate) fn remove(&mut self, key: &str) -> Option<EventWindow> {
        self.windows.remove(key)
    }

    pub(crate) fn keys_snapshot(&self) -> Vec<String> {
        self.windows.keys().cloned().collect()
    }
}

/// Per-key count threshold over a sliding window: once a key's window
/// accumulates `num_events` within `timeframe`, the newest event fires and
/// the window is dropped so the next alert requires fresh accumulation.
pub struct FrequencyRule {
    ts_field: String,
    query_key: Option<String>,
    timeframe: Duration,
    num_events: u64,
    windows: KeyedWindows,
    matches: MatchList,
}

impl FrequencyRule {
    pub fn new(opts: &RuleOptions) -> CoreResult<Self> {
        let Some(timeframe) = opts.timeframe.map(|t| t.as_duration()) else {
            return config_error("frequency rule requires timeframe");
        };
        let Some(num_events) = opts.num_events else {
            return config_error("frequency rule requires num_events");
        };
        Ok(Self {
            ts_field: opts.timestamp_field.clone(),
            query_key: opts.query_key.clone(),
            timeframe,
            num_events,
            windows: KeyedWindows::new(opts.timestamp_field.clone(), timeframe),
            matches: MatchList::default(),
        })
    }

    fn key_of(&self, event: &Event) -> String {
        match &self.query_key {
            Some(qk) => event
                .get(qk)
                .map(|v| v.as_display())
                .unwrap_or_else(|| UNPARTITIONED_KEY.to_string()),
            None => UNPARTITIONED_KEY.to_string(),
        }
    }

    fn check_matches(&mut self) {
        for key in self.windows.keys_snapshot() {
            let Some(window) = self.windows.get(&key) else {
                continue;
            };
            if window.count() >= self.num_events {
                let newest = window.newest().cloned();
                self.windows.remove(&key);
                if let Some(event) = newest {
                    self.matches.add(&self.ts_field, event);
                }
            }
        }
    }
}

impl RuleType for FrequencyRule {
    fn add_data(&mut self, events: &[Event]) -> CoreResult<()> {
        for event in events {
            let key = self.key_of(event);
            self.windows.window_mut(&key).append(event.clone(), 1);
        }
        self.check_matches();
        Ok(())
    }

    fn add_count_data(&mut self, data: crate::rule::CountData) -> CoreResult<()> {
        reject_count_shape(data.len())?;
        let (ts, count) = data[0];
        self.windows
            .window_mut(UNPARTITIONED_KEY)
            .append(Event::at(&self.ts_field, ts), count);
        self.check_matches();
        Ok(())
    }

    fn add_terms_data(&mut self, data: TermsData) -> CoreResult<()> {
        let (ts, buckets) = data;
        let qk_field = self.query_key.clone().unwrap_or_else(|| "query_key".to_string());
        for TermBucket { key, doc_count } in buckets {
            let event = Event::at(&self.ts_field, ts).with(qk_field.as_str(), key.as_str());
            self.windows.window_mut(&key).append(event, doc_count);
        }
        self.check_matches();
        Ok(())
    }

    fn garbage_collect(&mut self, now: Moment) -> CoreResult<()> {
        for key in self.windows.keys_snapshot() {
            let Some(window) = self.windows.get(&key) else {
                continue;
            };
            let stale = match window.newest().and_then(|e| e.moment(&self.ts_field)) {
                Some(newest) => (now - newest).to_std().unwrap_or(Duration::ZERO) >= self.timeframe,
                None => true,
            };
            if stale {
                self.windows.remove(&key);
            }
        }
        Ok(())
    }

    fn matches(&self) -> &[Event] {
        self.matches.as_slice()
    }

    fn drain_matches(&mut self) -> Vec<Event> {
        self.matches.drain()
    }

    fn get_match_str(&self, m: &Event) -> String {
        match &self.query_key {
            Some(qk) => summarize("frequency", m, &[qk.as_str()]),
            None => summarize("frequency", m, &[]),
        }
    }
}

pub(crate) fn reject_count_shape(count_entries: usize) -> CoreResult<()> {
    if count_entries > 1 {
        return shape_error(format!("add_count_data expects exactly one entry, got {count_entries}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(t: f64) -> Event {
        Event::new().with("@timestamp", t)
    }

    #[test]
    fn fires_at_threshold_and_resets() {
        let opts = RuleOptions::from_toml(
            r#"
            rule_type = "frequency"
            num_events = 3
            timeframe = "10s"
            "#,
        )
        .unwrap();
        let mut rule = FrequencyRule::new(&opts).unwrap();
        for t in 0..3 {
            rule.add_data(&[ev(t as f64)]).unwrap();
        }
        assert_eq!(rule.matches().len(), 1);
        assert_eq!(rule.matches()[0].moment("@timestamp").unwrap().timestamp(), 2);

        for t in 3..6 {
            rule.add_data(&[ev(t as f64)]).unwrap();
        }
        assert_eq!(rule.matches().len(), 2);
    }

    #[test]
    fn partitions_independently_by_query_key() {
        let opts = RuleOptions::from_toml(
            r#"
            rule_type = "frequency"
            query_key = "host"
            num_events = 2
            timeframe = "100s"
            "#,
        )
        .unwrap();
        let mut rule = FrequencyRule::new(&opts).unwrap();
        rule.add_data(&[Event::new().with("@timestamp", 0.0).with("host", "A")]).unwrap();
        rule.add_data(&[Event::new().with("@timestamp", 1.0).with("host", "B")]).unwrap();
        assert!(rule.matches().is_empty());
        rule.add_data(&[Event::new().with("@timestamp", 2.0).with("host", "A")]).unwrap();
        assert_eq!(rule.matches().len(), 1);
    }

    #[test]
    fn garbage_collect_drops_stale_keys() {
        let opts = RuleOptions::from_toml(
            r#"
            rule_type = "frequency"
            num_events = 5
            timeframe = "10s"
            "#,
        )
        .unwrap();
        let mut rule = FrequencyRule::new(&opts).unwrap();
        rule.add_data(&[ev(0.0)]).unwrap();
        assert_eq!(rule.windows.keys_snapshot().len(), 1);
        rule.garbage_collect(chrono::DateTime::from_timestamp(20, 0).unwrap()).unwrap();
        assert!(rule.windows.keys_snapshot().is_empty());
    }

    #[test]
    fn requires_timeframe_and_num_events() {
        assert!(FrequencyRule::new(&RuleOptions::from_toml("rule_type = \"frequency\"\ntimeframe = \"10s\"").unwrap()).is_err());
        assert!(FrequencyRule::new(&RuleOptions::from_toml("rule_type = \"frequency\"\nnum_events = 3").unwrap()).is_err());
    }
}
