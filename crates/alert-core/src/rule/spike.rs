use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use alert_config::{RuleOptions, SpikeType};

use crate::error::CoreResult;
use crate::event::{Event, Moment, Value};
use crate::rule::frequency::reject_count_shape;
use crate::rule::{config_error, summarize, CountData, MatchList, RuleType, TermBucket, TermsData, UNPARTITIONED_KEY};
use crate::window::EventWindow;

const OTHER_KEY: &str = "other";

struct KeyState {
    current: EventWindow,
    reference: Rc<RefCell<EventWindow>>,
    first_event: Moment,
}

impl KeyState {
    fn new(ts_field: &str, timeframe: Duration, first_event: Moment) -> Self {
        let reference = Rc::new(RefCell::new(EventWindow::new(ts_field.to_string(), timeframe)));
        let mut current = EventWindow::new(ts_field.to_string(), timeframe);
        let handoff = reference.clone();
        current.set_on_removed(move |ev, count| handoff.borrow_mut().append(ev, count));
        Self {
            current,
            reference,
            first_event,
        }
    }

    fn both_empty(&self) -> bool {
        self.current.is_empty() && self.reference.borrow().is_empty()
    }
}

/// Correlates two adjacent per-key windows — reference covering
/// `[now-2*timeframe, now-timeframe)` and current covering
/// `[now-timeframe, now]` — and fires when their counts diverge by at
/// least `spike_height`.
pub struct SpikeRule {
    ts_field: String,
    query_key: Option<String>,
    timeframe: Duration,
    spike_height: f64,
    spike_type: SpikeType,
    threshold_cur: u64,
    threshold_ref: u64,
    alert_on_new_data: bool,
    keys: HashMap<String, KeyState>,
    /// Global, not per-key: once any key clears its own 2*timeframe
    /// warmup, a newly-seen key may bypass warmup too when
    /// `alert_on_new_data` is set and the rule is partitioned. Preserves
    /// the original behavior verbatim rather than per-key tracking.
    ref_window_filled_once: bool,
    matches: MatchList,
}

impl SpikeRule {
    pub fn new(opts: &RuleOptions) -> CoreResult<Self> {
        let Some(timeframe) = opts.timeframe.map(|t| t.as_duration()) else {
            return config_error("spike rule requires timeframe");
        };
        Ok(Self {
            ts_field: opts.timestamp_field.clone(),
            query_key: opts.query_key.clone(),
            timeframe,
            spike_height: opts.spike_height,
            spike_type: opts.spike_type,
            threshold_cur: opts.threshold_cur,
            threshold_ref: opts.threshold_ref,
            alert_on_new_data: opts.alert_on_new_data,
            keys: HashMap::new(),
            ref_window_filled_once: false,
            matches: MatchList::default(),
        })
    }

    fn key_of(&self, event: &Event) -> String {
        match &self.query_key {
            None => UNPARTITIONED_KEY.to_string(),
            Some(qk) => match event.get(qk) {
                Some(Value::Null) | None => OTHER_KEY.to_string(),
                Some(v) => v.as_display(),
            },
        }
    }

    fn observe(&mut self, key: &str, event: Event, count: u64) {
        let Some(ts) = event.moment(&self.ts_field) else {
            return;
        };
        let ts_field = self.ts_field.clone();
        let timeframe = self.timeframe;
        let query_key_configured = self.query_key.is_some();
        let alert_on_new_data = self.alert_on_new_data;
        let spike_height = self.spike_height;
        let spike_type = self.spike_type;
        let threshold_cur = self.threshold_cur;
        let threshold_ref = self.threshold_ref;
        let ref_window_filled_once = self.ref_window_filled_once;

        let state = self
            .keys
            .entry(key.to_string())
            .or_insert_with(|| KeyState::new(&ts_field, timeframe, ts));
        state.current.append(event, count);

        let since_first = (ts - state.first_event).to_std().unwrap_or(Duration::ZERO);
        let past_warmup = since_first >= timeframe * 2;
        let new_key_bypass = query_key_configured && alert_on_new_data && ref_window_filled_once;
        if !past_warmup && !new_key_bypass {
            return;
        }
        if past_warmup {
            self.ref_window_filled_once = true;
        }

        let state = self.keys.get_mut(key).expect("key just inserted");
        let ref_count = state.reference.borrow().count();
        let cur_count = state.current.count();

        if !find_matches(threshold_cur, threshold_ref, spike_height, spike_type, ref_count, cur_count) {
            return;
        }

        let Some(mut matched) = state.current.newest().cloned() else {
            return;
        };
        matched.fields.insert("spike_count".to_string(), Value::Number(cur_count as f64));
        matched
            .fields
            .insert("reference_count".to_string(), Value::Number(ref_count as f64));
        let reset_to = matched.moment(&ts_field).unwrap_or(ts);

        state.current.clear();
        state.reference.borrow_mut().clear();
        state.first_event = reset_to;

        self.matches.add(&self.ts_field, matched);
    }
}

fn find_matches(
    threshold_cur: u64,
    threshold_ref: u64,
    spike_height: f64,
    spike_type: SpikeType,
    reference_count: u64,
    current_count: u64,
) -> bool {
    if current_count < threshold_cur || reference_count < threshold_ref {
        return false;
    }
    let spike_up = current_count as f64 >= reference_count as f64 * spike_height;
    let spike_down = current_count as f64 <= reference_count as f64 / spike_height;
    match spike_type {
        SpikeType::Up => spike_up,
        SpikeType::Down => spike_down,
        SpikeType::Both => spike_up || spike_down,
    }
}

impl RuleType for SpikeRule {
    fn add_data(&mut self, events: &[Event]) -> CoreResult<()> {
        for event in events {
            let key = self.key_of(event);
            self.observe(&key, event.clone(), 1);
        }
        Ok(())
    }

    /// A count-data batch carries no key of its own, so it always lands in
    /// the unpartitioned window — the same convention `FrequencyRule` uses.
    fn add_count_data(&mut self, data: CountData) -> CoreResult<()> {
        reject_count_shape(data.len())?;
        let (ts, count) = data[0];
        self.observe(UNPARTITIONED_KEY, Event::at(&self.ts_field, ts), count);
        Ok(())
    }

    /// Each bucket is its own key: a terms aggregation is already grouped by
    /// `query_key`, so every bucket feeds the window for its own key rather
    /// than the unpartitioned one.
    fn add_terms_data(&mut self, data: TermsData) -> CoreResult<()> {
        let (ts, buckets) = data;
        let qk_field = self.query_key.clone().unwrap_or_else(|| "query_key".to_string());
        for TermBucket { key, doc_count } in buckets {
            let event = Event::at(&self.ts_field, ts).with(qk_field.as_str(), key.as_str());
            self.observe(&key, event, doc_count);
        }
        Ok(())
    }

    fn garbage_collect(&mut self, now: Moment) -> CoreResult<()> {
        let keys: Vec<String> = self.keys.keys().cloned().collect();
        for key in keys {
            let forgettable = key != UNPARTITIONED_KEY
                && self.keys.get(&key).map(KeyState::both_empty).unwrap_or(false);
            if forgettable {
                self.keys.remove(&key);
                continue;
            }

            let mut placeholder = Event::at(&self.ts_field, now);
            if let Some(qk) = &self.query_key {
                placeholder = placeholder.with(qk.as_str(), key.as_str());
            }
            self.observe(&key, placeholder, 0);
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
        summarize("spike", m, &["spike_count", "reference_count"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(t: i64) -> Event {
        Event::new().with("@timestamp", t as f64)
    }

    #[test]
    fn suppresses_matches_during_warmup_then_fires_once_disparity_crosses_height() {
        let opts = RuleOptions::from_toml(
            r#"
            rule_type = "spike"
            timeframe = "10s"
            spike_height = 3
            spike_type = "up"
            "#,
        )
        .unwrap();
        let mut rule = SpikeRule::new(&opts).unwrap();

        // Two timeframes' worth of steady traffic: still inside the
        // 2*timeframe warmup the whole way (since_first tops out at 19s).
        for t in 0..20 {
            rule.add_data(&[ev(t)]).unwrap();
        }
        assert!(rule.matches().is_empty(), "still inside warmup");

        // Push well past warmup with a burst at a single later timestamp
        // until current overtakes reference by the configured height.
        for _ in 0..40 {
            rule.add_data(&[ev(20)]).unwrap();
        }
        assert_eq!(rule.matches().len(), 1);
    }

    #[test]
    fn find_matches_respects_thresholds_and_direction() {
        assert!(!find_matches(0, 0, 2.0, SpikeType::Up, 5, 5));
        assert!(find_matches(0, 0, 2.0, SpikeType::Up, 5, 10));
        assert!(!find_matches(0, 0, 2.0, SpikeType::Down, 5, 10));
        assert!(find_matches(0, 0, 2.0, SpikeType::Down, 10, 5));
        assert!(!find_matches(100, 0, 2.0, SpikeType::Up, 5, 10));
    }

    #[test]
    fn requires_timeframe() {
        assert!(SpikeRule::new(&RuleOptions::from_toml("rule_type = \"spike\"").unwrap()).is_err());
    }

    #[test]
    fn absent_query_key_value_buckets_into_other() {
        let opts = RuleOptions::from_toml(
            r#"
            rule_type = "spike"
            query_key = "host"
            timeframe = "10s"
            "#,
        )
        .unwrap();
        let mut rule = SpikeRule::new(&opts).unwrap();
        rule.add_data(&[ev(0)]).unwrap();
        assert!(rule.keys.contains_key(OTHER_KEY));
    }

    #[test]
    fn tick_forgets_a_key_whose_windows_were_cleared_by_a_match() {
        let opts = RuleOptions::from_toml(
            r#"
            rule_type = "spike"
            query_key = "host"
            timeframe = "1s"
            spike_height = 2
            spike_type = "up"
            "#,
        )
        .unwrap();
        let mut rule = SpikeRule::new(&opts).unwrap();
        let host_event = |t: i64| Event::new().with("@timestamp", t as f64).with("host", "A");

        rule.add_data(&[host_event(0)]).unwrap();
        rule.add_data(&[host_event(1)]).unwrap();
        rule.add_data(&[host_event(2)]).unwrap();
        // Past warmup (since_first == 2 * timeframe); burst until current
        // overtakes the now-filled reference window.
        for _ in 0..10 {
            rule.add_data(&[host_event(2)]).unwrap();
        }
        assert_eq!(rule.matches().len(), 1, "expected the burst to trip a match and clear A's windows");

        rule.garbage_collect(chrono::DateTime::from_timestamp(3, 0).unwrap()).unwrap();
        assert!(!rule.keys.contains_key("A"));
    }

    #[test]
    fn add_count_data_rejects_multi_entry_batches() {
        let opts = RuleOptions::from_toml("rule_type = \"spike\"\ntimeframe = \"10s\"").unwrap();
        let mut rule = SpikeRule::new(&opts).unwrap();
        let t0 = chrono::DateTime::from_timestamp(0, 0).unwrap();
        let t1 = chrono::DateTime::from_timestamp(1, 0).unwrap();
        assert!(rule.add_count_data(vec![(t0, 1), (t1, 1)]).is_err());
    }

    #[test]
    fn add_count_data_accumulates_into_the_unpartitioned_window() {
        let opts = RuleOptions::from_toml("rule_type = \"spike\"\ntimeframe = \"10s\"").unwrap();
        let mut rule = SpikeRule::new(&opts).unwrap();
        let t0 = chrono::DateTime::from_timestamp(0, 0).unwrap();
        rule.add_count_data(vec![(t0, 5)]).unwrap();
        assert_eq!(rule.keys.get(UNPARTITIONED_KEY).unwrap().current.count(), 5);
    }

    #[test]
    fn add_terms_data_partitions_by_bucket_key() {
        let opts = RuleOptions::from_toml(
            r#"
            rule_type = "spike"
            query_key = "host"
            timeframe = "10s"
            "#,
        )
        .unwrap();
        let mut rule = SpikeRule::new(&opts).unwrap();
        let t0 = chrono::DateTime::from_timestamp(0, 0).unwrap();
        rule.add_terms_data((
            t0,
            vec![
                TermBucket { key: "A".to_string(), doc_count: 3 },
                TermBucket { key: "B".to_string(), doc_count: 7 },
            ],
        ))
        .unwrap();
        assert_eq!(rule.keys.get("A").unwrap().current.count(), 3);
        assert_eq!(rule.keys.get("B").unwrap().current.count(), 7);
    }
}
