use alert_config::RuleOptions;

use crate::error::CoreResult;
use crate::event::{Event, Moment};
use crate::rule::{summarize, unsupported_mode, CountData, MatchList, RuleType, TermsData};

/// Every event in a batch becomes a match. A pass-through rule, useful as a
/// raw feed of everything a query surfaces.
pub struct AnyRule {
    ts_field: String,
    matches: MatchList,
}

impl AnyRule {
    pub fn new(opts: &RuleOptions) -> CoreResult<Self> {
        Ok(Self {
            ts_field: opts.timestamp_field.clone(),
            matches: MatchList::default(),
        })
    }
}

impl RuleType for AnyRule {
    fn add_data(&mut self, events: &[Event]) -> CoreResult<()> {
        for event in events {
            self.matches.add(&self.ts_field, event.clone());
        }
        Ok(())
    }

    fn add_count_data(&mut self, _data: CountData) -> CoreResult<()> {
        unsupported_mode("AnyRule", "add_count_data")
    }

    fn add_terms_data(&mut self, _data: TermsData) -> CoreResult<()> {
        unsupported_mode("AnyRule", "add_terms_data")
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
        summarize("any", m, &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_event_matches() {
        let opts = RuleOptions::from_toml("rule_type = \"any\"").unwrap();
        let mut rule = AnyRule::new(&opts).unwrap();
        rule.add_data(&[
            Event::new().with("@timestamp", 0.0),
            Event::new().with("@timestamp", 1.0),
        ])
        .unwrap();
        assert_eq!(rule.matches().len(), 2);
    }
}
