use alert_config::RuleOptions;

use crate::error::CoreResult;
use crate::event::Event;
use crate::rule::{config_error, summarize, unsupported_mode, CountData, MatchList, RuleType, TermsData};

/// Matches when `event[compare_key]` is one of `blacklist`.
pub struct BlacklistRule {
    ts_field: String,
    compare_key: String,
    blacklist: Vec<String>,
    matches: MatchList,
}

impl BlacklistRule {
    pub fn new(opts: &RuleOptions) -> CoreResult<Self> {
        let Some(compare_key) = opts.compare_key.clone() else {
            return config_error("blacklist rule requires compare_key");
        };
        if opts.blacklist.is_empty() {
            return config_error("blacklist rule requires a non-empty blacklist");
        }
        Ok(Self {
            ts_field: opts.timestamp_field.clone(),
            compare_key,
            blacklist: opts.blacklist.clone(),
            matches: MatchList::default(),
        })
    }

    fn compare(&self, event: &Event) -> bool {
        match event.get(&self.compare_key) {
            Some(v) => self.blacklist.iter().any(|b| *b == v.as_display()),
            None => false,
        }
    }
}

impl RuleType for BlacklistRule {
    fn add_data(&mut self, events: &[Event]) -> CoreResult<()> {
        for event in events {
            if self.compare(event) {
                self.matches.add(&self.ts_field, event.clone());
            }
        }
        Ok(())
    }

    fn add_count_data(&mut self, _data: CountData) -> CoreResult<()> {
        unsupported_mode("BlacklistRule", "add_count_data")
    }

    fn add_terms_data(&mut self, _data: TermsData) -> CoreResult<()> {
        unsupported_mode("BlacklistRule", "add_terms_data")
    }

    fn garbage_collect(&mut self, _now: crate::event::Moment) -> CoreResult<()> {
        Ok(())
    }

    fn matches(&self) -> &[Event] {
        self.matches.as_slice()
    }

    fn drain_matches(&mut self) -> Vec<Event> {
        self.matches.drain()
    }

    fn get_match_str(&self, m: &Event) -> String {
        summarize("blacklist", m, &[self.compare_key.as_str()])
    }
}

/// Matches when `event[compare_key]` is *not* one of `whitelist`. A missing
/// or null value counts as a violation unless `ignore_null` is set.
pub struct WhitelistRule {
    ts_field: String,
    compare_key: String,
    whitelist: Vec<String>,
    ignore_null: bool,
    matches: MatchList,
}

impl WhitelistRule {
    pub fn new(opts: &RuleOptions) -> CoreResult<Self> {
        let Some(compare_key) = opts.compare_key.clone() else {
            return config_error("whitelist rule requires compare_key");
        };
        if opts.whitelist.is_empty() {
            return config_error("whitelist rule requires a non-empty whitelist");
        }
        Ok(Self {
            ts_field: opts.timestamp_field.clone(),
            compare_key,
            whitelist: opts.whitelist.clone(),
            ignore_null: opts.ignore_null,
            matches: MatchList::default(),
        })
    }

    fn compare(&self, event: &Event) -> bool {
        if event.is_null(&self.compare_key) {
            return !self.ignore_null;
        }
        match event.get(&self.compare_key) {
            Some(v) => !self.whitelist.iter().any(|w| *w == v.as_display()),
            None => !self.ignore_null,
        }
    }
}

impl RuleType for WhitelistRule {
    fn add_data(&mut self, events: &[Event]) -> CoreResult<()> {
        for event in events {
            if self.compare(event) {
                self.matches.add(&self.ts_field, event.clone());
            }
        }
        Ok(())
    }

    fn add_count_data(&mut self, _data: CountData) -> CoreResult<()> {
        unsupported_mode("WhitelistRule", "add_count_data")
    }

    fn add_terms_data(&mut self, _data: TermsData) -> CoreResult<()> {
        unsupported_mode("WhitelistRule", "add_terms_data")
    }

    fn garbage_collect(&mut self, _now: crate::event::Moment) -> CoreResult<()> {
        Ok(())
    }

    fn matches(&self) -> &[Event] {
        self.matches.as_slice()
    }

    fn drain_matches(&mut self) -> Vec<Event> {
        self.matches.drain()
    }

    fn get_match_str(&self, m: &Event) -> String {
        summarize("whitelist", m, &[self.compare_key.as_str()])
    }
}
