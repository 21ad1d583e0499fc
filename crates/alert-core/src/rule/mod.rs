pub mod any;
pub mod change;
pub mod compare;
pub mod flatline;
pub mod frequency;
pub mod spike;

pub use any::AnyRule;
pub use change::ChangeRule;
pub use compare::{BlacklistRule, WhitelistRule};
pub use flatline::FlatlineRule;
pub use frequency::FrequencyRule;
pub use spike::SpikeRule;

use orion_error::StructError;

use crate::error::{CoreReason, CoreResult};
use crate::event::{Event, Moment};

/// Sentinel partition key used when a rule has no `query_key` configured.
pub const UNPARTITIONED_KEY: &str = "all";

/// The count-data ingestion shape: a `{timestamp -> count}` mapping,
/// expected to carry exactly one entry. Represented as a vec of pairs
/// rather than a map so a rule's shape check can observe and reject a
/// multi-entry batch instead of the type silently collapsing it.
pub type CountData = Vec<(Moment, u64)>;

/// A single aggregated bucket in the terms-data ingestion shape.
#[derive(Debug, Clone)]
pub struct TermBucket {
    pub key: String,
    pub doc_count: u64,
}

/// The terms-data ingestion shape: `{timestamp -> [bucket, ...]}`.
pub type TermsData = (Moment, Vec<TermBucket>);

/// The common contract every rule type implements.
///
/// A well-behaved driver calls exactly one of `add_data`/`add_count_data`/
/// `add_terms_data` against a given instance, chosen by the rule's query
/// mode. A rule that doesn't implement the mode it's called with returns
/// `CoreReason::UnsupportedMode` rather than silently dropping the batch.
pub trait RuleType {
    fn add_data(&mut self, events: &[Event]) -> CoreResult<()>;
    fn add_count_data(&mut self, data: CountData) -> CoreResult<()>;
    fn add_terms_data(&mut self, data: TermsData) -> CoreResult<()>;

    /// Advance logical time to `now`. May synthesize placeholder events so
    /// time-based rules can fire during silence.
    fn garbage_collect(&mut self, now: Moment) -> CoreResult<()>;

    fn matches(&self) -> &[Event];
    fn drain_matches(&mut self) -> Vec<Event>;

    /// A human-readable one-line summary of `m`, for alert bodies.
    fn get_match_str(&self, m: &Event) -> String;
}

pub(crate) fn unsupported_mode(rule: &'static str, mode: &'static str) -> CoreResult<()> {
    StructError::from(CoreReason::UnsupportedMode)
        .with_detail(format!("{rule} does not support {mode}"))
        .err()
}

pub(crate) fn shape_error(detail: impl Into<String>) -> CoreResult<()> {
    StructError::from(CoreReason::Shape).with_detail(detail.into()).err()
}

pub(crate) fn config_error<T>(detail: impl Into<String>) -> CoreResult<T> {
    StructError::from(CoreReason::Config).with_detail(detail.into()).err()
}

/// Canonicalizes the timestamp field to its RFC 3339 string form before a
/// match is recorded, then appends it — shared by every rule's `add_match`.
#[derive(Debug, Default)]
pub(crate) struct MatchList {
    entries: Vec<Event>,
}

impl MatchList {
    pub fn add(&mut self, ts_field: &str, mut event: Event) {
        if let Some(m) = event.moment(ts_field) {
            event.set_moment(ts_field, m);
        }
        self.entries.push(event);
    }

    pub fn as_slice(&self) -> &[Event] {
        &self.entries
    }

    pub fn drain(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.entries)
    }
}

/// Render `scope=[k=v, ...]` for the fields of `m` present in `fields`,
/// skipping any that are absent. Shared by every rule's `get_match_str`.
pub(crate) fn summarize(rule_name: &str, m: &Event, fields: &[&str]) -> String {
    let scope: Vec<String> = fields
        .iter()
        .filter_map(|f| m.get(f).map(|v| format!("{f}={}", v.as_display())))
        .collect();
    format!("rule={rule_name}; scope=[{}]", scope.join(", "))
}
