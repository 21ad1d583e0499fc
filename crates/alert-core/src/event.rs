use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};

/// A point in time. Differences between two moments yield a [`std::time::Duration`].
pub type Moment = DateTime<Utc>;

/// Scalar value carried inside an [`Event`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
}

impl Value {
    /// "Falsy" in the sense the spec uses for `ignore_null` checks on
    /// `ChangeRule`: null, `false`, empty string, or the number zero.
    pub fn is_falsy(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Number(n) => *n == 0.0,
            Value::Str(s) => s.is_empty(),
        }
    }

    /// Render this value as a stable string, used for set membership checks
    /// (`blacklist`/`whitelist`) and match-summary rendering.
    pub fn as_display(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            Value::Str(s) => s.clone(),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// An attribute map keyed by dotted field paths.
///
/// Field-path resolution (traversing nested documents, array indexing) is the
/// external lookup utility's concern; by the time an event reaches this
/// crate it is already flattened to direct key lookups, so `Event::get` is a
/// plain map access.
#[derive(Debug, Clone, Default)]
pub struct Event {
    pub fields: HashMap<String, Value>,
}

impl Event {
    pub fn new() -> Self {
        Self::default()
    }

    /// A bare event carrying only a timestamp field — the shape synthesized
    /// by the count-data and terms-data ingestion paths, and by ticks.
    pub fn at(ts_field: &str, moment: Moment) -> Self {
        let mut ev = Self::new();
        ev.set_moment(ts_field, moment);
        ev
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// A lookup miss is not an error: absent fields read as `None`, same as
    /// an explicit `Value::Null`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn is_null(&self, key: &str) -> bool {
        match self.get(key) {
            None => true,
            Some(Value::Null) => true,
            Some(_) => false,
        }
    }

    /// Read `key` as a [`Moment`].
    ///
    /// Accepts a `Number` (seconds since the Unix epoch, fractional part as
    /// sub-second precision) or a `Str` (RFC 3339 timestamp). Returns `None`
    /// on a lookup miss or an unparsable value — the driver's contract
    /// guarantees `timestamp_field` is present and well-formed, but this
    /// stays a `None` rather than a panic so a malformed synthetic event
    /// fails loudly at the call site instead of silently.
    pub fn moment(&self, key: &str) -> Option<Moment> {
        match self.get(key)? {
            Value::Number(secs) => {
                let whole = secs.trunc() as i64;
                let nanos = ((secs.fract()) * 1_000_000_000.0).round() as u32;
                DateTime::from_timestamp(whole, nanos)
            }
            Value::Str(s) => DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc)),
            _ => None,
        }
    }

    pub fn set_moment(&mut self, key: &str, moment: Moment) {
        self.fields.insert(
            key.to_string(),
            Value::Str(moment.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
    }
}
