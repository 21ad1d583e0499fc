use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::de;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ---------------------------------------------------------------------------
// Timeframe
// ---------------------------------------------------------------------------

const UNITS: [(&str, u64); 4] = [("d", 86_400), ("h", 3_600), ("m", 60), ("s", 1)];

/// A duration parsed from a human-readable string like `"30s"`, `"5m"`, `"1h"`, `"2d"`.
///
/// Used for every duration-valued rule option: `timeframe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timeframe(Duration);

impl Timeframe {
    pub fn as_duration(&self) -> Duration {
        self.0
    }
}

impl From<Timeframe> for Duration {
    fn from(tf: Timeframe) -> Self {
        tf.0
    }
}

impl From<Duration> for Timeframe {
    fn from(d: Duration) -> Self {
        Self(d)
    }
}

impl FromStr for Timeframe {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let trimmed = s.trim();
        let (unit, secs_per_unit) = UNITS
            .iter()
            .find(|(unit, _)| trimmed.ends_with(unit))
            .ok_or_else(|| anyhow::anyhow!("timeframe '{s}' must end in one of s/m/h/d"))?;

        let digits = &trimmed[..trimmed.len() - unit.len()];
        if digits.is_empty() {
            anyhow::bail!("timeframe '{s}' has a unit but no number in front of it");
        }
        let count: u64 = digits
            .parse()
            .map_err(|_| anyhow::anyhow!("timeframe '{s}' isn't a whole number of {unit}"))?;

        Ok(Self(Duration::from_secs(count.saturating_mul(*secs_per_unit))))
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.0.as_secs();
        for (unit, secs_per_unit) in UNITS {
            if secs != 0 && secs.is_multiple_of(secs_per_unit) {
                return write!(f, "{}{unit}", secs / secs_per_unit);
            }
        }
        write!(f, "0s")
    }
}

impl Serialize for Timeframe {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Timeframe {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
