pub mod logging;
pub mod options;
pub mod types;

pub use logging::{LogFormat, LoggingConfig};
pub use options::{RuleKind, RuleOptions, SpikeType};
pub use types::Timeframe;
