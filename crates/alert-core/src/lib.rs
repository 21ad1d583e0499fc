pub mod error;
pub mod event;
pub mod rule;
pub mod window;

pub use error::{CoreError, CoreReason, CoreResult};
pub use event::{Event, Moment, Value};
pub use rule::{
    AnyRule, BlacklistRule, ChangeRule, FlatlineRule, FrequencyRule, RuleType, SpikeRule, WhitelistRule,
};
pub use window::EventWindow;

use alert_config::{RuleKind, RuleOptions};

/// Construct the concrete rule implementation named by `opts.rule_type`,
/// validating the options it requires along the way.
///
/// This is the single entry point a host driver needs: it never has to
/// match on `RuleKind` itself, only hold the resulting trait object.
pub fn build_rule(opts: &RuleOptions) -> CoreResult<Box<dyn RuleType>> {
    Ok(match opts.rule_type {
        RuleKind::Blacklist => Box::new(BlacklistRule::new(opts)?),
        RuleKind::Whitelist => Box::new(WhitelistRule::new(opts)?),
        RuleKind::Change => Box::new(ChangeRule::new(opts)?),
        RuleKind::Any => Box::new(AnyRule::new(opts)?),
        RuleKind::Frequency => Box::new(FrequencyRule::new(opts)?),
        RuleKind::Flatline => Box::new(FlatlineRule::new(opts)?),
        RuleKind::Spike => Box::new(SpikeRule::new(opts)?),
    })
}
