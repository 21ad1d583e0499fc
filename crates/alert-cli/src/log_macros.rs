/// Domain-aware logging macros.
///
/// Each macro injects a `domain` field so callers never repeat the string
/// literal. Domains used by this binary: `sys` (startup, rule construction)
/// and `replay` (the per-event ingestion loop).
///
/// ```ignore
/// use crate::log_macros::*;
///
/// al_info!(sys, rule_type = ?opts.rule_type, "rule constructed");
/// al_warn!(replay, line = lineno, error = %e, "skipping invalid JSON");
/// ```

#[doc(hidden)]
macro_rules! al_log {
    ($level:ident, $domain:ident, $($field:tt)*) => {
        tracing::$level!(domain = stringify!($domain), $($field)*)
    };
}

macro_rules! al_error {
    ($domain:ident, $($rest:tt)*) => {
        al_log!(error, $domain, $($rest)*)
    };
}

macro_rules! al_warn {
    ($domain:ident, $($rest:tt)*) => {
        al_log!(warn, $domain, $($rest)*)
    };
}

macro_rules! al_info {
    ($domain:ident, $($rest:tt)*) => {
        al_log!(info, $domain, $($rest)*)
    };
}

#[allow(unused_macros)]
macro_rules! al_debug {
    ($domain:ident, $($rest:tt)*) => {
        al_log!(debug, $domain, $($rest)*)
    };
}

pub(crate) use al_debug;
pub(crate) use al_error;
pub(crate) use al_info;
pub(crate) use al_log;
pub(crate) use al_warn;
