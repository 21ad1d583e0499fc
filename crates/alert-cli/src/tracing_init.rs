use std::fmt::{self as stdfmt, Write as _};

use anyhow::Result;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::time::{FormatTime, SystemTime};
use tracing_subscriber::fmt::{self, FmtContext, FormatEvent};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use alert_config::{LogFormat, LoggingConfig};

/// Event formatter for the replay CLI: tags each line with `[domain]`
/// (`sys` or `replay`) instead of a module path, since that's what a reader
/// actually wants to filter on here. The CLI never opens spans, so unlike a
/// long-running service's formatter there's no span scope to render.
struct DomainFormat;

impl<S, N> FormatEvent<S, N> for DomainFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'writer> fmt::FormatFields<'writer> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: fmt::format::Writer<'_>,
        event: &Event<'_>,
    ) -> stdfmt::Result {
        SystemTime.format_time(&mut writer)?;
        write!(writer, " {:>5} ", event.metadata().level())?;

        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        if let Some(domain) = fields.domain {
            write!(writer, "[{domain}] ")?;
        }
        write!(writer, "{}", fields.message)?;
        if !fields.rest.is_empty() {
            write!(writer, " {}", fields.rest)?;
        }

        writeln!(writer)
    }
}

/// Splits an event's fields into `domain`, `message`, and everything else.
/// Only `record_str`/`record_debug` are implemented — `Visit`'s defaults for
/// the numeric and bool variants already forward to `record_debug`.
#[derive(Default)]
struct FieldCollector {
    domain: Option<String>,
    message: String,
    rest: String,
}

impl FieldCollector {
    fn push(&mut self, name: &str, rendered: stdfmt::Arguments<'_>) {
        if !self.rest.is_empty() {
            self.rest.push(' ');
        }
        write!(&mut self.rest, "{name}={rendered}").ok();
    }
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "domain" => self.domain = Some(value.to_string()),
            "message" => self.message = value.to_string(),
            name => self.push(name, format_args!("{value:?}")),
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn stdfmt::Debug) {
        match field.name() {
            "domain" => self.domain = Some(format!("{value:?}").trim_matches('"').to_string()),
            "message" => {
                write!(&mut self.message, "{value:?}").ok();
            }
            name => self.push(name, format_args!("{value:?}")),
        }
    }
}

/// Initialize the `tracing` subscriber stack from [`LoggingConfig`].
///
/// Precedence: `RUST_LOG` overrides all config-driven directives. This
/// binary always logs to stderr; it has no file sink (unlike the teacher's
/// runtime, the replay driver's stdout is reserved for match output).
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let mut directives = config.level.clone();
        for (module, level) in &config.modules {
            directives.push(',');
            directives.push_str(module);
            directives.push('=');
            directives.push_str(level);
        }
        EnvFilter::try_new(&directives).map_err(|e| anyhow::anyhow!("invalid log filter '{directives}': {e}"))?
    };

    let is_json = config.format == LogFormat::Json;
    if is_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_target(false).with_writer(std::io::stderr).with_filter(filter))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .event_format(DomainFormat)
                    .with_writer(std::io::stderr)
                    .with_filter(filter),
            )
            .init();
    }

    Ok(())
}
