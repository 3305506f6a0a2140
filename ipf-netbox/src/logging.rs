use colored::{ColoredString, Colorize};
use std::fmt;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::{FormatFields, Writer};
use tracing_subscriber::fmt::{FmtContext, FormatEvent};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

/// Marker printed in front of every line, coloured by severity.
fn marker(level: &Level) -> ColoredString {
    match *level {
        Level::ERROR => "[-]".red().bold(),
        Level::WARN => "[*]".yellow().bold(),
        Level::INFO => "[+]".green().bold(),
        Level::DEBUG => "[?]".blue(),
        Level::TRACE => "[ ]".dimmed(),
    }
}

/// Sync log lines: `[+] device SW1 was added ...`. With `with_target` the
/// emitting module follows the marker, which helps when `RUST_LOG` pulls in
/// HTTP client internals.
pub struct SyncFormatter {
    with_target: bool,
}

impl<S, N> FormatEvent<S, N> for SyncFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(&self, ctx: &FmtContext<'_, S, N>, mut writer: Writer<'_>, event: &Event<'_>) -> fmt::Result {
        let meta = event.metadata();
        write!(writer, "{} ", marker(meta.level()))?;
        if self.with_target {
            write!(writer, "{} ", meta.target().dimmed())?;
        }
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Logs go to stderr so stdout carries only the report. `RUST_LOG` wins over `verbose`.
pub fn init(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .event_format(SyncFormatter { with_target: verbose })
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_follow_severity() {
        colored::control::set_override(false);
        assert_eq!(marker(&Level::ERROR).to_string(), "[-]");
        assert_eq!(marker(&Level::WARN).to_string(), "[*]");
        assert_eq!(marker(&Level::INFO).to_string(), "[+]");
        assert_eq!(marker(&Level::DEBUG).to_string(), "[?]");
    }
}
