//! Service log formatter: `[timestamp] [service] [level] message`.

use std::fmt;
use std::io::IsTerminal;

use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::{format::Writer, FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

const COLOR_RESET: &str = "\x1b[0m";
const COLOR_CYAN: &str = "\x1b[36m";
const COLOR_GREEN: &str = "\x1b[32m";
const COLOR_BRIGHT_YELLOW: &str = "\x1b[93m";
const COLOR_BRIGHT_RED: &str = "\x1b[91m";
const COLOR_BRIGHT_GRAY: &str = "\x1b[90m";

const SERVICE_NAME_WIDTH: usize = 20;
const LOG_LEVEL_WIDTH: usize = 9;

/// Formatter printing one aligned line per event.
///
/// An event carrying a `component` field is labelled `<service>-<component>`.
pub struct ServiceLogFormatter {
    service_name: String,
    color_enabled: bool,
}

impl ServiceLogFormatter {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            color_enabled: is_terminal(),
        }
    }

    fn format_service_name(&self, component: Option<&str>) -> String {
        let name = match component {
            Some(component) => format!("{}-{}", self.service_name, component),
            None => self.service_name.clone(),
        };

        if name.chars().count() > SERVICE_NAME_WIDTH {
            let truncated: String = name.chars().take(SERVICE_NAME_WIDTH - 1).collect();
            format!("{}…", truncated)
        } else {
            format!("{:<width$}", name, width = SERVICE_NAME_WIDTH)
        }
    }

    fn format_log_level(level: &Level) -> String {
        let level_str = match *level {
            Level::ERROR => "✗ ERROR",
            Level::WARN => "⚠ WARN",
            Level::INFO => "ℹ INFO",
            Level::DEBUG => "◦ DEBUG",
            Level::TRACE => "◦ TRACE",
        };
        format!("{:<width$}", level_str, width = LOG_LEVEL_WIDTH)
    }

    fn color_for_level(&self, level: &Level) -> &'static str {
        if !self.color_enabled {
            return "";
        }

        match *level {
            Level::ERROR => COLOR_BRIGHT_RED,
            Level::WARN => COLOR_BRIGHT_YELLOW,
            Level::INFO => COLOR_GREEN,
            Level::DEBUG | Level::TRACE => COLOR_BRIGHT_GRAY,
        }
    }
}

impl<S, N> FormatEvent<S, N> for ServiceLogFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let level = event.metadata().level();

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let color = self.color_for_level(level);
        let reset = if self.color_enabled { COLOR_RESET } else { "" };
        let cyan = if self.color_enabled { COLOR_CYAN } else { "" };

        write!(
            writer,
            "{}[{}] [{}] [{}{}{}] ",
            cyan,
            timestamp,
            self.format_service_name(visitor.component.as_deref()),
            color,
            Self::format_log_level(level),
            reset
        )?;
        writeln!(writer, "{}{}", visitor.message, reset)
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    component: Option<String>,
}

fn unquote(value: String) -> String {
    match value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
        Some(inner) => inner.to_string(),
        None => value,
    }
}

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        match field.name() {
            "message" => self.message = unquote(format!("{:?}", value)),
            "component" => self.component = Some(unquote(format!("{:?}", value))),
            _ => {}
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            "component" => self.component = Some(value.to_string()),
            _ => {}
        }
    }
}

fn is_terminal() -> bool {
    if std::env::var("TERM").unwrap_or_default() == "dumb" {
        return false;
    }
    std::io::stderr().is_terminal()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_name_padding() {
        let formatter = ServiceLogFormatter {
            service_name: "mesh-sig".to_string(),
            color_enabled: false,
        };
        assert_eq!(formatter.format_service_name(None), format!("{:<20}", "mesh-sig"));
        assert_eq!(
            formatter.format_service_name(Some("layer2")).trim_end(),
            "mesh-sig-layer2"
        );

        let long = formatter.format_service_name(Some("a-very-long-component"));
        assert_eq!(long.chars().count(), SERVICE_NAME_WIDTH);
        assert!(long.ends_with('…'));
    }

    #[test]
    fn test_no_color_without_terminal() {
        let formatter = ServiceLogFormatter {
            service_name: "mesh-sig".to_string(),
            color_enabled: false,
        };
        assert_eq!(formatter.color_for_level(&Level::ERROR), "");
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"signed\"".to_string()), "signed");
        assert_eq!(unquote("42".to_string()), "42");
    }
}
