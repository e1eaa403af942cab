//! Console log lines of the form `[HH:MM:SS.mmm] message`.

use std::fmt;

use chrono::{DateTime, Local};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "EDGE_ENTER_LOG";

pub struct ConsoleLine;

impl<S, N> FormatEvent<S, N> for ConsoleLine
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(
            writer,
            "{}{}",
            stamp(&Local::now()),
            level_prefix(*event.metadata().level())
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// `[HH:MM:SS.mmm] ` prefix for `at`.
pub fn stamp(at: &DateTime<Local>) -> String {
    format!("[{}] ", at.format("%H:%M:%S%.3f"))
}

fn level_prefix(level: Level) -> &'static str {
    match level {
        Level::ERROR => "error: ",
        Level::WARN => "warn: ",
        _ => "",
    }
}

/// Installs the global subscriber. `EDGE_ENTER_LOG` overrides the level.
pub fn init(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stdout)
        .event_format(ConsoleLine)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[test]
    fn stamp_has_millisecond_precision() {
        let at = Local
            .with_ymd_and_hms(2024, 3, 9, 7, 5, 3)
            .single()
            .unwrap()
            + chrono::Duration::milliseconds(42);
        assert_eq!(stamp(&at), "[07:05:03.042] ");
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn assert_stamped(line: &str) -> &str {
        let (stamp, rest) = line.split_at(15);
        let bytes = stamp.as_bytes();
        assert_eq!(bytes[0], b'[', "{line}");
        assert_eq!(&stamp[13..], "] ", "{line}");
        assert_eq!((bytes[3], bytes[6], bytes[9]), (b':', b':', b'.'), "{line}");
        assert!(stamp[1..13]
            .chars()
            .all(|c| c.is_ascii_digit() || c == ':' || c == '.'));
        rest
    }

    #[test]
    fn console_line_renders_stamp_prefix_and_message() {
        let out = Captured::default();
        let writer = out.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .event_format(ConsoleLine)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("TRIGGER-RESULT: double_enter_sent=true");
            tracing::warn!("capture failed, skipping tick");
        });

        let text = String::from_utf8(out.0.lock().unwrap().clone()).unwrap();
        assert!(text.ends_with('\n'));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            assert_stamped(lines[0]),
            "TRIGGER-RESULT: double_enter_sent=true"
        );
        assert_eq!(
            assert_stamped(lines[1]),
            "warn: capture failed, skipping tick"
        );
    }

    #[test]
    fn only_problems_get_a_prefix() {
        assert_eq!(level_prefix(Level::INFO), "");
        assert_eq!(level_prefix(Level::DEBUG), "");
        assert_eq!(level_prefix(Level::WARN), "warn: ");
        assert_eq!(level_prefix(Level::ERROR), "error: ");
    }
}
