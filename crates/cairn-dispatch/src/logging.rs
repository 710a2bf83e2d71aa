//! Per-dispatch log output.
//!
//! Each dispatch installs its own subscriber for the duration of the command,
//! filtered by the threshold derived from `-v`/`-q`, so repeated dispatches in
//! one process never leak configuration into each other.
//!
//! Lines look like `WARNING message`. Records sent to the `critical` target
//! at error level print as `CRITICAL` and survive every threshold.

use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

use crate::flags::Threshold;

/// Target for messages that must always be shown.
pub const CRITICAL: &str = "critical";

/// Where log lines go.
#[derive(Debug, Clone, Default)]
pub enum LogSink {
    #[default]
    Stderr,
    /// In-memory capture, for tests and embedding.
    Buffer(Arc<Mutex<Vec<u8>>>),
}

impl LogSink {
    pub fn buffer() -> Self {
        LogSink::Buffer(Arc::new(Mutex::new(Vec::new())))
    }

    /// Everything captured so far; empty for [`LogSink::Stderr`].
    pub fn contents(&self) -> String {
        match self {
            LogSink::Stderr => String::new(),
            LogSink::Buffer(buf) => match buf.lock() {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(poisoned) => String::from_utf8_lossy(&poisoned.into_inner()).into_owned(),
            },
        }
    }
}

pub struct SinkWriter(LogSink);

impl Write for SinkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &self.0 {
            LogSink::Stderr => io::stderr().write(buf),
            LogSink::Buffer(bytes) => {
                let mut bytes = bytes
                    .lock()
                    .map_err(|_| io::Error::other("log buffer poisoned"))?;
                bytes.extend_from_slice(buf);
                Ok(buf.len())
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &self.0 {
            LogSink::Stderr => io::stderr().flush(),
            LogSink::Buffer(_) => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for LogSink {
    type Writer = SinkWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SinkWriter(self.clone())
    }
}

/// `LEVEL message`, with `CRITICAL` for the critical target.
pub struct LineFormat;

impl<S, N> FormatEvent<S, N> for LineFormat
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
        let meta = event.metadata();
        let label = if meta.target() == CRITICAL {
            "CRITICAL"
        } else {
            level_name(*meta.level())
        };
        write!(writer, "{} ", label)?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

fn level_name(level: Level) -> &'static str {
    match level {
        Level::ERROR => "ERROR",
        Level::WARN => "WARNING",
        Level::INFO => "INFO",
        Level::DEBUG => "DEBUG",
        _ => "TRACE",
    }
}

/// The filter for `threshold`, or `directive` when it parses.
pub fn filter(threshold: Threshold, directive: Option<&str>) -> EnvFilter {
    if let Some(directive) = directive {
        match EnvFilter::try_new(directive) {
            Ok(filter) => return filter,
            Err(err) => eprintln!("ignoring malformed log directive '{}': {}", directive, err),
        }
    }
    EnvFilter::new(threshold.directive())
}

/// A subscriber writing to `sink`.
pub fn subscriber(
    threshold: Threshold,
    directive: Option<&str>,
    sink: LogSink,
) -> impl Subscriber + Send + Sync {
    tracing_subscriber::fmt()
        .with_env_filter(filter(threshold, directive))
        .with_writer(sink)
        .with_ansi(false)
        .event_format(LineFormat)
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{debug, error, info, warn};

    fn capture(threshold: Threshold, directive: Option<&str>) -> String {
        let sink = LogSink::buffer();
        tracing::subscriber::with_default(subscriber(threshold, directive, sink.clone()), || {
            debug!("a debug line");
            info!("an info line");
            warn!("a warning line");
            error!("an error line");
            error!(target: CRITICAL, "a critical line");
        });
        sink.contents()
    }

    #[test]
    fn default_threshold_shows_warnings() {
        let out = capture(Threshold::Warning, None);
        assert!(out.contains("WARNING a warning line\n"));
        assert!(out.contains("ERROR an error line\n"));
        assert!(out.contains("CRITICAL a critical line\n"));
        assert!(!out.contains("info line"));
    }

    #[test]
    fn critical_threshold_hides_plain_errors() {
        let out = capture(Threshold::Critical, None);
        assert_eq!(out, "CRITICAL a critical line\n");
    }

    #[test]
    fn debug_threshold_shows_everything() {
        let out = capture(Threshold::Debug, None);
        assert!(out.starts_with("DEBUG a debug line\n"));
        assert_eq!(out.lines().count(), 5);
    }

    #[test]
    fn directive_overrides_threshold() {
        let out = capture(Threshold::Warning, Some("info"));
        assert!(out.contains("INFO an info line"));
        assert!(!out.contains("debug line"));
    }

    #[test]
    fn stderr_sink_has_no_contents() {
        assert_eq!(LogSink::Stderr.contents(), "");
    }
}
