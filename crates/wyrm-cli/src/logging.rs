//! Diagnostic log setup.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use chrono::Local;
use tracing::{Event, Subscriber};
use tracing_subscriber::filter::{filter_fn, LevelFilter};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// One line per event: `{timestamp} - {LEVEL} - {message}`.
pub struct DiagnosticFormat;

impl<S, N> FormatEvent<S, N> for DiagnosticFormat
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
            "{} - {} - ",
            Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
            event.metadata().level()
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Target for events that go to the diagnostic file but not the console.
pub const LOG_ONLY: &str = "wyrm_cli::log_only";

/// Crates whose events reach the diagnostic log by default.
const WYRM_CRATES: &[&str] = &[
    "wyrm_core",
    "wyrm_chunk",
    "wyrm_embed",
    "wyrm_store",
    "wyrm_query",
    "wyrm_generate",
    "wyrm_pipeline",
    "wyrm_cli",
];

/// Filter for the diagnostic file.
///
/// A bare level such as `info` applies to the wyrm crates only. A value with
/// explicit directives (`wyrm_store=debug,ort=warn`) is used as given.
pub fn default_filter(level: &str) -> EnvFilter {
    if level.contains('=') || level.contains(',') {
        return EnvFilter::new(level);
    }
    let directives: Vec<String> = WYRM_CRATES
        .iter()
        .map(|krate| format!("{}={}", krate, level))
        .collect();
    EnvFilter::new(directives.join(","))
}

/// Layer appending formatted events to `file`.
pub fn file_layer<S>(file: File, filter: EnvFilter) -> impl Layer<S> + Send + Sync
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .event_format(DiagnosticFormat)
        .with_filter(filter)
}

/// Console layer up to `max_level`, skipping [`LOG_ONLY`] events.
pub fn console_layer<S, W>(writer: W, max_level: LevelFilter) -> impl Layer<S> + Send + Sync
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_target(false)
        .with_filter(filter_fn(move |meta| {
            meta.target() != LOG_ONLY && *meta.level() <= max_level
        }))
}

/// Install the file and stderr layers.
///
/// `RUST_LOG` overrides `level` for the file layer. If the log file cannot be
/// opened only the stderr layer is installed.
pub fn setup_logging(path: &Path, level: &str, verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(level));

    let file = OpenOptions::new().create(true).append(true).open(path);
    let open_error = file.as_ref().err().map(|e| e.to_string());

    let stderr_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };

    tracing_subscriber::registry()
        .with(file.ok().map(|f| file_layer::<Registry>(f, filter)))
        .with(console_layer(std::io::stderr, stderr_level))
        .try_init()
        .ok();

    if let Some(e) = open_error {
        tracing::warn!("Diagnostic log {} unavailable: {}", path.display(), e);
    }
}
