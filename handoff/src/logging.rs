// Logging for the handoff pipeline
//
// Built on the `tracing` ecosystem. Every participant thread logs through the
// subscriber that was current when the pipeline run started.
//
// # Usage Examples
//
// ```rust
// use handoff::logging;
//
// // Warnings only, plain output on stderr
// logging::init_cli();
//
// // Or pick the level and layout yourself
// let config = logging::LogConfig {
//     level: tracing::Level::DEBUG,
//     json_format: false,
//     ..Default::default()
// };
// logging::init(config);
// ```
//
// ## File Logging
//
// ```rust
// use handoff::logging;
//
// let config = logging::LogConfig::default();
// logging::init_with_file(config, "/tmp/handoff.log").unwrap();
// ```
//
// ## Spans and events
//
// ```rust
// use handoff::{log_worker, worker_span};
//
// let span = worker_span!(3);
// let _guard = span.enter();
// log_worker!(3, "drained", value = 42);
// ```

use std::io;
use std::sync::Once;
use tracing::{Level, Subscriber};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Configuration for the logging system
///
/// # Examples
///
/// ```rust
/// use handoff::logging::LogConfig;
/// use tracing::Level;
///
/// let custom_config = LogConfig {
///     level: Level::DEBUG,
///     json_format: true,
///     show_file_line: false,
///     show_thread_info: true,
///     show_time: true,
///     target_filters: Some("handoff::pipeline=trace".to_string()),
/// };
/// ```
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display
    pub level: Level,
    /// Whether to use JSON format for logs
    pub json_format: bool,
    /// Whether to include file and line information
    pub show_file_line: bool,
    /// Whether to include thread name/id
    pub show_thread_info: bool,
    /// Whether to include timestamps
    pub show_time: bool,
    /// Target filter expressions (format: "target=level,target2=level2,...")
    pub target_filters: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            show_file_line: true,
            show_thread_info: true,
            show_time: true,
            target_filters: None,
        }
    }
}

// Initialization guard to ensure we only initialize once
static INIT: Once = Once::new();

fn env_filter(config: &LogConfig) -> EnvFilter {
    let mut env_filter = EnvFilter::from_default_env().add_directive(config.level.into());

    if let Some(filters) = &config.target_filters {
        for filter in filters.split(',') {
            if let Ok(directive) = filter.parse() {
                env_filter = env_filter.add_directive(directive);
            }
        }
    }
    env_filter
}

/// Initialize the logging system with the given configuration
///
/// Installs the global tracing subscriber. Only the first call takes effect.
/// Output goes to stderr so stdout stays free for results.
pub fn init(config: LogConfig) {
    INIT.call_once(|| {
        let env_filter = env_filter(&config);
        let registry = tracing_subscriber::registry().with(env_filter);

        let subscriber: Box<dyn Subscriber + Send + Sync> = if config.json_format {
            Box::new(
                registry.with(
                    fmt::layer()
                        .json()
                        .flatten_event(true)
                        .with_writer(io::stderr)
                        .with_thread_names(config.show_thread_info)
                        .with_thread_ids(config.show_thread_info),
                ),
            )
        } else if config.show_time {
            Box::new(registry.with(console_layer(&config)))
        } else {
            Box::new(registry.with(console_layer(&config).without_time()))
        };

        set_global_subscriber(subscriber);
    });
}

fn console_layer<S>(config: &LogConfig) -> fmt::Layer<S, fmt::format::DefaultFields, fmt::format::Format, fn() -> io::Stderr> {
    fmt::layer()
        .with_writer(io::stderr as fn() -> io::Stderr)
        .with_ansi(atty::is(atty::Stream::Stderr))
        .with_file(config.show_file_line)
        .with_line_number(config.show_file_line)
        .with_thread_names(config.show_thread_info)
        .with_thread_ids(config.show_thread_info)
}

// Helper function to set the global subscriber
fn set_global_subscriber<S>(subscriber: S)
where
    S: Subscriber + Send + Sync + 'static,
{
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Error setting global tracing subscriber: {}", err);
    }
}

/// Open `path` in append mode, creating it if needed.
pub fn file_writer(path: &str) -> io::Result<Box<dyn io::Write + Send + Sync + 'static>> {
    use std::fs::OpenOptions;

    let file = OpenOptions::new().create(true).append(true).open(path)?;

    Ok(Box::new(file))
}

/// Initialize logging with both console and file output
///
/// The file must be writable up front; events that later fail to reach it
/// fall back to stderr. File output never carries ANSI colors.
pub fn init_with_file(config: LogConfig, log_file: &str) -> Result<(), io::Error> {
    // Surface an unwritable path to the caller instead of silently dropping logs.
    file_writer(log_file)?;

    INIT.call_once(|| {
        let log_file_path = log_file.to_string();
        let file_layer = fmt::layer()
            .with_ansi(false)
            .with_writer(move || match file_writer(&log_file_path) {
                Ok(writer) => writer,
                Err(_) => Box::new(io::stderr()),
            })
            .with_file(true)
            .with_line_number(true)
            .with_thread_names(true)
            .with_thread_ids(true);

        let registry = tracing_subscriber::registry()
            .with(env_filter(&config))
            .with(file_layer);

        if config.show_time {
            set_global_subscriber(registry.with(console_layer(&config)));
        } else {
            set_global_subscriber(registry.with(console_layer(&config).without_time()));
        }
    });

    Ok(())
}

/// Settings for the command line binary: warnings only unless `RUST_LOG`
/// says otherwise, and no thread or time noise.
pub fn cli_config() -> LogConfig {
    LogConfig {
        level: Level::WARN,
        json_format: false,
        show_file_line: false,
        show_thread_info: false,
        show_time: false,
        target_filters: None,
    }
}

pub fn init_cli() {
    init(cli_config());
}

/// Initialize logging for testing
///
/// Only shows warnings and errors to keep test output clean.
pub fn init_test() {
    let config = LogConfig {
        level: Level::WARN,
        json_format: false,
        show_file_line: true,
        show_thread_info: false,
        show_time: false,
        target_filters: None,
    };
    init(config);
}

/// Span covering one pipeline run.
#[macro_export]
macro_rules! pipeline_span {
    ($run_id:expr) => {
        tracing::info_span!("pipeline", run_id = %$run_id)
    };
    ($run_id:expr, $($fields:tt)*) => {
        tracing::info_span!("pipeline", run_id = %$run_id, $($fields)*)
    };
}

/// Span covering one pool member.
#[macro_export]
macro_rules! worker_span {
    ($worker_id:expr) => {
        tracing::debug_span!("worker", id = $worker_id)
    };
    ($worker_id:expr, $($fields:tt)*) => {
        tracing::debug_span!("worker", id = $worker_id, $($fields)*)
    };
}

/// Log a consumer lifecycle event.
#[macro_export]
macro_rules! log_worker {
    ($worker_id:expr, $event:expr) => {
        tracing::debug!(consumer = $worker_id, event = $event)
    };
    ($worker_id:expr, $event:expr, $($fields:tt)*) => {
        tracing::debug!(consumer = $worker_id, event = $event, $($fields)*)
    };
}

/// Log a handshake step on the shared cell.
#[macro_export]
macro_rules! log_handoff {
    ($step:expr) => {
        tracing::trace!(step = $step)
    };
    ($step:expr, $($fields:tt)*) => {
        tracing::trace!(step = $step, $($fields)*)
    };
}

/// Get the current tracing dispatcher
///
/// Spawned participant threads install it so they log through the same
/// subscriber as the thread that started the run.
#[inline]
pub fn current_subscriber() -> tracing::Dispatch {
    tracing::dispatcher::get_default(|d| d.clone())
}

// Re-export the most commonly used tracing macros for convenience
pub use tracing::{debug, error, info, trace, warn};
