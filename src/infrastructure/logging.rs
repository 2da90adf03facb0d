//! Logging setup on top of `tracing`
//!
//! Library code only emits events; binaries and tests pick a subscriber here.

use std::path::Path;
use tracing::Level;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    filter::Directive,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, human-readable
    Pretty,
    Compact,
    /// One JSON object per event
    Json,
}

/// Log output destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
    /// Daily rolling files `<directory>/<prefix>.YYYY-MM-DD`
    File { directory: String, prefix: String },
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Emit span open/close events
    pub span_events: bool,
    /// Extra filter directives, e.g. "deferred_call=trace"
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Compact,
            output: LogOutput::Stderr,
            span_events: false,
            filter: None,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

/// Install the global subscriber
///
/// Keep the returned guard alive until exit so buffered events get flushed.
/// Returns `None` if a global subscriber is already installed.
pub fn init_logging(config: LogConfig) -> Option<WorkerGuard> {
    let (filter, rejected) = build_filter(&config);

    let (writer, guard) = match &config.output {
        LogOutput::Stdout => tracing_appender::non_blocking(std::io::stdout()),
        LogOutput::Stderr => tracing_appender::non_blocking(std::io::stderr()),
        LogOutput::File { directory, prefix } => {
            tracing_appender::non_blocking(rolling::daily(directory, prefix))
        }
    };

    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Pretty => fmt::layer()
            .with_writer(writer)
            .pretty()
            .with_span_events(span_events)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .with_writer(writer)
            .compact()
            .with_span_events(span_events)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .with_writer(writer)
            .json()
            .with_span_events(span_events)
            .boxed(),
    };

    if tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .try_init()
        .is_err()
    {
        return None;
    }

    for directive in rejected {
        tracing::warn!("Invalid filter directive: {}", directive);
    }

    Some(guard)
}

/// Build the env filter, returning directives that failed to parse
fn build_filter(config: &LogConfig) -> (EnvFilter, Vec<String>) {
    let mut filter = EnvFilter::from_default_env().add_directive(config.level.into());
    let mut rejected = Vec::new();

    if let Some(directives) = &config.filter {
        for raw in directives.split(',').map(str::trim).filter(|d| !d.is_empty()) {
            match raw.parse::<Directive>() {
                Ok(directive) => filter = filter.add_directive(directive),
                Err(_) => rejected.push(raw.to_string()),
            }
        }
    }

    (filter, rejected)
}

/// Verbose stderr logging for local runs
pub fn init_dev_logging() -> Option<WorkerGuard> {
    init_logging(
        LogConfig::new()
            .with_level(Level::DEBUG)
            .with_format(LogFormat::Pretty)
            .with_span_events(true)
            .with_filter("deferred_call=debug"),
    )
}

/// JSON logs to daily files under `log_dir`
pub fn init_prod_logging(log_dir: impl AsRef<Path>) -> Option<WorkerGuard> {
    init_logging(LogConfig {
        level: Level::INFO,
        format: LogFormat::Json,
        output: LogOutput::File {
            directory: log_dir.as_ref().to_string_lossy().to_string(),
            prefix: "deferred-call".to_string(),
        },
        span_events: false,
        filter: Some("deferred_call=info".to_string()),
    })
}
