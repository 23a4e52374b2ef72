use crate::errors::{Error, Result};
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Line format of emitted events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Logging setup for a process
///
/// Events go to stderr so commands can keep stdout for their own output.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Level used when `RUST_LOG` is not set
    pub level: Level,
    pub format: LogFormat,
    /// Annotate events with source file and line
    pub source_locations: bool,
    /// Emit an event when a span opens and when it closes (with its busy time)
    pub span_events: bool,
    pub app_name: String,
}

impl LoggingConfig {
    pub fn new(level: Level, app_name: impl Into<String>) -> Self {
        LoggingConfig {
            level,
            format: LogFormat::Text,
            source_locations: false,
            span_events: false,
            app_name: app_name.into(),
        }
    }

    pub fn with_json(mut self) -> Self {
        self.format = LogFormat::Json;
        self
    }

    pub fn with_source_locations(mut self) -> Self {
        self.source_locations = true;
        self
    }

    pub fn with_span_events(mut self) -> Self {
        self.span_events = true;
        self
    }

    /// `RUST_LOG` when set and parseable, the configured level otherwise
    fn env_filter(&self) -> EnvFilter {
        EnvFilter::builder()
            .with_default_directive(LevelFilter::from_level(self.level).into())
            .from_env_lossy()
    }

    fn fmt_span(&self) -> FmtSpan {
        if self.span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }
}

/// Install the global subscriber described by `config`.
///
/// Fails with [`Error::Logging`] when a global subscriber is already set.
pub fn setup_logging(config: LoggingConfig) -> Result<()> {
    let events = fmt::layer()
        .with_writer(std::io::stderr)
        .with_span_events(config.fmt_span())
        .with_file(config.source_locations)
        .with_line_number(config.source_locations);

    let registry = tracing_subscriber::registry().with(config.env_filter());
    let installed = match config.format {
        LogFormat::Json => registry.with(events.json()).try_init(),
        LogFormat::Text => registry.with(events).try_init(),
    };

    installed.map_err(|e| Error::Logging(format!("{}: {}", config.app_name, e)))
}

pub fn parse_log_level(level: &str) -> Result<Level> {
    Level::from_str(level).map_err(|_| Error::Config(format!("Invalid log level: {}", level)))
}

pub fn log_welcome(app_name: &str, version: &str) {
    tracing::info!("Starting {} v{}", app_name, version);
}
