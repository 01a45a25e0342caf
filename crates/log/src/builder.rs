//! Logger builder.

use tracing_subscriber::fmt;
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, Format};
use crate::error::{LogError, LogResult};

/// Logger builder.
#[derive(Debug)]
pub struct LoggerBuilder {
    config: Config,
}

/// Returned by [`LoggerBuilder::build`]; hold it for the life of the program.
#[derive(Debug)]
#[must_use = "dropping the guard early loses the logger configuration record"]
pub struct LoggerGuard {
    config: Config,
}

impl LoggerGuard {
    /// Configuration the subscriber was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl LoggerBuilder {
    /// Create builder from config.
    #[must_use]
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    /// Parse the filter directive without installing anything.
    pub fn filter(&self) -> LogResult<EnvFilter> {
        EnvFilter::try_new(&self.config.level).map_err(|e| LogError::Filter {
            directive: self.config.level.clone(),
            message: e.to_string(),
        })
    }

    /// Build and install the global subscriber.
    pub fn build(self) -> LogResult<LoggerGuard> {
        let filter = self.filter()?;
        let c = &self.config;
        let registry = Registry::default().with(filter);

        let installed = match c.format {
            Format::Pretty => registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_writer(std::io::stderr)
                        .with_ansi(c.colors)
                        .with_target(c.target)
                        .with_file(c.source)
                        .with_line_number(c.source)
                        .with_thread_ids(c.thread_ids),
                )
                .try_init(),
            Format::Compact => registry
                .with(
                    fmt::layer()
                        .compact()
                        .with_writer(std::io::stderr)
                        .with_ansi(c.colors)
                        .with_target(c.target)
                        .with_file(c.source)
                        .with_line_number(c.source)
                        .with_thread_ids(c.thread_ids),
                )
                .try_init(),
            Format::Json => registry
                .with(
                    fmt::layer()
                        .json()
                        .flatten_event(true)
                        .with_current_span(true)
                        .with_writer(std::io::stderr)
                        .with_target(c.target)
                        .with_file(c.source)
                        .with_line_number(c.source)
                        .with_thread_ids(c.thread_ids),
                )
                .try_init(),
        };
        installed.map_err(|e| LogError::AlreadyInitialized(e.to_string()))?;

        tracing::debug!(level = %c.level, format = %c.format, "logger initialised");
        Ok(LoggerGuard {
            config: self.config,
        })
    }
}
