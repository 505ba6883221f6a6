//! Logger builder implementation

#[macro_use]
mod format;

use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Format, LogConfig};
use crate::error::{LogError, LogResult};

/// Logger builder
#[derive(Debug)]
pub struct LoggerBuilder {
    config: LogConfig,
}

/// Guard returned by a successful initialization
///
/// Held by the binary for the lifetime of the process; dropping it emits a
/// final debug record.
#[derive(Debug)]
pub struct LoggerGuard {
    format: Format,
}

impl LoggerGuard {
    /// Format the global subscriber was built with
    pub fn format(&self) -> Format {
        self.format
    }
}

impl Drop for LoggerGuard {
    fn drop(&mut self) {
        tracing::debug!("Logger shutting down");
    }
}

/// Build and register a subscriber for a given format layer
macro_rules! init_subscriber {
    ($filter:expr, $fmt_layer:expr) => {
        Registry::default()
            .with($filter)
            .with($fmt_layer)
            .try_init()
            .map_err(|_| LogError::AlreadyInitialized)
    };
}

impl LoggerBuilder {
    /// Create builder from config
    #[must_use]
    pub fn from_config(config: LogConfig) -> Self {
        Self { config }
    }

    /// Parse the filter directive
    pub fn filter(&self) -> LogResult<EnvFilter> {
        EnvFilter::try_new(&self.config.level)
            .map_err(|e| LogError::Filter(format!("{}: {e}", self.config.level)))
    }

    /// Build and install the global subscriber
    ///
    /// # Errors
    ///
    /// - [`LogError::Filter`] when the level directive does not parse
    /// - [`LogError::AlreadyInitialized`] when a global subscriber exists
    pub fn build(self) -> LogResult<LoggerGuard> {
        let filter = self.filter()?;

        match self.config.format {
            Format::Pretty => init_subscriber!(filter, create_fmt_layer!(pretty, &self.config))?,
            Format::Compact => init_subscriber!(filter, create_fmt_layer!(compact, &self.config))?,
            Format::Json => init_subscriber!(filter, create_json_layer!(&self.config))?,
        }

        tracing::debug!(
            level = %self.config.level,
            format = ?self.config.format,
            "Logger initialized"
        );
        Ok(LoggerGuard {
            format: self.config.format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_directive_is_a_filter_error() {
        let builder = LoggerBuilder::from_config(LogConfig::default().with_level("keyguard=loud"));
        assert!(matches!(builder.filter(), Err(LogError::Filter(_))));
    }

    #[test]
    fn second_init_is_rejected() {
        // First call may race with other tests; only the second is asserted.
        let _first = LoggerBuilder::from_config(LogConfig::default()).build();
        let second = LoggerBuilder::from_config(LogConfig::default().with_level("debug")).build();
        assert!(matches!(second, Err(LogError::AlreadyInitialized)));
    }
}
