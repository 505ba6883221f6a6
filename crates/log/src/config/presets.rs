//! Configuration presets for common scenarios

use super::{Format, LOG_ENV, LOG_FORMAT_ENV, LogConfig};

impl LogConfig {
    /// Configuration from `KEYGUARD_LOG` (or `RUST_LOG`) and `KEYGUARD_LOG_FORMAT`
    ///
    /// Unset or unparseable variables keep the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(level) = lookup(LOG_ENV).or_else(|| lookup("RUST_LOG")) {
            config.level = level;
        }

        if let Some(format) = lookup(LOG_FORMAT_ENV).and_then(|f| f.parse().ok()) {
            config.format = format;
            config.ansi = format != Format::Json;
        }

        config
    }

    /// Environment configuration when `KEYGUARD_LOG` or `RUST_LOG` is set,
    /// otherwise [`development`](Self::development) in debug builds and
    /// [`production`](Self::production) in release builds
    #[must_use]
    pub fn auto() -> Self {
        Self::auto_from(|key| std::env::var(key).ok(), cfg!(debug_assertions))
    }

    pub(crate) fn auto_from(lookup: impl Fn(&str) -> Option<String>, debug_build: bool) -> Self {
        if lookup(LOG_ENV).is_some() || lookup("RUST_LOG").is_some() {
            Self::from_lookup(lookup)
        } else if debug_build {
            Self::development()
        } else {
            Self::production()
        }
    }

    /// Development configuration (pretty, debug level)
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            format: Format::Pretty,
            ansi: true,
            with_target: true,
        }
    }

    /// Production configuration (JSON, info level)
    #[must_use]
    pub fn production() -> Self {
        Self {
            level: "info".to_string(),
            format: Format::Json,
            ansi: false,
            with_target: true,
        }
    }

    /// Override the filter directive
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn keyguard_log_wins_over_rust_log() {
        let config = LogConfig::from_lookup(lookup(&[
            ("KEYGUARD_LOG", "keyguard=trace"),
            ("RUST_LOG", "warn"),
        ]));
        assert_eq!(config.level, "keyguard=trace");

        let config = LogConfig::from_lookup(lookup(&[("RUST_LOG", "warn")]));
        assert_eq!(config.level, "warn");
    }

    #[test]
    fn json_format_disables_colors() {
        let config = LogConfig::from_lookup(lookup(&[("KEYGUARD_LOG_FORMAT", "JSON")]));
        assert_eq!(config.format, Format::Json);
        assert!(!config.ansi);
    }

    #[test]
    fn auto_prefers_explicit_environment() {
        let config = LogConfig::auto_from(lookup(&[("RUST_LOG", "warn")]), false);
        assert_eq!(config.level, "warn");
        assert_eq!(config.format, Format::Compact);
    }

    #[test]
    fn auto_falls_back_to_build_profile() {
        assert_eq!(LogConfig::auto_from(lookup(&[]), true), LogConfig::development());
        assert_eq!(LogConfig::auto_from(lookup(&[]), false), LogConfig::production());
    }

    #[test]
    fn unknown_format_keeps_default() {
        let config = LogConfig::from_lookup(lookup(&[("KEYGUARD_LOG_FORMAT", "logfmt")]));
        assert_eq!(config, LogConfig::default());
    }
}
