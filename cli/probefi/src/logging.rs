//! Tracing subscriber setup.
//!
//! `PROBEFI_LOG` takes filter directives (`debug`, `probefi_bridge=trace`,
//! ...) and wins over the manifest's `[log] level`. Output goes to stderr so
//! it never mixes with command results on stdout.

use std::io;

use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::manifest::LogSection;

pub const LOG_ENV: &str = "PROBEFI_LOG";
const DEFAULT_FILTER: &str = "warn";

static LOGGER_INITIALIZED: OnceCell<()> = OnceCell::new();

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Filter directives in `EnvFilter` syntax
    pub filter: String,
    /// JSON lines instead of human-readable output
    pub json_format: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            json_format: false,
        }
    }
}

impl LogConfig {
    /// Combine the environment with the manifest's `[log]` section.
    pub fn resolve(section: Option<&LogSection>) -> Self {
        Self::from_parts(std::env::var(LOG_ENV).ok(), section)
    }

    fn from_parts(env: Option<String>, section: Option<&LogSection>) -> Self {
        let filter = env
            .filter(|s| !s.trim().is_empty())
            .or_else(|| section.and_then(|s| s.level.clone()))
            .unwrap_or_else(|| DEFAULT_FILTER.to_string());
        Self {
            filter,
            json_format: section.is_some_and(|s| s.json),
        }
    }
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init_with_config(config: &LogConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let env_filter =
            EnvFilter::try_new(&config.filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        let registry = tracing_subscriber::registry().with(env_filter);
        let result = if config.json_format {
            registry
                .with(fmt::layer().json().with_writer(io::stderr).with_target(true))
                .try_init()
        } else {
            registry
                .with(fmt::layer().with_writer(io::stderr).with_target(true))
                .try_init()
        };
        // Another subscriber may already be installed (tests); keep it.
        let _ = result;
    });
}
