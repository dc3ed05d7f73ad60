//! # Structured Logging
//!
//! Process-wide `tracing` subscriber setup. `RUST_LOG` takes precedence over
//! the configured level. Records emitted through the `log` facade are
//! forwarded into the same subscriber.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::types::{Error, ErrorKind, Result};

// Flag to track if logging has been initialized
static LOGGING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Configuration for the logging system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// The log level to use (trace, debug, info, warn, error)
    pub level: String,
    /// The service name for identification
    pub service_name: String,
    /// Whether to use JSON formatting
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            service_name: "product-composite".to_string(),
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Directive string handed to the env filter when `RUST_LOG` is unset
    pub fn filter_directive(&self) -> String {
        format!("{},hyper=warn,reqwest=warn", self.level)
    }
}

/// Initializes the structured logging system
///
/// Calling this more than once is a no-op.
pub fn init_logging(config: Option<LoggingConfig>) -> Result<()> {
    if LOGGING_INITIALIZED.load(Ordering::SeqCst) {
        return Ok(());
    }

    let config = config.unwrap_or_default();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.filter_directive()))
        .map_err(|e| {
            Error::new(
                ErrorKind::Initialization,
                format!("Invalid log level '{}': {}", config.level, e),
            )
        })?;

    let registry = Registry::default().with(filter);

    // JSON and text layers have distinct types, so each branch installs its own subscriber.
    // `try_init` also installs the `log` to `tracing` bridge.
    let installed = if config.json_format {
        let json_layer = fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_target(true);
        registry.with(json_layer).try_init()
    } else {
        let text_layer = fmt::layer().with_target(true).with_thread_ids(true);
        registry.with(text_layer).try_init()
    };

    installed.map_err(|e| {
        Error::new(
            ErrorKind::Initialization,
            format!("Failed to set global subscriber: {}", e),
        )
    })?;

    LOGGING_INITIALIZED.store(true, Ordering::SeqCst);

    tracing::info!(
        service = %config.service_name,
        level = %config.level,
        json = %config.json_format,
        "Structured logging initialized"
    );

    Ok(())
}

/// Returns true once [`init_logging`] has installed a subscriber
pub fn logging_initialized() -> bool {
    LOGGING_INITIALIZED.load(Ordering::SeqCst)
}
