//! Logging initialization.
//!
//! Structured `tracing` output to stderr, pretty or JSON, plus an optional
//! non-blocking file writer.

use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// The file writer flushes on drop; keep its guard for the life of the process
static LOG_GUARD: Mutex<Option<tracing_appender::non_blocking::WorkerGuard>> = Mutex::new(None);

/// Build the filter. `RUST_LOG` wins over the configured level when set.
pub fn env_filter(log_level: &str) -> anyhow::Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => Ok(EnvFilter::try_new(log_level)?),
    }
}

/// Initialize logging.
pub fn init_telemetry(log_level: &str, json_format: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = env_filter(log_level)?;

    let file_layer = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            if let Ok(mut g) = LOG_GUARD.lock() {
                *g = Some(guard);
            }
            Some(fmt::layer().with_ansi(false).with_writer(non_blocking))
        }
        None => None,
    };

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);
    if json_format {
        registry.with(fmt::layer().json()).try_init()?;
    } else {
        registry.with(fmt::layer().pretty()).try_init()?;
    }

    Ok(())
}
