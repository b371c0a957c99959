use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "sqlpilot=info,tower_http=info";

/// Install the global subscriber.
///
/// Logs go to stderr, and additionally to `log_file` (without ANSI colours)
/// when one is given. `RUST_LOG` overrides `default_filter`.
pub fn init(default_filter: &str, log_file: Option<&Path>) -> std::io::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(())
}

/// Log file from `SQLPILOT_LOG_FILE`, if set
pub fn log_file_from_env() -> Option<std::path::PathBuf> {
    std::env::var("SQLPILOT_LOG_FILE")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(Into::into)
}
