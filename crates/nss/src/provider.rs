//! The process-wide directory shared by every NSS entry point.
//!
//! The host loads the module once and calls it from any thread, so the
//! directory is built on first use and kept for the life of the process. A
//! configuration that fails to load makes every call report unavailable.

use std::sync::OnceLock;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use loginpolicy_core::config::LoggingConfig;
use loginpolicy_core::policy::FileSource;
use loginpolicy_core::{Directory, DirectoryConfig, LookupError};

static DIRECTORY: OnceLock<Result<Directory<FileSource>, String>> = OnceLock::new();

/// The shared directory, loading the configuration on first use.
pub fn directory() -> Result<&'static Directory<FileSource>, LookupError> {
    DIRECTORY
        .get_or_init(load)
        .as_ref()
        .map_err(|detail| LookupError::Unavailable(detail.clone()))
}

fn load() -> Result<Directory<FileSource>, String> {
    let path = DirectoryConfig::resolve_path();
    let config = DirectoryConfig::load_or_default(&path)
        .map_err(|e| format!("configuration {}: {e}", path.display()))?;

    init_logging(&config.logging);
    info!(
        config = %path.display(),
        policy = %config.policy.file.display(),
        "loginpolicy NSS module loaded"
    );
    Ok(Directory::from_config(config))
}

/// Install a file subscriber when a log file is configured. Nothing is ever
/// written to the host's stdout or stderr.
fn init_logging(logging: &LoggingConfig) {
    let Some(file) = &logging.file else {
        return;
    };
    let (Some(dir), Some(name)) = (file.parent(), file.file_name()) else {
        return;
    };

    let appender = tracing_appender::rolling::never(dir, name);
    let filter = EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("warn"));
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(appender)
        .try_init();

    // The host may already carry a global subscriber of its own.
    if installed.is_err() {
        warn!("a tracing subscriber is already installed; keeping it");
    }
}
