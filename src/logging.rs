/*!
 * Logging and tracing initialization
 *
 * Diagnostics never share a stream with the report unless `--logdebug`
 * asks for it.
 */

use std::fs::File;
use std::io;
use std::path::Path;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::{DebugTarget, ReportConfig};
use crate::error::{ReportError, Result};

/// Initialize structured logging based on configuration
pub fn init_logging(config: &ReportConfig) -> Result<()> {
    let env_filter = build_filter(config)?;

    if let Some(ref log_path) = config.log_file {
        init_file_logging(log_path, env_filter)?;
    } else if config.debug == Some(DebugTarget::Stdout) {
        init_terminal_logging(env_filter, io::stdout);
    } else {
        init_terminal_logging(env_filter, io::stderr);
    }

    Ok(())
}

fn build_filter(config: &ReportConfig) -> Result<EnvFilter> {
    let log_level = config.effective_level();
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("mirror_speeds={}", log_level)))
        .map_err(|e| ReportError::Config(format!("Failed to create log filter: {}", e)))
}

/// Initialize compact logging to a terminal stream
fn init_terminal_logging<W>(env_filter: EnvFilter, writer: W)
where
    W: for<'w> fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    let fmt_layer = fmt::layer()
        .with_writer(writer)
        .without_time()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_span_events(FmtSpan::NONE)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

/// Initialize logging to a file
fn init_file_logging(log_path: &Path, env_filter: EnvFilter) -> Result<()> {
    let file = File::create(log_path)
        .map_err(|e| ReportError::Config(format!("Failed to create log file: {}", e)))?;

    let fmt_layer = fmt::layer()
        .with_writer(file)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(false)
        .json();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    Ok(())
}

/// Initialize logging with custom format for testing
#[cfg(test)]
pub fn init_test_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("mirror_speeds=debug"));

        let fmt_layer = fmt::layer().with_test_writer().with_target(false).compact();

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .ok(); // Ignore error if already initialized
    });
}
