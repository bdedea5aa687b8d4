use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::Config;

const LOG_FILE_PREFIX: &str = "onionpath.log";

/// Install the global tracing subscriber
///
/// Logs go to stdout, and to a daily rolling file under `log_dir` when one
///  is configured. `RUST_LOG` overrides the configured level.
///
/// The returned guards flush buffered log lines on drop; hold them for the
///  life of the process.
pub fn init_logging(config: &Config) -> Vec<WorkerGuard> {
    let mut guards = Vec::new();

    let (stdout_writer, guard) = tracing_appender::non_blocking(std::io::stdout());
    guards.push(guard);
    let stdout_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(stdout_writer)
        .with_filter(env_filter(config));

    let file_layer = config.log_dir.as_ref().map(|dir| {
        let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
        let (file_writer, guard) = tracing_appender::non_blocking(appender);
        guards.push(guard);
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_writer)
            .with_filter(env_filter(config))
    });

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .init();

    register_panic_logger();
    guards
}

fn env_filter(config: &Config) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(config.log_level.into())
        .from_env_lossy()
}

/// Registers a panic hook that logs panics using the `tracing` crate
fn register_panic_logger() {
    std::panic::set_hook(Box::new(|panic| match panic.location() {
        Some(loc) => {
            tracing::error!(
                message = %panic,
                panic.file = loc.file(),
                panic.line = loc.line(),
                panic.column = loc.column(),
            );
        }
        None => tracing::error!(message = %panic),
    }));
}
