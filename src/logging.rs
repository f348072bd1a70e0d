use crate::config::AppConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Dependencies that log every statement or connection at info
const QUIET_DEPENDENCIES: &[&str] = &["sqlx", "hyper", "reqwest"];

/// Default filter: `level` for payflow, warn for chatty dependencies.
fn filter_directives(level: &str) -> String {
    let mut directives = level.to_string();
    for dep in QUIET_DEPENDENCIES {
        directives.push_str(&format!(",{}=warn", dep));
    }
    directives
}

fn rotation(name: &str) -> Rotation {
    match name {
        "minutely" => Rotation::MINUTELY,
        "hourly" => Rotation::HOURLY,
        "daily" => Rotation::DAILY,
        _ => Rotation::NEVER,
    }
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_directives(level)))
}

/// Install the global subscriber for the service.
///
/// Text mode writes to the rolling file and stdout. JSON mode writes JSON
/// lines to both. Keep the returned guard alive for the lifetime of the
/// process or buffered lines are lost on exit.
pub fn init_logging(config: &AppConfig) -> WorkerGuard {
    let file_appender =
        RollingFileAppender::new(rotation(&config.rotation), &config.log_dir, &config.log_file);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let registry = tracing_subscriber::registry().with(env_filter(&config.log_level));

    if config.use_json {
        let file_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_writer(non_blocking)
            .with_ansi(false);
        let stdout_layer = fmt::layer().json().with_target(true).with_ansi(false);
        registry.with(file_layer).with(stdout_layer).init();
    } else {
        let file_layer = fmt::layer()
            .with_target(false)
            .with_writer(non_blocking)
            .with_ansi(false);
        let stdout_layer = fmt::layer().with_target(false).with_ansi(true);
        registry.with(file_layer).with(stdout_layer).init();
    }

    guard
}

/// Stderr-only subscriber for one-shot tools; stdout stays free for the report.
pub fn init_cli_logging(level: &str) {
    tracing_subscriber::registry()
        .with(env_filter(level))
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}
