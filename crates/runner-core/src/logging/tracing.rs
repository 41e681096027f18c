use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{filter::LevelFilter, fmt, EnvFilter};

const DIAGNOSTIC_LOG_FILE: &str = "agent-runner.log";

/// Keeps the non-blocking diagnostic writer alive. Dropping it flushes any
/// buffered lines, so hold it for the lifetime of the process.
pub struct TracingGuard {
    _worker: WorkerGuard,
    log_file: Option<PathBuf>,
}

impl TracingGuard {
    /// Diagnostic log file, or `None` when writing to stderr
    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }
}

/// Initialize process diagnostics.
///
/// Diagnostics go to `<log_dir>/agent-runner.log` when a directory is given,
/// otherwise to stderr. The level comes from `LOG_LEVEL`, then `RUST_LOG`,
/// falling back to `default_level`.
///
/// Examples of valid LOG_LEVEL values:
/// - "debug"
/// - "runner_web=trace,runner_core=debug"
///
/// Installing the subscriber a second time is a no-op.
pub fn init_tracing(log_dir: Option<&Path>, default_level: &str) -> TracingGuard {
    let (writer, worker, log_file, ansi) = match log_dir {
        Some(dir) => {
            let appender = RollingFileAppender::new(Rotation::NEVER, dir, DIAGNOSTIC_LOG_FILE);
            let (writer, worker) = tracing_appender::non_blocking(appender);
            (writer, worker, Some(dir.join(DIAGNOSTIC_LOG_FILE)), false)
        }
        None => {
            let (writer, worker) = tracing_appender::non_blocking(std::io::stderr());
            (writer, worker, None, true)
        }
    };

    let log_level_str = std::env::var("LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| default_level.to_string());

    install(writer, ansi, &log_level_str, default_level);

    TracingGuard {
        _worker: worker,
        log_file,
    }
}

fn install(writer: NonBlocking, ansi: bool, log_level_str: &str, default_level: &str) {
    // Directives such as "runner_web=debug,info" need EnvFilter
    let is_complex_directive = log_level_str.contains('=') || log_level_str.contains(',');

    let result = if is_complex_directive {
        let env_filter = EnvFilter::try_new(log_level_str)
            .unwrap_or_else(|_| EnvFilter::new(default_level));

        fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .with_ansi(ansi)
            .with_writer(writer)
            .with_file(true)
            .with_line_number(true)
            .try_init()
    } else {
        fmt::Subscriber::builder()
            .with_max_level(parse_level(log_level_str))
            .with_ansi(ansi)
            .with_writer(writer)
            .with_file(true)
            .with_line_number(true)
            .try_init()
    };

    if let Err(e) = result {
        eprintln!("Tracing already initialized: {}", e);
    }
}

fn parse_level(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        "off" => LevelFilter::OFF,
        _ => LevelFilter::INFO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("DEBUG"), LevelFilter::DEBUG);
        assert_eq!(parse_level("warn"), LevelFilter::WARN);
        assert_eq!(parse_level("nonsense"), LevelFilter::INFO);
    }
}
