use {super::*, tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling}};

/// Initializes tracing: plain stderr output by default, or a daily-rolling file under
/// `logdir` when one is given. Density follows severity: info for lifecycle events,
/// debug for per-share/per-frame detail, warn for recoverable protocol violations,
/// error for unrecoverable bootstrap failures.
pub(crate) fn init(logdir: Option<&str>) -> WorkerGuard {
    let filter = EnvFilter::from_default_env();

    match logdir {
        Some(dir) => {
            let appender = rolling::daily(dir, "agent.log");
            let (writer, guard) = non_blocking(appender);

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();

            guard
        }
        None => {
            let (writer, guard) = non_blocking(std::io::stderr());

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .init();

            guard
        }
    }
}
