//! Logging utilities for CLI output

/// Log level for CLI output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Suppress all output
    Quiet,
    /// Normal output level
    Normal,
    /// Verbose output with additional details
    Verbose,
}

impl LogLevel {
    /// Default `tracing` filter directive for this level.
    pub fn filter_directive(self) -> &'static str {
        match self {
            LogLevel::Quiet => "warn",
            LogLevel::Normal => "info",
            LogLevel::Verbose => "debug",
        }
    }
}

/// Log a message if the current level permits it
pub fn log(level: LogLevel, required: LogLevel, msg: &str) {
    if level != LogLevel::Quiet && (level == required || required == LogLevel::Normal) {
        println!("{msg}");
    }
}

/// Install the global `tracing` subscriber on stderr.
///
/// `RUST_LOG` overrides the level's default filter. A second call is a no-op.
pub fn init_tracing(level: LogLevel) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.filter_directive()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directive() {
        assert_eq!(LogLevel::Quiet.filter_directive(), "warn");
        assert_eq!(LogLevel::Normal.filter_directive(), "info");
        assert_eq!(LogLevel::Verbose.filter_directive(), "debug");
    }

    #[test]
    fn test_init_tracing_twice_is_harmless() {
        init_tracing(LogLevel::Quiet);
        init_tracing(LogLevel::Verbose);
    }
}
