//! Structured logging plumbing shared by all crates in the workspace.
//!
//! Re-exports the `slog` surface so downstream code can write
//! `logging::debug!(log, ...)` and hold `logging::Logger` values without
//! depending on `slog` directly.

pub use slog::{crit, debug, error, info, o, trace, warn, Discard, Drain, Logger};

use sloggers::{Config, LoggerConfig};

const DEFAULT_CONFIG: &str = r#"
type = "terminal"
level = "debug"
destination = "stderr"
"#;

/// Builds the root logger from a TOML logger configuration snippet.
pub fn from_toml(config: &str) -> Result<Logger, String> {
    let config: LoggerConfig = serdeconv::from_toml_str(config).map_err(|e| e.to_string())?;
    config.build_logger().map_err(|e| e.to_string())
}

/// Builds the default terminal root logger.
pub fn init() -> Logger {
    from_toml(DEFAULT_CONFIG).expect("Error building default logger")
}

/// A logger that swallows everything. Used by tests and as the fallback
/// when no parent logger is supplied.
pub fn discard() -> Logger {
    Logger::root(Discard, o!())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_builds() {
        let _ = init();
    }

    #[test]
    fn test_discard_accepts_records() {
        let log = discard();
        debug!(log, "no-op"; "key" => 1);
    }

    #[test]
    fn test_bad_config_is_rejected() {
        assert!(from_toml("type = \"no-such-sink\"").is_err());
    }
}
