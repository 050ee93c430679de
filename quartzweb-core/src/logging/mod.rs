//! Logging setup
//!
//! All crate code logs through the standard `log` macros. Binaries call
//! [`init_logging`] once at startup to route those records to stderr via
//! `env_logger`.
//!
//! # Example
//!
//! ```rust,no_run
//! use quartzweb_core::config::LoggingConfig;
//!
//! quartzweb_core::logging::init_logging(&LoggingConfig::default());
//! log::info!("Server starting on port {}", 8000);
//! ```

use std::sync::Once;

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// Initialize the global logger
///
/// `RUST_LOG`, when set, takes precedence over the configured level. It's safe
/// to call multiple times; only the first call has an effect.
pub fn init_logging(config: &LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();
        builder.parse_filters(&effective_filter(config, std::env::var("RUST_LOG").ok()));
        builder.format_timestamp_millis().format_module_path(false);
        if let Err(e) = builder.try_init() {
            eprintln!("Logger already installed: {}", e);
        }
    });
}

fn effective_filter(config: &LoggingConfig, rust_log: Option<String>) -> String {
    match rust_log {
        Some(filter) if !filter.trim().is_empty() => filter,
        _ => config.level.to_ascii_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_log_wins() {
        let config = LoggingConfig { level: "WARN".to_string() };
        assert_eq!(effective_filter(&config, None), "warn");
        assert_eq!(effective_filter(&config, Some("  ".into())), "warn");
        assert_eq!(effective_filter(&config, Some("quartzweb_core=trace".into())), "quartzweb_core=trace");
    }

    #[test]
    fn test_init_twice() {
        let config = LoggingConfig::default();
        init_logging(&config);
        init_logging(&config);
        log::debug!("logger initialized");
    }
}
