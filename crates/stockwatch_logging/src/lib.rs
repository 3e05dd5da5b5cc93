#![deny(missing_docs)]
//! Shared logging utilities for the stockwatch workspace.
//!
//! This crate provides the `watch_*` logging macros used across the codebase
//! and a minimal test initializer for the global logger.

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! watch_trace {
    ($($arg:tt)*) => {{
        log::trace!($($arg)*);
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! watch_info {
    ($($arg:tt)*) => {{
        log::info!($($arg)*);
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! watch_debug {
    ($($arg:tt)*) => {{
        log::debug!($($arg)*);
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! watch_warn {
    ($($arg:tt)*) => {{
        log::warn!($($arg)*);
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! watch_error {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
    }};
}

/// Formats a target identity the same way in every log line, so a single
/// target can be followed through fetch, locate and notify messages.
pub fn target_tag(site: &str, label: &str, element_path: &[String], monitor_text: &str) -> String {
    format!(
        "site={site} label={label} path={} text='{monitor_text}'",
        element_path.join(">")
    )
}

/// Initializes a simple terminal logger for use in tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_tag_joins_path_with_arrows() {
        let path = vec!["div".to_string(), "button".to_string()];
        assert_eq!(
            target_tag("shop", "widget", &path, "Add to Cart"),
            "site=shop label=widget path=div>button text='Add to Cart'"
        );
    }

    #[test]
    fn macros_expand_without_a_logger() {
        initialize_for_tests();
        watch_trace!("trace {}", 1);
        watch_debug!("debug {}", 2);
        watch_info!("info {}", 3);
        watch_warn!("warn {}", 4);
        watch_error!("error {}", 5);
    }
}
