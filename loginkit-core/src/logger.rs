//! Logging hooks the host application can plug into the bridge.

use std::sync::{Arc, OnceLock};

/// Trait representing a logger that can log messages at various levels.
///
/// This trait should be implemented by any host that wants to receive the bridge's
/// log messages. It is exported via `UniFFI` for use in foreign languages.
///
/// # Examples
///
/// ```rust
/// use loginkit_core::logger::{Logger, LogLevel};
///
/// struct MyLogger;
///
/// impl Logger for MyLogger {
///     fn log(&self, level: LogLevel, message: String) {
///         println!("[{:?}] {}", level, message);
///     }
/// }
/// ```
///
/// ## Kotlin
///
/// ```kotlin
/// object LoginKitLogger : Logger {
///     override fun log(level: LogLevel, message: String) {
///         Log.println(level.toAndroid(), "loginkit", message)
///     }
/// }
///
/// setLogger(LoginKitLogger) // Call this only once!!!
/// ```
#[uniffi::export(with_foreign)]
pub trait Logger: Sync + Send {
    /// Logs a message at the specified log level.
    ///
    /// # Arguments
    ///
    /// * `level` - The severity level of the log message.
    /// * `message` - The log message to be recorded.
    fn log(&self, level: LogLevel, message: String);
}

/// Enumeration of possible log levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum LogLevel {
    /// Designates very low priority, often extremely detailed messages.
    Trace,
    /// Designates lower priority debugging information.
    Debug,
    /// Designates informational messages that highlight the progress of the application.
    Info,
    /// Designates potentially harmful situations.
    Warn,
    /// Designates error events that might still allow the application to continue running.
    Error,
}

/// Forwards `log` records to the host-provided [`Logger`].
struct ForeignLogger;

impl log::Log for ForeignLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        if !should_forward(record.level(), record.module_path()) {
            return;
        }

        if let Some(logger) = LOGGER_INSTANCE.get() {
            logger.log(log_level(record.level()), format!("{}", record.args()));
        } else {
            eprintln!("Logger not set: {}", record.args());
        }
    }

    fn flush(&self) {}
}

/// Debug and Trace records from dependencies (reqwest, hyper, rustls) are noise for
/// the host; only the bridge's own ones go through.
fn should_forward(level: log::Level, module_path: Option<&str>) -> bool {
    let is_from_loginkit = module_path.is_some_and(|path| path.starts_with("loginkit"));
    let is_debug_or_trace = level == log::Level::Debug || level == log::Level::Trace;
    !is_debug_or_trace || is_from_loginkit
}

const fn log_level(level: log::Level) -> LogLevel {
    match level {
        log::Level::Error => LogLevel::Error,
        log::Level::Warn => LogLevel::Warn,
        log::Level::Info => LogLevel::Info,
        log::Level::Debug => LogLevel::Debug,
        log::Level::Trace => LogLevel::Trace,
    }
}

static LOGGER_INSTANCE: OnceLock<Arc<dyn Logger>> = OnceLock::new();

/// Sets the global logger.
///
/// Should be called once, before the first bridge is created. Later calls keep the
/// first logger and print a notice.
#[uniffi::export]
pub fn set_logger(logger: Arc<dyn Logger>) {
    if LOGGER_INSTANCE.set(logger).is_err() {
        println!("Logger already set");
    }

    if let Err(e) = init_logger() {
        eprintln!("Failed to set logger: {e}");
    }
}

fn init_logger() -> Result<(), log::SetLoggerError> {
    static LOGGER: ForeignLogger = ForeignLogger;
    log::set_logger(&LOGGER)?;
    log::set_max_level(log::LevelFilter::Trace);
    Ok(())
}

/// Shortens an identity token for logs. Tokens are bearer credentials and never
/// appear in full.
pub(crate) fn redact(token: &str) -> String {
    let prefix: String = token.chars().take(10).collect();
    format!("{prefix}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_debug_records_are_dropped() {
        assert!(!should_forward(log::Level::Debug, Some("hyper::proto")));
        assert!(!should_forward(log::Level::Trace, None));
        assert!(should_forward(log::Level::Debug, Some("loginkit_core::bridge")));
        assert!(should_forward(log::Level::Warn, Some("hyper::proto")));
    }

    #[test]
    fn test_redact_keeps_prefix_only() {
        let token = "eyJhbGciOiJSUzI1NiJ9.payload.signature";
        let redacted = redact(token);
        assert_eq!(redacted, "eyJhbGciOi...");
        assert!(!redacted.contains("payload"));
    }
}
