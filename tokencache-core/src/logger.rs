//! Bridge from Rust logging to a host-provided logger.
//!
//! The engine logs through `tracing`, which forwards to the `log` facade
//! when no subscriber is installed. [`set_logger`] installs a `log::Log`
//! implementation that hands each record to the host.

use std::sync::{Arc, OnceLock};

/// Receives log messages from the engine.
///
/// # Examples
///
/// ```rust
/// use tokencache_core::logger::{LogLevel, Logger};
///
/// struct StderrLogger;
///
/// impl Logger for StderrLogger {
///     fn log(&self, level: LogLevel, message: String) {
///         eprintln!("[{level:?}] {message}");
///     }
/// }
/// ```
///
/// ## Swift
///
/// ```swift
/// final class CacheLogger: TokenCache.Logger {
///     func log(level: TokenCache.LogLevel, message: String) {
///         os_log("%{public}@", message)
///     }
/// }
///
/// TokenCache.setLogger(logger: CacheLogger()) // once, at startup
/// ```
#[cfg_attr(feature = "ffi", uniffi::export(with_foreign))]
pub trait Logger: Sync + Send {
    /// Logs `message` at `level`.
    fn log(&self, level: LogLevel, message: String);
}

/// Severity of a log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum LogLevel {
    /// Very detailed tracing.
    Trace,
    /// Per-operation diagnostics.
    Debug,
    /// Progress information.
    Info,
    /// Recoverable anomalies, such as unreadable records.
    Warn,
    /// Failed operations.
    Error,
}

impl From<log::Level> for LogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Self::Error,
            log::Level::Warn => Self::Warn,
            log::Level::Info => Self::Info,
            log::Level::Debug => Self::Debug,
            log::Level::Trace => Self::Trace,
        }
    }
}

static LOGGER_INSTANCE: OnceLock<Arc<dyn Logger>> = OnceLock::new();

struct ForeignLogger;

impl log::Log for ForeignLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        // Debug and trace output from dependencies is noise for the host.
        metadata.level() <= log::Level::Info || metadata.target().starts_with("tokencache")
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if let Some(logger) = LOGGER_INSTANCE.get() {
            logger.log(record.level().into(), record.args().to_string());
        }
    }

    fn flush(&self) {}
}

/// Installs `logger` as the receiver of engine log messages.
///
/// Only the first call takes effect; later calls are ignored with a
/// warning routed to the logger already installed.
#[cfg_attr(feature = "ffi", uniffi::export)]
pub fn set_logger(logger: Arc<dyn Logger>) {
    if LOGGER_INSTANCE.set(logger).is_err() {
        log::warn!("logger already set; ignoring");
        return;
    }
    static BRIDGE: ForeignLogger = ForeignLogger;
    match log::set_logger(&BRIDGE) {
        Ok(()) => log::set_max_level(log::LevelFilter::Trace),
        Err(err) => {
            // Another `log` implementation owns the facade; forward nothing.
            if let Some(logger) = LOGGER_INSTANCE.get() {
                logger.log(LogLevel::Warn, format!("failed to install logger: {err}"));
            }
        }
    }
}
