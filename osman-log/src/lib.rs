//! Osman logging.
//!
//! Small structured logger shared by the Osman crates. Every record is one
//! line on stderr, rendered as JSON by default so that index migrations and
//! script uploads can be followed from log aggregation.
//!
//! # Usage
//!
//! ```rust
//! use osman_log::{debug, info, warn};
//!
//! info!("Creating index: {}", "articles-1");
//! debug!(target: "osman::reindex", "Inactive suffix: {}", 2);
//! warn!("Copy into {} was rejected", "articles-2");
//! ```
//!
//! # Environment Variables
//!
//! - `OSMAN_DEBUG=1` - shorthand for `OSMAN_LOG_LEVEL=debug`
//! - `OSMAN_LOG_LEVEL=trace|debug|info|warn|error|off`
//! - `OSMAN_LOG_FORMAT=json|pretty|compact`
//! - `OSMAN_LOG_TIMESTAMPS=1|0`

use once_cell::sync::OnceCell;
use serde::Serialize;
use std::io::Write;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};

// ============================================================================
// Levels and formats
// ============================================================================

/// Severity of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Level {
    /// Most verbose.
    Trace = 0,
    /// Diagnostic detail.
    Debug = 1,
    /// Normal operation.
    Info = 2,
    /// Something unexpected but recoverable.
    Warn = 3,
    /// Failure.
    Error = 4,
    /// Logging disabled.
    Off = 5,
}

impl Level {
    /// Upper-case level name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Off => "OFF",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Level::Trace,
            1 => Level::Debug,
            2 => Level::Info,
            3 => Level::Warn,
            4 => Level::Error,
            _ => Level::Off,
        }
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(Level::Trace),
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            "off" | "none" => Ok(Level::Off),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<log::Level> for Level {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Trace => Level::Trace,
            log::Level::Debug => Level::Debug,
            log::Level::Info => Level::Info,
            log::Level::Warn => Level::Warn,
            log::Level::Error => Level::Error,
        }
    }
}

/// Line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// One JSON object per line.
    Json,
    /// Human readable, full timestamp and bracketed target.
    Pretty,
    /// Short single-letter level.
    Compact,
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(Format::Json),
            "pretty" => Ok(Format::Pretty),
            "compact" => Ok(Format::Compact),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Logger configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Minimum level written.
    pub level: Level,
    /// Line format.
    pub format: Format,
    /// Prefix lines with a timestamp.
    pub timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::Info,
            format: Format::Json,
            timestamps: true,
        }
    }
}

impl LogConfig {
    /// Build a configuration from a variable lookup.
    ///
    /// Unknown or unparsable values fall back to the defaults.
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |name: &str| {
            lookup(name).map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        };

        let debug = flag("OSMAN_DEBUG").unwrap_or(false);

        let level = lookup("OSMAN_LOG_LEVEL")
            .and_then(|s| s.parse().ok())
            .unwrap_or(if debug { Level::Debug } else { Level::Info });

        let format = lookup("OSMAN_LOG_FORMAT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(Format::Json);

        Self {
            level,
            format,
            timestamps: flag("OSMAN_LOG_TIMESTAMPS").unwrap_or(true),
        }
    }

    /// Build a configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }
}

// ============================================================================
// Global state
// ============================================================================

static CONFIG: OnceCell<LogConfig> = OnceCell::new();

static LOG_LEVEL: AtomicU8 = AtomicU8::new(Level::Info as u8);

/// Initialize from the environment. Later calls are no-ops.
pub fn init() {
    init_with(LogConfig::from_env());
}

/// Initialize with an explicit configuration.
///
/// Returns `false` if the logger was already initialized.
pub fn init_with(config: LogConfig) -> bool {
    let level = config.level;
    if CONFIG.set(config).is_err() {
        return false;
    }
    LOG_LEVEL.store(level as u8, Ordering::SeqCst);
    true
}

/// Active configuration, initializing from the environment on first use.
pub fn config() -> &'static LogConfig {
    CONFIG.get_or_init(|| {
        let config = LogConfig::from_env();
        LOG_LEVEL.store(config.level as u8, Ordering::SeqCst);
        config
    })
}

/// Check if a level would be written.
#[inline]
pub fn is_level_enabled(level: Level) -> bool {
    config();
    level != Level::Off && level as u8 >= LOG_LEVEL.load(Ordering::Relaxed)
}

/// Current minimum level.
pub fn current_level() -> Level {
    config();
    Level::from_u8(LOG_LEVEL.load(Ordering::Relaxed))
}

/// Change the minimum level at runtime.
pub fn set_level(level: Level) {
    config();
    LOG_LEVEL.store(level as u8, Ordering::SeqCst);
    log::set_max_level(to_level_filter(level));
}

// ============================================================================
// Output
// ============================================================================

#[derive(Serialize)]
struct JsonLine<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
    level: &'a str,
    target: &'a str,
    message: &'a str,
}

/// Render one record as it would be written, without the trailing newline.
pub fn render(level: Level, target: &str, message: &str, config: &LogConfig) -> String {
    match config.format {
        Format::Json => {
            let line = JsonLine {
                timestamp: config
                    .timestamps
                    .then(|| chrono::Utc::now().to_rfc3339()),
                level: level.as_str(),
                target,
                message,
            };
            serde_json::to_string(&line).unwrap_or_else(|_| message.to_string())
        }
        Format::Pretty => {
            let mut line = String::new();
            if config.timestamps {
                line.push_str(&chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f ").to_string());
            }
            line.push_str(&format!("{:5} ", level.as_str()));
            if !target.is_empty() {
                line.push_str(&format!("[{}] ", target));
            }
            line.push_str(message);
            line
        }
        Format::Compact => {
            let mut line = String::new();
            if config.timestamps {
                line.push_str(&chrono::Local::now().format("%H:%M:%S ").to_string());
            }
            line.push(level.as_str().chars().next().unwrap_or('?'));
            line.push(' ');
            if !target.is_empty() {
                line.push_str(target);
                line.push_str(": ");
            }
            line.push_str(message);
            line
        }
    }
}

/// Write a record. Used by the macros.
#[doc(hidden)]
pub fn log(level: Level, target: &str, message: &str) {
    if !is_level_enabled(level) {
        return;
    }
    let line = render(level, target, message, config());
    let mut stderr = std::io::stderr().lock();
    let _ = writeln!(stderr, "{}", line);
}

// ============================================================================
// `log` crate bridge
// ============================================================================

struct Bridge;

impl log::Log for Bridge {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        is_level_enabled(metadata.level().into())
    }

    fn log(&self, record: &log::Record<'_>) {
        if self.enabled(record.metadata()) {
            log(record.level().into(), record.target(), &record.args().to_string());
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static BRIDGE: Bridge = Bridge;

fn to_level_filter(level: Level) -> log::LevelFilter {
    match level {
        Level::Trace => log::LevelFilter::Trace,
        Level::Debug => log::LevelFilter::Debug,
        Level::Info => log::LevelFilter::Info,
        Level::Warn => log::LevelFilter::Warn,
        Level::Error => log::LevelFilter::Error,
        Level::Off => log::LevelFilter::Off,
    }
}

/// Route records emitted through the `log` facade (HTTP client stack,
/// dependencies) into the Osman sink.
pub fn install_log_bridge() -> Result<(), log::SetLoggerError> {
    log::set_logger(&BRIDGE)?;
    log::set_max_level(to_level_filter(current_level()));
    Ok(())
}

// ============================================================================
// Macros
// ============================================================================

/// Log a trace message.
#[macro_export]
macro_rules! trace {
    (target: $target:expr, $($arg:tt)+) => {
        if $crate::is_level_enabled($crate::Level::Trace) {
            $crate::log($crate::Level::Trace, $target, &format!($($arg)+));
        }
    };
    ($($arg:tt)+) => {
        $crate::trace!(target: module_path!(), $($arg)+)
    };
}

/// Log a debug message.
///
/// Written when `OSMAN_DEBUG=1` or `OSMAN_LOG_LEVEL` is `debug` or lower.
#[macro_export]
macro_rules! debug {
    (target: $target:expr, $($arg:tt)+) => {
        if $crate::is_level_enabled($crate::Level::Debug) {
            $crate::log($crate::Level::Debug, $target, &format!($($arg)+));
        }
    };
    ($($arg:tt)+) => {
        $crate::debug!(target: module_path!(), $($arg)+)
    };
}

/// Log an info message.
#[macro_export]
macro_rules! info {
    (target: $target:expr, $($arg:tt)+) => {
        if $crate::is_level_enabled($crate::Level::Info) {
            $crate::log($crate::Level::Info, $target, &format!($($arg)+));
        }
    };
    ($($arg:tt)+) => {
        $crate::info!(target: module_path!(), $($arg)+)
    };
}

/// Log a warning.
#[macro_export]
macro_rules! warn {
    (target: $target:expr, $($arg:tt)+) => {
        if $crate::is_level_enabled($crate::Level::Warn) {
            $crate::log($crate::Level::Warn, $target, &format!($($arg)+));
        }
    };
    ($($arg:tt)+) => {
        $crate::warn!(target: module_path!(), $($arg)+)
    };
}

/// Log an error.
#[macro_export]
macro_rules! error {
    (target: $target:expr, $($arg:tt)+) => {
        if $crate::is_level_enabled($crate::Level::Error) {
            $crate::log($crate::Level::Error, $target, &format!($($arg)+));
        }
    };
    ($($arg:tt)+) => {
        $crate::error!(target: module_path!(), $($arg)+)
    };
}
