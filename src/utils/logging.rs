//! Scoped logging macros gated by a module-level `ENABLE_LOGS` flag.
//!
//! Every module that uses them defines two constants:
//! ```rust,ignore
//! const ENABLE_LOGS: bool = true;
//! const LOG_SCOPE: &str = "gateway";
//!
//! use crate::{log_info, log_warn};
//!
//! log_info!("remote evaluation finished in {}ms", 120);
//! // => "[gateway] remote evaluation finished in 120ms"
//! ```

/// Info-level line prefixed with the calling module's `LOG_SCOPE`.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!("[{}] {}", LOG_SCOPE, format_args!($($arg)*));
        }
    };
}

/// Warn-level line prefixed with the calling module's `LOG_SCOPE`.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!("[{}] {}", LOG_SCOPE, format_args!($($arg)*));
        }
    };
}

/// Error-level line prefixed with the calling module's `LOG_SCOPE`.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!("[{}] {}", LOG_SCOPE, format_args!($($arg)*));
        }
    };
}

/// Debug-level line, used for orchestrator phase transitions.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!("[{}] {}", LOG_SCOPE, format_args!($($arg)*));
        }
    };
}

/// Initialise the global logger once. Reads `RUST_LOG`, defaults to `info`.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init();
}
