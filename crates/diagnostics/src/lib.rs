// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Logging setup shared by the extfs crates
//!
//! Usage:
//! - Set EXTFS_LOG=off (default) - no logs
//! - Set EXTFS_LOG=info - session flushes and discards
//! - Set EXTFS_LOG=debug - lazy loads, overlay creation, identifier allocation

use std::sync::Once;

// Re-export emit so macros can use it
pub use emit;

static INIT: Once = Once::new();

/// Environment variable holding the minimum level.
pub const LOG_ENV: &str = "EXTFS_LOG";

fn level_filter(name: &str) -> Option<emit::Level> {
    match name {
        "debug" => Some(emit::Level::Debug),
        "info" => Some(emit::Level::Info),
        "warn" => Some(emit::Level::Warn),
        "error" => Some(emit::Level::Error),
        _ => None,
    }
}

/// Initialize diagnostics from the EXTFS_LOG environment variable.
///
/// Call once at startup. Later calls are ignored.
pub fn init_diagnostics() {
    INIT.call_once(|| {
        let requested = std::env::var(LOG_ENV).unwrap_or_else(|_| "off".to_string());
        if requested == "off" {
            return;
        }

        let level = match level_filter(&requested) {
            Some(level) => level,
            None => {
                // Bootstrap warning, the emitter is not running yet
                eprintln!("Warning: Unknown {LOG_ENV} value '{requested}', using 'info'");
                emit::Level::Info
            }
        };

        let rt = emit::setup()
            .emit_to(emit_term::stderr())
            .emit_when(emit::level::min_filter(level))
            .init();

        // The runtime lives for the rest of the process
        std::mem::forget(rt);
    });
}

/// Log session-level operations (flush, discard, provider login).
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::emit::info!($($arg)*)
    };
}

/// Log detailed diagnostics (lazy loads, overlay lookups, pending registrations).
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::emit::debug!($($arg)*)
    };
}

/// Log recoverable conditions (skipped iteration elements, lost allocation races).
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::emit::warn!($($arg)*)
    };
}

/// Log failures that abort an operation.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::emit::error!($($arg)*)
    };
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::emit::info!($($arg)*)
    };
}

#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::emit::debug!($($arg)*)
    };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::emit::warn!($($arg)*)
    };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::emit::error!($($arg)*)
    };
}

pub use init_diagnostics as init;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_safe_to_call_multiple_times() {
        init_diagnostics();
        init_diagnostics();
    }

    #[test]
    fn test_level_filter_names() {
        assert_eq!(level_filter("debug"), Some(emit::Level::Debug));
        assert_eq!(level_filter("warn"), Some(emit::Level::Warn));
        assert_eq!(level_filter("verbose"), None);
    }

    #[test]
    fn test_macros_compile() {
        let path = "/a/b";
        log_info!("Flushed {path}", path);
        log_debug!("Lazy load of {name}", name: "title");
        log_warn!("Skipped element");
        log_error!("Flush failed");

        info!("Flushed {path}", path);
        debug!("Pending changes: {count}", count: 3);
        warn!("Skipped element");
        error!("Flush failed");
    }
}
