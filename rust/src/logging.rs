//! Logging macros for the playout core with verbosity level control.
//!
//! Records go through the `log` facade; the verbosity threshold decides
//! whether a record is emitted at all, so callers can keep chatty traces
//! in hot paths such as projection sampling.
//! - 0: SILENT (warnings and errors only, logged unconditionally)
//! - 1: CHANGES (plan rebuilds, playout transitions, auto-fill edits)
//! - 2: CHECKS (reconciliation slot decisions, skipped refreshes)
//! - 3: DEBUG (per-part schedule details)

/// Verbosity level constants.
pub const VERBOSITY_SILENT: u8 = 0;
pub const VERBOSITY_CHANGES: u8 = 1;
pub const VERBOSITY_CHECKS: u8 = 2;
pub const VERBOSITY_DEBUG: u8 = 3;

/// Log at CHANGES level (verbosity >= 1), as `log::info!`.
///
/// Used for: playout transitions, rebuilt plans, auto-fill results.
#[macro_export]
macro_rules! log_changes {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_CHANGES {
            ::log::info!($($arg)*);
        }
    };
}

/// Log at CHECKS level (verbosity >= 2), as `log::debug!`.
///
/// Used for: merge slot decisions, refresh skips, rate-limit coalescing.
#[macro_export]
macro_rules! log_checks {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_CHECKS {
            ::log::debug!($($arg)*);
        }
    };
}

/// Log at DEBUG level (verbosity >= 3), as `log::trace!`.
///
/// Used for: per-part scheduled windows.
#[macro_export]
macro_rules! log_debug {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_DEBUG {
            ::log::trace!($($arg)*);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_ordering() {
        assert!(VERBOSITY_SILENT < VERBOSITY_CHANGES);
        assert!(VERBOSITY_CHANGES < VERBOSITY_CHECKS);
        assert!(VERBOSITY_CHECKS < VERBOSITY_DEBUG);
    }

    #[test]
    fn test_log_macros_compile() {
        // No logger installed: records are dropped by the facade
        let verbosity = VERBOSITY_DEBUG;
        log_changes!(verbosity, "test {}", 1);
        log_checks!(verbosity, "test {}", 2);
        log_debug!(verbosity, "test {}", 3);
    }
}
