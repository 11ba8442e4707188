//! Fatal error channel.
//!
//! Fatal reports signal violated internal invariants or unreachable states. They
//! never return: the report is logged, handed to the installed handler (or
//! written to stderr when none is installed) and the process is aborted.
//!
//! Embedders and test harnesses can intercept reports with
//! [`install_fatal_error_handler`]. A handler that panics turns the report into an
//! unwinding panic instead of an abort, which is how tests observe fatal paths.
use std::{fmt, sync::Arc};

use log::error;
use parking_lot::{RwLock, const_rwlock};

/// A fatal report, as handed to the installed handler.
#[derive(Debug, Clone, Copy)]
pub struct FatalReport<'a> {
    pub reason: &'a str,
    pub file: Option<&'static str>,
    pub line: Option<u32>,
}

impl fmt::Display for FatalReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reason)?;
        if let Some(file) = self.file {
            write!(f, " at {}:{}", file, self.line.unwrap_or(0))?;
        }
        Ok(())
    }
}

pub type FatalErrorHandler = dyn Fn(&FatalReport<'_>) + Send + Sync;

static FATAL_HANDLER: RwLock<Option<Arc<FatalErrorHandler>>> = const_rwlock(None);

/// Restores the previously installed handler when dropped.
#[must_use = "dropping the guard immediately uninstalls the handler"]
pub struct FatalErrorHandlerGuard {
    previous: Option<Arc<FatalErrorHandler>>,
}

impl Drop for FatalErrorHandlerGuard {
    fn drop(&mut self) {
        *FATAL_HANDLER.write() = self.previous.take();
    }
}

/// Install `handler` as the process-wide fatal error handler.
///
/// The handler stays active until the returned guard is dropped. Guards must be
/// dropped in reverse installation order.
pub fn install_fatal_error_handler(
    handler: impl Fn(&FatalReport<'_>) + Send + Sync + 'static,
) -> FatalErrorHandlerGuard {
    let previous = FATAL_HANDLER.write().replace(Arc::new(handler));
    FatalErrorHandlerGuard { previous }
}

/// Whether a custom fatal error handler is currently installed.
pub fn has_fatal_error_handler() -> bool {
    FATAL_HANDLER.read().is_some()
}

fn dispatch(report: FatalReport<'_>) -> ! {
    error!("fatal error: {}", report);

    // Release the lock before calling out, the handler may unwind.
    let handler = FATAL_HANDLER.read().clone();
    match handler {
        Some(handler) => handler(&report),
        None => eprintln!("hyir: fatal error: {}", report),
    }

    std::process::abort()
}

/// Report a fatal error and terminate.
pub fn report_fatal_error(reason: impl AsRef<str>) -> ! {
    dispatch(FatalReport {
        reason: reason.as_ref(),
        file: None,
        line: None,
    })
}

/// Report that an unreachable code path was executed, then terminate.
///
/// Prefer the [`hy_unreachable!`](crate::hy_unreachable) macro which fills in the location.
pub fn unreachable_internal(message: Option<&str>, file: &'static str, line: u32) -> ! {
    let reason = match message {
        Some(message) => format!("UNREACHABLE executed: {}", message),
        None => "UNREACHABLE executed".to_string(),
    };
    dispatch(FatalReport {
        reason: &reason,
        file: Some(file),
        line: Some(line),
    })
}

/// Report a fatal error built from format arguments.
#[macro_export]
macro_rules! hy_fatal {
    (
        $( $arg:tt )*
    ) => {
        $crate::utils::fatal::report_fatal_error(format!($($arg)*))
    };
}

/// Mark a code path as unreachable. Reports the source location.
#[macro_export]
macro_rules! hy_unreachable {
    () => {
        $crate::utils::fatal::unreachable_internal(None, file!(), line!())
    };
    (
        $( $arg:tt )+
    ) => {
        $crate::utils::fatal::unreachable_internal(Some(format!($($arg)+).as_str()), file!(), line!())
    };
}

/// Mark a code path as not implemented yet.
#[macro_export]
macro_rules! hy_not_implemented {
    () => {
        $crate::hy_unreachable!("Not implemented")
    };
}
