use std::panic::{self, AssertUnwindSafe};

use hyir::{
    Context, Module, hy_fatal, hy_not_implemented, hy_unreachable,
    utils::fatal::{FatalReport, has_fatal_error_handler, install_fatal_error_handler},
};
use parking_lot::{Mutex, const_mutex};

// The handler is process-wide, tests installing one must not overlap.
static HANDLER_LOCK: Mutex<()> = const_mutex(());

#[derive(Debug, Clone, PartialEq)]
struct Captured {
    reason: String,
    file: Option<&'static str>,
    line: Option<u32>,
}

impl From<&FatalReport<'_>> for Captured {
    fn from(report: &FatalReport<'_>) -> Self {
        Self {
            reason: report.reason.to_string(),
            file: report.file,
            line: report.line,
        }
    }
}

/// Run `f` with a handler that turns fatal reports into panics carrying the report.
fn intercept(f: impl FnOnce()) -> Captured {
    let _guard = install_fatal_error_handler(|report| {
        panic::panic_any(Captured::from(report));
    });
    let payload = panic::catch_unwind(AssertUnwindSafe(f)).unwrap_err();
    match payload.downcast::<Captured>() {
        Ok(captured) => *captured,
        Err(_) => panic!("fatal handler was not invoked"),
    }
}

#[test]
fn unreachable_reports_location() {
    let _lock = HANDLER_LOCK.lock();
    let line = line!() + 1;
    let captured = intercept(|| hy_unreachable!("bad opcode {}", 42));

    assert_eq!(captured.reason, "UNREACHABLE executed: bad opcode 42");
    assert_eq!(captured.file, Some(file!()));
    assert_eq!(captured.line, Some(line));
}

#[test]
fn not_implemented_goes_through_unreachable() {
    let _lock = HANDLER_LOCK.lock();
    let captured = intercept(|| hy_not_implemented!());
    assert_eq!(captured.reason, "UNREACHABLE executed: Not implemented");
    assert!(captured.file.is_some());
}

#[test]
fn fatal_has_no_location() {
    let _lock = HANDLER_LOCK.lock();
    let captured = intercept(|| hy_fatal!("out of {}", "ids"));
    assert_eq!(captured.reason, "out of ids");
    assert_eq!(captured.line, None);
}

fn fire() {
    hy_fatal!("boom")
}

#[test]
fn guards_restore_previous_handlers() {
    let _lock = HANDLER_LOCK.lock();
    assert!(!has_fatal_error_handler());
    {
        let _outer = install_fatal_error_handler(|_| panic!("outer"));
        {
            let _inner = install_fatal_error_handler(|_| panic!("inner"));
            let payload = panic::catch_unwind(fire).unwrap_err();
            assert_eq!(payload.downcast_ref::<&str>(), Some(&"inner"));
        }
        let payload = panic::catch_unwind(fire).unwrap_err();
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"outer"));
        assert!(has_fatal_error_handler());
    }
    assert!(!has_fatal_error_handler());
}

#[test]
fn module_invariants_stay_intact_after_recoverable_errors() {
    // Recoverable failures never reach the fatal path.
    let _lock = HANDLER_LOCK.lock();
    let _guard = install_fatal_error_handler(|report| panic!("unexpected fatal: {}", report));

    let mut module = Module::new("m", Context::new());
    assert!(module.set_data_layout_str("garbage").is_err());
    assert!(module.materialize_global("missing").is_err());
    module.get_or_insert_named_metadata("dbg");
    module.get_or_insert_named_metadata("dbg");
    assert_eq!(module.named_metadata().count(), 1);
}
