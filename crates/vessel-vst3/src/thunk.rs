//! The boundary every native call crosses.
//!
//! Thunks wrap their body in [`guard`] (for methods returning a status) or
//! [`guard_value`] (for methods returning a count, a value or a pointer).
//! A panic inside the body is caught, logged and turned into
//! `kInternalError` or the given fallback, so unwinding never reaches a host
//! stack frame.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use vst3::Steinberg::{kInternalError, kResultOk, tresult};

use crate::trace;

/// Run a status-returning body.
#[inline]
pub(crate) fn guard(operation: &'static str, body: impl FnOnce() -> tresult) -> tresult {
    let tracer = trace::tracer();
    if let Some(tracer) = tracer {
        tracer.enter(operation);
    }

    let status = match catch_unwind(AssertUnwindSafe(body)) {
        Ok(status) => status,
        Err(payload) => {
            report_panic(operation, payload.as_ref());
            kInternalError
        }
    };

    if let Some(tracer) = tracer {
        tracer.exit(operation, status);
    }
    status
}

/// Run a value-returning body, answering `fallback` if it panics.
#[inline]
pub(crate) fn guard_value<T>(operation: &'static str, fallback: T, body: impl FnOnce() -> T) -> T {
    let tracer = trace::tracer();
    if let Some(tracer) = tracer {
        tracer.enter(operation);
    }

    let value = match catch_unwind(AssertUnwindSafe(body)) {
        Ok(value) => value,
        Err(payload) => {
            report_panic(operation, payload.as_ref());
            fallback
        }
    };

    if let Some(tracer) = tracer {
        tracer.exit(operation, kResultOk);
    }
    value
}

fn report_panic(operation: &'static str, payload: &(dyn Any + Send)) {
    let message = panic_message(payload);
    log::error!("{operation} panicked: {message}");
    if let Some(tracer) = trace::tracer() {
        tracer.error(operation, message);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

/// Validate a native count or index argument.
#[inline]
pub(crate) fn index(value: i32) -> Option<usize> {
    usize::try_from(value).ok()
}

#[cfg(test)]
mod tests {
    use vst3::Steinberg::kInvalidArgument;

    use super::*;

    #[test]
    fn test_passes_status_through() {
        assert_eq!(guard("ok", || kResultOk), kResultOk);
        assert_eq!(guard("invalid", || kInvalidArgument), kInvalidArgument);
    }

    #[test]
    fn test_panic_becomes_internal_error() {
        let status = guard("boom", || panic!("exploded"));
        assert_eq!(status, kInternalError);

        let status = guard("boom", || std::panic::panic_any(17u8));
        assert_eq!(status, kInternalError);
    }

    #[test]
    fn test_panic_becomes_fallback() {
        assert_eq!(guard_value("count", 0, || -> i32 { panic!("nope") }), 0);
        assert_eq!(guard_value("count", 0, || 4), 4);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
    }

    #[test]
    fn test_index() {
        assert_eq!(index(3), Some(3));
        assert_eq!(index(-1), None);
    }
}
