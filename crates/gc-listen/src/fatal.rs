//! Unrecoverable faults
//!
//! Internal invariant failures in the finalization hook and the deferred
//! task cannot be reported to script code: there is no caller to return to.
//! They end the process through [`fail_and_abort`].
//!
//! Embedders (and tests) may install a [`FatalHook`] that takes over from the
//! default abort. The hook's type is diverging, so no caller ever continues
//! past a fault.

use std::fmt;

use parking_lot::RwLock;

/// Replacement for the default process abort
pub type FatalHook = fn(&str) -> !;

static FATAL_HOOK: RwLock<Option<FatalHook>> = RwLock::new(None);

/// Install a fatal hook, returning the previous one
pub fn set_fatal_hook(hook: FatalHook) -> Option<FatalHook> {
    FATAL_HOOK.write().replace(hook)
}

/// Restore the default abort, returning the hook that was installed
pub fn clear_fatal_hook() -> Option<FatalHook> {
    FATAL_HOOK.write().take()
}

/// Report an unrecoverable fault and terminate.
pub fn fail_and_abort(message: &str) -> ! {
    tracing::error!(target: "gcl::fatal", "{message}");

    let hook = *FATAL_HOOK.read();
    if let Some(hook) = hook {
        hook(message);
    }

    eprintln!("{message}");
    std::process::abort()
}

/// Unwrap a value or fail with [`fail_and_abort`]
pub trait OrAbort<T> {
    /// The contained value, or a fatal fault reported as `message`
    fn or_abort(self, message: &str) -> T;
}

impl<T, E: fmt::Display> OrAbort<T> for Result<T, E> {
    fn or_abort(self, message: &str) -> T {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::error!(target: "gcl::fatal", error = %err, "{message}");
                fail_and_abort(message)
            }
        }
    }
}

impl<T> OrAbort<T> for Option<T> {
    fn or_abort(self, message: &str) -> T {
        match self {
            Some(value) => value,
            None => fail_and_abort(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panicking_hook(message: &str) -> ! {
        panic!("fatal: {message}")
    }

    #[test]
    fn test_or_abort_passes_values_through() {
        assert_eq!(Ok::<_, String>(7).or_abort("unused"), 7);
        assert_eq!(Some("x").or_abort("unused"), "x");
    }

    #[test]
    #[should_panic(expected = "fatal: lookup failed")]
    fn test_or_abort_reaches_hook() {
        set_fatal_hook(panicking_hook);
        let missing: Option<u8> = None;
        missing.or_abort("lookup failed");
    }
}
