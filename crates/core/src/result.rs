//! Result type definition and tap-style combinators.
//!
//! Lets callers log a failure or a miss on the way through a chain instead of
//! breaking it up with `match` blocks.

use crate::error::Error;

/// The standard Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Tap-style combinators for any Result type.
pub trait GenericResultExt<T, E> {
    /// Perform a side effect on Err value without consuming the Result.
    fn tap_err<F: FnOnce(&E)>(self, f: F) -> Self;
}

impl<T, E> GenericResultExt<T, E> for std::result::Result<T, E> {
    fn tap_err<F: FnOnce(&E)>(self, f: F) -> Self {
        if let Err(ref e) = self {
            f(e);
        }
        self
    }
}

/// Tap-style combinators for Option types.
pub trait OptionExt<T> {
    /// Tap into Some value without consuming the Option.
    fn tap_some<F: FnOnce(&T)>(self, f: F) -> Self;

    /// Tap into None without consuming the Option.
    fn tap_none<F: FnOnce()>(self, f: F) -> Self;
}

impl<T> OptionExt<T> for Option<T> {
    fn tap_some<F: FnOnce(&T)>(self, f: F) -> Self {
        if let Some(ref v) = self {
            f(v);
        }
        self
    }

    fn tap_none<F: FnOnce()>(self, f: F) -> Self {
        if self.is_none() {
            f();
        }
        self
    }
}
