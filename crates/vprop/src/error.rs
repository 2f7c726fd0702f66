#![forbid(unsafe_code)]

//! Error types.
//!
//! Nearly every operation in this crate is infallible: redundant
//! disconnects, repeated expiry and writes to a latched one-shot property
//! are silent no-ops. The only precondition a caller can violate is reading
//! a getter that has no function bound.

/// Errors from reading computed values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GetterError {
    /// The getter has no function bound.
    Unbound,
}

impl std::fmt::Display for GetterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unbound => write!(f, "getter has no function bound"),
        }
    }
}

impl std::error::Error for GetterError {}
