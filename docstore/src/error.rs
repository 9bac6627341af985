//! Error types for the document store.
//!
//! Every public operation is a boundary: internal failures are caught here
//! and mapped onto one of a small set of kinds, each carrying a `domain` and
//! `code` pair that callers can inspect without matching on the variant
//! itself (mirrors the HTTP-status convention used by the storage façade
//! this crate fronts).

use std::fmt::{Display, Formatter};

/// Convenience alias used throughout the crate.
pub type CResult<T> = std::result::Result<T, Error>;

/// The domain an [`Error`] is reported under.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Domain {
    /// Maps to an HTTP-style status code (Conflict, BadRequest, Gone, ...).
    Http,
    /// Surfaced unchanged from the underlying key-value engine.
    Engine,
    /// An internal failure with no natural external representation.
    Core,
}

impl Display for Domain {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Domain::Http => write!(f, "HTTP"),
            Domain::Engine => write!(f, "Engine"),
            Domain::Core => write!(f, "Core"),
        }
    }
}

/// Structured error carrying a `(domain, code)` pair, per the public surface
/// contract. Preconditions (misuse of the API, e.g. ending a transaction at
/// nesting depth zero) are programmer errors and are not represented here;
/// they panic instead.
#[derive(Debug)]
pub enum Error {
    /// Engine: the requested key does not exist.
    NotFound(String),

    /// HTTP 409: a disallowed concurrent branch, or a duplicate revision id
    /// whose body differs from what was requested.
    Conflict(String),

    /// HTTP 400: a malformed revision id, non-monotone history, or other bad input.
    BadRequest(String),

    /// HTTP 410: the revision's body has been compacted away.
    Gone(String),

    /// Engine: I/O failure talking to the underlying store.
    IO(String),

    /// Engine: the on-disk structure is invalid or inconsistent.
    Corrupt(String),

    /// Engine: a requested configuration or feature is not supported.
    Unsupported(String),

    /// An internal invariant was violated; carries no stable meaning to callers.
    Internal(String),

    /// Core, code 2: unexpected internal failure. Always logged with a warning.
    Unknown(String),
}

impl Error {
    /// The `(domain, code)` pair the public surface reports for this error.
    pub fn domain_code(&self) -> (Domain, i32) {
        match self {
            Error::NotFound(_) => (Domain::Engine, 1),
            Error::Conflict(_) => (Domain::Http, 409),
            Error::BadRequest(_) => (Domain::Http, 400),
            Error::Gone(_) => (Domain::Http, 410),
            Error::IO(_) => (Domain::Engine, 2),
            Error::Corrupt(_) => (Domain::Engine, 3),
            Error::Unsupported(_) => (Domain::Engine, 4),
            Error::Internal(_) => (Domain::Core, 1),
            Error::Unknown(_) => (Domain::Core, 2),
        }
    }

    pub fn domain(&self) -> Domain {
        self.domain_code().0
    }

    pub fn code(&self) -> i32 {
        self.domain_code().1
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NotFound(msg) => write!(f, "not found: {}", msg),
            Error::Conflict(msg) => write!(f, "conflict: {}", msg),
            Error::BadRequest(msg) => write!(f, "bad request: {}", msg),
            Error::Gone(msg) => write!(f, "gone: {}", msg),
            Error::IO(msg) => write!(f, "I/O error: {}", msg),
            Error::Corrupt(msg) => write!(f, "corrupt: {}", msg),
            Error::Unsupported(msg) => write!(f, "unsupported: {}", msg),
            Error::Internal(msg) => write!(f, "internal error: {}", msg),
            Error::Unknown(msg) => write!(f, "unknown error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IO(err.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Corrupt(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_maps_to_http_409() {
        let err = Error::Conflict("dup rev".into());
        assert_eq!(err.domain(), Domain::Http);
        assert_eq!(err.code(), 409);
    }

    #[test]
    fn gone_maps_to_http_410() {
        let err = Error::Gone("body compacted".into());
        assert_eq!(err.code(), 410);
    }
}
