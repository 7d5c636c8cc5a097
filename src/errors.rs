//! Crate-wide error type.
//!
//! Errors split into two strata: everything but `Fatal` is user-recoverable
//! and handled at the statement boundary in the REPL loop; `Fatal` (and a
//! bare I/O failure) terminates the process.

use std::fmt;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    /// Malformed statement or meta-command.
    Syntax(String),
    /// `username`/`email` exceeded its fixed-width column limit.
    TooLong(String),
    /// Insert of a key already present.
    Duplicate,
    /// Engine-level condition with no recovery: corrupt file, page number
    /// out of bounds, non-resident flush, internal-node overflow, ...
    Fatal(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "{}", e),
            Error::Syntax(msg) => write!(f, "{}", msg),
            Error::TooLong(_field) => write!(f, "string is too long"),
            Error::Duplicate => write!(f, "ERROR: Duplicate key."),
            Error::Fatal(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl Error {
    /// The engine-fatal stratum: process should print and exit nonzero.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Fatal(_))
    }
}

/// Builds an `Error` variant from a format string, `err!(Variant, "fmt", args...)`.
#[macro_export]
macro_rules! err {
    (Fatal, $($arg:tt)*) => {
        $crate::errors::Error::Fatal(format!($($arg)*))
    };
    (Syntax, $($arg:tt)*) => {
        $crate::errors::Error::Syntax(format!($($arg)*))
    };
}
