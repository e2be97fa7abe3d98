//! The crate-wide error type.
//!
//! Every fallible operation in `sap` returns [`Result<T>`]. The error kinds
//! mirror the closed set a document pipeline actually produces: a source
//! file failed to parse, a typecheck rule was violated, evaluation hit a
//! runtime fault, a layout object couldn't be placed, I/O failed, or an
//! internal invariant broke. Only [`Error::Internal`] is allowed to abort
//! the process; everything else is meant to be caught, reported, and
//! (for `Layout`) recovered from.

use std::fmt;
use std::path::PathBuf;

/// A source location: which file, and a byte offset into it.
///
/// Kept cheap to copy so it can be attached to every node in the typed tree.
/// Line/column are only computed when a diagnostic is actually rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub file_id: u32,
    pub byte_offset: u32,
}

impl Location {
    pub const fn new(file_id: u32, byte_offset: u32) -> Self {
        Self { file_id, byte_offset }
    }
}

/// A secondary annotation attached to an error: "note: defined here" etc.
#[derive(Debug, Clone)]
pub struct Info {
    pub loc: Location,
    pub message: String,
}

/// The crate-wide error type.
///
/// `Parse`/`Type`/`Eval` carry zero or more [`Info`] annotations. `Type`
/// additionally carries a list of candidates considered during overload
/// resolution, since those are usually the most useful part of the message.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{message}")]
    Parse {
        loc: Location,
        message: String,
        info: Vec<Info>,
    },

    #[error("{message}")]
    Type {
        loc: Location,
        message: String,
        candidates: Vec<String>,
        info: Vec<Info>,
    },

    #[error("{message}")]
    Eval {
        loc: Location,
        message: String,
        info: Vec<Info>,
    },

    #[error("{message}")]
    Layout { loc: Location, message: String },

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn parse(loc: Location, message: impl Into<String>) -> Self {
        Error::Parse { loc, message: message.into(), info: Vec::new() }
    }

    pub fn ty(loc: Location, message: impl Into<String>) -> Self {
        Error::Type { loc, message: message.into(), candidates: Vec::new(), info: Vec::new() }
    }

    pub fn eval(loc: Location, message: impl Into<String>) -> Self {
        Error::Eval { loc, message: message.into(), info: Vec::new() }
    }

    pub fn layout(loc: Location, message: impl Into<String>) -> Self {
        Error::Layout { loc, message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal(message.into())
    }

    pub fn with_info(mut self, loc: Location, message: impl Into<String>) -> Self {
        let info = Info { loc, message: message.into() };
        match &mut self {
            Error::Parse { info: v, .. } | Error::Eval { info: v, .. } => v.push(info),
            Error::Type { info: v, .. } => v.push(info),
            _ => {}
        }
        self
    }

    /// True only for the one kind that's allowed to propagate uncaught past
    /// the interpreter driver.
    pub fn is_internal(&self) -> bool {
        matches!(self, Error::Internal(_))
    }

    /// The process exit code this error should map to, per the CLI contract:
    /// 0 success, 1 a reported diagnostic, 2 an internal/unexpected failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Internal(_) => 2,
            _ => 1,
        }
    }
}

/// Raised when a requested font can't be located on the system (or, on
/// platforms without a font-search backend, at all).
#[derive(Debug, thiserror::Error)]
pub enum FontSearchError {
    #[error("font search is not supported on this platform for family {0:?}")]
    Unsupported(String),

    #[error("no installed font matched family {family:?} (style {style:?})")]
    NotFound { family: String, style: String },

    #[error("font file {0:?} is a collection; collection members are not searchable")]
    IsCollection(PathBuf),
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<file {}>:{}", self.file_id, self.byte_offset)
    }
}
