use std::fmt;
use std::io;

use crate::listener::Diagnostic;

/// A convenient type alias for results in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// An error that can occur while lexing, parsing, evaluating or rendering a
/// document, or while parsing and auditing a control block.
///
/// Errors raised at the end of a pass carry every [`Diagnostic`] recorded
/// during that pass. The [`Display`][fmt::Display] output of such an error is
/// the diagnostics joined with newlines, in the order they were received.
#[derive(Clone)]
pub struct Error {
    kind: ErrorKind,
    msg: String,
    diagnostics: Vec<Diagnostic>,
}

/// The category of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ErrorKind {
    /// An unrecognized character sequence in the document.
    Lexical,
    /// A token sequence that does not match the template grammar.
    Syntax,
    /// A conditional was used before its test element was set.
    UnsetTest,
    /// A variable is missing from the binding context.
    UnresolvedBinding,
    /// An unknown, duplicate or malformed control block directive.
    Directive,
    /// A control block refers to users or restaurants that do not exist.
    Audit,
    /// A value could not be rendered.
    Render,
    /// A value could not be converted into a binding context.
    Serialize,
    /// Writing the rendered output failed.
    Io,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            msg: msg.into(),
            diagnostics: Vec::new(),
        }
    }

    /// Constructs an error from diagnostics collected during one pass.
    pub(crate) fn from_diagnostics(kind: ErrorKind, diagnostics: Vec<Diagnostic>) -> Self {
        assert!(!diagnostics.is_empty(), "diagnostics must be populated");
        let msg = diagnostics
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            kind,
            msg,
            diagnostics,
        }
    }

    /// Returns the category of this error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the diagnostics this error was raised with.
    ///
    /// Errors that are not tied to a location in a document, for example an
    /// I/O failure, have no diagnostics.
    #[inline]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Returns the full error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.msg
    }
}

impl std::error::Error for Error {}

#[cfg(feature = "serde")]
impl serde::ser::Error for Error {
    fn custom<T>(msg: T) -> Self
    where
        T: fmt::Display,
    {
        Self::new(ErrorKind::Serialize, msg.to_string())
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::new(ErrorKind::Io, format!("failed to write output: {err}"))
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} error\n{}", self.kind, self.msg)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.msg)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Lexical => "lexical error",
            Self::Syntax => "syntax error",
            Self::UnsetTest => "unset test",
            Self::UnresolvedBinding => "unresolved binding",
            Self::Directive => "directive error",
            Self::Audit => "audit failure",
            Self::Render => "render error",
            Self::Serialize => "serialize error",
            Self::Io => "io error",
        };
        f.write_str(s)
    }
}
