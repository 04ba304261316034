use std::fmt::{Display, Formatter};

/// Why opening or reading a PDF failed.
///
/// Every variant here is fatal to [`crate::doc::Document::open`]: there is no partial-success
/// document. `Io` also stands in for allocation failure, since Rust has no catchable OOM signal
/// at this layer.
#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Parse(ErrorKind, &'static str)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadHeader,
    MalformedTrailer,
    MalformedXref,
    UnsupportedXrefIndex,
    BadXrefStreamParams,
    DanglingObjectStream,
    TooManyObjects,
    MissingCatalog,
    /// Any structural mismatch not covered by a more specific kind above (e.g. "object number
    /// mismatch" when an indirect reference resolves to the wrong object).
    Other
}

impl Error {
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::Parse(kind, _) => Some(*kind),
            Error::Io(_) => None
        }
    }
}

impl Error {
    pub(crate) fn parse(msg: &'static str) -> Error {
        Error::Parse(ErrorKind::Other, msg)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(err) => write!(f, "{err}"),
            Error::Parse(_, msg) => f.write_str(msg)
        }
    }
}

impl std::error::Error for Error {}
