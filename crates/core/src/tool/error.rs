use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt::{self, Display};

use cinescout_catalog::CatalogError;

/// Why a tool call failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The arguments didn't match the tool's schema.
    InvalidInput,
    /// The catalog request behind the tool failed.
    Catalog,
    /// The model asked for a tool that isn't in the catalog.
    UnknownTool,
}

impl ErrorKind {
    fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid arguments",
            ErrorKind::Catalog => "catalog request failed",
            ErrorKind::UnknownTool => "unknown tool",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed tool call.
///
/// The model never sees this error, the dispatcher replaces it with a
/// generic failure payload. The reason only ends up in the logs.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Error {
    kind: ErrorKind,
    reason: Option<String>,
}

impl Error {
    #[inline]
    fn new(kind: ErrorKind) -> Self {
        Self { kind, reason: None }
    }

    /// Creates an error for arguments that don't fit the tool.
    #[inline]
    pub fn invalid_input() -> Self {
        Self::new(ErrorKind::InvalidInput)
    }

    /// Creates an error for a call to a tool that doesn't exist.
    #[inline]
    pub fn unknown_tool() -> Self {
        Self::new(ErrorKind::UnknownTool)
    }

    /// Attaches a reason to the error.
    #[inline]
    pub fn with_reason<S: Into<String>>(mut self, reason: S) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Returns the kind of this error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the reason, or the kind's description if none was given.
    pub fn reason(&self) -> Cow<'_, str> {
        match self.reason.as_deref() {
            Some(reason) => Cow::Borrowed(reason),
            None => Cow::Borrowed(self.kind.as_str()),
        }
    }
}

impl From<CatalogError> for Error {
    fn from(err: CatalogError) -> Self {
        Self::new(ErrorKind::Catalog).with_reason(err.to_string())
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "{}: {reason}", self.kind),
            None => Display::fmt(&self.kind, f),
        }
    }
}

impl StdError for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = Error::from(CatalogError::RateLimited);
        assert_eq!(err.kind(), ErrorKind::Catalog);
        assert_eq!(
            err.to_string(),
            "catalog request failed: catalog rate limit exceeded"
        );

        let err = Error::unknown_tool();
        assert_eq!(err.reason(), "unknown tool");
        assert_eq!(err.to_string(), "unknown tool");
    }
}
