//! Centralized error types for pktmsg.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the pktmsg library.
///
/// Decoding never surfaces these to the caller of
/// [`classify`](crate::classify::classify): each stage that fails is folded
/// into the returned classification. They are returned directly by the
/// individual codecs and by the encode side.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PktMsgError {
    /// The message headers could not be parsed at all.
    #[error("malformed message headers: {0}")]
    MalformedEnvelope(String),

    /// The body could not be decoded (unknown transfer encoding,
    /// unparseable Content-Type, broken multipart structure).
    #[error("undecodable message body: {0}")]
    UndecodableBody(String),

    /// The `!SCCoPIFO!` header block is missing or malformed.
    #[error("invalid form header: {0}")]
    InvalidFormHeader(String),

    /// The same field tag appeared twice in one form.
    #[error("duplicate form field tag {0:?}")]
    DuplicateTag(String),

    /// The body ended inside a bracketed field value.
    #[error("unterminated value for form field {0:?}")]
    UnterminatedValue(String),

    /// Something other than a newline followed a field's closing bracket.
    #[error("unexpected text after value of form field {0:?}")]
    TrailingGarbage(String),

    /// The form fields were not followed by the `!/ADDON!` footer.
    #[error("form footer missing")]
    MissingFooter,

    /// A required field of an outgoing message was not set.
    #[error("required message field not set: {0}")]
    Incomplete(&'static str),

    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {reason}")]
    Io { path: PathBuf, reason: String },
}

/// Convenience alias for `Result<T, PktMsgError>`.
pub type Result<T> = std::result::Result<T, PktMsgError>;

impl PktMsgError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: &std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            reason: source.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = PktMsgError::DuplicateTag("MsgNo".into());
        assert_eq!(err.to_string(), "duplicate form field tag \"MsgNo\"");
    }
}
