use std::io;

/// Failures raised by the note store and the chapter directory it reads from.
#[derive(Debug, thiserror::Error)]
pub enum NoteError {
    #[error("missing required input: {0}")]
    MissingInput(&'static str),
    #[error("file not found: {0}")]
    FileNotFound(String),
    #[error("note not found: {0}")]
    NoteNotFound(String),
    #[error("opening tag for note '{0}' is never closed with '>'")]
    MalformedTag(String),
    #[error("note '{0}' has no closing </Note> tag")]
    MissingClosingTag(String),
    #[error("note '{0}' contains another <Note> tag; notes must not nest")]
    NestedNote(String),
    #[error("path escapes the chapters directory: {0}")]
    PathEscape(String),
    #[error("invalid request payload: {0}")]
    InvalidPayload(String),
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl NoteError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        NoteError::Io {
            context: context.into(),
            source,
        }
    }

    /// Short, stable message used as the `error` field of transport responses.
    pub fn summary(&self) -> &'static str {
        match self {
            NoteError::MissingInput(_) => "Missing required input",
            NoteError::FileNotFound(_) => "File not found",
            NoteError::NoteNotFound(_) => "Note not found",
            NoteError::MalformedTag(_) => "Malformed note tag",
            NoteError::MissingClosingTag(_) => "Missing closing tag",
            NoteError::NestedNote(_) => "Nested note",
            NoteError::PathEscape(_) => "File not found",
            NoteError::InvalidPayload(_) => "Invalid request payload",
            NoteError::Io { .. } => "File system error",
        }
    }
}

pub type NoteResult<T> = Result<T, NoteError>;
