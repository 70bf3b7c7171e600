use thiserror::Error;

pub type Result<T> = std::result::Result<T, StreamError>;

/// A malformed record or marker in the device stream. The parser resets to
/// scanning for the next header after returning one of these.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("line {line}: unsupported protocol version '{found}'")]
    UnsupportedVersion { line: u64, found: String },

    #[error("line {line}: unknown record kind '{kind}'")]
    UnknownKind { line: u64, kind: String },

    #[error("line {line}: invalid length '{value}'")]
    InvalidLength { line: u64, value: String },

    #[error("line {line}: payload is not valid hex")]
    InvalidHex { line: u64 },

    #[error("line {line}: declared {declared} bytes, payload carries {actual}")]
    LengthMismatch {
        line: u64,
        declared: usize,
        actual: usize,
    },

    #[error("line {line}: expected {expected}, got '{found}'")]
    Unexpected {
        line: u64,
        expected: &'static str,
        found: String,
    },

    #[error("stream ended inside {0}")]
    Truncated(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StreamError {
    /// Whether the stream itself failed, as opposed to one bad record
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}
