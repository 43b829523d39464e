use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The buffer ended before the value did. Captured buffers are bounded
    /// prefixes, so this is the expected shape of truncation.
    #[error("incomplete input: {0}")]
    Incomplete(String),

    #[error("malformed input: {0}")]
    Malformed(String),

    #[error("segment count mismatch: {0}")]
    Count(String),

    #[error("empty pattern")]
    EmptyPattern,

    #[error("missing path or host")]
    MissingPathOrHost,
}

impl DecodeError {
    pub fn is_truncation(&self) -> bool {
        matches!(self, Self::Incomplete(_))
    }
}
