use thiserror::Error;

#[derive(Debug, Error)]
pub enum AutotraceError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("clock error: {0}")]
    Clock(String),

    #[error("record error: {0}")]
    Record(String),

    #[error("probe error: {0}")]
    Probe(String),

    #[error("export error: {0}")]
    Export(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AutotraceError>;
