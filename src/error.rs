use thiserror::Error;

/// Crate-wide error type. No variant is ever inferred from partial data —
/// every failure path here corresponds to a point in the spec that says
/// "surfaced", never "silently recovered".
#[derive(Debug, Error)]
pub enum DedupeError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("oracle protocol error: {0}")]
    OracleProtocol(String),

    #[error("empty input: {0}")]
    EmptyInput(String),

    #[error("numerical error: solver failed to converge at alpha={alpha}: {detail}")]
    Numerical { alpha: f64, detail: String },
}

impl From<std::io::Error> for DedupeError {
    fn from(e: std::io::Error) -> Self {
        DedupeError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for DedupeError {
    fn from(e: serde_json::Error) -> Self {
        DedupeError::Io(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DedupeError>;
