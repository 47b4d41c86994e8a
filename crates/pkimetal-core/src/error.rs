use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to decode input: {0}")]
    Decode(String),

    #[error("unknown profile name: {0}")]
    UnknownProfile(String),

    #[error("invalid severity: {0}")]
    InvalidSeverity(String),

    #[error("unsupported content type for this endpoint: {0}")]
    UnsupportedContentType(String),

    #[error("engine '{engine}' protocol violation: {detail}")]
    EngineProtocol { engine: String, detail: String },

    #[error("engine queue closed")]
    QueueClosed,

    #[error("metrics error: {0}")]
    Metrics(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
