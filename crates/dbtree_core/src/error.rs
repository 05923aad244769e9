use thiserror::Error;

#[derive(Debug, Error)]
pub enum TreeError {
    #[error("Metadata fetch failed: {0}")]
    FetchFailed(String),

    #[error("Malformed metadata payload: {0}")]
    MalformedPayload(String),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Node cannot have children: {0}")]
    NotExpandable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl TreeError {
    pub fn fetch_failed(message: impl Into<String>) -> Self {
        Self::FetchFailed(message.into())
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedPayload(message.into())
    }
}
