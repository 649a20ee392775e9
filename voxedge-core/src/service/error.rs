use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    /// The connection to the service could not be established. Observed to
    /// happen intermittently, so this is the one retryable failure.
    #[error("handshake with speech service failed: {0}")]
    Handshake(anyhow::Error),

    /// The service (or our own request validation) refused the request,
    /// e.g. an unknown voice.
    #[error("{0}")]
    Rejected(anyhow::Error),

    #[error("speech protocol error: {0}")]
    Protocol(anyhow::Error),

    #[error("failed to decode voice list: {0}")]
    Decode(anyhow::Error),
}

impl ServiceError {
    pub fn is_handshake(&self) -> bool {
        matches!(self, ServiceError::Handshake(_))
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(source: serde_json::Error) -> Self {
        Self::Decode(anyhow::anyhow!(source))
    }
}
