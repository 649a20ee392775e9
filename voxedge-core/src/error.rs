use thiserror::Error;

use crate::service::ServiceError;

/// Errors surfaced by the voice catalog and synthesis workflows.
///
/// Only handshake failures are mitigated locally (by retrying). Everything
/// else reaches the caller untouched so the front end can show it as-is.
#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("speech service unavailable after {attempts} attempts: {source}")]
    TransientService {
        attempts: u32,
        #[source]
        source: ServiceError,
    },

    #[error(transparent)]
    Remote(ServiceError),

    #[error("filesystem error: {0}")]
    Filesystem(#[from] std::io::Error),
}

impl SpeechError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SpeechError::TransientService { .. })
    }
}

impl From<ServiceError> for SpeechError {
    fn from(source: ServiceError) -> Self {
        Self::Remote(source)
    }
}
