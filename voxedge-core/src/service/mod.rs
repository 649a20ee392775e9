pub mod edge;
pub mod error;
pub mod mock;

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use serde::{Deserialize, Serialize};

use crate::voice::VoiceDescriptor;

pub use error::ServiceError;

/// Audio chunks of one synthesis, in playback order.
pub type AudioStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, ServiceError>> + Send>>;

/// Wire-level parameters of one text to speech conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechRequest {
    pub text: String,
    /// Short voice identifier, e.g. `en-US-JennyNeural`
    pub voice: String,
    /// Signed percentage, e.g. `+0%`
    pub rate: String,
    /// Signed hertz offset, e.g. `-10Hz`
    pub pitch: String,
}

/// The remote speech service.
///
/// Both operations may fail with [`ServiceError::Handshake`] when the
/// connection cannot be established; callers decide whether to retry.
#[async_trait]
pub trait SpeechService: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fetch every voice the service offers, in the service's order.
    async fn list_voices(&self) -> Result<Vec<VoiceDescriptor>, ServiceError>;

    /// Validate the request and establish the synthesis session.
    ///
    /// Audio is only pulled once the returned stream is polled; failures
    /// while streaming are reported through the stream items.
    async fn open_synthesis(&self, request: &SpeechRequest) -> Result<AudioStream, ServiceError>;
}
