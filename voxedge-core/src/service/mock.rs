use crate::service::{AudioStream, ServiceError, SpeechRequest, SpeechService};
use crate::voice::VoiceDescriptor;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Audio bytes produced for every non-empty synthesis
pub const MOCK_AUDIO: &[u8] = b"ID3\x04\x00mock-mp3-frame";

/// Mock behavior for the mock service
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MockBehavior {
    /// Succeed on every call
    #[default]
    Success,
    /// Fail the handshake N times, then succeed
    HandshakeErrorThenSuccess { remaining_errors: usize },
    /// Always fail the handshake
    AlwaysHandshakeError,
    /// Always reject the request
    AlwaysRejected,
    /// Open the session, then fail after the first audio chunk
    StreamErrorAfterFirstChunk,
}

/// Mock speech service for testing
#[derive(Clone, Default)]
pub struct MockService {
    voices: Vec<VoiceDescriptor>,
    behavior: Arc<Mutex<MockBehavior>>,
    call_count: Arc<Mutex<usize>>,
    captured_requests: Arc<Mutex<Vec<SpeechRequest>>>,
}

impl MockService {
    pub fn new(voices: Vec<VoiceDescriptor>, behavior: MockBehavior) -> Self {
        Self {
            voices,
            behavior: Arc::new(Mutex::new(behavior)),
            call_count: Arc::new(Mutex::new(0)),
            captured_requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn set_behavior(&self, behavior: MockBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn get_call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    pub fn captured_requests(&self) -> Vec<SpeechRequest> {
        self.captured_requests.lock().unwrap().clone()
    }

    /// Counts the call and applies the handshake part of the behavior.
    fn connect(&self, operation: &str) -> Result<MockBehavior, ServiceError> {
        *self.call_count.lock().unwrap() += 1;

        let mut behavior = self.behavior.lock().unwrap();
        match behavior.clone() {
            MockBehavior::HandshakeErrorThenSuccess { remaining_errors } if remaining_errors > 0 => {
                *behavior = MockBehavior::HandshakeErrorThenSuccess {
                    remaining_errors: remaining_errors - 1,
                };
                Err(ServiceError::Handshake(anyhow::anyhow!(
                    "Mock {operation} handshake error (remaining: {})",
                    remaining_errors - 1
                )))
            }
            MockBehavior::AlwaysHandshakeError => Err(ServiceError::Handshake(anyhow::anyhow!(
                "Mock {operation} handshake error (always fails)"
            ))),
            MockBehavior::AlwaysRejected => Err(ServiceError::Rejected(anyhow::anyhow!(
                "Mock {operation} rejected"
            ))),
            other => Ok(other),
        }
    }
}

#[async_trait]
impl SpeechService for MockService {
    fn name(&self) -> &'static str {
        "Mock"
    }

    async fn list_voices(&self) -> Result<Vec<VoiceDescriptor>, ServiceError> {
        self.connect("list_voices")?;
        Ok(self.voices.clone())
    }

    async fn open_synthesis(&self, request: &SpeechRequest) -> Result<AudioStream, ServiceError> {
        self.captured_requests.lock().unwrap().push(request.clone());
        let behavior = self.connect("open_synthesis")?;

        let known_voice = self.voices.is_empty()
            || self.voices.iter().any(|v| v.short_name == request.voice);
        if !known_voice {
            return Err(ServiceError::Rejected(anyhow::anyhow!(
                "Invalid voice '{}'",
                request.voice
            )));
        }

        let mut items: Vec<Result<Vec<u8>, ServiceError>> = Vec::new();
        if !request.text.is_empty() {
            items.push(Ok(MOCK_AUDIO.to_vec()));
            if behavior == MockBehavior::StreamErrorAfterFirstChunk {
                items.push(Err(ServiceError::Protocol(anyhow::anyhow!(
                    "Mock connection closed mid-stream"
                ))));
            } else {
                items.push(Ok(request.text.as_bytes().to_vec()));
            }
        }
        Ok(Box::pin(futures_util::stream::iter(items)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    fn request(text: &str) -> SpeechRequest {
        SpeechRequest {
            text: text.to_string(),
            voice: "en-US-JennyNeural".to_string(),
            rate: "+0%".to_string(),
            pitch: "+0Hz".to_string(),
        }
    }

    #[tokio::test]
    async fn test_mock_handshake_error_then_success() {
        let service = MockService::new(
            Vec::new(),
            MockBehavior::HandshakeErrorThenSuccess {
                remaining_errors: 2,
            },
        );

        assert!(matches!(
            service.list_voices().await,
            Err(ServiceError::Handshake(_))
        ));
        assert!(matches!(
            service.list_voices().await,
            Err(ServiceError::Handshake(_))
        ));
        assert!(service.list_voices().await.is_ok());
        assert_eq!(service.get_call_count(), 3);
    }

    #[tokio::test]
    async fn test_mock_stream_yields_audio() {
        let service = MockService::new(Vec::new(), MockBehavior::Success);
        let mut stream = service.open_synthesis(&request("hi")).await.unwrap();

        let mut audio = Vec::new();
        while let Some(chunk) = stream.next().await {
            audio.extend(chunk.unwrap());
        }

        assert!(audio.starts_with(MOCK_AUDIO));
        assert!(audio.ends_with(b"hi"));
        assert_eq!(service.captured_requests(), vec![request("hi")]);
    }

    #[tokio::test]
    async fn test_mock_empty_text_yields_nothing() {
        let service = MockService::new(Vec::new(), MockBehavior::Success);
        let stream = service.open_synthesis(&request("")).await.unwrap();
        assert_eq!(stream.count().await, 0);
    }
}
