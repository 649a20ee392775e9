pub mod error;
pub mod retry;
pub mod service;
pub mod settings;
pub mod synth;
pub mod voice;

// Public library API - the CLI and HTTP server only go through these.
pub use error::SpeechError;
pub use retry::{Backoff, RetryPolicy};
pub use service::{edge::EdgeTts, AudioStream, ServiceError, SpeechRequest, SpeechService};
pub use settings::{Settings, SettingsManager, SpeechConfig};
pub use synth::{SynthesisJob, SynthesisRequest};
pub use voice::{PriorityOrder, VoiceCatalog, VoiceDescriptor, VoiceTag};
