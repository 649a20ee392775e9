use std::sync::Arc;

use tempfile::TempDir;
use tracing_subscriber;
use voxedge_core::{
    service::mock::{MockBehavior, MockService},
    Backoff, RetryPolicy, SpeechConfig, SynthesisJob, VoiceCatalog, VoiceDescriptor,
};

pub struct Fixture {
    pub catalog: VoiceCatalog,
    pub job: SynthesisJob,
    pub output_dir: TempDir,
    service: MockService,
}

impl Fixture {
    #[allow(dead_code)]
    pub fn new() -> Self {
        Self::with_behavior(MockBehavior::Success)
    }

    #[allow(dead_code)]
    pub fn with_behavior(behavior: MockBehavior) -> Self {
        Self::with_voices_and_behavior(sample_voices(), behavior)
    }

    #[allow(dead_code)]
    pub fn with_voices_and_behavior(voices: Vec<VoiceDescriptor>, behavior: MockBehavior) -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        // Keep generated audio inside the tempdir instead of the system temp dir
        let output_dir = TempDir::new().unwrap();
        let config = Arc::new(SpeechConfig {
            priority_order: Default::default(),
            retry: RetryPolicy::new(5, Backoff::Linear { step_ms: 1000 }),
            output_dir: Some(output_dir.path().join("audio")),
        });

        // Clones share the same behavior and captured requests
        let service = MockService::new(voices, behavior);
        let shared: Arc<dyn voxedge_core::SpeechService> = Arc::new(service.clone());

        Fixture {
            catalog: VoiceCatalog::new(shared.clone(), config.clone()),
            job: SynthesisJob::new(shared, config),
            output_dir,
            service,
        }
    }

    #[allow(dead_code)]
    pub fn set_behavior(&self, behavior: MockBehavior) {
        self.service.set_behavior(behavior);
    }

    #[allow(dead_code)]
    pub fn call_count(&self) -> usize {
        self.service.get_call_count()
    }

    #[allow(dead_code)]
    pub fn captured_requests(&self) -> Vec<voxedge_core::SpeechRequest> {
        self.service.captured_requests()
    }

    #[allow(dead_code)]
    pub fn audio_files(&self) -> Vec<std::path::PathBuf> {
        let dir = self.output_dir.path().join("audio");
        let Ok(entries) = std::fs::read_dir(dir) else {
            return Vec::new();
        };
        let mut files: Vec<_> = entries.map(|e| e.unwrap().path()).collect();
        files.sort();
        files
    }
}

#[allow(dead_code)]
pub fn voice(short_name: &str, gender: &str) -> VoiceDescriptor {
    VoiceDescriptor {
        name: format!("Microsoft Server Speech Text to Speech Voice ({short_name})"),
        short_name: short_name.to_string(),
        gender: gender.to_string(),
        locale: short_name.split('-').take(2).collect::<Vec<_>>().join("-"),
        suggested_codec: "audio-24khz-48kbitrate-mono-mp3".to_string(),
        friendly_name: short_name.to_string(),
        status: "GA".to_string(),
        voice_tag: Default::default(),
    }
}

/// A small voice list in the shuffled order the service returns.
#[allow(dead_code)]
pub fn sample_voices() -> Vec<VoiceDescriptor> {
    vec![
        voice("en-US-JennyNeural", "Female"),
        voice("de-DE-KatjaNeural", "Female"),
        voice("zh-CN-YunxiNeural", "Male"),
        voice("sw-KE-RafikiNeural", "Male"),
        voice("en-US-GuyNeural", "Male"),
        voice("zh-CN-XiaoxiaoNeural", "Female"),
        voice("ja-JP-NanamiNeural", "Female"),
        voice("zh-TW-HsiaoChenNeural", "Female"),
    ]
}
