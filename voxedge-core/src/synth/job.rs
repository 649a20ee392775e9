use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::SpeechError;
use crate::service::{ServiceError, SpeechService};
use crate::settings::SpeechConfig;
use crate::synth::request::SynthesisRequest;

/// Every generated file is named `voxedge-<random>.mp3`.
pub const OUTPUT_PREFIX: &str = "voxedge-";
pub const OUTPUT_SUFFIX: &str = ".mp3";

/// `<system temp>/voxedge`, used when no output directory is configured.
pub fn default_output_dir() -> PathBuf {
    std::env::temp_dir().join("voxedge")
}

/// Turns text into an MP3 file on disk.
///
/// Every call creates a new file that is handed over to the caller: it is
/// never removed here, so a player can keep streaming it after the call
/// returns.
#[derive(Clone)]
pub struct SynthesisJob {
    service: Arc<dyn SpeechService>,
    config: Arc<SpeechConfig>,
}

impl SynthesisJob {
    pub fn new(service: Arc<dyn SpeechService>, config: Arc<SpeechConfig>) -> Self {
        Self { service, config }
    }

    /// Synthesizes `text` with the voice named by `display_key` and returns
    /// the forward-slash path of the new file.
    pub async fn synthesize(
        &self,
        text: &str,
        display_key: &str,
        rate_percent: i32,
        pitch_hz: i32,
    ) -> Result<String, SpeechError> {
        let request = SynthesisRequest::new(text, display_key)
            .with_rate(rate_percent)
            .with_pitch(pitch_hz);
        self.run(&request).await
    }

    pub async fn run(&self, request: &SynthesisRequest) -> Result<String, SpeechError> {
        let speech = request.to_speech_request();

        // Only establishing the session is retried; once audio flows any
        // failure goes straight to the caller.
        let mut audio = self
            .config
            .retry
            .run("open_synthesis", ServiceError::is_handshake, || {
                self.service.open_synthesis(&speech)
            })
            .await?;

        let (file, path) = self.create_output_file().await?;
        debug!(?path, voice = %speech.voice, "Writing synthesized audio");

        let mut file = tokio::fs::File::from_std(file);
        let mut bytes = 0usize;
        while let Some(chunk) = audio.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            bytes += chunk.len();
        }
        file.flush().await?;

        let path = posix_path(&tokio::fs::canonicalize(&path).await?);
        info!(
            voice = %speech.voice,
            rate = %speech.rate,
            pitch = %speech.pitch,
            bytes,
            path = %path,
            "Synthesized speech"
        );
        Ok(path)
    }

    async fn create_output_file(&self) -> io::Result<(std::fs::File, PathBuf)> {
        let dir = self
            .config
            .output_dir
            .clone()
            .unwrap_or_else(default_output_dir);
        tokio::fs::create_dir_all(&dir).await?;

        tokio::task::spawn_blocking(move || {
            let temp_file = tempfile::Builder::new()
                .prefix(OUTPUT_PREFIX)
                .suffix(OUTPUT_SUFFIX)
                .tempfile_in(&dir)?;
            temp_file.keep().map_err(|e| e.error)
        })
        .await
        .map_err(io::Error::other)?
    }
}

/// Renders `path` with forward slashes whatever the host separator is.
pub fn posix_path(path: &Path) -> String {
    let raw = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        return raw.into_owned();
    }
    to_forward_slashes(&raw)
}

fn to_forward_slashes(raw: &str) -> String {
    if let Some(share) = raw.strip_prefix(r"\\?\UNC\") {
        return format!("//{}", share.replace('\\', "/"));
    }
    let raw = raw.strip_prefix(r"\\?\").unwrap_or(raw);
    raw.replace('\\', "/")
}
