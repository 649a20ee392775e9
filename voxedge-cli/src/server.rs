//! HTTP API over the voice catalog and synthesis job.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{Path as UrlPath, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use voxedge_core::synth::{OUTPUT_PREFIX, OUTPUT_SUFFIX};
use voxedge_core::voice::VoiceMap;
use voxedge_core::{SpeechError, SynthesisJob, SynthesisRequest, VoiceCatalog};

const RATE_RANGE: std::ops::RangeInclusive<i32> = -50..=50;
const PITCH_RANGE: std::ops::RangeInclusive<i32> = -20..=20;

/// Rejects rate and pitch values outside the ranges the front ends offer.
pub(crate) fn check_adjustments(rate: i32, pitch: i32) -> Result<(), String> {
    if !RATE_RANGE.contains(&rate) {
        return Err(format!("rate must be within {RATE_RANGE:?}, got {rate}"));
    }
    if !PITCH_RANGE.contains(&pitch) {
        return Err(format!("pitch must be within {PITCH_RANGE:?}, got {pitch}"));
    }
    Ok(())
}

#[derive(Clone)]
pub struct AppState {
    catalog: VoiceCatalog,
    job: SynthesisJob,
    permits: Arc<Semaphore>,
    audio_dir: PathBuf,
}

impl AppState {
    pub fn new(
        catalog: VoiceCatalog,
        job: SynthesisJob,
        concurrency_limit: usize,
        audio_dir: PathBuf,
    ) -> Self {
        Self {
            catalog,
            job,
            permits: Arc::new(Semaphore::new(concurrency_limit.max(1))),
            audio_dir,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/voices", get(voices_handler))
        .route("/api/text_to_speech", post(text_to_speech_handler))
        .route("/audio/:name", get(audio_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

pub async fn serve(state: AppState, host: &str, port: u16) -> Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(url = %format!("http://{addr}"), "VoxEdge API ready");
    eprintln!("Listening on http://{addr}");

    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[derive(Debug)]
pub enum ApiError {
    Speech(SpeechError),
    BadRequest(String),
    Unavailable,
}

impl From<SpeechError> for ApiError {
    fn from(error: SpeechError) -> Self {
        Self::Speech(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Speech(error) => {
                let status = match &error {
                    SpeechError::Filesystem(_) => StatusCode::INTERNAL_SERVER_ERROR,
                    SpeechError::TransientService { .. } | SpeechError::Remote(_) => {
                        StatusCode::BAD_GATEWAY
                    }
                };
                warn!(%status, error = %error, "Request failed");
                (status, error.to_string())
            }
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Server is shutting down".to_string(),
            ),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct TextToSpeechBody {
    text: String,
    voice: String,
    #[serde(default)]
    rate: i32,
    #[serde(default)]
    pitch: i32,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct TextToSpeechResponse {
    /// Absolute forward-slash path on the server
    pub path: String,
    /// Where the file can be fetched from this server
    pub url: String,
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn voices_handler(State(state): State<AppState>) -> Result<Json<VoiceMap>, ApiError> {
    Ok(Json(state.catalog.fetch_voices().await?))
}

async fn text_to_speech_handler(
    State(state): State<AppState>,
    Json(body): Json<TextToSpeechBody>,
) -> Result<Json<TextToSpeechResponse>, ApiError> {
    check_adjustments(body.rate, body.pitch).map_err(ApiError::BadRequest)?;

    let _permit = state
        .permits
        .acquire()
        .await
        .map_err(|_| ApiError::Unavailable)?;

    let request = SynthesisRequest::new(body.text, body.voice)
        .with_rate(body.rate)
        .with_pitch(body.pitch);
    let path = state.job.run(&request).await?;

    let name = Path::new(&path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Json(TextToSpeechResponse {
        url: format!("/audio/{name}"),
        path,
    }))
}

async fn audio_handler(State(state): State<AppState>, UrlPath(name): UrlPath<String>) -> Response {
    if !is_audio_file_name(&name) {
        return StatusCode::NOT_FOUND.into_response();
    }

    match tokio::fs::read(state.audio_dir.join(&name)).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, "audio/mpeg")], bytes).into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Only files named the way the synthesis job names them are served.
fn is_audio_file_name(name: &str) -> bool {
    name.len() > OUTPUT_PREFIX.len() + OUTPUT_SUFFIX.len()
        && name.starts_with(OUTPUT_PREFIX)
        && name.ends_with(OUTPUT_SUFFIX)
        && !name.contains(['/', '\\'])
        && !name.contains("..")
}
