//! Microsoft Edge read-aloud text-to-speech service

pub mod protocol;
pub mod ssml;
pub mod token;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures_util::{SinkExt, Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};
use uuid::Uuid;

use self::protocol::{
    AUDIO_CONTENT_TYPE, PATH_AUDIO, PATH_AUDIO_METADATA, PATH_RESPONSE, PATH_TURN_END,
    PATH_TURN_START,
};
use self::ssml::SsmlParams;
use self::token::DrmClock;
use crate::service::{AudioStream, ServiceError, SpeechRequest, SpeechService};
use crate::voice::VoiceDescriptor;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const EDGE_ORIGIN: &str = "chrome-extension://jdiccldimpdaibmpdkjnbmckianbfold";
const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EdgeConfig {
    #[serde(default = "default_voice_list_url")]
    pub voice_list_url: String,

    #[serde(default = "default_websocket_url")]
    pub websocket_url: String,

    #[serde(default = "default_trusted_client_token")]
    pub trusted_client_token: String,

    /// Edge browser version the requests claim to come from
    #[serde(default = "default_chromium_version")]
    pub chromium_version: String,

    #[serde(default = "default_output_format")]
    pub output_format: String,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Longest silence tolerated from the service while audio streams
    #[serde(default = "default_receive_timeout_secs")]
    pub receive_timeout_secs: u64,
}

fn default_voice_list_url() -> String {
    "https://speech.platform.bing.com/consumer/speech/synthesize/readaloud/voices/list".to_string()
}

fn default_websocket_url() -> String {
    "wss://speech.platform.bing.com/consumer/speech/synthesize/readaloud/edge/v1".to_string()
}

fn default_trusted_client_token() -> String {
    "6A5AA1D4EAFF4E9FB37E23D68491D6F4".to_string()
}

fn default_chromium_version() -> String {
    "130.0.2849.68".to_string()
}

fn default_output_format() -> String {
    "audio-24khz-48kbitrate-mono-mp3".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_receive_timeout_secs() -> u64 {
    60
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            voice_list_url: default_voice_list_url(),
            websocket_url: default_websocket_url(),
            trusted_client_token: default_trusted_client_token(),
            chromium_version: default_chromium_version(),
            output_format: default_output_format(),
            connect_timeout_secs: default_connect_timeout_secs(),
            receive_timeout_secs: default_receive_timeout_secs(),
        }
    }
}

impl EdgeConfig {
    fn sec_ms_gec_version(&self) -> String {
        format!("1-{}", self.chromium_version)
    }

    fn user_agent(&self) -> String {
        let major = self
            .chromium_version
            .split('.')
            .next()
            .unwrap_or(&self.chromium_version);
        format!(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/{major}.0.0.0 Safari/537.36 Edg/{major}.0.0.0"
        )
    }

    pub fn voice_list_request_url(&self, sec_ms_gec: &str) -> String {
        format!(
            "{}?trustedclienttoken={}&Sec-MS-GEC={}&Sec-MS-GEC-Version={}",
            self.voice_list_url,
            self.trusted_client_token,
            sec_ms_gec,
            self.sec_ms_gec_version()
        )
    }

    pub fn websocket_request_url(&self, sec_ms_gec: &str, connection_id: &str) -> String {
        format!(
            "{}?TrustedClientToken={}&Sec-MS-GEC={}&Sec-MS-GEC-Version={}&ConnectionId={}",
            self.websocket_url,
            self.trusted_client_token,
            sec_ms_gec,
            self.sec_ms_gec_version(),
            connection_id
        )
    }
}

/// Client of the Edge read-aloud service: voice list over HTTPS, synthesis
/// over a WebSocket.
pub struct EdgeTts {
    config: EdgeConfig,
    client: Client,
    clock: Arc<DrmClock>,
}

impl EdgeTts {
    pub fn new(config: EdgeConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(config.user_agent())
            .build()?;

        Ok(Self {
            config,
            client,
            clock: Arc::new(DrmClock::default()),
        })
    }

    fn sec_ms_gec(&self) -> String {
        self.clock.sec_ms_gec(&self.config.trusted_client_token)
    }

    /// A refused handshake carries the server time; resync so the next
    /// attempt sends a token the server accepts.
    fn learn_clock_skew(&self, status: u16, date: Option<&str>) {
        if status != 403 {
            return;
        }
        if let Some(date) = date {
            self.clock.adjust_from_server_date(date);
        }
    }

    async fn connect(&self) -> Result<Socket, ServiceError> {
        let connection_id = Uuid::new_v4().simple().to_string();
        let url = self
            .config
            .websocket_request_url(&self.sec_ms_gec(), &connection_id);

        let mut request = url
            .into_client_request()
            .map_err(|e| ServiceError::Rejected(anyhow::anyhow!("Invalid WebSocket URL: {e}")))?;
        let headers = request.headers_mut();
        headers.insert("Pragma", HeaderValue::from_static("no-cache"));
        headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
        headers.insert("Origin", HeaderValue::from_static(EDGE_ORIGIN));
        headers.insert("Accept-Language", HeaderValue::from_static(ACCEPT_LANGUAGE));
        headers.insert(
            "User-Agent",
            HeaderValue::from_str(&self.config.user_agent()).map_err(|e| {
                ServiceError::Rejected(anyhow::anyhow!("Invalid user agent header: {e}"))
            })?,
        );

        let timeout = Duration::from_secs(self.config.connect_timeout_secs);
        match tokio::time::timeout(timeout, connect_async(request)).await {
            Err(_) => Err(ServiceError::Handshake(anyhow::anyhow!(
                "Timed out after {timeout:?} connecting to speech service"
            ))),
            Ok(Err(error)) => Err(self.classify_connect_error(error)),
            Ok(Ok((socket, _))) => {
                debug!(%connection_id, "Connected to speech service");
                Ok(socket)
            }
        }
    }

    fn classify_connect_error(&self, error: WsError) -> ServiceError {
        match error {
            WsError::Http(response) => {
                let status = response.status();
                let date = response
                    .headers()
                    .get("date")
                    .and_then(|value| value.to_str().ok());
                self.learn_clock_skew(status.as_u16(), date);
                ServiceError::Handshake(anyhow::anyhow!(
                    "Server rejected WebSocket handshake with status {status}"
                ))
            }
            WsError::Url(e) => {
                ServiceError::Rejected(anyhow::anyhow!("Invalid WebSocket URL: {e}"))
            }
            other => ServiceError::Handshake(anyhow::anyhow!(other)),
        }
    }
}

#[async_trait]
impl SpeechService for EdgeTts {
    fn name(&self) -> &'static str {
        "Edge"
    }

    async fn list_voices(&self) -> Result<Vec<VoiceDescriptor>, ServiceError> {
        let response = self
            .client
            .get(self.config.voice_list_request_url(&self.sec_ms_gec()))
            .header("Accept", "*/*")
            .header("Accept-Language", ACCEPT_LANGUAGE)
            .header("Sec-CH-UA-Mobile", "?0")
            .header("Sec-Fetch-Site", "none")
            .header("Sec-Fetch-Mode", "cors")
            .header("Sec-Fetch-Dest", "empty")
            .send()
            .await
            .map_err(|e| {
                debug!(?e, "Voice list request failed");
                ServiceError::Handshake(anyhow::anyhow!("Network error: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let date = response
                .headers()
                .get(reqwest::header::DATE)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            self.learn_clock_skew(status.as_u16(), date.as_deref());

            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Handshake(anyhow::anyhow!(
                "Voice list error {status}: {body}"
            )));
        }

        let body = response.text().await.map_err(|e| {
            ServiceError::Handshake(anyhow::anyhow!("Failed to read voice list: {e}"))
        })?;
        let voices: Vec<VoiceDescriptor> = serde_json::from_str(&body)?;
        debug!(count = voices.len(), "Received voice list");
        Ok(voices)
    }

    async fn open_synthesis(&self, request: &SpeechRequest) -> Result<AudioStream, ServiceError> {
        let params = SsmlParams::from_request(request)?;
        let chunks = ssml::prepare_text(&request.text);
        let socket = self.connect().await?;

        Ok(Box::pin(stream_audio(
            socket,
            params,
            chunks,
            self.config.output_format.clone(),
            Duration::from_secs(self.config.receive_timeout_secs),
        )))
    }
}

enum Incoming {
    Audio(Vec<u8>),
    TurnEnd,
    Skip,
}

/// Sends one request per text chunk over the open socket and yields the
/// audio of each turn in order.
fn stream_audio(
    mut socket: Socket,
    params: SsmlParams,
    chunks: Vec<String>,
    output_format: String,
    receive_timeout: Duration,
) -> impl Stream<Item = Result<Vec<u8>, ServiceError>> + Send {
    async_stream::try_stream! {
        let mut received_audio = false;

        for chunk in &chunks {
            send_turn(&mut socket, &params, chunk, &output_format).await?;

            loop {
                let message = next_message(&mut socket, receive_timeout).await?;
                match decode_message(message)? {
                    Incoming::Audio(audio) => {
                        received_audio = true;
                        yield audio;
                    }
                    Incoming::TurnEnd => break,
                    Incoming::Skip => {}
                }
            }
        }

        ensure_audio(received_audio, chunks.len())?;
        let _ = socket.close(None).await;
    }
}

async fn send_turn(
    socket: &mut Socket,
    params: &SsmlParams,
    escaped_text: &str,
    output_format: &str,
) -> Result<(), ServiceError> {
    let timestamp = protocol::date_to_string(Utc::now());
    let request_id = Uuid::new_v4().simple().to_string();

    socket
        .send(Message::Text(protocol::speech_config_message(
            &timestamp,
            output_format,
        )))
        .await
        .map_err(|e| ServiceError::Protocol(anyhow::anyhow!("Failed to send config: {e}")))?;
    socket
        .send(Message::Text(protocol::ssml_message(
            &request_id,
            &timestamp,
            &params.render(escaped_text),
        )))
        .await
        .map_err(|e| ServiceError::Protocol(anyhow::anyhow!("Failed to send SSML: {e}")))?;

    trace!(%request_id, bytes = escaped_text.len(), "Sent synthesis turn");
    Ok(())
}

async fn next_message(socket: &mut Socket, receive_timeout: Duration) -> Result<Message, ServiceError> {
    match tokio::time::timeout(receive_timeout, socket.next()).await {
        Err(_) => Err(ServiceError::Protocol(anyhow::anyhow!(
            "No data from speech service for {receive_timeout:?}"
        ))),
        Ok(None) => Err(ServiceError::Protocol(anyhow::anyhow!(
            "Connection closed before the turn ended"
        ))),
        Ok(Some(message)) => {
            message.map_err(|e| ServiceError::Protocol(anyhow::anyhow!("WebSocket error: {e}")))
        }
    }
}

fn decode_message(message: Message) -> Result<Incoming, ServiceError> {
    match message {
        Message::Text(text) => {
            let frame = protocol::parse_text_frame(&text)?;
            match frame.path() {
                Some(PATH_TURN_END) => Ok(Incoming::TurnEnd),
                Some(PATH_TURN_START) | Some(PATH_RESPONSE) | Some(PATH_AUDIO_METADATA) => {
                    Ok(Incoming::Skip)
                }
                other => Err(ServiceError::Protocol(anyhow::anyhow!(
                    "Unexpected text frame path: {other:?}"
                ))),
            }
        }
        Message::Binary(data) => {
            let frame = protocol::parse_binary_frame(&data)?;
            if frame.path() != Some(PATH_AUDIO) {
                return Err(ServiceError::Protocol(anyhow::anyhow!(
                    "Unexpected binary frame path: {:?}",
                    frame.path()
                )));
            }
            if frame.body.is_empty() {
                return Ok(Incoming::Skip);
            }
            if frame.content_type() != Some(AUDIO_CONTENT_TYPE) {
                return Err(ServiceError::Protocol(anyhow::anyhow!(
                    "Unexpected audio content type: {:?}",
                    frame.content_type()
                )));
            }
            Ok(Incoming::Audio(frame.body.to_vec()))
        }
        Message::Close(close) => Err(ServiceError::Protocol(anyhow::anyhow!(
            "Connection closed by speech service: {close:?}"
        ))),
        _ => Ok(Incoming::Skip),
    }
}

/// The service answers an unknown voice with an empty turn rather than an
/// error.
fn ensure_audio(received_audio: bool, chunk_count: usize) -> Result<(), ServiceError> {
    if chunk_count > 0 && !received_audio {
        return Err(ServiceError::Rejected(anyhow::anyhow!(
            "No audio was received. Please verify that your parameters are correct."
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_tungstenite::tungstenite::http::Response;

    fn audio_frame(body: &[u8]) -> Vec<u8> {
        binary_frame("X-RequestId:abc\r\nContent-Type:audio/mpeg\r\nPath:audio\r\n", body)
    }

    fn binary_frame(headers: &str, body: &[u8]) -> Vec<u8> {
        let mut frame = (headers.len() as u16).to_be_bytes().to_vec();
        frame.extend_from_slice(headers.as_bytes());
        frame.extend_from_slice(body);
        frame
    }

    #[test]
    fn test_request_urls() {
        let config = EdgeConfig::default();
        assert_eq!(
            config.voice_list_request_url("TOKEN"),
            "https://speech.platform.bing.com/consumer/speech/synthesize/readaloud/voices/list\
             ?trustedclienttoken=6A5AA1D4EAFF4E9FB37E23D68491D6F4\
             &Sec-MS-GEC=TOKEN&Sec-MS-GEC-Version=1-130.0.2849.68"
        );
        assert_eq!(
            config.websocket_request_url("TOKEN", "conn"),
            "wss://speech.platform.bing.com/consumer/speech/synthesize/readaloud/edge/v1\
             ?TrustedClientToken=6A5AA1D4EAFF4E9FB37E23D68491D6F4\
             &Sec-MS-GEC=TOKEN&Sec-MS-GEC-Version=1-130.0.2849.68&ConnectionId=conn"
        );
    }

    #[test]
    fn test_user_agent_uses_major_version() {
        let user_agent = EdgeConfig::default().user_agent();
        assert!(user_agent.contains("Chrome/130.0.0.0"));
        assert!(user_agent.ends_with("Edg/130.0.0.0"));
    }

    #[test]
    fn test_forbidden_handshake_learns_clock_skew() {
        let tts = EdgeTts::new(EdgeConfig::default()).unwrap();
        let response = Response::builder()
            .status(403)
            .header("date", "Mon, 01 Jan 2001 00:00:00 GMT")
            .body(None)
            .unwrap();

        let error = tts.classify_connect_error(WsError::Http(response));

        assert!(error.is_handshake());
        assert!(tts.clock.skew_secs() < 0);
    }

    #[test]
    fn test_other_statuses_do_not_touch_clock() {
        let tts = EdgeTts::new(EdgeConfig::default()).unwrap();
        let response = Response::builder()
            .status(503)
            .header("date", "Mon, 01 Jan 2001 00:00:00 GMT")
            .body(None)
            .unwrap();

        assert!(tts.classify_connect_error(WsError::Http(response)).is_handshake());
        assert_eq!(tts.clock.skew_secs(), 0);
    }

    #[test]
    fn test_decode_messages() {
        assert!(matches!(
            decode_message(Message::Binary(audio_frame(b"mp3"))),
            Ok(Incoming::Audio(audio)) if audio == b"mp3"
        ));
        assert!(matches!(
            decode_message(Message::Binary(audio_frame(b""))),
            Ok(Incoming::Skip)
        ));
        assert!(matches!(
            decode_message(Message::Text("Path:turn.end\r\n\r\n{}".to_string())),
            Ok(Incoming::TurnEnd)
        ));
        assert!(matches!(
            decode_message(Message::Text("Path:turn.start\r\n\r\n{}".to_string())),
            Ok(Incoming::Skip)
        ));
        assert!(matches!(
            decode_message(Message::Text("Path:surprise\r\n\r\n{}".to_string())),
            Err(ServiceError::Protocol(_))
        ));
        assert!(matches!(
            decode_message(Message::Close(None)),
            Err(ServiceError::Protocol(_))
        ));
    }

    #[test]
    fn test_audio_needs_mpeg_content_type() {
        let missing = binary_frame("X-RequestId:abc\r\nPath:audio\r\n", b"mp3");
        assert!(matches!(
            decode_message(Message::Binary(missing)),
            Err(ServiceError::Protocol(_))
        ));

        let wav = binary_frame(
            "X-RequestId:abc\r\nContent-Type:audio/x-wav\r\nPath:audio\r\n",
            b"RIFF",
        );
        assert!(matches!(
            decode_message(Message::Binary(wav)),
            Err(ServiceError::Protocol(_))
        ));

        // The closing audio frame of a turn has no body and no content type.
        let closing = binary_frame("X-RequestId:abc\r\nPath:audio\r\n", b"");
        assert!(matches!(
            decode_message(Message::Binary(closing)),
            Ok(Incoming::Skip)
        ));
    }

    #[test]
    fn test_ensure_audio() {
        assert!(ensure_audio(true, 1).is_ok());
        assert!(ensure_audio(false, 0).is_ok());
        assert!(matches!(
            ensure_audio(false, 2),
            Err(ServiceError::Rejected(_))
        ));
    }
}
