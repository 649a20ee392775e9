//! Message framing of the read-aloud WebSocket.
//!
//! Both directions use HTTP-style `Key:Value\r\n` headers followed by a
//! body. Text frames separate the two with a blank line; binary frames
//! start with a big-endian `u16` header length instead.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::service::ServiceError;

pub const PATH_AUDIO: &str = "audio";
pub const PATH_AUDIO_METADATA: &str = "audio.metadata";
pub const PATH_RESPONSE: &str = "response";
pub const PATH_TURN_START: &str = "turn.start";
pub const PATH_TURN_END: &str = "turn.end";

/// Content type of every non-empty audio frame for the MP3 output formats.
pub const AUDIO_CONTENT_TYPE: &str = "audio/mpeg";

/// JavaScript `Date.toString()` style timestamp the service expects.
pub fn date_to_string(now: DateTime<Utc>) -> String {
    now.format("%a %b %d %Y %H:%M:%S GMT+0000 (Coordinated Universal Time)")
        .to_string()
}

pub fn speech_config_message(timestamp: &str, output_format: &str) -> String {
    format!(
        "X-Timestamp:{timestamp}\r\n\
         Content-Type:application/json; charset=utf-8\r\n\
         Path:speech.config\r\n\r\n\
         {{\"context\":{{\"synthesis\":{{\"audio\":{{\"metadataoptions\":{{\
         \"sentenceBoundaryEnabled\":\"false\",\"wordBoundaryEnabled\":\"false\"}},\
         \"outputFormat\":\"{output_format}\"}}}}}}}}\r\n"
    )
}

pub fn ssml_message(request_id: &str, timestamp: &str, ssml: &str) -> String {
    // The trailing Z on the timestamp matches what the browser sends.
    format!(
        "X-RequestId:{request_id}\r\n\
         Content-Type:application/ssml+xml\r\n\
         X-Timestamp:{timestamp}Z\r\n\
         Path:ssml\r\n\r\n\
         {ssml}"
    )
}

/// A decoded frame from the service.
#[derive(Debug, PartialEq, Eq)]
pub struct Frame<'a> {
    pub headers: HashMap<String, String>,
    pub body: &'a [u8],
}

impl Frame<'_> {
    pub fn path(&self) -> Option<&str> {
        self.headers.get("Path").map(String::as_str)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("Content-Type").map(String::as_str)
    }
}

fn parse_headers(raw: &[u8]) -> HashMap<String, String> {
    String::from_utf8_lossy(raw)
        .split("\r\n")
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

pub fn parse_text_frame(text: &str) -> Result<Frame<'_>, ServiceError> {
    let Some(split) = text.find("\r\n\r\n") else {
        return Err(ServiceError::Protocol(anyhow::anyhow!(
            "Text frame without header separator"
        )));
    };

    Ok(Frame {
        headers: parse_headers(text[..split].as_bytes()),
        body: text[split + 4..].as_bytes(),
    })
}

pub fn parse_binary_frame(data: &[u8]) -> Result<Frame<'_>, ServiceError> {
    if data.len() < 2 {
        return Err(ServiceError::Protocol(anyhow::anyhow!(
            "Binary frame too short for header length"
        )));
    }

    let header_len = u16::from_be_bytes([data[0], data[1]]) as usize;
    if data.len() < 2 + header_len {
        return Err(ServiceError::Protocol(anyhow::anyhow!(
            "Binary frame header length {header_len} exceeds frame size {}",
            data.len()
        )));
    }

    Ok(Frame {
        headers: parse_headers(&data[2..2 + header_len]),
        body: &data[2 + header_len..],
    })
}
