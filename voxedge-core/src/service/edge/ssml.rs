//! Text preparation and SSML rendering for the read-aloud endpoint.

use std::sync::OnceLock;

use regex::Regex;

use crate::service::{ServiceError, SpeechRequest};

/// The service rejects SSML documents above roughly this many bytes.
pub const MAX_CHUNK_BYTES: usize = 4096;

const LONG_NAME_PREFIX: &str = "Microsoft Server Speech Text to Speech Voice";

fn short_voice_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([a-z]{2,})-([A-Z]{2,})-(.+Neural)$").unwrap())
}

fn long_voice_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^Microsoft Server Speech Text to Speech Voice \(.+,.+\)$").unwrap()
    })
}

fn rate_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[+-]\d+%$").unwrap())
}

fn pitch_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[+-]\d+Hz$").unwrap())
}

/// Validated parameters of one synthesis, ready to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsmlParams {
    pub voice: String,
    pub rate: String,
    pub pitch: String,
    pub volume: String,
}

impl SsmlParams {
    pub fn from_request(request: &SpeechRequest) -> Result<Self, ServiceError> {
        let voice = long_voice_name(&request.voice)?;

        if !rate_pattern().is_match(&request.rate) {
            return Err(ServiceError::Rejected(anyhow::anyhow!(
                "Invalid rate '{}'",
                request.rate
            )));
        }
        if !pitch_pattern().is_match(&request.pitch) {
            return Err(ServiceError::Rejected(anyhow::anyhow!(
                "Invalid pitch '{}'",
                request.pitch
            )));
        }

        Ok(Self {
            voice,
            rate: request.rate.clone(),
            pitch: request.pitch.clone(),
            volume: "+0%".to_string(),
        })
    }

    /// Renders one SSML document. `escaped_text` must already be XML
    /// escaped.
    pub fn render(&self, escaped_text: &str) -> String {
        format!(
            "<speak version='1.0' xmlns='http://www.w3.org/2001/10/synthesis' xml:lang='en-US'>\
             <voice name='{}'><prosody pitch='{}' rate='{}' volume='{}'>{}</prosody></voice></speak>",
            self.voice, self.pitch, self.rate, self.volume, escaped_text
        )
    }
}

/// `en-US-JennyNeural` becomes
/// `Microsoft Server Speech Text to Speech Voice (en-US, JennyNeural)`.
/// Long names are accepted unchanged.
pub fn long_voice_name(voice: &str) -> Result<String, ServiceError> {
    if long_voice_pattern().is_match(voice) {
        return Ok(voice.to_string());
    }

    let Some(captures) = short_voice_pattern().captures(voice) else {
        return Err(ServiceError::Rejected(anyhow::anyhow!(
            "Invalid voice '{voice}'"
        )));
    };

    let lang = &captures[1];
    let mut region = captures[2].to_string();
    let mut name = captures[3].to_string();
    // Voices like zh-CN-liaoning-XiaobeiNeural carry a sub-region.
    if let Some((sub_region, rest)) = name.split_once('-') {
        region = format!("{region}-{sub_region}");
        name = rest.to_string();
    }

    Ok(format!("{LONG_NAME_PREFIX} ({lang}-{region}, {name})"))
}

/// Replaces control characters the service chokes on with spaces. Tab, line
/// feed and carriage return are kept.
pub fn remove_incompatible_characters(text: &str) -> String {
    text.chars()
        .map(|c| match c as u32 {
            0..=8 | 11..=12 | 14..=31 => ' ',
            _ => c,
        })
        .collect()
}

pub fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Cleans, escapes and splits `text` into chunks the service accepts.
pub fn prepare_text(text: &str) -> Vec<String> {
    split_text_by_byte_length(
        &escape_xml(&remove_incompatible_characters(text)),
        MAX_CHUNK_BYTES,
    )
}

/// Splits escaped text into trimmed, non-empty chunks of at most
/// `max_bytes` bytes. Splits prefer the last newline, then the last space,
/// and never cut a UTF-8 character or an XML entity in half.
pub fn split_text_by_byte_length(text: &str, max_bytes: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut rest = text;

    while rest.len() > max_bytes {
        let mut split_at = floor_char_boundary(rest, max_bytes);

        let window = &rest[..split_at];
        if let Some(pos) = window.rfind('\n').or_else(|| window.rfind(' ')) {
            if pos > 0 {
                split_at = pos;
            }
        }

        if let Some(amp) = rest[..split_at].rfind('&') {
            if amp > 0 && !rest[amp..split_at].contains(';') {
                split_at = amp;
            }
        }

        if split_at == 0 {
            // A single character wider than max_bytes; emit it on its own.
            split_at = rest.chars().next().map_or(rest.len(), char::len_utf8);
        }

        push_trimmed(&mut chunks, &rest[..split_at]);
        rest = &rest[split_at..];
    }

    push_trimmed(&mut chunks, rest);
    chunks
}

fn push_trimmed(chunks: &mut Vec<String>, chunk: &str) {
    let chunk = chunk.trim();
    if !chunk.is_empty() {
        chunks.push(chunk.to_string());
    }
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}
