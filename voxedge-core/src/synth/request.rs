use serde::{Deserialize, Serialize};

use crate::service::SpeechRequest;
use crate::voice::short_name_from_key;

/// One text to speech conversion as requested by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisRequest {
    /// May be empty, which produces an empty audio file.
    pub text: String,
    /// A catalog display key, `"<ShortName> - <Gender>"`.
    pub voice: String,
    /// Speaking rate adjustment in percent
    #[serde(default)]
    pub rate: i32,
    /// Pitch adjustment in Hz
    #[serde(default)]
    pub pitch: i32,
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>, voice: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: voice.into(),
            rate: 0,
            pitch: 0,
        }
    }

    pub fn with_rate(mut self, rate_percent: i32) -> Self {
        self.rate = rate_percent;
        self
    }

    pub fn with_pitch(mut self, pitch_hz: i32) -> Self {
        self.pitch = pitch_hz;
        self
    }

    /// Wire parameters. Only the short voice name is forwarded; the gender
    /// half of the display key is not checked.
    pub fn to_speech_request(&self) -> SpeechRequest {
        SpeechRequest {
            text: self.text.clone(),
            voice: short_name_from_key(&self.voice).to_string(),
            rate: format_rate(self.rate),
            pitch: format_pitch(self.pitch),
        }
    }
}

/// `0` -> `+0%`, `-25` -> `-25%`
pub fn format_rate(rate_percent: i32) -> String {
    format!("{rate_percent:+}%")
}

/// `0` -> `+0Hz`, `-10` -> `-10Hz`
pub fn format_pitch(pitch_hz: i32) -> String {
    format!("{pitch_hz:+}Hz")
}
