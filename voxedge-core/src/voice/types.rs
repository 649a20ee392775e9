use serde::{Deserialize, Serialize};

/// One synthetic voice as described by the speech service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VoiceDescriptor {
    /// e.g. `Microsoft Server Speech Text to Speech Voice (zh-CN, XiaoxiaoNeural)`
    pub name: String,
    /// e.g. `zh-CN-XiaoxiaoNeural`; this is what synthesis requests address
    pub short_name: String,
    pub gender: String,
    pub locale: String,
    #[serde(default)]
    pub suggested_codec: String,
    #[serde(default)]
    pub friendly_name: String,
    /// `GA`, `Preview`, ...
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub voice_tag: VoiceTag,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VoiceTag {
    #[serde(default)]
    pub content_categories: Vec<String>,
    #[serde(default)]
    pub voice_personalities: Vec<String>,
}

impl VoiceDescriptor {
    /// The human-facing catalog key, `"<ShortName> - <Gender>"`.
    pub fn display_key(&self) -> String {
        format!("{}{}{}", self.short_name, DISPLAY_KEY_SEPARATOR, self.gender)
    }
}

pub const DISPLAY_KEY_SEPARATOR: &str = " - ";

/// Extracts the short voice identifier from a display key. Anything after
/// the first separator (the gender) is ignored.
pub fn short_name_from_key(display_key: &str) -> &str {
    display_key
        .split_once(DISPLAY_KEY_SEPARATOR)
        .map_or(display_key, |(short_name, _)| short_name)
}
