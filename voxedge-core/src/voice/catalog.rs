use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::error::SpeechError;
use crate::service::{ServiceError, SpeechService};
use crate::settings::SpeechConfig;
use crate::voice::types::VoiceDescriptor;
use crate::voice::PriorityOrder;

/// Display key to voice, in priority order.
pub type VoiceMap = IndexMap<String, VoiceDescriptor>;

/// Fetches the service's voices and orders them for selection.
#[derive(Clone)]
pub struct VoiceCatalog {
    service: Arc<dyn SpeechService>,
    config: Arc<SpeechConfig>,
}

impl VoiceCatalog {
    pub fn new(service: Arc<dyn SpeechService>, config: Arc<SpeechConfig>) -> Self {
        Self { service, config }
    }

    /// Returns every voice keyed by `"<ShortName> - <Gender>"`. The first
    /// key is the highest priority voice.
    ///
    /// When two voices share a display key the later one replaces the
    /// earlier one.
    pub async fn fetch_voices(&self) -> Result<VoiceMap, SpeechError> {
        let voices = self
            .config
            .retry
            .run("list_voices", ServiceError::is_handshake, || {
                self.service.list_voices()
            })
            .await?;

        let catalog = build_catalog(voices, &self.config.priority_order);
        info!(
            service = self.service.name(),
            voices = catalog.len(),
            "Fetched voice catalog"
        );
        Ok(catalog)
    }
}

/// Sorts by priority rank then short name and keys each voice by its
/// display key.
pub fn build_catalog(mut voices: Vec<VoiceDescriptor>, priority: &PriorityOrder) -> VoiceMap {
    voices.sort_by(|a, b| {
        priority
            .sort_key(&a.short_name)
            .cmp(&priority.sort_key(&b.short_name))
    });

    let mut catalog = VoiceMap::with_capacity(voices.len());
    for voice in voices {
        let key = voice.display_key();
        if let Some(replaced) = catalog.insert(key, voice) {
            debug!(short_name = %replaced.short_name, "Duplicate display key, keeping later voice");
        }
    }
    catalog
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice(short_name: &str, gender: &str) -> VoiceDescriptor {
        VoiceDescriptor {
            name: format!("Voice ({short_name})"),
            short_name: short_name.to_string(),
            gender: gender.to_string(),
            locale: short_name.split('-').take(2).collect::<Vec<_>>().join("-"),
            suggested_codec: "audio-24khz-48kbitrate-mono-mp3".to_string(),
            friendly_name: short_name.to_string(),
            status: "GA".to_string(),
            voice_tag: Default::default(),
        }
    }

    #[test]
    fn test_build_catalog_orders_by_priority_then_name() {
        let voices = vec![
            voice("xx-YY-UnknownNeural", "Male"),
            voice("en-IN-NeerjaNeural", "Female"),
            voice("en-US-JennyNeural", "Female"),
            voice("en-AU-NatashaNeural", "Female"),
            voice("zh-CN-XiaoxiaoNeural", "Female"),
            voice("aa-ZZ-AlsoUnknownNeural", "Male"),
        ];

        let catalog = build_catalog(voices, &PriorityOrder::default());
        let keys: Vec<&str> = catalog.keys().map(String::as_str).collect();

        assert_eq!(
            keys,
            vec![
                "zh-CN-XiaoxiaoNeural - Female",
                "en-US-JennyNeural - Female",
                "en-AU-NatashaNeural - Female",
                "en-IN-NeerjaNeural - Female",
                "aa-ZZ-AlsoUnknownNeural - Male",
                "xx-YY-UnknownNeural - Male",
            ]
        );
    }

    #[test]
    fn test_duplicate_display_key_keeps_later_voice() {
        let mut first = voice("en-US-JennyNeural", "Female");
        first.status = "Preview".to_string();
        let second = voice("en-US-JennyNeural", "Female");

        let catalog = build_catalog(vec![first, second], &PriorityOrder::default());

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog["en-US-JennyNeural - Female"].status, "GA");
    }

    #[test]
    fn test_same_voice_different_gender_are_distinct() {
        let catalog = build_catalog(
            vec![
                voice("en-US-JennyNeural", "Female"),
                voice("en-US-JennyNeural", "Male"),
            ],
            &PriorityOrder::default(),
        );
        assert_eq!(catalog.len(), 2);
    }
}
