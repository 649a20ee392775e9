use crate::retry::RetryPolicy;
use crate::service::edge::EdgeConfig;
use crate::voice::PriorityOrder;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CatalogConfig {
    /// Locale prefixes, highest priority first
    #[serde(default)]
    pub priority_order: PriorityOrder,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SynthesisConfig {
    /// Where generated audio files are created. Defaults to a `voxedge`
    /// directory under the system temp directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum number of synthesis jobs served at the same time
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7860
}

fn default_concurrency_limit() -> usize {
    50
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            concurrency_limit: default_concurrency_limit(),
        }
    }
}

/// Application settings, persisted as TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub service: EdgeConfig,

    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub synthesis: SynthesisConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

impl Settings {
    /// Snapshot of the values the catalog and synthesis workflows share.
    /// Built once at startup and handed out behind an `Arc`.
    pub fn speech_config(&self) -> SpeechConfig {
        SpeechConfig {
            priority_order: self.catalog.priority_order.clone(),
            retry: self.retry.clone(),
            output_dir: self.synthesis.output_dir.clone(),
        }
    }
}

/// Immutable configuration shared by [`crate::VoiceCatalog`] and
/// [`crate::SynthesisJob`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpeechConfig {
    pub priority_order: PriorityOrder,
    pub retry: RetryPolicy,
    pub output_dir: Option<PathBuf>,
}
