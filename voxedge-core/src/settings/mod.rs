pub mod config;
pub mod manager;

#[cfg(test)]
mod tests;

pub use config::{CatalogConfig, ServerConfig, Settings, SpeechConfig, SynthesisConfig};
pub use manager::SettingsManager;
