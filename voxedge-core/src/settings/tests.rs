use crate::retry::{Backoff, RetryPolicy};
use crate::settings::manager::SettingsManager;
use crate::settings::Settings;
use crate::voice::PriorityOrder;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_missing_file_is_created_with_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let settings_path = temp_dir.path().join("nested").join("settings.toml");

    let manager = SettingsManager::from_path(settings_path.clone()).unwrap();

    assert!(settings_path.exists());
    assert_eq!(manager.settings(), Settings::default());
    assert_eq!(manager.path(), settings_path.as_path());
}

#[test]
fn test_default_settings_round_trip_through_toml() {
    let contents = toml::to_string_pretty(&Settings::default()).unwrap();
    let parsed: Settings = toml::from_str(&contents).unwrap();
    assert_eq!(parsed, Settings::default());
}

#[test]
fn test_partial_file_fills_in_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let settings_path = temp_dir.path().join("settings.toml");
    std::fs::write(
        &settings_path,
        r#"
[retry]
max_attempts = 3

[retry.backoff]
type = "constant"
delay_ms = 250

[catalog]
priority_order = ["fr", "de"]
"#,
    )
    .unwrap();

    let settings = SettingsManager::from_path(settings_path).unwrap().settings();

    assert_eq!(
        settings.retry,
        RetryPolicy::new(3, Backoff::Constant { delay_ms: 250 })
    );
    assert_eq!(
        settings.catalog.priority_order,
        PriorityOrder::new(vec!["fr".to_string(), "de".to_string()])
    );
    assert_eq!(settings.server.port, 7860);
    assert_eq!(settings.synthesis.output_dir, None);
}

#[test]
fn test_corrupt_file_is_backed_up_and_reset() {
    let temp_dir = TempDir::new().unwrap();
    let settings_path = temp_dir.path().join("settings.toml");
    std::fs::write(&settings_path, "this is [not toml").unwrap();

    let manager = SettingsManager::from_path(settings_path.clone()).unwrap();

    assert_eq!(manager.settings(), Settings::default());
    let backup = temp_dir.path().join("settings.toml.backup");
    assert_eq!(
        std::fs::read_to_string(backup).unwrap(),
        "this is [not toml"
    );
}

#[test]
fn test_save_settings_updates_memory_and_disk() {
    let temp_dir = TempDir::new().unwrap();
    let settings_path = temp_dir.path().join("settings.toml");
    let manager = SettingsManager::from_path(settings_path.clone()).unwrap();

    let mut settings = manager.settings();
    settings.synthesis.output_dir = Some(PathBuf::from("/tmp/voxedge-out"));
    settings.server.port = 9000;
    manager.save_settings(settings.clone()).unwrap();

    assert_eq!(manager.settings(), settings);
    let reloaded = SettingsManager::from_path(settings_path).unwrap();
    assert_eq!(reloaded.settings(), settings);
}

#[test]
fn test_speech_config_snapshot() {
    let mut settings = Settings::default();
    settings.retry.max_attempts = 2;
    settings.synthesis.output_dir = Some(PathBuf::from("out"));

    let config = settings.speech_config();

    assert_eq!(config.retry.max_attempts, 2);
    assert_eq!(config.output_dir, Some(PathBuf::from("out")));
    assert_eq!(config.priority_order, PriorityOrder::default());
}
