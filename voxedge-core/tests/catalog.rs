use std::time::Duration;

use voxedge_core::{
    service::mock::MockBehavior, voice::short_name_from_key, PriorityOrder, SpeechError,
};

mod fixture;

use fixture::{voice, Fixture};

#[tokio::test]
async fn test_catalog_is_ordered_by_priority() {
    let fixture = Fixture::new();

    let catalog = fixture.catalog.fetch_voices().await.unwrap();
    let keys: Vec<&str> = catalog.keys().map(String::as_str).collect();

    assert_eq!(
        keys,
        vec![
            "zh-CN-XiaoxiaoNeural - Female",
            "zh-CN-YunxiNeural - Male",
            "zh-TW-HsiaoChenNeural - Female",
            "en-US-GuyNeural - Male",
            "en-US-JennyNeural - Female",
            "de-DE-KatjaNeural - Female",
            "ja-JP-NanamiNeural - Female",
            "sw-KE-RafikiNeural - Male",
        ]
    );
    assert_eq!(fixture.call_count(), 1);
}

#[tokio::test]
async fn test_every_voice_appears_under_its_display_key() {
    let fixture = Fixture::new();

    let catalog = fixture.catalog.fetch_voices().await.unwrap();

    assert_eq!(catalog.len(), fixture::sample_voices().len());
    for (key, descriptor) in &catalog {
        assert_eq!(key, &format!("{} - {}", descriptor.short_name, descriptor.gender));
        assert_eq!(short_name_from_key(key), descriptor.short_name);
    }
}

#[tokio::test]
async fn test_unlisted_locales_sort_last_by_name() {
    let fixture = Fixture::with_voices_and_behavior(
        vec![
            voice("xh-ZA-ThandoNeural", "Female"),
            voice("af-ZA-AdriNeural", "Female"),
            voice("en-GB-SoniaNeural", "Female"),
        ],
        MockBehavior::Success,
    );

    let catalog = fixture.catalog.fetch_voices().await.unwrap();
    let keys: Vec<&str> = catalog.keys().map(String::as_str).collect();

    assert_eq!(
        keys,
        vec![
            "en-GB-SoniaNeural - Female",
            "af-ZA-AdriNeural - Female",
            "xh-ZA-ThandoNeural - Female",
        ]
    );
}

#[tokio::test]
async fn test_empty_voice_list_gives_empty_catalog() {
    let fixture = Fixture::with_voices_and_behavior(Vec::new(), MockBehavior::Success);
    assert!(fixture.catalog.fetch_voices().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_fetch_recovers_from_handshake_failures() {
    let fixture = Fixture::with_behavior(MockBehavior::HandshakeErrorThenSuccess {
        remaining_errors: 4,
    });

    let start = tokio::time::Instant::now();
    let catalog = fixture.catalog.fetch_voices().await.unwrap();

    assert_eq!(catalog.len(), fixture::sample_voices().len());
    assert_eq!(fixture.call_count(), 5);
    // Waits of 0s, 1s, 2s and 3s between the five attempts
    assert_eq!(start.elapsed(), Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn test_fetch_gives_up_after_five_attempts() {
    let fixture = Fixture::with_behavior(MockBehavior::AlwaysHandshakeError);

    let error = fixture.catalog.fetch_voices().await.unwrap_err();

    assert!(error.is_transient());
    assert!(matches!(
        error,
        SpeechError::TransientService { attempts: 5, .. }
    ));
    assert_eq!(fixture.call_count(), 5);
}

#[tokio::test]
async fn test_rejection_is_not_retried() {
    let fixture = Fixture::with_behavior(MockBehavior::AlwaysRejected);

    let error = fixture.catalog.fetch_voices().await.unwrap_err();

    assert!(matches!(error, SpeechError::Remote(_)));
    assert_eq!(fixture.call_count(), 1);
}

#[tokio::test]
async fn test_each_fetch_queries_the_service() {
    let fixture = Fixture::new();

    let first = fixture.catalog.fetch_voices().await.unwrap();
    let second = fixture.catalog.fetch_voices().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(fixture.call_count(), 2);
}

#[test]
fn test_default_priority_order_starts_with_chinese_and_english() {
    let order = PriorityOrder::default();
    assert_eq!(&order.prefixes()[..4], &["zh", "en-US", "en-GB", "en"]);
}
