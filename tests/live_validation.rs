use std::{env, sync::Once};

use labtract::{config, pipeline::ReportService};

static INIT: Once = Once::new();

fn set_default_env(key: &str, value: &str) {
    let needs_value = env::var(key).map(|v| v.trim().is_empty()).unwrap_or(true);
    if needs_value {
        // SAFETY: Tests run serially via Once and we intentionally mutate process env.
        unsafe {
            env::set_var(key, value);
        }
    }
}

fn init_config_once() {
    INIT.call_once(|| {
        set_default_env("OCR_URL", "http://127.0.0.1:8500");
        set_default_env("LLM_URL", "http://127.0.0.1:8600");
        set_default_env("LLM_MODEL", "extractor-1");
        set_default_env("STORAGE_URL", "http://127.0.0.1:9000");
        set_default_env("STAGING_BUCKET", "labtract-staging");
        set_default_env("ARTIFACT_BUCKET", "labtract-artifacts");
        config::init_config();
    });
}

#[tokio::test]
#[ignore = "Requires live OCR, LLM, and blob store endpoints"]
async fn live_image_extraction_roundtrip() {
    init_config_once();
    let sample = env::var("LABTRACT_SAMPLE_IMAGE").expect("set LABTRACT_SAMPLE_IMAGE to a scan");
    let bytes = std::fs::read(&sample).expect("sample image should be readable");

    let service = ReportService::new();
    let outcome = service
        .extract("sample.png", bytes)
        .await
        .expect("extraction should succeed against live providers");

    assert!(outcome.chunk_count >= 1, "OCR produced no text: {outcome:?}");
}

#[tokio::test]
#[ignore = "Requires live OCR, LLM, and blob store endpoints"]
async fn live_analysis_produces_narrative() {
    init_config_once();
    let sample = env::var("LABTRACT_SAMPLE_IMAGE").expect("set LABTRACT_SAMPLE_IMAGE to a scan");
    let bytes = std::fs::read(&sample).expect("sample image should be readable");

    let service = ReportService::new();
    let outcome = service
        .analyze("sample.png", bytes)
        .await
        .expect("analysis should succeed against live providers");

    assert!(!outcome.narrative.is_empty());
}
