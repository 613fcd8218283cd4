use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use helmet_sentinel::config::SentineldConfig;
use helmet_sentinel::throttle::ThrottleMode;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "SENTINEL_CONFIG",
        "SENTINEL_API_ADDR",
        "SENTINEL_SOURCE_URL",
        "SENTINEL_EVIDENCE_ENDPOINT",
        "SENTINEL_MIN_UPLOAD_SECS",
        "SENTINEL_DETECTOR_BACKEND",
        "SENTINEL_UNSAFE_KEYWORDS",
        "SENTINEL_SAFE_KEYWORDS",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_apply_without_a_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = SentineldConfig::load().expect("load config");

    assert_eq!(cfg.api_addr, "127.0.0.1:8793");
    assert_eq!(cfg.source.url, "stub://camera");
    assert_eq!(cfg.source.target_fps, 10);
    assert_eq!(cfg.source.width, 640);
    assert_eq!(cfg.source.height, 480);
    assert_eq!(cfg.detector.backend, "stub");
    assert_eq!(cfg.detector.violation_threshold, 0.4);
    assert_eq!(cfg.detector.safe_threshold, 0.5);
    assert_eq!(cfg.evidence.endpoint, "mem://evidence");
    assert_eq!(cfg.evidence.throttle.mode, ThrottleMode::Debounce);
    assert_eq!(cfg.evidence.throttle.min_interval, Duration::from_secs(10));

    clear_env();
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "api": { "addr": "0.0.0.0:9000" },
        "source": {
            "url": "rtsp://site-camera-1",
            "target_fps": 12,
            "width": 800,
            "height": 600
        },
        "detector": {
            "backend": "tract",
            "model_path": "/var/lib/sentinel/model.onnx",
            "violation_threshold": 0.3,
            "safe_threshold": 0.6,
            "unsafe_keywords": ["no-helmet", "bare-head"],
            "safe_keywords": ["helmet"],
            "interval_ms": 150
        },
        "evidence": {
            "endpoint": "https://storage.example/upload",
            "throttle_mode": "sample",
            "min_interval_secs": 45
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("SENTINEL_CONFIG", file.path());
    std::env::set_var("SENTINEL_SOURCE_URL", "stub://override");
    std::env::set_var("SENTINEL_MIN_UPLOAD_SECS", "20");

    let cfg = SentineldConfig::load().expect("load config");

    assert_eq!(cfg.api_addr, "0.0.0.0:9000");
    // Env beats the file.
    assert_eq!(cfg.source.url, "stub://override");
    assert_eq!(cfg.source.target_fps, 12);
    assert_eq!(cfg.detector.backend, "tract");
    assert_eq!(
        cfg.detector.model_path.as_deref(),
        Some("/var/lib/sentinel/model.onnx")
    );
    assert_eq!(cfg.detector.violation_threshold, 0.3);
    assert_eq!(cfg.detector.safe_threshold, 0.6);
    assert_eq!(
        cfg.detector.unsafe_keywords,
        vec!["no-helmet", "bare-head"]
    );
    assert_eq!(cfg.detector.interval, Duration::from_millis(150));
    assert_eq!(cfg.evidence.endpoint, "https://storage.example/upload");
    assert_eq!(cfg.evidence.throttle.mode, ThrottleMode::Sample);
    assert_eq!(cfg.evidence.throttle.min_interval, Duration::from_secs(20));

    clear_env();
}

#[test]
fn keyword_env_overrides_are_csv() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("SENTINEL_UNSAFE_KEYWORDS", "no-helmet, bare-head ,");
    std::env::set_var("SENTINEL_SAFE_KEYWORDS", "helmet,hardhat");

    let cfg = SentineldConfig::load().expect("load config");
    assert_eq!(cfg.detector.unsafe_keywords, vec!["no-helmet", "bare-head"]);
    assert_eq!(cfg.detector.safe_keywords, vec!["helmet", "hardhat"]);

    clear_env();
}

#[test]
fn invalid_thresholds_are_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    // Violation bar above the safe bar inverts the design intent.
    let json = r#"{
        "detector": { "violation_threshold": 0.9, "safe_threshold": 0.5 }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");
    std::env::set_var("SENTINEL_CONFIG", file.path());

    assert!(SentineldConfig::load().is_err());

    clear_env();
}

#[test]
fn unknown_throttle_mode_is_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{ "evidence": { "throttle_mode": "burst" } }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");
    std::env::set_var("SENTINEL_CONFIG", file.path());

    assert!(SentineldConfig::load().is_err());

    clear_env();
}
