use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use biometric_engine::config::EngineConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "BIOMETRIC_CONFIG",
        "BIOMETRIC_FACE_VERIFY_THRESHOLD",
        "BIOMETRIC_FACE_UNIQUENESS_THRESHOLD",
        "BIOMETRIC_FP_SCORE_THRESHOLD",
        "BIOMETRIC_FP_REQUEST_THRESHOLD",
        "BIOMETRIC_CAPTURE_TIMEOUT_MS",
        "BIOMETRIC_CAPTURE_RETRIES",
    ] {
        std::env::remove_var(key);
    }
}

fn write_config(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");
    file
}

#[test]
fn loads_defaults_without_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = EngineConfig::load().expect("load defaults");
    assert_eq!(cfg.face.verify_distance_threshold, 0.55);
    assert_eq!(cfg.face.verify_confidence_min, 35.0);
    assert_eq!(cfg.face.uniqueness_distance_threshold, 0.6);
    assert_eq!(cfg.fingerprint.biometric_offset, 50_000);
    assert_eq!(cfg.fingerprint.max_stored_templates, 6);
    assert_eq!(cfg.enrollment.capture_attempts, 10);
    assert_eq!(cfg.device.capture_timeout, Duration::from_secs(5));
    assert_eq!(cfg.device.capture_retries, 20);
    assert_eq!(cfg.device.startup_attempts, 5);
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        r#"{
            "face": {
                "verify_distance_threshold": 0.5,
                "uniqueness_distance_threshold": 0.65
            },
            "fingerprint": {
                "feature_gate_pct": 70,
                "request_score_threshold": 45,
                "default_quality": 60
            },
            "enrollment": {
                "capture_attempts": 8,
                "capture_budget_ms": 16000
            },
            "device": {
                "retry_delay_ms": 100,
                "startup_backoff_ms": 0
            }
        }"#,
    );

    std::env::set_var("BIOMETRIC_CONFIG", file.path());
    std::env::set_var("BIOMETRIC_FACE_VERIFY_THRESHOLD", "0.52");
    std::env::set_var("BIOMETRIC_FP_SCORE_THRESHOLD", "65");
    std::env::set_var("BIOMETRIC_CAPTURE_TIMEOUT_MS", "3000");
    std::env::set_var("BIOMETRIC_CAPTURE_RETRIES", "4");

    let cfg = EngineConfig::load().expect("load config");
    clear_env();

    assert_eq!(cfg.face.verify_distance_threshold, 0.52);
    assert_eq!(cfg.face.uniqueness_distance_threshold, 0.65);
    assert_eq!(cfg.face.verify_confidence_min, 35.0);

    assert_eq!(cfg.fingerprint.feature_gate_pct, 70);
    assert_eq!(cfg.fingerprint.request_score_threshold, 45);
    assert_eq!(cfg.fingerprint.service_score_threshold, 65);
    assert_eq!(cfg.fingerprint.default_quality, 60);

    assert_eq!(cfg.enrollment.capture_attempts, 8);
    assert_eq!(
        cfg.enrollment.per_capture_timeout(),
        Duration::from_millis(2_000)
    );

    assert_eq!(cfg.device.capture_timeout, Duration::from_millis(3_000));
    assert_eq!(cfg.device.capture_retries, 4);
    assert_eq!(cfg.device.retry_delay, Duration::from_millis(100));
    assert_eq!(cfg.device.startup_backoff, Duration::ZERO);
}

#[test]
fn rejects_out_of_range_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(r#"{ "fingerprint": { "max_stored_templates": 9 } }"#);
    std::env::set_var("BIOMETRIC_CONFIG", file.path());
    let err = EngineConfig::load().unwrap_err();
    assert!(err.to_string().contains("max_stored_templates"));

    let file = write_config(r#"{ "enrollment": { "min_captures": 2, "fusion_inputs": 3 } }"#);
    std::env::set_var("BIOMETRIC_CONFIG", file.path());
    let err = EngineConfig::load().unwrap_err();
    assert!(err.to_string().contains("fusion_inputs"));

    clear_env();
    std::env::set_var("BIOMETRIC_FP_REQUEST_THRESHOLD", "140");
    let err = EngineConfig::load().unwrap_err();
    assert!(err.to_string().contains("request_score_threshold"));

    std::env::set_var("BIOMETRIC_FP_REQUEST_THRESHOLD", "many");
    let err = EngineConfig::load().unwrap_err();
    assert!(err.to_string().contains("BIOMETRIC_FP_REQUEST_THRESHOLD"));

    clear_env();
    std::env::set_var("BIOMETRIC_FACE_UNIQUENESS_THRESHOLD", "0");
    assert!(EngineConfig::load().is_err());
    clear_env();
}

#[test]
fn unreadable_file_is_an_error() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("BIOMETRIC_CONFIG", "/nonexistent/biometric.json");
    let err = EngineConfig::load().unwrap_err();
    assert!(err.to_string().contains("failed to read config file"));

    let file = write_config("{ not json");
    std::env::set_var("BIOMETRIC_CONFIG", file.path());
    let err = EngineConfig::load().unwrap_err();
    assert!(err.to_string().contains("invalid config file"));
    clear_env();
}
