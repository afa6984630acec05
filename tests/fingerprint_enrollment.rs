use biometric_engine::fingerprint::{
    RepresentativeFuser, ScriptedSensor, SensorError, VendorMethod, VendorReply,
};
use biometric_engine::{
    BackendRegistry, Capture, DeviceSettings, Engine, EngineConfig, EngineError,
    FingerprintTemplate, IdentificationCandidate, SessionState,
};

fn engine() -> Engine {
    let mut config = EngineConfig::default();
    config.device = DeviceSettings::immediate();
    Engine::new(config, BackendRegistry::new())
}

fn tpl(byte: u8) -> Vec<u8> {
    vec![byte; 16]
}

fn candidate(id: &str, byte: u8) -> IdentificationCandidate {
    IdentificationCandidate::new(id, FingerprintTemplate::new(tpl(byte), 75))
}

#[test]
fn two_successful_captures_are_insufficient() {
    let engine = engine();
    let sensor = ScriptedSensor::new()
        .then_no_finger()
        .then_capture(tpl(1), Some(70))
        .then_error(SensorError::Timeout)
        .then_capture(tpl(2), Some(60));
    let probe = sensor.probe();
    let session = engine.open_session(sensor);

    let err = engine.enroll_fingerprint(&session).unwrap_err();
    assert!(matches!(
        err,
        EngineError::InsufficientCaptures {
            captured: 2,
            required: 3
        }
    ));
    assert_eq!(probe.acquires(), 10);
    assert!(probe.merge_inputs().is_empty());
}

#[test]
fn three_captures_fuse_in_capture_order() {
    let engine = engine();
    let sensor = ScriptedSensor::new()
        .then_capture(tpl(1), Some(80))
        .then_no_finger()
        .then_capture(tpl(2), Some(40))
        .then_capture(tpl(3), Some(90));
    let probe = sensor.probe();
    let session = engine.open_session(sensor);

    let outcome = engine.enroll_fingerprint(&session).unwrap();
    assert!(!outcome.is_fused());
    assert_eq!(outcome.quality, 90);
    assert_eq!(outcome.qualities(), vec![90, 90, 90]);
    let stored: Vec<u8> = outcome.templates.iter().map(|t| t.bytes()[0]).collect();
    assert_eq!(stored, vec![1, 2, 3]);

    // the native merge was offered the same order
    assert_eq!(probe.merge_inputs(), vec![vec![tpl(1), tpl(2), tpl(3)]]);
}

#[test]
fn top_three_by_quality_are_merged() {
    let engine = engine();
    let sensor = ScriptedSensor::new()
        .then_capture(tpl(1), Some(50))
        .then_capture(tpl(2), Some(95))
        .then_capture(tpl(3), None)
        .then_capture(tpl(4), Some(30))
        .then_capture(tpl(5), Some(85))
        .with_merge(tpl(0xF0));
    let probe = sensor.probe();
    let session = engine.open_session(sensor);

    let outcome = engine.enroll_fingerprint(&session).unwrap();
    assert_eq!(outcome.fused_by.as_deref(), Some("scripted"));
    assert_eq!(outcome.templates.len(), 1);
    assert_eq!(outcome.templates[0].bytes(), tpl(0xF0).as_slice());
    assert_eq!(outcome.quality, 95);
    // capture 3 reported no quality and counts as 75
    assert_eq!(probe.merge_inputs(), vec![vec![tpl(2), tpl(3), tpl(5)]]);
}

#[test]
fn failed_merge_falls_back_to_unfused_set() {
    let engine = engine();
    let sensor = ScriptedSensor::new()
        .then_capture(tpl(1), Some(70))
        .then_capture(tpl(2), Some(70))
        .then_capture(tpl(3), Some(70))
        .with_failing_merge("GenRegTemplate returned -17");
    let session = engine.open_session(sensor);

    let outcome = engine.enroll_fingerprint(&session).unwrap();
    assert!(!outcome.is_fused());
    assert_eq!(outcome.templates.len(), 3);
}

#[test]
fn cached_fuser_takes_precedence() {
    let engine = engine();
    let sensor = ScriptedSensor::new()
        .then_capture(vec![0x00; 4], Some(70))
        .then_capture(vec![0x0F; 4], Some(70))
        .then_capture(vec![0xFF; 4], Some(70))
        .with_merge(tpl(0xAB));
    let probe = sensor.probe();
    let session = engine
        .open_session(sensor)
        .with_fuser(RepresentativeFuser::default());

    let outcome = engine.enroll_fingerprint(&session).unwrap();
    assert_eq!(outcome.fused_by.as_deref(), Some("representative"));
    assert_eq!(outcome.templates[0].bytes(), &[0x0F; 4]);
    assert!(probe.merge_inputs().is_empty());
}

#[test]
fn driver_errors_skip_only_that_capture() {
    let engine = engine();
    let sensor = ScriptedSensor::new()
        .then_capture(tpl(1), Some(70))
        .then_error(SensorError::Other(anyhow::anyhow!("usb transfer stalled")))
        .then_error(SensorError::Status(-8))
        .then_capture(tpl(2), Some(70))
        .then_capture(tpl(3), Some(70));
    let probe = sensor.probe();
    let session = engine.open_session(sensor);

    let outcome = engine.enroll_fingerprint(&session).unwrap();
    assert_eq!(outcome.templates.len(), 3);
    assert_eq!(probe.acquires(), 10);
    // the stalled transfer dropped the connection once
    assert_eq!(probe.opens(), 2);
}

#[test]
fn reconnect_during_enrollment_keeps_the_capture() {
    let engine = engine();
    let sensor = ScriptedSensor::new()
        .then_error(SensorError::NotInitialized)
        .then_capture(tpl(1), Some(70))
        .then_capture(tpl(2), Some(70))
        .then_capture(tpl(3), Some(70));
    let session = engine.open_session(sensor);

    let outcome = engine.enroll_fingerprint(&session).unwrap();
    let stored: Vec<u8> = outcome.templates.iter().map(|t| t.bytes()[0]).collect();
    assert_eq!(stored, vec![1, 2, 3]);
    assert_eq!(session.stats().reconnects, 1);
}

#[test]
fn unavailable_sensor_aborts_enrollment() {
    let engine = engine();
    let session = engine.open_session(ScriptedSensor::new().failing_opens(u32::MAX));
    let err = engine.enroll_fingerprint(&session).unwrap_err();
    assert!(matches!(err, EngineError::CapabilityUnavailable(_)));
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[test]
fn login_accepts_the_enrolled_finger() {
    let engine = engine();
    let session = engine.open_session(ScriptedSensor::new().then_capture(tpl(0xA1), Some(80)));
    let candidates = vec![candidate("alice", 0xA1), candidate("bob", 0x5E)];

    let result = engine
        .verify_fingerprint(&session, "alice", &candidates, None)
        .unwrap();
    assert!(result.matched);
    assert_eq!(result.score, Some(100));
    assert_eq!(result.threshold, 60);
    assert_eq!(result.best_candidate_id.as_deref(), Some("alice"));
}

#[test]
fn login_scores_only_the_claimed_identity() {
    let engine = engine();
    let session = engine.open_session(ScriptedSensor::new().then_capture(tpl(0x5E), Some(80)));
    let candidates = vec![candidate("alice", 0xA1), candidate("bob", 0x5E)];

    let result = engine
        .verify_fingerprint(&session, "alice", &candidates, Some(40))
        .unwrap();
    assert!(!result.matched);
    assert_eq!(result.score, Some(0));
    assert_eq!(result.best_candidate_id.as_deref(), Some("alice"));
}

#[test]
fn login_is_not_blocked_by_an_identical_template_of_another_identity() {
    let engine = engine();
    let session = engine.open_session(ScriptedSensor::new().then_capture(tpl(0xA1), Some(80)));
    let candidates = vec![candidate("bob", 0xA1), candidate("alice", 0xA1)];

    let result = engine
        .verify_fingerprint(&session, "alice", &candidates, None)
        .unwrap();
    assert!(result.matched);
    assert_eq!(result.score, Some(100));
    assert_eq!(result.best_candidate_id.as_deref(), Some("alice"));
}

#[test]
fn login_without_enrolled_templates_is_not_enrolled() {
    let engine = engine();
    let sensor = ScriptedSensor::new().then_capture(tpl(0xA1), Some(80));
    let probe = sensor.probe();
    let session = engine.open_session(sensor);
    let err = engine
        .verify_fingerprint(&session, "carol", &[candidate("alice", 0xA1)], None)
        .unwrap_err();
    assert!(matches!(err, EngineError::NotEnrolled));
    assert_eq!(probe.acquires(), 0);
}

#[test]
fn login_surfaces_missing_finger() {
    let engine = engine();
    let session = engine.open_session(ScriptedSensor::new());
    let err = engine
        .verify_fingerprint(&session, "alice", &[candidate("alice", 0xA1)], None)
        .unwrap_err();
    assert!(matches!(err, EngineError::FingerNotDetected { .. }));
    assert!(err.is_retryable());
}

#[test]
fn session_identification_prefers_native_matcher() {
    let engine = engine();
    let sensor = ScriptedSensor::new()
        .with_vendor_reply(VendorMethod::IdentifyTemplate, VendorReply::Score(88.0));
    let session = engine.open_session(sensor);
    let candidates = vec![candidate("alice", 0xA1), candidate("bob", 0x5E)];
    let probe = Capture::fingerprint_template(tpl(0x00));

    let result = engine
        .identify_fingerprint_on(&session, &probe, &candidates)
        .unwrap();
    assert_eq!(result.best_score, Some(88));
    assert_eq!(result.best_candidate_id.as_deref(), Some("alice"));

    // whole-buffer bits: 0x00 vs 0xA1 agree on 5 of 8, vs 0x5E on 3 of 8
    let driverless = engine.identify_fingerprint(&probe, &candidates).unwrap();
    assert_eq!(driverless.best_score, Some(62));
    assert_eq!(driverless.best_candidate_id.as_deref(), Some("alice"));
}

#[test]
fn identification_requires_a_probe() {
    let engine = engine();
    let err = engine
        .identify_fingerprint(&Capture::fingerprint_template(Vec::new()), &[])
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));
}
