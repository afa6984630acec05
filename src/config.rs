use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_VERIFY_DISTANCE: f64 = 0.55;
pub const DEFAULT_VERIFY_CONFIDENCE_MIN: f64 = 35.0;
pub const DEFAULT_UNIQUENESS_DISTANCE: f64 = 0.6;

pub const DEFAULT_BIOMETRIC_OFFSET: usize = 50_000;
pub const DEFAULT_FEATURE_GATE_PCT: u8 = 60;
pub const DEFAULT_REQUEST_SCORE_THRESHOLD: u8 = 40;
pub const DEFAULT_SERVICE_SCORE_THRESHOLD: u8 = 60;
pub const DEFAULT_TEMPLATE_QUALITY: u8 = 75;
pub const MAX_STORED_TEMPLATES: usize = 6;

const DEFAULT_CAPTURE_ATTEMPTS: u32 = 10;
const DEFAULT_CAPTURE_BUDGET_MS: u64 = 25_000;
const DEFAULT_MIN_CAPTURES: usize = 3;
const DEFAULT_FUSION_INPUTS: usize = 3;

const DEFAULT_CAPTURE_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_CAPTURE_RETRIES: u32 = 20;
const DEFAULT_RETRY_DELAY_MS: u64 = 500;
const DEFAULT_RECONNECT_DELAY_MS: u64 = 200;
const DEFAULT_STARTUP_ATTEMPTS: u32 = 5;
const DEFAULT_STARTUP_BACKOFF_MS: u64 = 1_500;

#[derive(Debug, Deserialize, Default)]
struct EngineConfigFile {
    face: Option<FaceConfigFile>,
    fingerprint: Option<FingerprintConfigFile>,
    enrollment: Option<EnrollmentConfigFile>,
    device: Option<DeviceConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct FaceConfigFile {
    verify_distance_threshold: Option<f64>,
    verify_confidence_min: Option<f64>,
    uniqueness_distance_threshold: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct FingerprintConfigFile {
    biometric_offset: Option<usize>,
    feature_gate_pct: Option<u8>,
    request_score_threshold: Option<u8>,
    service_score_threshold: Option<u8>,
    default_quality: Option<u8>,
    max_stored_templates: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct EnrollmentConfigFile {
    capture_attempts: Option<u32>,
    capture_budget_ms: Option<u64>,
    min_captures: Option<usize>,
    fusion_inputs: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct DeviceConfigFile {
    capture_timeout_ms: Option<u64>,
    capture_retries: Option<u32>,
    retry_delay_ms: Option<u64>,
    reconnect_delay_ms: Option<u64>,
    startup_attempts: Option<u32>,
    startup_backoff_ms: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub face: FaceSettings,
    pub fingerprint: FingerprintSettings,
    pub enrollment: EnrollmentSettings,
    pub device: DeviceSettings,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceSettings {
    pub verify_distance_threshold: f64,
    pub verify_confidence_min: f64,
    /// Looser than verification: a miss here lets a duplicate identity in.
    pub uniqueness_distance_threshold: f64,
}

impl Default for FaceSettings {
    fn default() -> Self {
        Self {
            verify_distance_threshold: DEFAULT_VERIFY_DISTANCE,
            verify_confidence_min: DEFAULT_VERIFY_CONFIDENCE_MIN,
            uniqueness_distance_threshold: DEFAULT_UNIQUENESS_DISTANCE,
        }
    }
}

/// The three fingerprint thresholds are independent knobs and are never unified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FingerprintSettings {
    /// Byte offset where feature data starts inside a full template.
    pub biometric_offset: usize,
    /// Inner gate applied to feature-region similarity.
    pub feature_gate_pct: u8,
    /// Default acceptance threshold of per-request verification.
    pub request_score_threshold: u8,
    /// Default acceptance threshold of the login service.
    pub service_score_threshold: u8,
    /// Quality assigned to captures the reader reports without one.
    pub default_quality: u8,
    pub max_stored_templates: usize,
}

impl Default for FingerprintSettings {
    fn default() -> Self {
        Self {
            biometric_offset: DEFAULT_BIOMETRIC_OFFSET,
            feature_gate_pct: DEFAULT_FEATURE_GATE_PCT,
            request_score_threshold: DEFAULT_REQUEST_SCORE_THRESHOLD,
            service_score_threshold: DEFAULT_SERVICE_SCORE_THRESHOLD,
            default_quality: DEFAULT_TEMPLATE_QUALITY,
            max_stored_templates: MAX_STORED_TEMPLATES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrollmentSettings {
    pub capture_attempts: u32,
    pub capture_budget: Duration,
    pub min_captures: usize,
    pub fusion_inputs: usize,
}

impl EnrollmentSettings {
    /// Per-capture timeout: the budget divided evenly across attempts.
    pub fn per_capture_timeout(&self) -> Duration {
        self.capture_budget / self.capture_attempts.max(1)
    }
}

impl Default for EnrollmentSettings {
    fn default() -> Self {
        Self {
            capture_attempts: DEFAULT_CAPTURE_ATTEMPTS,
            capture_budget: Duration::from_millis(DEFAULT_CAPTURE_BUDGET_MS),
            min_captures: DEFAULT_MIN_CAPTURES,
            fusion_inputs: DEFAULT_FUSION_INPUTS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSettings {
    pub capture_timeout: Duration,
    pub capture_retries: u32,
    pub retry_delay: Duration,
    pub reconnect_delay: Duration,
    pub startup_attempts: u32,
    pub startup_backoff: Duration,
}

impl DeviceSettings {
    /// Settings with every delay set to zero. Used by tests and offline tools.
    pub fn immediate() -> Self {
        Self {
            retry_delay: Duration::ZERO,
            reconnect_delay: Duration::ZERO,
            startup_backoff: Duration::ZERO,
            ..Self::default()
        }
    }
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            capture_timeout: Duration::from_millis(DEFAULT_CAPTURE_TIMEOUT_MS),
            capture_retries: DEFAULT_CAPTURE_RETRIES,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            reconnect_delay: Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS),
            startup_attempts: DEFAULT_STARTUP_ATTEMPTS,
            startup_backoff: Duration::from_millis(DEFAULT_STARTUP_BACKOFF_MS),
        }
    }
}

impl EngineConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("BIOMETRIC_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: EngineConfigFile) -> Self {
        let face_file = file.face.unwrap_or_default();
        let fp_file = file.fingerprint.unwrap_or_default();
        let enroll_file = file.enrollment.unwrap_or_default();
        let device_file = file.device.unwrap_or_default();

        let face = FaceSettings {
            verify_distance_threshold: face_file
                .verify_distance_threshold
                .unwrap_or(DEFAULT_VERIFY_DISTANCE),
            verify_confidence_min: face_file
                .verify_confidence_min
                .unwrap_or(DEFAULT_VERIFY_CONFIDENCE_MIN),
            uniqueness_distance_threshold: face_file
                .uniqueness_distance_threshold
                .unwrap_or(DEFAULT_UNIQUENESS_DISTANCE),
        };
        let fingerprint = FingerprintSettings {
            biometric_offset: fp_file.biometric_offset.unwrap_or(DEFAULT_BIOMETRIC_OFFSET),
            feature_gate_pct: fp_file.feature_gate_pct.unwrap_or(DEFAULT_FEATURE_GATE_PCT),
            request_score_threshold: fp_file
                .request_score_threshold
                .unwrap_or(DEFAULT_REQUEST_SCORE_THRESHOLD),
            service_score_threshold: fp_file
                .service_score_threshold
                .unwrap_or(DEFAULT_SERVICE_SCORE_THRESHOLD),
            default_quality: fp_file.default_quality.unwrap_or(DEFAULT_TEMPLATE_QUALITY),
            max_stored_templates: fp_file.max_stored_templates.unwrap_or(MAX_STORED_TEMPLATES),
        };
        let enrollment = EnrollmentSettings {
            capture_attempts: enroll_file
                .capture_attempts
                .unwrap_or(DEFAULT_CAPTURE_ATTEMPTS),
            capture_budget: Duration::from_millis(
                enroll_file
                    .capture_budget_ms
                    .unwrap_or(DEFAULT_CAPTURE_BUDGET_MS),
            ),
            min_captures: enroll_file.min_captures.unwrap_or(DEFAULT_MIN_CAPTURES),
            fusion_inputs: enroll_file.fusion_inputs.unwrap_or(DEFAULT_FUSION_INPUTS),
        };
        let device = DeviceSettings {
            capture_timeout: Duration::from_millis(
                device_file
                    .capture_timeout_ms
                    .unwrap_or(DEFAULT_CAPTURE_TIMEOUT_MS),
            ),
            capture_retries: device_file
                .capture_retries
                .unwrap_or(DEFAULT_CAPTURE_RETRIES),
            retry_delay: Duration::from_millis(
                device_file.retry_delay_ms.unwrap_or(DEFAULT_RETRY_DELAY_MS),
            ),
            reconnect_delay: Duration::from_millis(
                device_file
                    .reconnect_delay_ms
                    .unwrap_or(DEFAULT_RECONNECT_DELAY_MS),
            ),
            startup_attempts: device_file
                .startup_attempts
                .unwrap_or(DEFAULT_STARTUP_ATTEMPTS),
            startup_backoff: Duration::from_millis(
                device_file
                    .startup_backoff_ms
                    .unwrap_or(DEFAULT_STARTUP_BACKOFF_MS),
            ),
        };
        Self {
            face,
            fingerprint,
            enrollment,
            device,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(value) = env_parse::<f64>("BIOMETRIC_FACE_VERIFY_THRESHOLD")? {
            self.face.verify_distance_threshold = value;
        }
        if let Some(value) = env_parse::<f64>("BIOMETRIC_FACE_UNIQUENESS_THRESHOLD")? {
            self.face.uniqueness_distance_threshold = value;
        }
        if let Some(value) = env_parse::<u8>("BIOMETRIC_FP_SCORE_THRESHOLD")? {
            self.fingerprint.service_score_threshold = value;
        }
        if let Some(value) = env_parse::<u8>("BIOMETRIC_FP_REQUEST_THRESHOLD")? {
            self.fingerprint.request_score_threshold = value;
        }
        if let Some(ms) = env_parse::<u64>("BIOMETRIC_CAPTURE_TIMEOUT_MS")? {
            self.device.capture_timeout = Duration::from_millis(ms);
        }
        if let Some(retries) = env_parse::<u32>("BIOMETRIC_CAPTURE_RETRIES")? {
            self.device.capture_retries = retries;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("face.verify_distance_threshold", self.face.verify_distance_threshold),
            (
                "face.uniqueness_distance_threshold",
                self.face.uniqueness_distance_threshold,
            ),
        ] {
            if !(value > 0.0 && value <= 2.0) {
                return Err(anyhow!("{} must be in (0, 2], got {}", name, value));
            }
        }
        if !(0.0..=100.0).contains(&self.face.verify_confidence_min) {
            return Err(anyhow!("face.verify_confidence_min must be within 0..=100"));
        }
        for (name, value) in [
            ("fingerprint.feature_gate_pct", self.fingerprint.feature_gate_pct),
            (
                "fingerprint.request_score_threshold",
                self.fingerprint.request_score_threshold,
            ),
            (
                "fingerprint.service_score_threshold",
                self.fingerprint.service_score_threshold,
            ),
            ("fingerprint.default_quality", self.fingerprint.default_quality),
        ] {
            if value > 100 {
                return Err(anyhow!("{} must be within 0..=100, got {}", name, value));
            }
        }
        if self.fingerprint.max_stored_templates == 0
            || self.fingerprint.max_stored_templates > MAX_STORED_TEMPLATES
        {
            return Err(anyhow!(
                "fingerprint.max_stored_templates must be within 1..={}",
                MAX_STORED_TEMPLATES
            ));
        }
        let enrollment = &self.enrollment;
        if enrollment.fusion_inputs == 0 || enrollment.fusion_inputs > enrollment.min_captures {
            return Err(anyhow!(
                "enrollment.fusion_inputs must be within 1..=min_captures"
            ));
        }
        if enrollment.min_captures > enrollment.capture_attempts as usize {
            return Err(anyhow!(
                "enrollment.min_captures cannot exceed enrollment.capture_attempts"
            ));
        }
        if self.device.capture_retries == 0 {
            return Err(anyhow!("device.capture_retries must be at least 1"));
        }
        if self.device.startup_attempts == 0 {
            return Err(anyhow!("device.startup_attempts must be at least 1"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<EngineConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{} has an invalid value: {}", key, raw)),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_keep_thresholds_independent() {
        let cfg = EngineConfig::from_file(EngineConfigFile::default());
        assert_eq!(cfg.fingerprint.feature_gate_pct, 60);
        assert_eq!(cfg.fingerprint.request_score_threshold, 40);
        assert_eq!(cfg.fingerprint.service_score_threshold, 60);
        assert_eq!(cfg.face.verify_distance_threshold, 0.55);
        assert_eq!(cfg.face.uniqueness_distance_threshold, 0.6);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn per_capture_timeout_divides_budget() {
        let settings = EnrollmentSettings::default();
        assert_eq!(settings.per_capture_timeout(), Duration::from_millis(2_500));
    }

    #[test]
    fn validate_rejects_fusion_inputs_above_minimum() {
        let mut cfg = EngineConfig::default();
        cfg.enrollment.fusion_inputs = 4;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_template_cap_above_six() {
        let mut cfg = EngineConfig::default();
        cfg.fingerprint.max_stored_templates = 7;
        assert!(cfg.validate().is_err());
    }
}
