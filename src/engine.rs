//! Engine facade consumed by the authentication service.
//!
//! Holds configuration and the vision backends; fingerprint hardware is passed
//! in per call as a [`DeviceSession`] owned by the caller.

use serde::Serialize;

use crate::capture::{Capture, Modality};
use crate::config::EngineConfig;
use crate::detect::{BackendRegistry, FaceBox};
use crate::error::{EngineError, EngineResult};
use crate::face::{self, EnrolledFace, FaceMatcher, LivenessVerdict, UniquenessVerdict};
use crate::fingerprint::{
    self, DeviceSession, EnrollmentOutcome, Identification, IdentificationCandidate,
    TemplateScorer,
};
use crate::verdict::MatchResult;

/// Result of the full face login pipeline.
#[derive(Clone, Debug, Serialize)]
pub struct FaceAuthentication {
    pub verified: bool,
    pub face: FaceBox,
    pub liveness: LivenessVerdict,
    /// `None` when liveness rejected the capture before matching.
    pub matching: Option<MatchResult>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FingerprintVerification {
    pub matched: bool,
    pub identity_id: String,
    pub score: Option<u8>,
    pub threshold: u8,
    pub best_candidate_id: Option<String>,
}

pub struct Engine {
    config: EngineConfig,
    registry: BackendRegistry,
    face: FaceMatcher,
    scorer: TemplateScorer,
}

impl Engine {
    pub fn new(config: EngineConfig, registry: BackendRegistry) -> Self {
        let face = FaceMatcher::new(config.face);
        let scorer = TemplateScorer::new(config.fingerprint);
        Self {
            config,
            registry,
            face,
            scorer,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// Session over `sensor` configured from this engine's settings.
    pub fn open_session<S: fingerprint::FingerprintSensor + 'static>(
        &self,
        sensor: S,
    ) -> DeviceSession {
        DeviceSession::new(sensor, self.config.device, self.config.fingerprint)
    }

    pub fn assess_liveness(&self, image: &Capture) -> EngineResult<LivenessVerdict> {
        face::liveness::assess(&self.registry, image)
    }

    pub fn detect_face(&self, image: &Capture) -> EngineResult<FaceBox> {
        face::detect_face(&self.registry, image)
    }

    pub fn verify_face(&self, probe: &Capture, gallery: &[Capture]) -> EngineResult<MatchResult> {
        self.face.verify(&self.registry, probe, gallery)
    }

    /// Detect, screen for liveness, then verify against the gallery.
    pub fn authenticate_face(
        &self,
        probe: &Capture,
        gallery: &[Capture],
    ) -> EngineResult<FaceAuthentication> {
        if gallery.is_empty() {
            return Err(EngineError::NotEnrolled);
        }
        let face_box = self.detect_face(probe)?;
        let liveness = self.assess_liveness(probe)?;
        if !liveness.is_live {
            log::warn!(
                "face authentication rejected by liveness ({:?}): {}",
                liveness.security_level,
                liveness.reason
            );
            return Ok(FaceAuthentication {
                verified: false,
                face: face_box,
                liveness,
                matching: None,
            });
        }
        let matching = self.verify_face(probe, gallery)?;
        Ok(FaceAuthentication {
            verified: matching.matched,
            face: face_box,
            liveness,
            matching: Some(matching),
        })
    }

    pub fn check_face_uniqueness(
        &self,
        probe: &Capture,
        enrolled: &[EnrolledFace],
        exclude_identity: Option<&str>,
    ) -> EngineResult<UniquenessVerdict> {
        self.face
            .check_uniqueness(&self.registry, probe, enrolled, exclude_identity)
    }

    pub fn enroll_fingerprint(&self, session: &DeviceSession) -> EngineResult<EnrollmentOutcome> {
        fingerprint::enroll(session, &self.config.enrollment, &self.config.fingerprint)
    }

    /// Driverless pairwise score.
    pub fn score_fingerprint_pair(&self, a: &[u8], b: &[u8]) -> u8 {
        self.scorer.score(a, b)
    }

    /// Driverless 1:N identification.
    pub fn identify_fingerprint(
        &self,
        probe: &Capture,
        candidates: &[IdentificationCandidate],
    ) -> EngineResult<Identification> {
        let probe = probe.require(Modality::FingerprintTemplate, "probe template")?;
        let mut scorer = self.scorer;
        Ok(fingerprint::identify(probe, candidates, &mut scorer))
    }

    /// 1:N identification that also consults the sensor's native matcher.
    pub fn identify_fingerprint_on(
        &self,
        session: &DeviceSession,
        probe: &Capture,
        candidates: &[IdentificationCandidate],
    ) -> EngineResult<Identification> {
        let probe = probe.require(Modality::FingerprintTemplate, "probe template")?;
        let mut guard = session.lock()?;
        if let Err(err) = guard.ensure_connected() {
            log::warn!("identify without native matcher: {}", err);
        }
        Ok(fingerprint::identify(probe, candidates, &mut guard))
    }

    /// Capture a live probe and verify it belongs to `identity_id`.
    ///
    /// Only the templates enrolled for `identity_id` are scored; entries for
    /// other identities in `candidates` are ignored.
    pub fn verify_fingerprint(
        &self,
        session: &DeviceSession,
        identity_id: &str,
        candidates: &[IdentificationCandidate],
        threshold: Option<u8>,
    ) -> EngineResult<FingerprintVerification> {
        let own: Vec<IdentificationCandidate> = candidates
            .iter()
            .filter(|c| c.identity_id == identity_id)
            .cloned()
            .collect();
        if own.is_empty() {
            return Err(EngineError::NotEnrolled);
        }
        let threshold = threshold.unwrap_or(self.config.fingerprint.service_score_threshold);

        let mut guard = session.lock()?;
        let probe = guard.capture(self.config.device.capture_timeout)?;
        let result = fingerprint::identify(probe.bytes(), &own, &mut guard);
        drop(guard);

        let matched = result.accepted(threshold);
        log::info!(
            "fingerprint verification for {}: score={:?} threshold={} matched={}",
            identity_id,
            result.best_score,
            threshold,
            matched
        );
        Ok(FingerprintVerification {
            matched,
            identity_id: identity_id.to_string(),
            score: result.best_score,
            threshold,
            best_candidate_id: result.best_candidate_id,
        })
    }
}
