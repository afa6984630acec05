//! Biometric Verification & Liveness Engine
//!
//! Decision pipelines that turn a raw capture (face image or fingerprint
//! template) into an enrollment record or a match verdict.
//!
//! # Architecture
//!
//! The engine holds no persistent state. Enrolled images and templates are
//! owned by the calling service and passed in per call:
//!
//! 1. **Capability providers**: face detection, face encoding and object
//!    classification sit behind [`detect::VisionBackend`]; the fingerprint
//!    reader sits behind [`fingerprint::FingerprintSensor`].
//! 2. **Liveness**: object-class screening for replay devices and staged scenes.
//! 3. **Face matching**: 1:1 gallery verification and 1:N duplicate screening.
//! 4. **Fingerprint enrollment**: quality-ranked capture selection and fusion.
//! 5. **Fingerprint matching**: feature-region, vendor and whole-buffer
//!    strategies tried in a fixed order, plus 1:N identification.
//! 6. **Device session**: one exclusive, reconnecting session per reader.
//!
//! # Module Structure
//!
//! - `capture`: modality-tagged capture bytes, wiped on drop
//! - `config`: thresholds and timings, JSON file plus environment overrides
//! - `detect`: vision backend trait, registry and stub/tract backends
//! - `face`: detection, liveness and embedding matching
//! - `fingerprint`: sensor session, fusion, scoring and identification
//! - `engine`: facade tying the pipelines together

pub mod capture;
pub mod config;
pub mod detect;
pub mod engine;
pub mod error;
pub mod face;
pub mod fingerprint;
pub mod verdict;

pub use capture::{Capture, Modality};
pub use config::{
    DeviceSettings, EngineConfig, EnrollmentSettings, FaceSettings, FingerprintSettings,
};
pub use detect::{
    BackendRegistry, FaceBox, FaceEmbedding, ObjectDetection, StubBackend, VisionBackend,
    VisionCapability,
};
pub use engine::{Engine, FaceAuthentication, FingerprintVerification};
pub use error::{CaptureMiss, EngineError, EngineResult};
pub use face::{EnrolledFace, LivenessVerdict, SecurityLevel, UniquenessVerdict};
pub use fingerprint::{
    DeviceSession, EnrollmentOutcome, FingerprintSensor, FingerprintTemplate, Identification,
    IdentificationCandidate, SessionState,
};
pub use verdict::{CandidateDetail, MatchMetric, MatchResult};
