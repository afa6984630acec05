//! Fingerprint pipeline: sensor session, enrollment fusion, scoring and
//! 1:N identification.

mod fusion;
mod identify;
mod score;
mod sensor;
mod session;
pub mod stub;
mod template;

pub use fusion::{
    enroll, fuse_or_fallback, most_representative, select_top_captures, RepresentativeFuser,
    TemplateFuser,
};
pub use identify::{identify, locate_best, Identification};
pub use score::{
    bit_similarity, matching_bits, MatchStrategy, PairScorer, ScoreOutcome, TemplateScorer,
};
pub use sensor::{Acquisition, FingerprintSensor, SensorError, VendorMethod, VendorReply};
pub use session::{DeviceSession, SessionGuard, SessionState, SessionStats};
pub use stub::{ScriptedSensor, SensorProbe};
pub use template::{EnrollmentOutcome, FingerprintTemplate, IdentificationCandidate};
