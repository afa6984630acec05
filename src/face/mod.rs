//! Face pipeline: detection, liveness screening and embedding matching.
//!
//! Every call here is CPU-bound and blocking (image decode, model inference).
//! Async callers are expected to move them onto a blocking worker.

pub mod liveness;
mod matcher;

use crate::capture::{Capture, Modality};
use crate::detect::{BackendRegistry, FaceBox};
use crate::error::{EngineError, EngineResult};

pub use liveness::{
    assess_detections, DetectedObject, LivenessVerdict, ObjectCategory, SecurityLevel,
};
pub use matcher::{confidence_from_distance, EnrolledFace, FaceMatcher, UniquenessVerdict};

/// Locate the primary face in an image.
pub fn detect_face(registry: &BackendRegistry, image: &Capture) -> EngineResult<FaceBox> {
    let bytes = image.require(Modality::FaceImage, "face image")?;
    match registry.detect_face(bytes)? {
        Some(face) => {
            log::debug!(
                "face detected: confidence={:.2} box=({:.2},{:.2},{:.2},{:.2})",
                face.confidence,
                face.x,
                face.y,
                face.w,
                face.h
            );
            Ok(face)
        }
        None => Err(EngineError::NoEncodableFeature(
            "no face detected in image".to_string(),
        )),
    }
}
