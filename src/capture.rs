//! Raw biometric captures.
//!
//! A `Capture` owns the bytes handed over by the caller for the duration of a
//! single engine call. The engine never persists captures; storage belongs to
//! the surrounding service.

use serde::Serialize;
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::error::{EngineError, EngineResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Modality {
    FaceImage,
    FingerprintTemplate,
}

/// Ephemeral capture bytes tagged with their modality.
///
/// Not `Clone`: every copy of biometric bytes is an explicit decision of the caller.
pub struct Capture {
    data: Vec<u8>,
    modality: Modality,
}

// Explicitly NOT implementing Clone or Debug over the bytes.

impl Capture {
    pub fn new(data: Vec<u8>, modality: Modality) -> Self {
        Self { data, modality }
    }

    pub fn face_image(data: impl Into<Vec<u8>>) -> Self {
        Self::new(data.into(), Modality::FaceImage)
    }

    pub fn fingerprint_template(data: impl Into<Vec<u8>>) -> Self {
        Self::new(data.into(), Modality::FingerprintTemplate)
    }

    pub fn modality(&self) -> Modality {
        self.modality
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Checks modality and non-emptiness before any provider sees the bytes.
    pub(crate) fn require(&self, modality: Modality, what: &str) -> EngineResult<&[u8]> {
        if self.modality != modality {
            return Err(EngineError::invalid(format!(
                "{} must be a {:?} capture, got {:?}",
                what, modality, self.modality
            )));
        }
        if self.data.is_empty() {
            return Err(EngineError::invalid(format!("{} is empty", what)));
        }
        Ok(&self.data)
    }
}

impl std::fmt::Debug for Capture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capture")
            .field("modality", &self.modality)
            .field("len", &self.data.len())
            .finish()
    }
}

impl Drop for Capture {
    fn drop(&mut self) {
        self.data.zeroize();
    }
}

/// Short, non-invertible label for log lines. Raw bytes never reach the log.
pub fn short_digest(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(&digest[..6])
}
