use serde::Serialize;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::capture::short_digest;

/// Opaque vendor template plus its quality score (0..=100).
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct FingerprintTemplate {
    bytes: Vec<u8>,
    quality: u8,
}

impl FingerprintTemplate {
    pub fn new(bytes: Vec<u8>, quality: u8) -> Self {
        Self {
            bytes,
            quality: quality.min(100),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Log label.
    pub fn digest(&self) -> String {
        short_digest(&self.bytes)
    }
}

impl std::fmt::Debug for FingerprintTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FingerprintTemplate")
            .field("digest", &self.digest())
            .field("len", &self.bytes.len())
            .field("quality", &self.quality)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct IdentificationCandidate {
    pub identity_id: String,
    pub template: FingerprintTemplate,
}

impl IdentificationCandidate {
    pub fn new(identity_id: impl Into<String>, template: FingerprintTemplate) -> Self {
        Self {
            identity_id: identity_id.into(),
            template,
        }
    }
}

/// Templates to store for one identity after enrollment.
#[derive(Debug)]
pub struct EnrollmentOutcome {
    pub templates: Vec<FingerprintTemplate>,
    /// Best quality among the fusion inputs.
    pub quality: u8,
    /// Name of the fuser that produced a merged template, `None` for the
    /// unfused fallback set.
    pub fused_by: Option<String>,
}

impl EnrollmentOutcome {
    pub fn is_fused(&self) -> bool {
        self.fused_by.is_some()
    }

    /// `quality` once per stored template.
    pub fn qualities(&self) -> Vec<u8> {
        vec![self.quality; self.templates.len()]
    }
}

#[derive(Serialize)]
struct OutcomeSummary<'a> {
    digests: Vec<String>,
    qualities: Vec<u8>,
    fused_by: Option<&'a str>,
}

impl Serialize for EnrollmentOutcome {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        OutcomeSummary {
            digests: self.templates.iter().map(FingerprintTemplate::digest).collect(),
            qualities: self.qualities(),
            fused_by: self.fused_by.as_deref(),
        }
        .serialize(serializer)
    }
}
