use serde::Serialize;

use crate::capture::{Capture, Modality};
use crate::config::FaceSettings;
use crate::detect::{BackendRegistry, FaceEmbedding};
use crate::error::{EngineError, EngineResult};
use crate::verdict::{CandidateDetail, MatchMetric, MatchResult};

/// Stored face images of one identity, most recent first.
pub struct EnrolledFace {
    pub identity_id: String,
    pub images: Vec<Capture>,
}

impl EnrolledFace {
    pub fn new(identity_id: impl Into<String>, images: Vec<Capture>) -> Self {
        Self {
            identity_id: identity_id.into(),
            images,
        }
    }

    /// The image used for 1:N duplicate screening.
    pub fn representative(&self) -> Option<&Capture> {
        self.images.first()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UniquenessVerdict {
    pub is_unique: bool,
    pub matched_identity: Option<String>,
    pub confidence: f64,
    pub message: String,
}

impl UniquenessVerdict {
    fn unique(message: &str) -> Self {
        Self {
            is_unique: true,
            matched_identity: None,
            confidence: 0.0,
            message: message.to_string(),
        }
    }

    fn undecidable(message: String) -> Self {
        Self {
            is_unique: false,
            matched_identity: None,
            confidence: 0.0,
            message,
        }
    }
}

/// `max(0, (1 - distance) * 100)`.
pub fn confidence_from_distance(distance: f64) -> f64 {
    ((1.0 - distance) * 100.0).max(0.0)
}

/// Embedding comparison for 1:1 verification and 1:N duplicate screening.
#[derive(Clone, Copy, Debug, Default)]
pub struct FaceMatcher {
    settings: FaceSettings,
}

impl FaceMatcher {
    pub fn new(settings: FaceSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &FaceSettings {
        &self.settings
    }

    /// Verify a probe against one identity's gallery.
    ///
    /// An empty gallery is `NotEnrolled`, never a vacuous pass. Gallery entries
    /// that fail extraction are skipped.
    pub fn verify(
        &self,
        registry: &BackendRegistry,
        probe: &Capture,
        gallery: &[Capture],
    ) -> EngineResult<MatchResult> {
        if gallery.is_empty() {
            return Err(EngineError::NotEnrolled);
        }
        let probe_bytes = probe.require(Modality::FaceImage, "probe image")?;
        let probe_embedding = match registry.encode_face(probe_bytes) {
            Ok(Some(embedding)) => embedding,
            Ok(None) => {
                log::warn!("face verify: no encodable face in probe");
                return Ok(MatchResult::rejected(
                    MatchMetric::Distance(1.0),
                    gallery.len(),
                    "no encodable face",
                    Vec::new(),
                ));
            }
            Err(err @ EngineError::CapabilityUnavailable(_)) => return Err(err),
            Err(err) => {
                log::error!("face verify: probe encoding failed: {}", err);
                return Ok(MatchResult::rejected(
                    MatchMetric::Distance(1.0),
                    gallery.len(),
                    format!("failed to process probe: {}", err),
                    Vec::new(),
                ));
            }
        };

        let gallery_embeddings: Vec<Option<FaceEmbedding>> = gallery
            .iter()
            .enumerate()
            .map(|(idx, image)| encode_gallery_entry(registry, idx, image))
            .collect();

        Ok(self.verify_embeddings(&probe_embedding, &gallery_embeddings))
    }

    /// Decision over already extracted embeddings. `None` entries were not
    /// extractable and count toward `total_candidates` only.
    pub fn verify_embeddings(
        &self,
        probe: &FaceEmbedding,
        gallery: &[Option<FaceEmbedding>],
    ) -> MatchResult {
        let total = gallery.len();
        if total == 0 {
            return MatchResult::rejected(
                MatchMetric::Distance(1.0),
                0,
                "no enrolled images to compare against",
                Vec::new(),
            );
        }

        let mut details = Vec::with_capacity(total);
        let mut best: Option<f64> = None;
        let mut matched_count = 0usize;

        for (idx, entry) in gallery.iter().enumerate() {
            let Some(embedding) = entry else {
                continue;
            };
            let Some(distance) = probe.distance(embedding) else {
                log::warn!(
                    "face verify: gallery #{} has dimension {} vs probe {}, skipped",
                    idx + 1,
                    embedding.dim(),
                    probe.dim()
                );
                continue;
            };
            let confidence = confidence_from_distance(distance);
            let is_match = distance < self.settings.verify_distance_threshold
                && confidence >= self.settings.verify_confidence_min;
            log::debug!(
                "face verify: gallery #{} distance={:.4} confidence={:.1} match={}",
                idx + 1,
                distance,
                confidence,
                is_match
            );
            if is_match {
                matched_count += 1;
                best = Some(best.map_or(distance, |b: f64| b.min(distance)));
            }
            details.push(CandidateDetail {
                index: idx,
                candidate_id: None,
                metric: MatchMetric::Distance(distance),
                confidence,
                is_match,
            });
        }

        match best {
            Some(distance) => {
                log::info!("face verify: {}/{} gallery images matched", matched_count, total);
                MatchResult::accepted(
                    MatchMetric::Distance(distance),
                    confidence_from_distance(distance),
                    matched_count,
                    total,
                    format!("face matches {}/{} enrolled images", matched_count, total),
                    details,
                )
            }
            None => {
                log::info!("face verify: none of {} gallery images matched", total);
                MatchResult::rejected(
                    MatchMetric::Distance(1.0),
                    total,
                    format!("face does not match any of the {} enrolled images", total),
                    details,
                )
            }
        }
    }

    /// Screen a probe against every other identity's representative image.
    ///
    /// Returns on the first identity under the uniqueness threshold; order of
    /// `enrolled` decides among several close identities.
    pub fn check_uniqueness(
        &self,
        registry: &BackendRegistry,
        probe: &Capture,
        enrolled: &[EnrolledFace],
        exclude_identity: Option<&str>,
    ) -> EngineResult<UniquenessVerdict> {
        let probe_bytes = probe.require(Modality::FaceImage, "probe image")?;
        if enrolled.is_empty() {
            return Ok(UniquenessVerdict::unique("no identities enrolled yet"));
        }

        let probe_embedding = match registry.encode_face(probe_bytes) {
            Ok(Some(embedding)) => embedding,
            Ok(None) => {
                return Ok(UniquenessVerdict::undecidable(
                    "cannot check uniqueness: no encodable face in probe".to_string(),
                ))
            }
            Err(err @ EngineError::CapabilityUnavailable(_)) => return Err(err),
            Err(err) => {
                return Ok(UniquenessVerdict::undecidable(format!(
                    "cannot check uniqueness: {}",
                    err
                )))
            }
        };

        for identity in enrolled {
            if exclude_identity == Some(identity.identity_id.as_str()) {
                continue;
            }
            let Some(image) = identity.representative() else {
                continue;
            };
            let Some(embedding) = encode_gallery_entry(registry, 0, image) else {
                log::warn!(
                    "face uniqueness: identity {} has no usable representative image",
                    identity.identity_id
                );
                continue;
            };
            let Some(distance) = probe_embedding.distance(&embedding) else {
                continue;
            };
            if distance < self.settings.uniqueness_distance_threshold {
                let confidence = (confidence_from_distance(distance) * 100.0).round() / 100.0;
                log::info!(
                    "face uniqueness: probe matches identity {} (distance={:.4})",
                    identity.identity_id,
                    distance
                );
                return Ok(UniquenessVerdict {
                    is_unique: false,
                    matched_identity: Some(identity.identity_id.clone()),
                    confidence,
                    message: "face is already enrolled by another identity".to_string(),
                });
            }
        }

        Ok(UniquenessVerdict::unique("face is unique"))
    }
}

fn encode_gallery_entry(
    registry: &BackendRegistry,
    idx: usize,
    image: &Capture,
) -> Option<FaceEmbedding> {
    let bytes = match image.require(Modality::FaceImage, "gallery image") {
        Ok(bytes) => bytes,
        Err(err) => {
            log::warn!("face gallery #{}: {}", idx + 1, err);
            return None;
        }
    };
    match registry.encode_face(bytes) {
        Ok(Some(embedding)) => Some(embedding),
        Ok(None) => {
            log::warn!("face gallery #{}: no encodable face", idx + 1);
            None
        }
        Err(err) => {
            log::warn!("face gallery #{}: {}", idx + 1, err);
            None
        }
    }
}
