//! Enrollment: repeated captures, quality ranking and template fusion.

use anyhow::Result;

use crate::config::{EnrollmentSettings, FingerprintSettings};
use crate::error::{EngineError, EngineResult};

use super::score::{PairScorer, TemplateScorer};
use super::session::DeviceSession;
use super::template::{EnrollmentOutcome, FingerprintTemplate};

/// Merges several enrollment captures into one template.
pub trait TemplateFuser: Send {
    fn name(&self) -> &str;

    /// `Ok(None)` when the fuser cannot merge these inputs.
    fn fuse(&mut self, inputs: &[FingerprintTemplate]) -> Result<Option<Vec<u8>>>;
}

/// Keeps the input that agrees best with the others.
#[derive(Clone, Copy, Debug, Default)]
pub struct RepresentativeFuser {
    scorer: TemplateScorer,
}

impl RepresentativeFuser {
    pub fn new(scorer: TemplateScorer) -> Self {
        Self { scorer }
    }
}

impl TemplateFuser for RepresentativeFuser {
    fn name(&self) -> &str {
        "representative"
    }

    fn fuse(&mut self, inputs: &[FingerprintTemplate]) -> Result<Option<Vec<u8>>> {
        let idx = most_representative(inputs, &mut self.scorer)?;
        Ok(idx.map(|i| inputs[i].bytes().to_vec()))
    }
}

/// Index of the template with the highest mean score against the others.
/// Ties go to the earliest template. `None` for an empty slice.
pub fn most_representative(
    templates: &[FingerprintTemplate],
    scorer: &mut dyn PairScorer,
) -> EngineResult<Option<usize>> {
    if templates.len() <= 1 {
        return Ok(if templates.is_empty() { None } else { Some(0) });
    }
    let mut best: Option<(usize, f64)> = None;
    for (i, template) in templates.iter().enumerate() {
        let mut total = 0u32;
        for (j, other) in templates.iter().enumerate() {
            if i != j {
                total += u32::from(scorer.score_pair(template.bytes(), other.bytes())?);
            }
        }
        let mean = f64::from(total) / (templates.len() - 1) as f64;
        if best.map_or(true, |(_, b)| mean > b) {
            best = Some((i, mean));
        }
    }
    Ok(best.map(|(i, _)| i))
}

/// Top `n` captures by quality, returned in their original capture order.
pub fn select_top_captures(
    captures: Vec<FingerprintTemplate>,
    n: usize,
) -> Vec<FingerprintTemplate> {
    let mut ranked: Vec<usize> = (0..captures.len()).collect();
    // stable: equal qualities keep capture order
    ranked.sort_by(|a, b| captures[*b].quality().cmp(&captures[*a].quality()));
    ranked.truncate(n);
    ranked.sort_unstable();
    captures
        .into_iter()
        .enumerate()
        .filter(|(idx, _)| ranked.binary_search(idx).is_ok())
        .map(|(_, template)| template)
        .collect()
}

/// Build the stored set from the top captures and an optional merged template.
pub fn fuse_or_fallback(
    top: Vec<FingerprintTemplate>,
    merged: Option<(String, Vec<u8>)>,
    max_stored: usize,
) -> EnrollmentOutcome {
    let quality = top.iter().map(FingerprintTemplate::quality).max().unwrap_or(0);
    let (mut templates, fused_by) = match merged {
        Some((fuser, bytes)) => (vec![FingerprintTemplate::new(bytes, quality)], Some(fuser)),
        None => (top, None),
    };
    templates.truncate(max_stored.max(1));
    EnrollmentOutcome {
        templates,
        quality,
        fused_by,
    }
}

/// Run a full enrollment sequence while holding the session lock.
pub fn enroll(
    session: &DeviceSession,
    enrollment: &EnrollmentSettings,
    fingerprint: &FingerprintSettings,
) -> EngineResult<EnrollmentOutcome> {
    let mut guard = session.lock()?;
    guard.ensure_connected()?;

    let timeout = enrollment.per_capture_timeout();
    let mut captures = Vec::new();
    for attempt in 1..=enrollment.capture_attempts {
        match guard.capture_with_retries(timeout, 1) {
            Ok(template) => {
                log::info!(
                    "enrollment capture {}/{} ok (quality {})",
                    attempt,
                    enrollment.capture_attempts,
                    template.quality()
                );
                captures.push(template);
            }
            // a missing driver cannot recover within this sequence
            Err(err @ EngineError::CapabilityUnavailable(_)) => return Err(err),
            Err(err) => {
                log::info!(
                    "enrollment capture {}/{} skipped: {}",
                    attempt,
                    enrollment.capture_attempts,
                    err
                );
            }
        }
    }

    if captures.len() < enrollment.min_captures {
        log::warn!(
            "enrollment failed: {}/{} captures",
            captures.len(),
            enrollment.min_captures
        );
        return Err(EngineError::InsufficientCaptures {
            captured: captures.len(),
            required: enrollment.min_captures,
        });
    }

    let top = select_top_captures(captures, enrollment.fusion_inputs);
    let merged = guard.fuse(&top);
    let outcome = fuse_or_fallback(top, merged, fingerprint.max_stored_templates);
    match outcome.fused_by.as_deref() {
        Some(fuser) => log::info!(
            "enrollment fused by {} into {} (quality {})",
            fuser,
            outcome.templates[0].digest(),
            outcome.quality
        ),
        None => log::info!(
            "enrollment stored {} unfused templates (quality {})",
            outcome.templates.len(),
            outcome.quality
        ),
    }
    Ok(outcome)
}
