use serde::Serialize;

use super::score::PairScorer;
use super::template::IdentificationCandidate;

/// Best score of a 1:N sweep. Acceptance thresholds are applied by the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Identification {
    /// True as soon as one candidate was scored.
    pub found: bool,
    pub best_score: Option<u8>,
    pub best_candidate_id: Option<String>,
    pub scored: usize,
    pub total: usize,
}

impl Identification {
    pub fn accepted(&self, threshold: u8) -> bool {
        self.best_score.is_some_and(|score| score >= threshold)
    }
}

/// Score every candidate and report the maximum.
///
/// A candidate whose comparison fails is skipped; the sweep continues.
pub fn identify(
    probe: &[u8],
    candidates: &[IdentificationCandidate],
    scorer: &mut dyn PairScorer,
) -> Identification {
    let mut best: Option<u8> = None;
    let mut scored = 0usize;
    for candidate in candidates {
        match scorer.score_pair(probe, candidate.template.bytes()) {
            Ok(score) => {
                scored += 1;
                log::debug!(
                    "identify: candidate {} template {} score={}",
                    candidate.identity_id,
                    candidate.template.digest(),
                    score
                );
                best = Some(best.map_or(score, |b| b.max(score)));
            }
            Err(err) => log::warn!(
                "identify: skipping candidate {}: {}",
                candidate.identity_id,
                err
            ),
        }
    }

    let best_candidate_id = best
        .and_then(|score| locate_best(probe, candidates, score, scorer))
        .map(|candidate| candidate.identity_id.clone());

    Identification {
        found: best.is_some(),
        best_score: best,
        best_candidate_id,
        scored,
        total: candidates.len(),
    }
}

/// First candidate, in list order, whose recomputed score equals `best`.
pub fn locate_best<'a>(
    probe: &[u8],
    candidates: &'a [IdentificationCandidate],
    best: u8,
    scorer: &mut dyn PairScorer,
) -> Option<&'a IdentificationCandidate> {
    candidates.iter().find(|candidate| {
        matches!(scorer.score_pair(probe, candidate.template.bytes()), Ok(score) if score == best)
    })
}
