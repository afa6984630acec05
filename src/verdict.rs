//! Match results shared by the face and fingerprint matchers.

use serde::Serialize;

/// The number a match decision was taken on.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MatchMetric {
    /// Embedding distance, lower is closer (face).
    Distance(f64),
    /// Similarity percentage, higher is closer (fingerprint).
    Similarity(u8),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CandidateDetail {
    /// Position of the candidate in the caller's list.
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_id: Option<String>,
    pub metric: MatchMetric,
    pub confidence: f64,
    pub is_match: bool,
}

/// Outcome of a 1:1 or 1:N match.
///
/// Built only through [`MatchResult::accepted`] and [`MatchResult::rejected`] so
/// that a positive result always carries at least one matching candidate and a
/// confidence computed from the metric that passed the threshold.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MatchResult {
    pub matched: bool,
    /// 0..=100.
    pub confidence: f64,
    pub metric: MatchMetric,
    pub matched_count: usize,
    pub total_candidates: usize,
    pub reason: String,
    pub details: Vec<CandidateDetail>,
}

impl MatchResult {
    pub(crate) fn accepted(
        metric: MatchMetric,
        confidence: f64,
        matched_count: usize,
        total_candidates: usize,
        reason: String,
        details: Vec<CandidateDetail>,
    ) -> Self {
        debug_assert!(matched_count >= 1, "accepted match without a matching candidate");
        Self {
            matched: matched_count >= 1,
            confidence: confidence.clamp(0.0, 100.0),
            metric,
            matched_count,
            total_candidates,
            reason,
            details,
        }
    }

    pub(crate) fn rejected(
        metric: MatchMetric,
        total_candidates: usize,
        reason: impl Into<String>,
        details: Vec<CandidateDetail>,
    ) -> Self {
        Self {
            matched: false,
            confidence: 0.0,
            metric,
            matched_count: 0,
            total_candidates,
            reason: reason.into(),
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_results_carry_no_confidence() {
        let result = MatchResult::rejected(MatchMetric::Distance(1.0), 3, "no match", vec![]);
        assert!(!result.matched);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.matched_count, 0);
    }

    #[test]
    fn metric_serializes_with_kind_tag() {
        let json = serde_json::to_value(MatchMetric::Similarity(87)).unwrap();
        assert_eq!(json["kind"], "similarity");
        assert_eq!(json["value"], 87);
    }
}
