//! Pairwise template similarity.
//!
//! Strategies are tried in a fixed order so that the same inputs and the same
//! driver capabilities always pick the same strategy and score.

use serde::Serialize;

use crate::config::FingerprintSettings;
use crate::error::EngineResult;

use super::sensor::{FingerprintSensor, VendorMethod};

/// Number of equal bits between two equal-length buffers.
pub fn matching_bits(a: &[u8], b: &[u8]) -> u64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| u64::from((!(x ^ y)).count_ones()))
        .sum()
}

/// `matching_bits * 100 / total_bits`, truncated. Zero for empty or
/// mismatched buffers.
pub fn bit_similarity(a: &[u8], b: &[u8]) -> u8 {
    if a.is_empty() || a.len() != b.len() {
        return 0;
    }
    let total_bits = a.len() as u64 * 8;
    (matching_bits(a, b) * 100 / total_bits) as u8
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// Empty or mismatched buffers, rejected before any comparison.
    LengthGuard,
    /// Bit similarity over the feature region behind the biometric offset.
    FeatureRegion,
    Vendor(VendorMethod),
    /// Bit similarity over the whole buffer.
    WholeBuffer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ScoreOutcome {
    pub score: u8,
    pub strategy: MatchStrategy,
}

/// Deterministic template scorer.
#[derive(Clone, Copy, Debug, Default)]
pub struct TemplateScorer {
    settings: FingerprintSettings,
}

impl TemplateScorer {
    pub fn new(settings: FingerprintSettings) -> Self {
        Self { settings }
    }

    /// Score without a driver: feature region, else whole buffer.
    pub fn score(&self, a: &[u8], b: &[u8]) -> u8 {
        self.score_detailed(a, b, None).score
    }

    pub fn score_detailed(
        &self,
        a: &[u8],
        b: &[u8],
        vendor: Option<&mut dyn FingerprintSensor>,
    ) -> ScoreOutcome {
        if a.is_empty() || b.is_empty() || a.len() != b.len() {
            return ScoreOutcome {
                score: 0,
                strategy: MatchStrategy::LengthGuard,
            };
        }

        let offset = self.settings.biometric_offset;
        if a.len() > offset && b.len() > offset {
            let raw = bit_similarity(&a[offset..], &b[offset..]);
            let score = if raw > self.settings.feature_gate_pct { raw } else { 0 };
            return ScoreOutcome {
                score,
                strategy: MatchStrategy::FeatureRegion,
            };
        }

        if let Some(sensor) = vendor {
            if let Some(outcome) = vendor_score(sensor, a, b) {
                return outcome;
            }
        }

        ScoreOutcome {
            score: bit_similarity(a, b),
            strategy: MatchStrategy::WholeBuffer,
        }
    }
}

fn vendor_score(sensor: &mut dyn FingerprintSensor, a: &[u8], b: &[u8]) -> Option<ScoreOutcome> {
    for method in VendorMethod::PRIORITY {
        match sensor.vendor_match(method, a, b) {
            Ok(Some(reply)) => match reply.usable_score() {
                Some(score) => {
                    return Some(ScoreOutcome {
                        score,
                        strategy: MatchStrategy::Vendor(method),
                    })
                }
                None => log::debug!(
                    "{}: {} returned no usable score",
                    sensor.name(),
                    method.as_str()
                ),
            },
            Ok(None) => {}
            Err(err) => log::debug!("{}: {} failed: {:#}", sensor.name(), method.as_str(), err),
        }
    }
    None
}

/// Anything that can score a template pair: the pure scorer, or a locked
/// device session that also consults the driver.
pub trait PairScorer {
    fn score_pair(&mut self, a: &[u8], b: &[u8]) -> EngineResult<u8>;
}

impl PairScorer for TemplateScorer {
    fn score_pair(&mut self, a: &[u8], b: &[u8]) -> EngineResult<u8> {
        Ok(self.score(a, b))
    }
}
