//! Error taxonomy shared by the face and fingerprint pipelines.

use thiserror::Error;

/// Why a capture loop ran out of attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub enum CaptureMiss {
    /// The sensor call itself timed out.
    Timeout,
    /// The sensor returned an image without a template (or vice versa).
    IncompleteData,
}

impl std::fmt::Display for CaptureMiss {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureMiss::Timeout => f.write_str("sensor timeout"),
            CaptureMiss::IncompleteData => f.write_str("incomplete capture data"),
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// Empty or corrupt image/buffer, wrong modality, mismatched dimensions.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("capability unavailable: {0}")]
    CapabilityUnavailable(String),

    #[error("capture loop exhausted after {attempts} attempts ({last})")]
    HardwareTimeout { attempts: u32, last: CaptureMiss },

    #[error("no finger detected after {attempts} attempts")]
    FingerNotDetected { attempts: u32 },

    #[error("no encodable feature: {0}")]
    NoEncodableFeature(String),

    #[error("identity has no enrolled biometrics")]
    NotEnrolled,

    #[error("insufficient captures: {captured}/{required} succeeded")]
    InsufficientCaptures { captured: usize, required: usize },

    #[error("sensor reported capture failure code {code}")]
    CaptureFailed { code: i32 },

    #[error("device error: {0}")]
    Device(#[from] anyhow::Error),
}

impl EngineError {
    /// True when repeating the same call may succeed without operator action.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::HardwareTimeout { .. } | EngineError::FingerNotDetected { .. }
        )
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        EngineError::InvalidInput(msg.into())
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
