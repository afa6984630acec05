//! Fingerprint sensor driver interface.
//!
//! A driver wraps one physical reader. It is opened and closed by the
//! [`DeviceSession`](super::DeviceSession) that owns it and is never called
//! concurrently.

use std::time::Duration;

use anyhow::Result;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SensorError {
    /// The driver lost its session handle. Recovered by one reconnect.
    #[error("sensor not initialized")]
    NotInitialized,

    /// Driver library or reader missing.
    #[error("sensor unavailable: {0}")]
    Unavailable(String),

    #[error("sensor timed out")]
    Timeout,

    /// Non-zero status code reported by the driver.
    #[error("sensor status {0}")]
    Status(i32),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result of one blocking acquisition call.
#[derive(Debug)]
pub enum Acquisition {
    Captured {
        template: Vec<u8>,
        /// Device-reported quality. `None` or `Some(0)` means not reported.
        quality: Option<u8>,
    },
    NoFinger,
    /// Image without template, or a truncated read.
    Incomplete,
}

/// Native match primitives a driver may expose, in the order they are tried.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
pub enum VendorMethod {
    Identify,
    IdentifyTemplate,
    MatchFingerprint,
    MatchTemplate,
    Match,
    Verify,
}

impl VendorMethod {
    pub const PRIORITY: [VendorMethod; 6] = [
        VendorMethod::Identify,
        VendorMethod::IdentifyTemplate,
        VendorMethod::MatchFingerprint,
        VendorMethod::MatchTemplate,
        VendorMethod::Match,
        VendorMethod::Verify,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VendorMethod::Identify => "Identify",
            VendorMethod::IdentifyTemplate => "IdentifyTemplate",
            VendorMethod::MatchFingerprint => "MatchFingerprint",
            VendorMethod::MatchTemplate => "MatchTemplate",
            VendorMethod::Match => "Match",
            VendorMethod::Verify => "Verify",
        }
    }
}

/// Raw reply of a vendor match primitive.
#[derive(Clone, Debug, PartialEq)]
pub enum VendorReply {
    Score(f64),
    Verdict(bool),
    Tuple(Vec<VendorReply>),
    /// Anything non-numeric (handles, strings, status objects).
    Opaque,
}

impl VendorReply {
    /// Similarity 0..=100 if the reply carries one.
    ///
    /// Negative and non-finite numbers are unusable. A tuple contributes its
    /// first numeric element.
    pub fn usable_score(&self) -> Option<u8> {
        match self {
            VendorReply::Score(value) if value.is_finite() && *value >= 0.0 => {
                Some(value.trunc().clamp(0.0, 100.0) as u8)
            }
            VendorReply::Score(_) => None,
            VendorReply::Verdict(true) => Some(100),
            VendorReply::Verdict(false) => Some(0),
            VendorReply::Tuple(items) => items
                .iter()
                .find(|item| matches!(item, VendorReply::Score(_)))
                .and_then(VendorReply::usable_score),
            VendorReply::Opaque => None,
        }
    }
}

pub trait FingerprintSensor: Send {
    fn name(&self) -> &str;

    fn open(&mut self) -> std::result::Result<(), SensorError>;

    fn close(&mut self);

    /// Block until a finger is read or `timeout` expires.
    fn acquire(&mut self, timeout: Duration) -> std::result::Result<Acquisition, SensorError>;

    /// Run a native match primitive. `Ok(None)` means the driver does not offer it.
    fn vendor_match(
        &mut self,
        _method: VendorMethod,
        _a: &[u8],
        _b: &[u8],
    ) -> Result<Option<VendorReply>> {
        Ok(None)
    }

    /// Native three-way registration merge. `Ok(None)` means not offered.
    fn merge_templates(&mut self, _templates: &[&[u8]]) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
}
