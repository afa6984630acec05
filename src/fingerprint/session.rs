//! Exclusive, reconnecting session over one fingerprint sensor.
//!
//! `Disconnected -> Connecting -> Ready -> (Capturing | Idle) -> Disconnected`.
//! Every call against the reader goes through one `Mutex`; concurrent callers
//! block until the current sequence releases the lock.

use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use anyhow::anyhow;
use serde::Serialize;

use crate::config::{DeviceSettings, FingerprintSettings};
use crate::error::{CaptureMiss, EngineError, EngineResult};

use super::fusion::TemplateFuser;
use super::score::{PairScorer, ScoreOutcome, TemplateScorer};
use super::sensor::{Acquisition, FingerprintSensor, SensorError};
use super::template::FingerprintTemplate;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Ready,
    Capturing,
    Idle,
}

impl SessionState {
    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            SessionState::Ready | SessionState::Capturing | SessionState::Idle
        )
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub connect_attempts: u64,
    pub captures: u64,
    pub reconnects: u64,
    pub failures: u64,
}

struct SessionInner {
    sensor: Box<dyn FingerprintSensor>,
    /// Cached fusion driver, consulted before the sensor's own merge.
    fuser: Option<Box<dyn TemplateFuser>>,
    state: SessionState,
    stats: SessionStats,
}

pub struct DeviceSession {
    inner: Mutex<SessionInner>,
    device: DeviceSettings,
    default_quality: u8,
    scorer: TemplateScorer,
}

impl DeviceSession {
    pub fn new<S: FingerprintSensor + 'static>(
        sensor: S,
        device: DeviceSettings,
        fingerprint: FingerprintSettings,
    ) -> Self {
        Self {
            inner: Mutex::new(SessionInner {
                sensor: Box::new(sensor),
                fuser: None,
                state: SessionState::Disconnected,
                stats: SessionStats::default(),
            }),
            device,
            default_quality: fingerprint.default_quality,
            scorer: TemplateScorer::new(fingerprint),
        }
    }

    pub fn with_fuser<F: TemplateFuser + 'static>(mut self, fuser: F) -> Self {
        if let Ok(inner) = self.inner.get_mut() {
            inner.fuser = Some(Box::new(fuser));
        }
        self
    }

    pub fn settings(&self) -> &DeviceSettings {
        &self.device
    }

    /// Startup connect: up to `startup_attempts` tries with fixed backoff.
    ///
    /// Never fails. When every attempt fails the session stays disconnected
    /// and later calls retry lazily.
    pub fn connect_with_retry(&self) -> bool {
        let attempts = self.device.startup_attempts.max(1);
        for attempt in 1..=attempts {
            match self.lock() {
                Ok(mut guard) => {
                    if guard.ensure_connected().is_ok() {
                        log::info!("fingerprint sensor ready after {} attempt(s)", attempt);
                        return true;
                    }
                }
                Err(err) => {
                    log::error!("fingerprint session unusable: {}", err);
                    return false;
                }
            }
            if attempt < attempts {
                thread::sleep(self.device.startup_backoff);
            }
        }
        log::warn!(
            "fingerprint sensor not ready after {} attempts, will retry on demand",
            attempts
        );
        false
    }

    /// Lazy connect, then report readiness.
    pub fn is_ready(&self) -> bool {
        match self.lock() {
            Ok(mut guard) => guard.ensure_connected().is_ok(),
            Err(_) => false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.lock()
            .map(|guard| guard.inner.state)
            .unwrap_or(SessionState::Disconnected)
    }

    pub fn stats(&self) -> SessionStats {
        self.lock()
            .map(|guard| guard.inner.stats)
            .unwrap_or_default()
    }

    /// Take the session lock for a multi-step sequence.
    pub fn lock(&self) -> EngineResult<SessionGuard<'_>> {
        let inner = self
            .inner
            .lock()
            .map_err(|_| EngineError::Device(anyhow!("fingerprint session lock poisoned")))?;
        Ok(SessionGuard {
            inner,
            device: &self.device,
            default_quality: self.default_quality,
            scorer: self.scorer,
        })
    }

    /// Capture one template with the configured retry loop.
    pub fn capture(&self, timeout: Duration) -> EngineResult<FingerprintTemplate> {
        self.lock()?.capture(timeout)
    }

    pub fn score(&self, a: &[u8], b: &[u8]) -> EngineResult<ScoreOutcome> {
        Ok(self.lock()?.score_detailed(a, b))
    }

    pub fn close(&self) {
        if let Ok(mut guard) = self.lock() {
            guard.disconnect();
        }
    }
}

/// Exclusive access to the sensor for the lifetime of the guard.
pub struct SessionGuard<'a> {
    inner: MutexGuard<'a, SessionInner>,
    device: &'a DeviceSettings,
    default_quality: u8,
    scorer: TemplateScorer,
}

impl SessionGuard<'_> {
    pub fn state(&self) -> SessionState {
        self.inner.state
    }

    pub fn ensure_connected(&mut self) -> EngineResult<()> {
        if self.inner.state.is_connected() {
            return Ok(());
        }
        self.inner.state = SessionState::Connecting;
        self.inner.stats.connect_attempts += 1;
        match self.inner.sensor.open() {
            Ok(()) => {
                self.inner.state = SessionState::Ready;
                log::info!("fingerprint sensor {} connected", self.inner.sensor.name());
                Ok(())
            }
            Err(err) => {
                self.inner.state = SessionState::Disconnected;
                log::warn!("fingerprint sensor connect failed: {}", err);
                Err(sensor_failure(err))
            }
        }
    }

    fn disconnect(&mut self) {
        if self.inner.state != SessionState::Disconnected {
            self.inner.sensor.close();
            self.inner.state = SessionState::Disconnected;
        }
    }

    fn reconnect(&mut self) -> EngineResult<()> {
        log::warn!("fingerprint sensor lost its session, reconnecting");
        self.disconnect();
        thread::sleep(self.device.reconnect_delay);
        self.inner.stats.reconnects += 1;
        self.ensure_connected()
    }

    /// Capture with the configured retry count.
    pub fn capture(&mut self, timeout: Duration) -> EngineResult<FingerprintTemplate> {
        self.capture_with_retries(timeout, self.device.capture_retries)
    }

    /// Bounded retry loop. At most one reconnect per call; the read that hit
    /// the lost session is repeated and does not use up an attempt.
    pub fn capture_with_retries(
        &mut self,
        timeout: Duration,
        retries: u32,
    ) -> EngineResult<FingerprintTemplate> {
        self.ensure_connected()?;
        let attempts = retries.max(1);
        let mut reconnected = false;
        let mut last = CaptureMiss::Timeout;
        let mut only_no_finger = true;

        let mut attempt = 0;
        while attempt < attempts {
            attempt += 1;
            self.inner.state = SessionState::Capturing;
            let outcome = self.inner.sensor.acquire(timeout);
            self.inner.state = SessionState::Idle;
            match outcome {
                Ok(Acquisition::Captured { template, quality }) if !template.is_empty() => {
                    let quality = quality
                        .filter(|q| *q > 0)
                        .unwrap_or(self.default_quality);
                    let template = FingerprintTemplate::new(template, quality);
                    self.inner.stats.captures += 1;
                    log::debug!(
                        "fingerprint captured on attempt {}: template {} quality {}",
                        attempt,
                        template.digest(),
                        template.quality()
                    );
                    return Ok(template);
                }
                Ok(Acquisition::Captured { .. }) | Ok(Acquisition::Incomplete) => {
                    last = CaptureMiss::IncompleteData;
                    only_no_finger = false;
                }
                Ok(Acquisition::NoFinger) => {}
                Err(SensorError::Timeout) => {
                    last = CaptureMiss::Timeout;
                    only_no_finger = false;
                }
                Err(SensorError::NotInitialized) if !reconnected => {
                    reconnected = true;
                    if let Err(err) = self.reconnect() {
                        self.inner.stats.failures += 1;
                        return Err(err);
                    }
                    attempt -= 1;
                    continue;
                }
                Err(SensorError::Status(code)) => {
                    self.inner.stats.failures += 1;
                    return Err(EngineError::CaptureFailed { code });
                }
                Err(err) => {
                    self.inner.stats.failures += 1;
                    self.disconnect();
                    return Err(sensor_failure(err));
                }
            }
            if attempt < attempts {
                thread::sleep(self.device.retry_delay);
            }
        }

        self.inner.stats.failures += 1;
        if only_no_finger {
            Err(EngineError::FingerNotDetected { attempts })
        } else {
            Err(EngineError::HardwareTimeout { attempts, last })
        }
    }

    /// Score a pair, consulting the driver's native primitives when the
    /// feature region does not apply.
    pub fn score_detailed(&mut self, a: &[u8], b: &[u8]) -> ScoreOutcome {
        let vendor: Option<&mut dyn FingerprintSensor> = if self.inner.state.is_connected() {
            Some(self.inner.sensor.as_mut())
        } else {
            None
        };
        self.scorer.score_detailed(a, b, vendor)
    }

    /// Merge fusion inputs: cached fuser first, then the sensor's native
    /// merge. `None` when neither produced a template.
    pub fn fuse(&mut self, inputs: &[FingerprintTemplate]) -> Option<(String, Vec<u8>)> {
        let inner = &mut *self.inner;
        if let Some(fuser) = inner.fuser.as_mut() {
            match fuser.fuse(inputs) {
                Ok(Some(bytes)) if !bytes.is_empty() => return Some((fuser.name().to_string(), bytes)),
                Ok(_) => log::debug!("fuser {} produced no template", fuser.name()),
                Err(err) => log::warn!("fuser {} failed: {:#}", fuser.name(), err),
            }
        }
        if !inner.state.is_connected() {
            return None;
        }
        let slices: Vec<&[u8]> = inputs.iter().map(FingerprintTemplate::bytes).collect();
        match inner.sensor.merge_templates(&slices) {
            Ok(Some(bytes)) if !bytes.is_empty() => Some((inner.sensor.name().to_string(), bytes)),
            Ok(_) => None,
            Err(err) => {
                log::warn!("{} template merge failed: {:#}", inner.sensor.name(), err);
                None
            }
        }
    }
}

impl PairScorer for SessionGuard<'_> {
    fn score_pair(&mut self, a: &[u8], b: &[u8]) -> EngineResult<u8> {
        Ok(self.score_detailed(a, b).score)
    }
}

fn sensor_failure(err: SensorError) -> EngineError {
    match err {
        SensorError::Unavailable(msg) => EngineError::CapabilityUnavailable(msg),
        SensorError::Status(code) => EngineError::CaptureFailed { code },
        SensorError::Other(err) => EngineError::Device(err),
        other => EngineError::Device(anyhow!(other.to_string())),
    }
}
