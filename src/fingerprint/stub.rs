//! Scripted sensor for tests and offline tooling.
//!
//! Acquisitions are replayed in order; once the script runs out the sensor
//! reports `NoFinger`. A [`SensorProbe`] observes calls after the sensor has
//! been moved into a session.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};

use super::sensor::{Acquisition, FingerprintSensor, SensorError, VendorMethod, VendorReply};

#[derive(Default)]
struct ProbeState {
    opens: AtomicU32,
    closes: AtomicU32,
    acquires: AtomicU32,
    merges: Mutex<Vec<Vec<Vec<u8>>>>,
}

/// Shared view of the calls a [`ScriptedSensor`] received.
#[derive(Clone, Default)]
pub struct SensorProbe(Arc<ProbeState>);

impl SensorProbe {
    pub fn opens(&self) -> u32 {
        self.0.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> u32 {
        self.0.closes.load(Ordering::SeqCst)
    }

    pub fn acquires(&self) -> u32 {
        self.0.acquires.load(Ordering::SeqCst)
    }

    /// Inputs of every merge call, in call order.
    pub fn merge_inputs(&self) -> Vec<Vec<Vec<u8>>> {
        self.0
            .merges
            .lock()
            .map(|merges| merges.clone())
            .unwrap_or_default()
    }
}

enum MergeScript {
    Unsupported,
    Merged(Vec<u8>),
    Fails(String),
}

pub struct ScriptedSensor {
    name: String,
    script: VecDeque<std::result::Result<Acquisition, SensorError>>,
    failing_opens: u32,
    vendor: HashMap<VendorMethod, VendorReply>,
    merge: MergeScript,
    probe: SensorProbe,
}

impl Default for ScriptedSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedSensor {
    pub fn new() -> Self {
        Self {
            name: "scripted".to_string(),
            script: VecDeque::new(),
            failing_opens: 0,
            vendor: HashMap::new(),
            merge: MergeScript::Unsupported,
            probe: SensorProbe::default(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn probe(&self) -> SensorProbe {
        self.probe.clone()
    }

    pub fn then_capture(mut self, template: Vec<u8>, quality: Option<u8>) -> Self {
        self.script
            .push_back(Ok(Acquisition::Captured { template, quality }));
        self
    }

    pub fn then_no_finger(mut self) -> Self {
        self.script.push_back(Ok(Acquisition::NoFinger));
        self
    }

    pub fn then_incomplete(mut self) -> Self {
        self.script.push_back(Ok(Acquisition::Incomplete));
        self
    }

    pub fn then_error(mut self, err: SensorError) -> Self {
        self.script.push_back(Err(err));
        self
    }

    /// The first `count` opens fail with `Unavailable`.
    pub fn failing_opens(mut self, count: u32) -> Self {
        self.failing_opens = count;
        self
    }

    pub fn with_vendor_reply(mut self, method: VendorMethod, reply: VendorReply) -> Self {
        self.vendor.insert(method, reply);
        self
    }

    pub fn with_merge(mut self, merged: Vec<u8>) -> Self {
        self.merge = MergeScript::Merged(merged);
        self
    }

    pub fn with_failing_merge(mut self, msg: impl Into<String>) -> Self {
        self.merge = MergeScript::Fails(msg.into());
        self
    }
}

impl FingerprintSensor for ScriptedSensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self) -> std::result::Result<(), SensorError> {
        self.probe.0.opens.fetch_add(1, Ordering::SeqCst);
        if self.failing_opens > 0 {
            self.failing_opens -= 1;
            return Err(SensorError::Unavailable("no reader attached".to_string()));
        }
        Ok(())
    }

    fn close(&mut self) {
        self.probe.0.closes.fetch_add(1, Ordering::SeqCst);
    }

    fn acquire(&mut self, _timeout: Duration) -> std::result::Result<Acquisition, SensorError> {
        self.probe.0.acquires.fetch_add(1, Ordering::SeqCst);
        self.script.pop_front().unwrap_or(Ok(Acquisition::NoFinger))
    }

    fn vendor_match(
        &mut self,
        method: VendorMethod,
        _a: &[u8],
        _b: &[u8],
    ) -> Result<Option<VendorReply>> {
        Ok(self.vendor.get(&method).cloned())
    }

    fn merge_templates(&mut self, templates: &[&[u8]]) -> Result<Option<Vec<u8>>> {
        if let Ok(mut merges) = self.probe.0.merges.lock() {
            merges.push(templates.iter().map(|t| t.to_vec()).collect());
        }
        match &self.merge {
            MergeScript::Unsupported => Ok(None),
            MergeScript::Merged(bytes) => Ok(Some(bytes.clone())),
            MergeScript::Fails(msg) => Err(anyhow!("{}", msg)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_replays_then_reports_no_finger() {
        let mut sensor = ScriptedSensor::new().then_capture(vec![1], Some(60));
        let probe = sensor.probe();
        assert!(matches!(
            sensor.acquire(Duration::ZERO),
            Ok(Acquisition::Captured { .. })
        ));
        assert!(matches!(
            sensor.acquire(Duration::ZERO),
            Ok(Acquisition::NoFinger)
        ));
        assert_eq!(probe.acquires(), 2);
    }

    #[test]
    fn merge_records_inputs() {
        let mut sensor = ScriptedSensor::new().with_failing_merge("GenRegTemplate -3");
        let probe = sensor.probe();
        assert!(sensor.merge_templates(&[&[1u8][..], &[2u8][..]]).is_err());
        assert_eq!(probe.merge_inputs(), vec![vec![vec![1], vec![2]]]);
    }
}
