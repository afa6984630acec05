use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::anyhow;

use crate::error::{EngineError, EngineResult};

use super::backend::{VisionBackend, VisionCapability};
use super::result::{FaceBox, FaceEmbedding, ObjectDetection};

type SharedBackend = Arc<Mutex<dyn VisionBackend>>;

/// Thread-safe registry of vision backends.
///
/// Backends are wrapped in `Mutex` because every `VisionBackend` call takes `&mut self`.
/// A lookup prefers the default backend and falls back to any other backend
/// that supports the capability, so a secondary face detector is used when
/// the primary one lacks it.
pub struct BackendRegistry {
    backends: HashMap<String, SharedBackend>,
    order: Vec<String>,
    default_name: Option<String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
            order: Vec::new(),
            default_name: None,
        }
    }

    /// Register a backend. The first registered backend becomes the default.
    pub fn register<B: VisionBackend + 'static>(&mut self, backend: B) {
        let name = backend.name().to_string();
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        if !self.backends.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.backends.insert(name, Arc::new(Mutex::new(backend)));
    }

    /// Set default backend by name.
    pub fn set_default(&mut self, name: &str) -> anyhow::Result<()> {
        if !self.backends.contains_key(name) {
            return Err(anyhow!("backend '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    /// Get backend by name.
    pub fn get(&self, name: &str) -> Option<SharedBackend> {
        self.backends.get(name).cloned()
    }

    /// List registered backends in registration order.
    pub fn list(&self) -> Vec<String> {
        self.order.clone()
    }

    /// True when some registered backend supports the capability.
    pub fn supports(&self, capability: VisionCapability) -> bool {
        self.backend_for_capability(capability).is_ok()
    }

    /// Select a backend that supports the requested capability.
    ///
    /// Fallback candidates are tried in registration order so the choice is
    /// reproducible.
    pub fn backend_for_capability(&self, capability: VisionCapability) -> EngineResult<SharedBackend> {
        let default = self.default_name.iter();
        let rest = self
            .order
            .iter()
            .filter(|name| Some(*name) != self.default_name.as_ref());
        for name in default.chain(rest) {
            let Some(backend) = self.backends.get(name) else {
                continue;
            };
            if lock(backend)?.supports(capability) {
                return Ok(backend.clone());
            }
        }
        Err(EngineError::CapabilityUnavailable(format!(
            "no registered backend supports {:?}",
            capability
        )))
    }

    pub fn detect_face(&self, image: &[u8]) -> EngineResult<Option<FaceBox>> {
        let backend = self.backend_for_capability(VisionCapability::FaceDetection)?;
        let mut guard = lock(&backend)?;
        Ok(guard.detect_face(image)?)
    }

    pub fn encode_face(&self, image: &[u8]) -> EngineResult<Option<FaceEmbedding>> {
        let backend = self.backend_for_capability(VisionCapability::FaceEncoding)?;
        let mut guard = lock(&backend)?;
        Ok(guard.encode_face(image)?)
    }

    pub fn classify_objects(&self, image: &[u8]) -> EngineResult<Vec<ObjectDetection>> {
        let backend = self.backend_for_capability(VisionCapability::ObjectClassification)?;
        let mut guard = lock(&backend)?;
        Ok(guard.classify_objects(image)?)
    }

    /// Run every backend's warm-up hook.
    pub fn warm_up(&self) -> EngineResult<()> {
        for name in &self.order {
            if let Some(backend) = self.backends.get(name) {
                lock(backend)?.warm_up()?;
            }
        }
        Ok(())
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn lock(backend: &SharedBackend) -> EngineResult<MutexGuard<'_, dyn VisionBackend + 'static>> {
    backend
        .lock()
        .map_err(|_| EngineError::Device(anyhow!("vision backend lock poisoned")))
}
