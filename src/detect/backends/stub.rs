use std::collections::{HashMap, HashSet};

use anyhow::{anyhow, Result};
use sha2::{Digest, Sha256};

use crate::detect::backend::{VisionBackend, VisionCapability};
use crate::detect::result::{FaceBox, FaceEmbedding, ObjectDetection};

/// Scripted answer for one image.
#[derive(Clone, Debug, Default)]
pub struct StubScript {
    pub face: Option<FaceBox>,
    pub embedding: Option<Vec<f32>>,
    pub objects: Vec<ObjectDetection>,
    pub failure: Option<String>,
}

impl StubScript {
    /// A centred face with the given detector confidence.
    pub fn face(confidence: f32) -> Self {
        Self::default().with_face(confidence)
    }

    /// A detectable face that encodes to `values`.
    pub fn encoded(values: Vec<f32>) -> Self {
        Self::face(0.99).with_embedding(values)
    }

    /// Every call on this image fails.
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn with_face(mut self, confidence: f32) -> Self {
        self.face = Some(FaceBox {
            x: 0.3,
            y: 0.2,
            w: 0.4,
            h: 0.5,
            confidence,
        });
        self
    }

    pub fn with_embedding(mut self, values: Vec<f32>) -> Self {
        self.embedding = Some(values);
        self
    }

    /// Adds a classifier hit covering a `w` x `h` share of the frame.
    pub fn with_object(mut self, class_id: u16, label: &str, confidence: f32, w: f32, h: f32) -> Self {
        self.objects.push(ObjectDetection {
            class_id,
            label: label.to_string(),
            confidence,
            x: 0.0,
            y: 0.0,
            w,
            h,
        });
        self
    }
}

/// Stub backend for testing. Answers are keyed by the SHA-256 of the image bytes,
/// so unknown images behave like frames with nothing in them.
pub struct StubBackend {
    name: &'static str,
    capabilities: HashSet<VisionCapability>,
    scripts: HashMap<[u8; 32], StubScript>,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::named("stub")
    }

    pub fn named(name: &'static str) -> Self {
        Self {
            name,
            capabilities: [
                VisionCapability::FaceDetection,
                VisionCapability::FaceEncoding,
                VisionCapability::ObjectClassification,
            ]
            .into_iter()
            .collect(),
            scripts: HashMap::new(),
        }
    }

    /// Restrict the advertised capabilities.
    pub fn with_capabilities(mut self, capabilities: &[VisionCapability]) -> Self {
        self.capabilities = capabilities.iter().copied().collect();
        self
    }

    pub fn script(mut self, image: &[u8], script: StubScript) -> Self {
        self.scripts.insert(image_key(image), script);
        self
    }

    fn lookup(&self, image: &[u8]) -> Result<Option<&StubScript>> {
        match self.scripts.get(&image_key(image)) {
            Some(StubScript {
                failure: Some(message),
                ..
            }) => Err(anyhow!("{}: {}", self.name, message)),
            other => Ok(other),
        }
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl VisionBackend for StubBackend {
    fn name(&self) -> &'static str {
        self.name
    }

    fn supports(&self, capability: VisionCapability) -> bool {
        self.capabilities.contains(&capability)
    }

    fn detect_face(&mut self, image: &[u8]) -> Result<Option<FaceBox>> {
        Ok(self.lookup(image)?.and_then(|s| s.face))
    }

    fn encode_face(&mut self, image: &[u8]) -> Result<Option<FaceEmbedding>> {
        Ok(self
            .lookup(image)?
            .and_then(|s| s.embedding.clone())
            .map(FaceEmbedding::new))
    }

    fn classify_objects(&mut self, image: &[u8]) -> Result<Vec<ObjectDetection>> {
        Ok(self
            .lookup(image)?
            .map(|s| s.objects.clone())
            .unwrap_or_default())
    }
}

fn image_key(image: &[u8]) -> [u8; 32] {
    Sha256::digest(image).into()
}
