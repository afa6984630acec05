use anyhow::{anyhow, Result};

use crate::detect::result::{FaceBox, FaceEmbedding, ObjectDetection};

/// Capabilities a vision backend may provide.
///
/// The engine treats models as opaque: a backend answers with boxes,
/// embeddings or labelled objects and nothing else.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VisionCapability {
    FaceDetection,
    FaceEncoding,
    ObjectClassification,
}

/// Vision backend trait.
///
/// Implementations receive encoded image bytes (JPEG/PNG as captured) and must
/// treat them as read-only and ephemeral: no copies beyond the call, no disk
/// writes, no network I/O.
///
/// Calls are CPU-bound and blocking. Async callers offload them to a worker.
pub trait VisionBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Returns true when the backend supports a capability.
    fn supports(&self, capability: VisionCapability) -> bool;

    /// Locate the primary face. `Ok(None)` means the image holds no face.
    fn detect_face(&mut self, _image: &[u8]) -> Result<Option<FaceBox>> {
        Err(anyhow!("{} does not support face detection", self.name()))
    }

    /// Encode the primary face. `Ok(None)` means no face could be encoded.
    fn encode_face(&mut self, _image: &[u8]) -> Result<Option<FaceEmbedding>> {
        Err(anyhow!("{} does not support face encoding", self.name()))
    }

    /// Run the object classifier over the full frame.
    fn classify_objects(&mut self, _image: &[u8]) -> Result<Vec<ObjectDetection>> {
        Err(anyhow!("{} does not support object classification", self.name()))
    }

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
