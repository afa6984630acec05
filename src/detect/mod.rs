mod backend;
pub mod backends;
mod registry;
mod result;

pub use backend::{VisionBackend, VisionCapability};
pub use backends::StubBackend;
pub use registry::BackendRegistry;
pub use result::{FaceBox, FaceEmbedding, ObjectDetection};
