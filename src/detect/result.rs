use serde::Serialize;

/// Face location with normalized (0..1) coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct FaceBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub confidence: f32,
}

/// One object reported by the classifier.
///
/// `class_id` follows the COCO numbering the classifier was trained on; the
/// label is whatever the model reports and is informational only.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ObjectDetection {
    pub class_id: u16,
    pub label: String,
    pub confidence: f32,
    /// Bounding box, normalized 0..1 coordinates.
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl ObjectDetection {
    /// Share of the frame covered by the box, in percent.
    pub fn area_percent(&self) -> f32 {
        (self.w.max(0.0) * self.h.max(0.0) * 100.0).min(100.0)
    }
}

/// Fixed-length face descriptor. Produced per call, never cached.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceEmbedding(Vec<f32>);

impl FaceEmbedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[f32] {
        &self.0
    }

    pub fn dim(&self) -> usize {
        self.0.len()
    }

    /// Euclidean distance. `None` when dimensions differ.
    pub fn distance(&self, other: &FaceEmbedding) -> Option<f64> {
        if self.0.len() != other.0.len() || self.0.is_empty() {
            return None;
        }
        let sum: f64 = self
            .0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| {
                let d = f64::from(*a) - f64::from(*b);
                d * d
            })
            .sum();
        Some(sum.sqrt())
    }
}
