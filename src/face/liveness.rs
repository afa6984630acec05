//! Presentation-attack screening for face captures.
//!
//! The object classifier runs over the full frame and every hit is sorted into
//! one of four disjoint categories. The first matching rule decides:
//!
//! 1. any replay device (screen, phone, remote, book) -> `Critical`, reject
//! 2. two or more disallowed accessories -> `High`, reject
//! 3. only eyewear -> `Low`, accept with a note
//! 4. suspicious items or a single disallowed accessory -> `Medium`, accept with warnings
//! 5. nothing notable -> `Low`, accept
//!
//! A missing classifier accepts with `degraded = true`. A classifier failure
//! rejects at `Error` level.

use std::cmp::Ordering;

use serde::Serialize;

use crate::capture::{Capture, Modality};
use crate::detect::{BackendRegistry, ObjectDetection};
use crate::error::{EngineError, EngineResult};

/// COCO ids of objects that can replay a face.
pub const BLOCKING_DEVICES: &[(u16, &str)] = &[
    (62, "laptop"),
    (63, "tv"),
    (65, "remote"),
    (73, "book"),
    (74, "cell phone"),
];

/// Items that suggest a staged photo when several appear together.
pub const DISALLOWED_ACCESSORIES: &[(u16, &str)] = &[
    (0, "person"),
    (27, "tie"),
    (28, "cake"),
    (29, "couch"),
    (30, "potted plant"),
];

pub const ALLOWED_ACCESSORIES: &[(u16, &str)] = &[(37, "glasses"), (38, "sunglasses"), (39, "goggles")];

/// Tolerated, but reported as warnings.
pub const SUSPICIOUS_ITEMS: &[(u16, &str)] = &[
    (34, "bottle"),
    (35, "wine glass"),
    (36, "cup"),
    (42, "spoon"),
    (43, "bowl"),
    (44, "banana"),
    (45, "apple"),
    (47, "sandwich"),
    (48, "orange"),
    (50, "pizza"),
    (51, "donut"),
    (52, "cake"),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityLevel {
    Low,
    Medium,
    High,
    Critical,
    /// Classification itself failed. Not ranked against the others.
    Error,
}

impl SecurityLevel {
    pub fn severity(self) -> Option<u8> {
        match self {
            SecurityLevel::Low => Some(0),
            SecurityLevel::Medium => Some(1),
            SecurityLevel::High => Some(2),
            SecurityLevel::Critical => Some(3),
            SecurityLevel::Error => None,
        }
    }

    /// Only `Critical` and `High` block on their own.
    pub fn blocks_acceptance(self) -> bool {
        matches!(self, SecurityLevel::Critical | SecurityLevel::High)
    }
}

impl PartialOrd for SecurityLevel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.severity(), other.severity()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ if self == other => Some(Ordering::Equal),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectCategory {
    BlockingDevice,
    DisallowedAccessory,
    AllowedAccessory,
    Suspicious,
}

/// Eyewear is checked first, then devices, then the remaining tables.
pub fn categorize(class_id: u16) -> Option<(ObjectCategory, &'static str)> {
    let tables: [(ObjectCategory, &[(u16, &'static str)]); 4] = [
        (ObjectCategory::AllowedAccessory, ALLOWED_ACCESSORIES),
        (ObjectCategory::BlockingDevice, BLOCKING_DEVICES),
        (ObjectCategory::DisallowedAccessory, DISALLOWED_ACCESSORIES),
        (ObjectCategory::Suspicious, SUSPICIOUS_ITEMS),
    ];
    tables.into_iter().find_map(|(category, table)| {
        table
            .iter()
            .find(|(id, _)| *id == class_id)
            .map(|(_, name)| (category, *name))
    })
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetectedObject {
    pub class_id: u16,
    pub name: &'static str,
    pub category: ObjectCategory,
    pub confidence: f32,
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub area_percent: f32,
}

impl DetectedObject {
    fn describe(&self) -> String {
        format!(
            "{} at [x={:.2} y={:.2} w={:.2} h={:.2}], {:.1}% of frame",
            self.name, self.x, self.y, self.w, self.h, self.area_percent
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LivenessVerdict {
    pub is_live: bool,
    pub security_level: SecurityLevel,
    pub reason: String,
    pub detected_objects: Vec<DetectedObject>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Set when the classifier was missing and the check was skipped.
    pub degraded: bool,
}

impl LivenessVerdict {
    fn new(is_live: bool, security_level: SecurityLevel, reason: String) -> Self {
        Self {
            is_live,
            security_level,
            reason,
            detected_objects: Vec::new(),
            warnings: Vec::new(),
            note: None,
            degraded: false,
        }
    }

    pub fn unavailable(detail: &str) -> Self {
        let mut verdict = Self::new(
            true,
            SecurityLevel::Low,
            format!("object classifier unavailable, liveness check skipped ({})", detail),
        );
        verdict.degraded = true;
        verdict
    }

    pub fn failed(detail: &str) -> Self {
        Self::new(
            false,
            SecurityLevel::Error,
            format!("liveness classification failed: {}", detail),
        )
    }
}

/// Run the classifier and decide. Empty or non-face captures are input errors.
pub fn assess(registry: &BackendRegistry, image: &Capture) -> EngineResult<LivenessVerdict> {
    let bytes = image.require(Modality::FaceImage, "liveness image")?;
    let verdict = match registry.classify_objects(bytes) {
        Ok(detections) => assess_detections(&detections),
        Err(EngineError::CapabilityUnavailable(detail)) => {
            log::warn!("liveness: {}", detail);
            LivenessVerdict::unavailable(&detail)
        }
        Err(err) => {
            log::error!("liveness: classifier failed: {}", err);
            LivenessVerdict::failed(&err.to_string())
        }
    };
    log::info!(
        "liveness: level={:?} live={} objects={}",
        verdict.security_level,
        verdict.is_live,
        verdict.detected_objects.len()
    );
    Ok(verdict)
}

/// Pure decision over classifier output.
pub fn assess_detections(detections: &[ObjectDetection]) -> LivenessVerdict {
    let objects: Vec<DetectedObject> = detections
        .iter()
        .filter_map(|det| {
            categorize(det.class_id).map(|(category, name)| DetectedObject {
                class_id: det.class_id,
                name,
                category,
                confidence: det.confidence,
                x: det.x,
                y: det.y,
                w: det.w,
                h: det.h,
                area_percent: det.area_percent(),
            })
        })
        .collect();

    let names = |category: ObjectCategory| -> Vec<&'static str> {
        objects
            .iter()
            .filter(|o| o.category == category)
            .map(|o| o.name)
            .collect()
    };
    let devices: Vec<&DetectedObject> = objects
        .iter()
        .filter(|o| o.category == ObjectCategory::BlockingDevice)
        .collect();
    let disallowed = names(ObjectCategory::DisallowedAccessory);
    let allowed = names(ObjectCategory::AllowedAccessory);
    let suspicious = names(ObjectCategory::Suspicious);

    let mut verdict = if !devices.is_empty() {
        let listed: Vec<String> = devices.iter().map(|d| d.describe()).collect();
        LivenessVerdict::new(
            false,
            SecurityLevel::Critical,
            format!(
                "replay device detected ({}); the face must be presented directly, not through a screen, phone or printout",
                listed.join("; ")
            ),
        )
    } else if disallowed.len() >= 2 {
        LivenessVerdict::new(
            false,
            SecurityLevel::High,
            format!(
                "too many accessories or objects detected ({}); present the face without additional items",
                disallowed.join(", ")
            ),
        )
    } else if !allowed.is_empty() && disallowed.is_empty() && suspicious.is_empty() {
        let worn = allowed.join(", ");
        let mut verdict = LivenessVerdict::new(
            true,
            SecurityLevel::Low,
            format!("liveness passed, face with {} accepted", worn),
        );
        verdict.note = Some(format!("subject is wearing {}", worn));
        verdict
    } else if !suspicious.is_empty() || !disallowed.is_empty() {
        let warnings: Vec<String> = suspicious
            .iter()
            .chain(disallowed.iter())
            .chain(allowed.iter())
            .map(|name| name.to_string())
            .collect();
        let mut verdict = LivenessVerdict::new(
            true,
            SecurityLevel::Medium,
            format!(
                "liveness passed with warnings, objects present ({})",
                warnings.join(", ")
            ),
        );
        verdict.warnings = warnings;
        verdict
    } else {
        LivenessVerdict::new(
            true,
            SecurityLevel::Low,
            "liveness passed, no suspicious objects detected".to_string(),
        )
    };
    verdict.detected_objects = objects;
    verdict
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::backends::stub::{StubBackend, StubScript};
    use crate::detect::VisionCapability;

    fn det(class_id: u16, w: f32, h: f32) -> ObjectDetection {
        ObjectDetection {
            class_id,
            label: format!("class-{}", class_id),
            confidence: 0.8,
            x: 0.1,
            y: 0.1,
            w,
            h,
        }
    }

    #[test]
    fn laptop_is_critical_even_with_glasses() {
        let verdict = assess_detections(&[det(37, 0.2, 0.05), det(62, 0.5, 0.4)]);
        assert!(!verdict.is_live);
        assert_eq!(verdict.security_level, SecurityLevel::Critical);
        assert!(verdict.reason.contains("laptop"));
        assert!(verdict.reason.contains("20.0% of frame"));
    }

    #[test]
    fn two_disallowed_accessories_are_high() {
        let verdict = assess_detections(&[det(0, 0.6, 0.8), det(27, 0.1, 0.2)]);
        assert!(!verdict.is_live);
        assert_eq!(verdict.security_level, SecurityLevel::High);
        assert!(verdict.reason.contains("person, tie"));
    }

    #[test]
    fn eyewear_alone_is_low_with_note() {
        let verdict = assess_detections(&[det(38, 0.2, 0.05)]);
        assert!(verdict.is_live);
        assert_eq!(verdict.security_level, SecurityLevel::Low);
        assert_eq!(verdict.note.as_deref(), Some("subject is wearing sunglasses"));
    }

    #[test]
    fn single_person_or_food_is_medium() {
        let verdict = assess_detections(&[det(0, 0.6, 0.8)]);
        assert!(verdict.is_live);
        assert_eq!(verdict.security_level, SecurityLevel::Medium);
        assert_eq!(verdict.warnings, vec!["person"]);

        let verdict = assess_detections(&[det(36, 0.1, 0.1), det(37, 0.2, 0.05)]);
        assert_eq!(verdict.security_level, SecurityLevel::Medium);
        assert_eq!(verdict.warnings, vec!["cup", "glasses"]);
    }

    #[test]
    fn unknown_classes_are_ignored() {
        let verdict = assess_detections(&[det(2, 0.3, 0.3)]);
        assert!(verdict.is_live);
        assert_eq!(verdict.security_level, SecurityLevel::Low);
        assert!(verdict.detected_objects.is_empty());
    }

    #[test]
    fn cake_ids_fall_into_their_own_tables() {
        assert_eq!(
            categorize(28).map(|c| c.0),
            Some(ObjectCategory::DisallowedAccessory)
        );
        assert_eq!(categorize(52).map(|c| c.0), Some(ObjectCategory::Suspicious));
        assert_eq!(categorize(99), None);
    }

    #[test]
    fn security_levels_are_ordered_except_error() {
        assert!(SecurityLevel::Critical > SecurityLevel::High);
        assert!(SecurityLevel::High > SecurityLevel::Medium);
        assert!(SecurityLevel::Medium > SecurityLevel::Low);
        assert_eq!(SecurityLevel::Error.partial_cmp(&SecurityLevel::Low), None);
        assert!(SecurityLevel::High.blocks_acceptance());
        assert!(!SecurityLevel::Medium.blocks_acceptance());
    }

    #[test]
    fn missing_classifier_accepts_and_flags_degradation() {
        let mut registry = BackendRegistry::new();
        registry.register(StubBackend::new().with_capabilities(&[VisionCapability::FaceEncoding]));
        let verdict = assess(&registry, &Capture::face_image(b"face".to_vec())).unwrap();
        assert!(verdict.is_live);
        assert!(verdict.degraded);
        assert!(verdict.reason.contains("unavailable"));
    }

    #[test]
    fn classifier_failure_rejects_at_error_level() {
        let mut registry = BackendRegistry::new();
        registry.register(StubBackend::new().script(b"face", StubScript::failing("tensor shape")));
        let verdict = assess(&registry, &Capture::face_image(b"face".to_vec())).unwrap();
        assert!(!verdict.is_live);
        assert_eq!(verdict.security_level, SecurityLevel::Error);
        assert!(!verdict.degraded);
    }

    #[test]
    fn empty_image_is_an_input_error() {
        let registry = BackendRegistry::new();
        let err = assess(&registry, &Capture::face_image(Vec::new())).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }
}
