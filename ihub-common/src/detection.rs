//! Detection records
//!
//! A `Detection` is one labeled, confidence-scored, bounding-boxed object
//! instance emitted by a model pass. Records are validated and normalized at
//! construction and are immutable afterwards.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Axis-aligned box in image pixel coordinates
///
/// Serialized as `[x1, y1, x2, y2]`. `x1 < x2` and `y1 < y2` are expected but
/// not enforced; consumers that draw boxes skip degenerate ones.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    fn is_finite(&self) -> bool {
        [self.x1, self.y1, self.x2, self.y2]
            .iter()
            .all(|v| v.is_finite())
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from(v: [f64; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

impl TryFrom<&[f64]> for BoundingBox {
    type Error = Error;

    fn try_from(v: &[f64]) -> Result<Self> {
        match v {
            [x1, y1, x2, y2] => Ok(Self::new(*x1, *y1, *x2, *y2)),
            _ => Err(Error::InvalidInput(format!(
                "bbox must have 4 coordinates, got {}",
                v.len()
            ))),
        }
    }
}

/// One recognized object instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDetection")]
pub struct Detection {
    label: String,
    confidence: f64,
    bbox: BoundingBox,
}

/// Unvalidated wire shape; every deserialized `Detection` passes through `Detection::new`
#[derive(Deserialize)]
struct RawDetection {
    label: String,
    confidence: f64,
    bbox: BoundingBox,
}

impl TryFrom<RawDetection> for Detection {
    type Error = Error;

    fn try_from(raw: RawDetection) -> Result<Self> {
        Detection::new(&raw.label, raw.confidence, raw.bbox)
    }
}

impl Detection {
    /// Create a detection, normalizing the label and validating value ranges
    ///
    /// # Errors
    /// `Error::InvalidInput` when the label is blank, the confidence is not a
    /// finite value in `[0, 1]`, or a bbox coordinate is not finite.
    pub fn new(label: &str, confidence: f64, bbox: impl Into<BoundingBox>) -> Result<Self> {
        let label = normalize_label(label);
        if label.is_empty() {
            return Err(Error::InvalidInput("detection label is empty".to_string()));
        }
        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            return Err(Error::InvalidInput(format!(
                "confidence for '{}' out of range [0, 1]: {}",
                label, confidence
            )));
        }
        let bbox = bbox.into();
        if !bbox.is_finite() {
            return Err(Error::InvalidInput(format!(
                "bbox for '{}' has non-finite coordinates",
                label
            )));
        }

        Ok(Self {
            label,
            confidence,
            bbox,
        })
    }

    /// Normalized label (lowercase, underscores for spaces)
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }
}

/// Lowercase a model class name and replace spaces with underscores
///
/// `"Safety Shoe"` becomes `"safety_shoe"`.
pub fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase().replace(' ', "_")
}
