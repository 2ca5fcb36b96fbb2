//! Severity classification
//!
//! Maps a detection set to one of four ordinal severity levels and a
//! human-readable reason. Rules are evaluated top to bottom and the first
//! matching rule wins:
//!
//! 1. no detections → LOW
//! 2. fire or smoke → CRITICAL
//! 3. crack or pothole → HIGH
//! 4. person or head present → PPE assessment (missing helmet is CRITICAL)
//! 5. five or more detections above 0.75 confidence → MEDIUM
//! 6. three or more detections → MEDIUM
//! 7. otherwise → LOW
//!
//! Overlapping detections from different model passes are counted separately.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Detection;

/// Labels that escalate straight to CRITICAL
pub const EMERGENCY_LABELS: [&str; 2] = ["fire", "smoke"];

/// Labels that indicate structural damage
pub const STRUCTURAL_DAMAGE_LABELS: [&str; 2] = ["crack", "pothole"];

/// Labels that signal a person in the scene
pub const PERSON_LABELS: [&str; 2] = ["person", "head"];

/// Personal protective equipment labels
pub const PPE_LABELS: [&str; 6] = ["helmet", "vest", "mask", "gloves", "goggles", "safety_shoe"];

pub const HELMET_LABEL: &str = "helmet";

/// Confidence above which a detection counts toward the busy-scene rule
const HIGH_CONFIDENCE: f64 = 0.75;
const HIGH_CONFIDENCE_SCENE_MIN: usize = 5;
const BUSY_SCENE_MIN: usize = 3;
const FULL_PPE_MIN: usize = 4;
const PARTIAL_PPE_MIN: usize = 2;

/// Ordinal hazard level, LOW < MEDIUM < HIGH < CRITICAL
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Severity::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| crate::Error::InvalidInput(format!("unknown severity: {}", s)))
    }
}

/// Classifier output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityAssessment {
    pub severity: Severity,
    pub reason: String,
}

impl SeverityAssessment {
    fn new(severity: Severity, reason: impl Into<String>) -> Self {
        Self {
            severity,
            reason: reason.into(),
        }
    }
}

/// Distinct labels of a detection set
pub(crate) fn label_set(detections: &[Detection]) -> BTreeSet<&str> {
    detections.iter().map(Detection::label).collect()
}

/// Members of `candidates` present in `labels`, sorted
pub(crate) fn present<'a>(labels: &BTreeSet<&str>, candidates: &[&'a str]) -> Vec<&'a str> {
    let mut found: Vec<&str> = candidates
        .iter()
        .copied()
        .filter(|c| labels.contains(c))
        .collect();
    found.sort_unstable();
    found
}

/// Classify a detection set
///
/// Pure: the same input always yields the same assessment. Matched keywords
/// are listed in sorted order so the reason text is reproducible.
pub fn classify(detections: &[Detection]) -> SeverityAssessment {
    if detections.is_empty() {
        return SeverityAssessment::new(Severity::Low, "No objects detected");
    }

    let labels = label_set(detections);

    let emergency = present(&labels, &EMERGENCY_LABELS);
    if !emergency.is_empty() {
        return SeverityAssessment::new(
            Severity::Critical,
            format!("Emergency detected: {}", emergency.join(", ")),
        );
    }

    let damage = present(&labels, &STRUCTURAL_DAMAGE_LABELS);
    if !damage.is_empty() {
        return SeverityAssessment::new(
            Severity::High,
            format!("Structural damage detected: {}", damage.join(", ")),
        );
    }

    if !present(&labels, &PERSON_LABELS).is_empty() {
        return assess_ppe(&labels);
    }

    let high_confidence = detections
        .iter()
        .filter(|d| d.confidence() > HIGH_CONFIDENCE)
        .count();
    if high_confidence >= HIGH_CONFIDENCE_SCENE_MIN {
        return SeverityAssessment::new(
            Severity::Medium,
            format!("Multiple objects detected ({} items)", high_confidence),
        );
    }

    if detections.len() >= BUSY_SCENE_MIN {
        return SeverityAssessment::new(
            Severity::Medium,
            format!("Multiple objects detected ({} items)", detections.len()),
        );
    }

    SeverityAssessment::new(
        Severity::Low,
        format!("Routine observation: {} object(s) detected", detections.len()),
    )
}

/// PPE compliance for a scene known to contain a person
///
/// The helmet is checked first; the item count covers the full PPE set,
/// helmet included.
fn assess_ppe(labels: &BTreeSet<&str>) -> SeverityAssessment {
    if !labels.contains(HELMET_LABEL) {
        return SeverityAssessment::new(
            Severity::Critical,
            "Safety violation: Person without helmet detected",
        );
    }

    let ppe = present(labels, &PPE_LABELS);
    let list = ppe.join(", ");
    match ppe.len() {
        n if n >= FULL_PPE_MIN => {
            SeverityAssessment::new(Severity::Low, format!("Full PPE compliance: {}", list))
        }
        n if n >= PARTIAL_PPE_MIN => SeverityAssessment::new(
            Severity::Medium,
            format!(
                "Partial PPE detected: {}. Review for complete compliance",
                list
            ),
        ),
        1 => SeverityAssessment::new(
            Severity::High,
            format!("Insufficient PPE: Only {} detected", list),
        ),
        // Unreachable while the helmet check above holds
        _ => SeverityAssessment::new(
            Severity::High,
            "Safety concern: Person without visible PPE",
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(label: &str, confidence: f64) -> Detection {
        Detection::new(label, confidence, [0.0, 0.0, 10.0, 10.0]).unwrap()
    }

    fn dets(labels: &[&str]) -> Vec<Detection> {
        labels.iter().map(|l| det(l, 0.5)).collect()
    }

    #[test]
    fn test_empty_is_low() {
        let a = classify(&[]);
        assert_eq!(a.severity, Severity::Low);
        assert_eq!(a.reason, "No objects detected");
    }

    #[test]
    fn test_emergency_reason_is_sorted() {
        let a = classify(&dets(&["smoke", "fire", "smoke"]));
        assert_eq!(a.severity, Severity::Critical);
        assert_eq!(a.reason, "Emergency detected: fire, smoke");
    }

    #[test]
    fn test_emergency_beats_structural_damage() {
        let a = classify(&dets(&["crack", "smoke"]));
        assert_eq!(a.severity, Severity::Critical);
    }

    #[test]
    fn test_structural_damage_is_high() {
        let a = classify(&dets(&["pothole", "car", "crack"]));
        assert_eq!(a.severity, Severity::High);
        assert_eq!(a.reason, "Structural damage detected: crack, pothole");
    }

    #[test]
    fn test_structural_damage_beats_ppe_violation() {
        let a = classify(&dets(&["person", "crack"]));
        assert_eq!(a.severity, Severity::High);
    }

    #[test]
    fn test_person_without_helmet_is_critical() {
        let a = classify(&dets(&["person", "vest", "gloves"]));
        assert_eq!(a.severity, Severity::Critical);
        assert_eq!(a.reason, "Safety violation: Person without helmet detected");
    }

    #[test]
    fn test_head_counts_as_person() {
        let a = classify(&dets(&["head"]));
        assert_eq!(a.severity, Severity::Critical);
    }

    #[test]
    fn test_helmet_only_is_insufficient() {
        let a = classify(&dets(&["person", "helmet"]));
        assert_eq!(a.severity, Severity::High);
        assert_eq!(a.reason, "Insufficient PPE: Only helmet detected");
    }

    #[test]
    fn test_helmet_and_vest_is_partial() {
        let a = classify(&dets(&["person", "helmet", "vest"]));
        assert_eq!(a.severity, Severity::Medium);
        assert_eq!(
            a.reason,
            "Partial PPE detected: helmet, vest. Review for complete compliance"
        );
    }

    #[test]
    fn test_four_items_is_full_compliance() {
        let a = classify(&dets(&["person", "helmet", "vest", "gloves", "safety_shoe"]));
        assert_eq!(a.severity, Severity::Low);
        assert_eq!(
            a.reason,
            "Full PPE compliance: gloves, helmet, safety_shoe, vest"
        );
    }

    #[test]
    fn test_duplicate_ppe_counts_once() {
        let a = classify(&dets(&["person", "helmet", "helmet", "helmet"]));
        assert_eq!(a.severity, Severity::High);
    }

    #[test]
    fn test_high_confidence_scene() {
        let mut detections: Vec<Detection> = ["car", "car", "tree", "bench", "dog"]
            .iter()
            .map(|l| det(l, 0.9))
            .collect();
        detections.push(det("bicycle", 0.2));
        let a = classify(&detections);
        assert_eq!(a.severity, Severity::Medium);
        assert_eq!(a.reason, "Multiple objects detected (5 items)");
    }

    #[test]
    fn test_high_confidence_threshold_is_exclusive() {
        let mut detections: Vec<Detection> = (0..5).map(|_| det("car", 0.75)).collect();
        detections.push(det("truck", 0.9));
        let a = classify(&detections);
        // Falls through to the plain count rule
        assert_eq!(a.severity, Severity::Medium);
        assert_eq!(a.reason, "Multiple objects detected (6 items)");
    }

    #[test]
    fn test_three_detections_is_medium() {
        let a = classify(&dets(&["car", "truck", "bus"]));
        assert_eq!(a.severity, Severity::Medium);
        assert_eq!(a.reason, "Multiple objects detected (3 items)");
    }

    #[test]
    fn test_routine_observation() {
        let a = classify(&dets(&["car", "tree"]));
        assert_eq!(a.severity, Severity::Low);
        assert_eq!(a.reason, "Routine observation: 2 object(s) detected");
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn test_severity_parse_and_serialize() {
        assert_eq!("critical".parse::<Severity>().unwrap(), Severity::Critical);
        assert!("severe".parse::<Severity>().is_err());
        assert_eq!(
            serde_json::to_value(Severity::Medium).unwrap(),
            serde_json::json!("MEDIUM")
        );
    }
}
