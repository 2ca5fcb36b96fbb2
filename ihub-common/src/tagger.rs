//! Auto tagging
//!
//! Direct label → tag lookups plus contextual rules over the whole label set.
//! Output is deduplicated and sorted.

use std::collections::BTreeSet;

use crate::classify::{
    label_set, present, EMERGENCY_LABELS, HELMET_LABEL, PERSON_LABELS, PPE_LABELS,
    STRUCTURAL_DAMAGE_LABELS,
};
use crate::Detection;

/// Tag returned for an empty detection set
pub const NO_DETECTIONS_TAG: &str = "no-detections";

const FULL_PPE_MIN: usize = 3;

/// Fixed label → tag vocabulary. Labels not listed contribute no direct tags.
const LABEL_TAGS: &[(&str, &[&str])] = &[
    // Personnel
    ("person", &["personnel", "human-present"]),
    ("head", &["personnel", "human-present"]),
    // PPE
    ("helmet", &["safety-equipment", "ppe", "ppe-compliant", "head-protection"]),
    ("vest", &["safety-equipment", "ppe", "ppe-compliant", "high-visibility"]),
    ("mask", &["safety-equipment", "ppe", "ppe-compliant", "respiratory-protection"]),
    ("gloves", &["safety-equipment", "ppe", "ppe-compliant", "hand-protection"]),
    ("goggles", &["safety-equipment", "ppe", "ppe-compliant", "eye-protection"]),
    ("safety_shoe", &["safety-equipment", "ppe", "ppe-compliant", "foot-protection"]),
    // Infrastructure damage
    ("crack", &["infrastructure-damage", "structural-issue", "maintenance-required"]),
    ("pothole", &["infrastructure-damage", "road-hazard", "maintenance-required"]),
    // Emergency
    ("fire", &["emergency", "critical-hazard", "evacuation-required"]),
    ("smoke", &["emergency", "fire-risk", "investigation-required"]),
    // Vehicles
    ("car", &["infrastructure", "vehicle"]),
    ("truck", &["infrastructure", "vehicle", "heavy-vehicle"]),
    ("bus", &["infrastructure", "vehicle", "heavy-vehicle"]),
];

/// Direct tags for a single label
pub fn tags_for_label(label: &str) -> &'static [&'static str] {
    LABEL_TAGS
        .iter()
        .find(|(l, _)| *l == label)
        .map(|(_, tags)| *tags)
        .unwrap_or(&[])
}

/// Generate the sorted tag list for a detection set
///
/// An empty set yields `["no-detections"]`.
pub fn generate_tags(detections: &[Detection]) -> Vec<String> {
    if detections.is_empty() {
        return vec![NO_DETECTIONS_TAG.to_string()];
    }

    let labels = label_set(detections);
    let mut tags: BTreeSet<&str> = labels
        .iter()
        .flat_map(|label| tags_for_label(label).iter().copied())
        .collect();

    if !present(&labels, &PERSON_LABELS).is_empty() {
        let ppe_count = present(&labels, &PPE_LABELS).len();
        if !labels.contains(HELMET_LABEL) {
            tags.insert("safety-violation");
            tags.insert("helmet-missing");
        } else if ppe_count >= FULL_PPE_MIN {
            tags.insert("full-ppe-compliant");
        } else {
            tags.insert("partial-ppe");
        }
    }

    if !present(&labels, &EMERGENCY_LABELS).is_empty() {
        tags.insert("immediate-action-required");
    }

    if !present(&labels, &STRUCTURAL_DAMAGE_LABELS).is_empty() {
        tags.insert("inspection-required");
    }

    tags.into_iter().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dets(labels: &[&str]) -> Vec<Detection> {
        labels
            .iter()
            .map(|l| Detection::new(l, 0.8, [0.0, 0.0, 5.0, 5.0]).unwrap())
            .collect()
    }

    #[test]
    fn test_empty_returns_sentinel() {
        assert_eq!(generate_tags(&[]), vec!["no-detections".to_string()]);
    }

    #[test]
    fn test_person_without_helmet() {
        let tags = generate_tags(&dets(&["person"]));
        assert_eq!(
            tags,
            vec!["helmet-missing", "human-present", "personnel", "safety-violation"]
        );
    }

    #[test]
    fn test_partial_ppe() {
        let tags = generate_tags(&dets(&["person", "helmet", "vest"]));
        assert!(tags.contains(&"partial-ppe".to_string()));
        assert!(tags.contains(&"high-visibility".to_string()));
        assert!(!tags.contains(&"safety-violation".to_string()));
    }

    #[test]
    fn test_helmet_alone_is_partial() {
        let tags = generate_tags(&dets(&["head", "helmet"]));
        assert!(tags.contains(&"partial-ppe".to_string()));
    }

    #[test]
    fn test_full_ppe_needs_three_items() {
        let tags = generate_tags(&dets(&["person", "helmet", "vest", "gloves"]));
        assert!(tags.contains(&"full-ppe-compliant".to_string()));
        assert!(!tags.contains(&"partial-ppe".to_string()));
    }

    #[test]
    fn test_ppe_without_person_has_no_compliance_tags() {
        let tags = generate_tags(&dets(&["helmet", "vest", "gloves"]));
        assert!(!tags.contains(&"full-ppe-compliant".to_string()));
        assert!(!tags.contains(&"partial-ppe".to_string()));
        assert!(tags.contains(&"ppe-compliant".to_string()));
    }

    #[test]
    fn test_emergency_and_damage_rules() {
        let tags = generate_tags(&dets(&["smoke", "pothole"]));
        assert!(tags.contains(&"immediate-action-required".to_string()));
        assert!(tags.contains(&"inspection-required".to_string()));
        assert!(tags.contains(&"road-hazard".to_string()));
        assert!(tags.contains(&"fire-risk".to_string()));
    }

    #[test]
    fn test_unknown_label_has_no_direct_tags() {
        assert!(tags_for_label("giraffe").is_empty());
        assert!(generate_tags(&dets(&["giraffe"])).is_empty());
    }

    #[test]
    fn test_output_sorted_and_unique() {
        let tags = generate_tags(&dets(&["truck", "bus", "car", "truck"]));
        assert_eq!(tags, vec!["heavy-vehicle", "infrastructure", "vehicle"]);
    }
}
