//! Properties of the classification core across classifier, tagger and assembler

use chrono::Utc;
use ihub_common::{classify, generate_tags, AnalysisResult, Detection, Severity};
use uuid::Uuid;

fn det(label: &str, confidence: f64) -> Detection {
    Detection::new(label, confidence, [0.0, 0.0, 10.0, 10.0]).unwrap()
}

/// A spread of scenes covering every classifier rule
fn scenes() -> Vec<Vec<Detection>> {
    let labels: &[&[&str]] = &[
        &[],
        &["fire"],
        &["smoke", "person"],
        &["crack"],
        &["person"],
        &["head", "helmet"],
        &["person", "helmet", "vest"],
        &["person", "helmet", "vest", "mask", "gloves"],
        &["car", "truck", "bus"],
        &["car"],
        &["giraffe", "zebra"],
        &["person", "person", "helmet", "goggles", "safety_shoe"],
    ];
    labels
        .iter()
        .map(|scene| scene.iter().map(|l| det(l, 0.8)).collect())
        .collect()
}

#[test]
fn test_classify_is_idempotent() {
    for scene in scenes() {
        assert_eq!(classify(&scene), classify(&scene));
        assert_eq!(generate_tags(&scene), generate_tags(&scene));
    }
}

#[test]
fn test_tags_sorted_and_unique() {
    for scene in scenes() {
        let tags = generate_tags(&scene);
        let mut expected = tags.clone();
        expected.sort();
        expected.dedup();
        assert_eq!(tags, expected);
    }
}

#[test]
fn test_adding_fire_always_escalates_to_critical() {
    for mut scene in scenes() {
        scene.push(det("fire", 0.3));
        let assessment = classify(&scene);
        assert_eq!(assessment.severity, Severity::Critical);
        assert!(assessment.reason.contains("fire"));
    }
}

#[test]
fn test_fire_scenario() {
    let scene = vec![Detection::new("fire", 0.9, [0.0, 0.0, 10.0, 10.0]).unwrap()];
    let assessment = classify(&scene);
    assert_eq!(assessment.severity, Severity::Critical);
    assert!(assessment.reason.contains("fire"));
    assert!(generate_tags(&scene).contains(&"immediate-action-required".to_string()));
}

#[test]
fn test_partial_ppe_scenario() {
    let scene = vec![det("person", 0.9), det("helmet", 0.85), det("vest", 0.8)];
    assert_eq!(classify(&scene).severity, Severity::Medium);
    assert!(generate_tags(&scene).contains(&"partial-ppe".to_string()));
}

#[test]
fn test_person_alone_scenario() {
    let scene = vec![det("person", 0.9)];
    assert_eq!(classify(&scene).severity, Severity::Critical);
    let tags = generate_tags(&scene);
    assert!(tags.contains(&"safety-violation".to_string()));
    assert!(tags.contains(&"helmet-missing".to_string()));
}

#[test]
fn test_vehicle_scene_uses_count_fallback() {
    let scene = vec![det("car", 0.5), det("truck", 0.5), det("bus", 0.5)];
    let assessment = classify(&scene);
    assert_eq!(assessment.severity, Severity::Medium);
    assert_eq!(assessment.reason, "Multiple objects detected (3 items)");
}

#[test]
fn test_overlapping_passes_count_separately() {
    // General model and PPE model both report the same worker
    let scene = vec![det("person", 0.9), det("head", 0.7)];
    let result = AnalysisResult::from_detections(Uuid::new_v4(), scene, None, Utc::now());

    assert_eq!(result.detections.len(), 2);
    assert_eq!(result.summary, "1 person(s), 1 head(s)");
    assert_eq!(result.severity, Severity::Critical);
}

#[test]
fn test_unknown_labels_still_count() {
    let scene = vec![det("giraffe", 0.5), det("zebra", 0.5), det("lion", 0.5)];
    assert!(generate_tags(&scene).is_empty());
    assert_eq!(classify(&scene).severity, Severity::Medium);
}

#[test]
fn test_result_invariants() {
    for scene in scenes() {
        let result = AnalysisResult::from_detections(Uuid::new_v4(), scene, None, Utc::now());
        assert!((0.0..=1.0).contains(&result.score));
        assert!(Severity::ALL.contains(&result.severity));
    }
}
