//! Analysis result assembly
//!
//! Combines detections, classifier output and tagger output with request
//! metadata into the record returned to clients and kept in the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{classify, generate_tags, Detection, Error, Result, Severity, SeverityAssessment};

/// Capture location attached to an uploaded photograph
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
    /// Reported accuracy radius in meters
    pub accuracy: Option<f64>,
}

impl GeoLocation {
    /// Validate coordinates: latitude in [-90, 90], longitude in [-180, 180],
    /// accuracy non-negative
    pub fn new(latitude: f64, longitude: f64, accuracy: Option<f64>) -> Result<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(Error::InvalidInput(format!(
                "latitude out of range [-90, 90]: {}",
                latitude
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(Error::InvalidInput(format!(
                "longitude out of range [-180, 180]: {}",
                longitude
            )));
        }
        if let Some(acc) = accuracy {
            if !acc.is_finite() || acc < 0.0 {
                return Err(Error::InvalidInput(format!(
                    "location accuracy must be non-negative: {}",
                    acc
                )));
            }
        }

        Ok(Self {
            latitude,
            longitude,
            accuracy,
        })
    }
}

/// Aggregate output for one uploaded image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub analysis_id: Uuid,
    /// Detector emission order, preserved for display
    pub detections: Vec<Detection>,
    /// Mean detection confidence, 0.0 when nothing was detected
    pub score: f64,
    pub summary: String,
    pub severity: Severity,
    pub severity_reason: String,
    /// Sorted, duplicate-free
    pub tags: Vec<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location_accuracy: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl AnalysisResult {
    /// Build a result from already computed classifier and tagger output
    pub fn assemble(
        analysis_id: Uuid,
        detections: Vec<Detection>,
        assessment: SeverityAssessment,
        tags: Vec<String>,
        location: Option<GeoLocation>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            analysis_id,
            score: mean_confidence(&detections),
            summary: summarize(&detections),
            detections,
            severity: assessment.severity,
            severity_reason: assessment.reason,
            tags,
            latitude: location.map(|l| l.latitude),
            longitude: location.map(|l| l.longitude),
            location_accuracy: location.and_then(|l| l.accuracy),
            timestamp,
        }
    }

    /// Classify, tag and assemble in one step
    pub fn from_detections(
        analysis_id: Uuid,
        detections: Vec<Detection>,
        location: Option<GeoLocation>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let assessment = classify(&detections);
        let tags = generate_tags(&detections);
        Self::assemble(analysis_id, detections, assessment, tags, location, timestamp)
    }

    /// Location when both coordinates are known
    pub fn location(&self) -> Option<GeoLocation> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoLocation {
                latitude,
                longitude,
                accuracy: self.location_accuracy,
            }),
            _ => None,
        }
    }
}

/// Arithmetic mean of detection confidences
pub fn mean_confidence(detections: &[Detection]) -> f64 {
    if detections.is_empty() {
        return 0.0;
    }
    let total: f64 = detections.iter().map(Detection::confidence).sum();
    total / detections.len() as f64
}

/// Count-by-label listing, e.g. `"2 person(s), 1 helmet(s)"`
///
/// Labels appear in first-seen order.
pub fn summarize(detections: &[Detection]) -> String {
    if detections.is_empty() {
        return "No objects detected".to_string();
    }

    let mut counts: Vec<(&str, usize)> = Vec::new();
    for det in detections {
        match counts.iter_mut().find(|(label, _)| *label == det.label()) {
            Some((_, count)) => *count += 1,
            None => counts.push((det.label(), 1)),
        }
    }

    counts
        .iter()
        .map(|(label, count)| format!("{} {}(s)", count, label))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(label: &str, confidence: f64) -> Detection {
        Detection::new(label, confidence, [1.0, 2.0, 3.0, 4.0]).unwrap()
    }

    #[test]
    fn test_mean_confidence() {
        assert_eq!(mean_confidence(&[]), 0.0);
        let d = vec![det("car", 0.5), det("car", 1.0)];
        assert!((mean_confidence(&d) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_summary_first_seen_order() {
        let d = vec![
            det("person", 0.9),
            det("helmet", 0.8),
            det("person", 0.7),
            det("vest", 0.6),
        ];
        assert_eq!(summarize(&d), "2 person(s), 1 helmet(s), 1 vest(s)");
        assert_eq!(summarize(&[]), "No objects detected");
    }

    #[test]
    fn test_assemble_copies_location() {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let loc = GeoLocation::new(37.77, -122.42, Some(12.5)).unwrap();
        let result = AnalysisResult::from_detections(id, vec![det("fire", 0.9)], Some(loc), now);

        assert_eq!(result.analysis_id, id);
        assert_eq!(result.severity, Severity::Critical);
        assert_eq!(result.latitude, Some(37.77));
        assert_eq!(result.longitude, Some(-122.42));
        assert_eq!(result.location_accuracy, Some(12.5));
        assert_eq!(result.location(), Some(loc));
        assert_eq!(result.timestamp, now);
    }

    #[test]
    fn test_assemble_without_location() {
        let result = AnalysisResult::from_detections(Uuid::new_v4(), vec![], None, Utc::now());
        assert_eq!(result.score, 0.0);
        assert_eq!(result.tags, vec!["no-detections".to_string()]);
        assert!(result.location().is_none());
        assert!(result.latitude.is_none());
    }

    #[test]
    fn test_geolocation_validation() {
        assert!(GeoLocation::new(91.0, 0.0, None).is_err());
        assert!(GeoLocation::new(0.0, -180.5, None).is_err());
        assert!(GeoLocation::new(0.0, 0.0, Some(-1.0)).is_err());
        assert!(GeoLocation::new(-90.0, 180.0, Some(0.0)).is_ok());
    }

    #[test]
    fn test_timestamp_serializes_as_rfc3339() {
        let result = AnalysisResult::from_detections(Uuid::new_v4(), vec![], None, Utc::now());
        let json = serde_json::to_value(&result).unwrap();
        let ts = json["timestamp"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(ts).is_ok());
        assert_eq!(json["severity"], "LOW");
    }
}
