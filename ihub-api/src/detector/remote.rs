//! Model pass served by an HTTP inference endpoint
//!
//! The endpoint receives the raw image bytes in a POST body and answers with
//! `{"detections": [{"label": "...", "confidence": 0.9, "bbox": [x1, y1, x2, y2]}]}`.

use std::time::Duration;

use async_trait::async_trait;
use ihub_common::config::DetectorConfig;
use ihub_common::{BoundingBox, Detection};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{DetectionSource, DetectorError};

#[derive(Debug, Deserialize)]
struct DetectReply {
    detections: Vec<RemoteDetection>,
}

#[derive(Debug, Deserialize)]
struct RemoteDetection {
    label: String,
    confidence: f64,
    bbox: Vec<f64>,
}

pub struct RemoteDetector {
    name: String,
    endpoint: String,
    min_confidence: f64,
    client: reqwest::Client,
}

impl RemoteDetector {
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, DetectorError> {
        let name = name.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| DetectorError::Request {
                pass: name.clone(),
                source,
            })?;

        Ok(Self {
            name,
            endpoint: endpoint.into(),
            min_confidence: 0.0,
            client,
        })
    }

    pub fn from_config(config: &DetectorConfig) -> Result<Self, DetectorError> {
        Ok(Self::new(
            config.name.clone(),
            config.endpoint.clone(),
            Duration::from_secs(config.timeout_secs),
        )?
        .with_min_confidence(config.min_confidence))
    }

    /// Discard detections below `min_confidence`
    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Convert an endpoint reply, dropping entries that fail validation
    fn convert(&self, reply: DetectReply) -> Vec<Detection> {
        reply
            .detections
            .into_iter()
            .filter_map(|raw| {
                let detection = BoundingBox::try_from(raw.bbox.as_slice())
                    .and_then(|bbox| Detection::new(&raw.label, raw.confidence, bbox));
                match detection {
                    Ok(d) => Some(d),
                    Err(e) => {
                        warn!(pass = %self.name, error = %e, "Dropping malformed detection");
                        None
                    }
                }
            })
            .filter(|d| d.confidence() >= self.min_confidence)
            .collect()
    }
}

#[async_trait]
impl DetectionSource for RemoteDetector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn detect(&self, image: &[u8]) -> Result<Vec<Detection>, DetectorError> {
        debug!(pass = %self.name, endpoint = %self.endpoint, bytes = image.len(), "Sending image");

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(image.to_vec())
            .send()
            .await
            .map_err(|source| DetectorError::Request {
                pass: self.name.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DetectorError::Status {
                pass: self.name.clone(),
                status: status.as_u16(),
            });
        }

        let reply: DetectReply = response.json().await.map_err(|e| DetectorError::Decode {
            pass: self.name.clone(),
            message: e.to_string(),
        })?;

        Ok(self.convert(reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> RemoteDetector {
        RemoteDetector::new("ppe", "http://127.0.0.1:9/detect", Duration::from_secs(1))
            .unwrap()
            .with_min_confidence(0.3)
    }

    #[test]
    fn test_convert_normalizes_and_filters() {
        let reply: DetectReply = serde_json::from_str(
            r#"{"detections": [
                {"label": "Safety Shoe", "confidence": 0.8, "bbox": [1, 2, 3, 4]},
                {"label": "helmet", "confidence": 0.1, "bbox": [1, 2, 3, 4]},
                {"label": "vest", "confidence": 0.7, "bbox": [1, 2, 3]},
                {"label": "mask", "confidence": 1.7, "bbox": [1, 2, 3, 4]}
            ]}"#,
        )
        .unwrap();

        let found = detector().convert(reply);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].label(), "safety_shoe");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_request_error() {
        let err = detector().detect(b"img").await.unwrap_err();
        assert!(matches!(err, DetectorError::Request { .. }));
    }
}
