//! Detection sources
//!
//! A detection source turns encoded image bytes into a list of detections.
//! Several model passes (general objects, PPE, cracks, fire) are combined by
//! `CompositeSource`, which concatenates their output in pass order. Boxes
//! from different passes that cover the same object are kept as separate
//! detections.

mod remote;
mod fixed;

pub use fixed::StaticSource;
pub use remote::RemoteDetector;

use std::sync::Arc;

use async_trait::async_trait;
use ihub_common::config::DetectorConfig;
use ihub_common::Detection;
use thiserror::Error;
use tracing::{debug, warn};

/// Detection source error
#[derive(Debug, Error)]
pub enum DetectorError {
    /// Transport failure talking to an inference endpoint
    #[error("pass '{pass}' request failed: {source}")]
    Request {
        pass: String,
        #[source]
        source: reqwest::Error,
    },

    /// Endpoint answered with a non-success status
    #[error("pass '{pass}' returned HTTP {status}")]
    Status { pass: String, status: u16 },

    /// Endpoint reply could not be decoded
    #[error("pass '{pass}' returned an unreadable reply: {message}")]
    Decode { pass: String, message: String },
}

impl DetectorError {
    /// Name of the pass that failed
    pub fn pass(&self) -> &str {
        match self {
            DetectorError::Request { pass, .. }
            | DetectorError::Status { pass, .. }
            | DetectorError::Decode { pass, .. } => pass,
        }
    }
}

/// One model pass over an uploaded image
#[async_trait]
pub trait DetectionSource: Send + Sync {
    /// Pass name for logging
    fn name(&self) -> &str;

    /// Run detection on encoded image bytes
    async fn detect(&self, image: &[u8]) -> Result<Vec<Detection>, DetectorError>;
}

struct Pass {
    source: Box<dyn DetectionSource>,
    optional: bool,
}

/// Ordered set of model passes whose detections are concatenated
#[derive(Default)]
pub struct CompositeSource {
    passes: Vec<Pass>,
}

impl CompositeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build remote passes from configuration, in configuration order
    pub fn from_config(configs: &[DetectorConfig]) -> Result<Self, DetectorError> {
        let mut composite = Self::new();
        for config in configs {
            let detector = RemoteDetector::from_config(config)?;
            composite = composite.with_pass(detector, config.optional);
        }
        Ok(composite)
    }

    /// Append a pass. Failures of an optional pass are logged and skipped.
    pub fn with_pass(mut self, source: impl DetectionSource + 'static, optional: bool) -> Self {
        self.passes.push(Pass {
            source: Box::new(source),
            optional,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    pub fn into_shared(self) -> Arc<dyn DetectionSource> {
        Arc::new(self)
    }
}

#[async_trait]
impl DetectionSource for CompositeSource {
    fn name(&self) -> &str {
        "composite"
    }

    async fn detect(&self, image: &[u8]) -> Result<Vec<Detection>, DetectorError> {
        let mut detections = Vec::new();
        for pass in &self.passes {
            match pass.source.detect(image).await {
                Ok(found) => {
                    debug!(pass = pass.source.name(), count = found.len(), "Pass complete");
                    detections.extend(found);
                }
                Err(e) if pass.optional => {
                    warn!(pass = pass.source.name(), error = %e, "Optional pass failed, skipping");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSource;

    #[async_trait]
    impl DetectionSource for FailingSource {
        fn name(&self) -> &str {
            "failing"
        }

        async fn detect(&self, _image: &[u8]) -> Result<Vec<Detection>, DetectorError> {
            Err(DetectorError::Status {
                pass: "failing".to_string(),
                status: 503,
            })
        }
    }

    fn det(label: &str) -> Detection {
        Detection::new(label, 0.9, [0.0, 0.0, 4.0, 4.0]).unwrap()
    }

    #[tokio::test]
    async fn test_passes_are_concatenated_in_order() {
        let composite = CompositeSource::new()
            .with_pass(StaticSource::new("general", vec![det("person"), det("car")]), false)
            .with_pass(StaticSource::new("ppe", vec![det("person"), det("helmet")]), false);

        let labels: Vec<String> = composite
            .detect(b"img")
            .await
            .unwrap()
            .iter()
            .map(|d| d.label().to_string())
            .collect();
        assert_eq!(labels, vec!["person", "car", "person", "helmet"]);
    }

    #[tokio::test]
    async fn test_optional_pass_failure_is_skipped() {
        let composite = CompositeSource::new()
            .with_pass(StaticSource::new("general", vec![det("person")]), false)
            .with_pass(FailingSource, true);

        let found = composite.detect(b"img").await.unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_required_pass_failure_fails() {
        let composite = CompositeSource::new()
            .with_pass(FailingSource, false)
            .with_pass(StaticSource::new("ppe", vec![det("helmet")]), true);

        let err = composite.detect(b"img").await.unwrap_err();
        assert!(matches!(err, DetectorError::Status { status: 503, .. }));
        assert_eq!(err.pass(), "failing");
    }

    #[tokio::test]
    async fn test_empty_composite_detects_nothing() {
        let composite = CompositeSource::new();
        assert!(composite.is_empty());
        assert!(composite.detect(b"img").await.unwrap().is_empty());
    }
}
