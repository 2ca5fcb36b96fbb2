//! Source returning a fixed detection list

use async_trait::async_trait;
use ihub_common::Detection;

use super::{DetectionSource, DetectorError};

/// Returns the same detections for every image
pub struct StaticSource {
    name: String,
    detections: Vec<Detection>,
}

impl StaticSource {
    pub fn new(name: impl Into<String>, detections: Vec<Detection>) -> Self {
        Self {
            name: name.into(),
            detections,
        }
    }
}

#[async_trait]
impl DetectionSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn detect(&self, _image: &[u8]) -> Result<Vec<Detection>, DetectorError> {
        Ok(self.detections.clone())
    }
}
