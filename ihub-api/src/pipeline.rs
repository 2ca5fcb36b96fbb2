//! Analysis pipeline
//!
//! decode → detect → classify + tag → assemble → annotate → persist → store

use chrono::Utc;
use ihub_common::{AnalysisResult, GeoLocation};
use image::ImageFormat;
use tracing::{debug, info};
use uuid::Uuid;

use crate::annotate::encode_jpeg;
use crate::error::{ApiError, ApiResult};
use crate::store::StoredAnalysis;
use crate::AppState;

/// Run a full analysis of an uploaded image and store the result
pub async fn analyze_image(
    state: &AppState,
    image_bytes: Vec<u8>,
    location: Option<GeoLocation>,
) -> ApiResult<AnalysisResult> {
    if image_bytes.is_empty() {
        return Err(ApiError::BadRequest("Uploaded file is empty".to_string()));
    }

    let format = image::guess_format(&image_bytes)
        .map_err(|_| ApiError::BadRequest("Unsupported or unreadable image".to_string()))?;

    // Decoding is CPU bound
    let bytes = image_bytes.clone();
    let decoded = tokio::task::spawn_blocking(move || {
        image::load_from_memory_with_format(&bytes, format)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Decode task failed: {}", e)))?
    .map_err(|e| ApiError::BadRequest(format!("Could not read image: {}", e)))?;

    let analysis_id = Uuid::new_v4();
    debug!(
        analysis_id = %analysis_id,
        width = decoded.width(),
        height = decoded.height(),
        "Image decoded"
    );

    let detections = state.detector.detect(&image_bytes).await?;
    let result = AnalysisResult::from_detections(analysis_id, detections, location, Utc::now());

    let annotator = state.annotator.clone();
    let to_draw = result.detections.clone();
    let annotated = tokio::task::spawn_blocking(move || {
        encode_jpeg(annotator.annotate(&decoded, &to_draw))
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Annotation task failed: {}", e)))??;

    let original_path = state
        .storage
        .original_path(analysis_id, extension(format));
    let annotated_path = state.storage.annotated_path(analysis_id);
    state.storage.write(&original_path, &image_bytes).await?;
    if let Err(e) = state.storage.write(&annotated_path, &annotated).await {
        state
            .storage
            .remove_paths(&[original_path.as_path(), annotated_path.as_path()])
            .await;
        return Err(e.into());
    }

    let evicted = state
        .store
        .insert(StoredAnalysis::new(
            result.clone(),
            original_path,
            annotated_path,
        ))
        .await;
    if !evicted.is_empty() {
        debug!(count = evicted.len(), "Evicted analyses to stay within capacity");
        state.storage.remove_files(&evicted).await;
    }

    info!(
        analysis_id = %analysis_id,
        detections = result.detections.len(),
        severity = %result.severity,
        "Analysis complete"
    );

    Ok(result)
}

fn extension(format: ImageFormat) -> &'static str {
    format.extensions_str().first().copied().unwrap_or("img")
}
