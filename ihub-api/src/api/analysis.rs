//! Analysis API handlers
//!
//! POST /api/analyze, GET /api/analyses, GET|DELETE /api/analysis/:id,
//! GET /api/analysis/:id/report, GET /api/analysis/:id/image

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use ihub_common::{AnalysisResult, GeoLocation, Severity};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    pdf, pipeline,
    store::StoredAnalysis,
    AppState,
};

const DEFAULT_LIST_LIMIT: usize = 50;
const MAX_LIST_LIMIT: usize = 500;

/// GET /api/analyses query
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub severity: Option<String>,
    pub limit: Option<usize>,
}

/// One entry of GET /api/analyses
#[derive(Debug, Serialize)]
pub struct AnalysisSummary {
    pub analysis_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub detection_count: usize,
    pub score: f64,
    pub summary: String,
    pub tags: Vec<String>,
}

impl From<AnalysisResult> for AnalysisSummary {
    fn from(result: AnalysisResult) -> Self {
        Self {
            analysis_id: result.analysis_id,
            timestamp: result.timestamp,
            severity: result.severity,
            detection_count: result.detections.len(),
            score: result.score,
            summary: result.summary,
            tags: result.tags,
        }
    }
}

/// Which stored image to return
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageVariant {
    #[default]
    Annotated,
    Original,
}

#[derive(Debug, Default, Deserialize)]
pub struct ImageQuery {
    #[serde(default)]
    pub variant: ImageVariant,
}

/// Multipart form fields of POST /api/analyze
#[derive(Debug, Default)]
struct AnalyzeForm {
    file: Option<Vec<u8>>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    location_accuracy: Option<f64>,
}

impl AnalyzeForm {
    async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" => form.file = Some(field.bytes().await?.to_vec()),
                "latitude" => form.latitude = parse_number(&name, &field.text().await?)?,
                "longitude" => form.longitude = parse_number(&name, &field.text().await?)?,
                "location_accuracy" => {
                    form.location_accuracy = parse_number(&name, &field.text().await?)?
                }
                other => tracing::debug!(field = other, "Ignoring unknown form field"),
            }
        }
        Ok(form)
    }

    fn location(&self) -> ApiResult<Option<GeoLocation>> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Ok(Some(GeoLocation::new(lat, lon, self.location_accuracy)?)),
            (None, None) => Ok(None),
            _ => Err(ApiError::BadRequest(
                "latitude and longitude must be provided together".to_string(),
            )),
        }
    }
}

/// Blank values count as absent
fn parse_number(field: &str, value: &str) -> ApiResult<Option<f64>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse::<f64>()
        .map(Some)
        .map_err(|_| ApiError::BadRequest(format!("{} is not a number: {}", field, value)))
}

/// POST /api/analyze
///
/// Multipart upload: `file` plus optional `latitude`, `longitude`,
/// `location_accuracy`. Returns the full analysis result.
pub async fn analyze(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<AnalysisResult>> {
    let form = AnalyzeForm::read(multipart).await?;
    let location = form.location()?;
    let file = form
        .file
        .ok_or_else(|| ApiError::BadRequest("No file uploaded".to_string()))?;

    let result = pipeline::analyze_image(&state, file, location).await?;
    Ok(Json(result))
}

/// GET /api/analyses
pub async fn list_analyses(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<AnalysisSummary>>> {
    let severity = query
        .severity
        .as_deref()
        .map(str::parse::<Severity>)
        .transpose()?;
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).min(MAX_LIST_LIMIT);

    let results = state.store.list(severity, limit).await;
    Ok(Json(results.into_iter().map(AnalysisSummary::from).collect()))
}

async fn find(state: &AppState, id: Uuid) -> ApiResult<StoredAnalysis> {
    state
        .store
        .get(&id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Analysis not found: {}", id)))
}

/// GET /api/analysis/:id
pub async fn get_analysis(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<AnalysisResult>> {
    Ok(Json(find(&state, id).await?.result))
}

/// GET /api/analysis/:id/report
///
/// PDF rendering of the stored result.
pub async fn get_report(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let stored = find(&state, id).await?;

    let bytes = tokio::task::spawn_blocking(move || pdf::render_report(&stored))
        .await
        .map_err(|e| ApiError::Internal(format!("Report task failed: {}", e)))??;

    tracing::info!(analysis_id = %id, bytes = bytes.len(), "Report generated");

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"insight-report-{}.pdf\"", id),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// GET /api/analysis/:id/image?variant=annotated|original
pub async fn get_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ImageQuery>,
) -> ApiResult<Response> {
    let stored = find(&state, id).await?;
    let path = match query.variant {
        ImageVariant::Annotated => stored.annotated_path,
        ImageVariant::Original => stored.original_path,
    };

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::NotFound(format!(
                "Image file missing for analysis {}",
                id
            )))
        }
        Err(e) => return Err(e.into()),
    };
    let mime = image::guess_format(&bytes)
        .map(|f| f.to_mime_type())
        .unwrap_or("application/octet-stream");

    Ok(([(header::CONTENT_TYPE, mime)], bytes).into_response())
}

/// DELETE /api/analysis/:id
pub async fn delete_analysis(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let removed = state
        .store
        .remove(&id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Analysis not found: {}", id)))?;
    state.storage.remove_files(&[removed]).await;

    tracing::info!(analysis_id = %id, "Analysis deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Build analysis routes
pub fn analysis_routes() -> Router<AppState> {
    Router::new()
        .route("/api/analyze", post(analyze))
        .route("/api/analyses", get(list_analyses))
        .route(
            "/api/analysis/:id",
            get(get_analysis).delete(delete_analysis),
        )
        .route("/api/analysis/:id/report", get(get_report))
        .route("/api/analysis/:id/image", get(get_image))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("latitude", " 12.5 ").unwrap(), Some(12.5));
        assert_eq!(parse_number("latitude", "").unwrap(), None);
        assert!(parse_number("latitude", "north").is_err());
    }

    #[test]
    fn test_location_requires_both_coordinates() {
        let form = AnalyzeForm {
            latitude: Some(1.0),
            ..Default::default()
        };
        assert!(form.location().is_err());

        let form = AnalyzeForm {
            latitude: Some(1.0),
            longitude: Some(2.0),
            location_accuracy: Some(5.0),
            ..Default::default()
        };
        let loc = form.location().unwrap().unwrap();
        assert_eq!(loc.accuracy, Some(5.0));

        assert!(AnalyzeForm::default().location().unwrap().is_none());
    }

    #[test]
    fn test_out_of_range_latitude_is_rejected() {
        let form = AnalyzeForm {
            latitude: Some(120.0),
            longitude: Some(2.0),
            ..Default::default()
        };
        assert!(form.location().is_err());
    }
}
