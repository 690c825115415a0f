use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
};
use tracing::info;

use crate::{
    handlers::error::{api_error, ApiError},
    models::{ApiResponse, ErrorResponse},
    services::DiscoveryReport,
    AppState,
};

/// POST /api/v1/discovery/gke
/// Lists the project's GKE clusters, reconciles them into the store and
/// refreshes the zone capability cache. Per-cluster failures are part of
/// the report, not an error.
pub async fn discover_gke(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<DiscoveryReport>>, ApiError> {
    let Some(discovery) = state.discovery.as_ref() else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "GKE discovery is not configured".to_string(),
                message: Some("No usable GCP service account was found at startup".to_string()),
            }),
        ));
    };

    info!("Starting GKE discovery");
    let report = discovery
        .reconcile(state.store.as_ref())
        .await
        .map_err(|e| api_error("GKE discovery failed", &e))?;
    Ok(Json(ApiResponse::success(report)))
}
