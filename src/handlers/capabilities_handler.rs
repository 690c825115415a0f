use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};

use crate::{
    handlers::error::{api_error, bad_request, ApiError},
    models::{ApiResponse, ErrorResponse, ProviderCapabilities, ProviderKind},
    AppState,
};

/// GET /api/v1/capabilities/:provider
pub async fn get_capabilities(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> Result<Json<ApiResponse<ProviderCapabilities>>, ApiError> {
    let provider: ProviderKind = provider
        .parse()
        .map_err(|e: String| bad_request("Invalid provider", e))?;
    // Autopilot shares the GKE cache
    let provider = match provider {
        ProviderKind::GkeAutopilot => ProviderKind::Gke,
        other => other,
    };

    match state.store.get_capabilities(provider).await {
        Ok(Some(capabilities)) => Ok(Json(ApiResponse::success(capabilities))),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "Capabilities not cached".to_string(),
                message: Some(format!("No {} capabilities have been cached yet", provider)),
            }),
        )),
        Err(e) => Err(api_error("Failed to read capabilities", &e)),
    }
}
