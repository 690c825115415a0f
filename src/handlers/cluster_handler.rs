use axum::{
    extract::{Query, State},
    response::Json,
};
use tracing::info;

use crate::{
    handlers::error::{api_error, ApiError},
    models::{ApiResponse, ClusterRecord, ListClustersQuery},
    AppState,
};

/// GET /api/v1/clusters
/// Lists stored cluster records, optionally narrowed with `?provider=`
pub async fn list_clusters(
    State(state): State<AppState>,
    Query(query): Query<ListClustersQuery>,
) -> Result<Json<ApiResponse<Vec<ClusterRecord>>>, ApiError> {
    match state.store.list_clusters(query.provider).await {
        Ok(clusters) => {
            info!("Returning {} cluster records", clusters.len());
            Ok(Json(ApiResponse::success(clusters)))
        }
        Err(e) => Err(api_error("Failed to list clusters", &e)),
    }
}
