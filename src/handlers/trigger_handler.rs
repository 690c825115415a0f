use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use tracing::info;

use crate::{
    handlers::error::{api_error, bad_request, ApiError},
    models::{
        AgentDeploymentRequest, AksBuildRequest, ApiResponse, CachingRequest, DeleteClusterRequest,
        DispatchResponse, EksBuildRequest, GkeBuildRequest, ProviderKind, TriggerStatus,
    },
    services::EventType,
    AppState,
};

type DispatchResult = Result<(StatusCode, Json<ApiResponse<DispatchResponse>>), ApiError>;

/// 200 when the trigger API took the event, 502 when it answered otherwise
fn dispatch_outcome(event_type: EventType, cluster_name: Option<&str>, dispatched: bool) -> DispatchResult {
    let data = DispatchResponse {
        event_type,
        cluster_name: cluster_name.map(str::to_string),
        dispatched,
    };
    if dispatched {
        Ok((StatusCode::OK, Json(ApiResponse::success(data))))
    } else {
        Ok((
            StatusCode::BAD_GATEWAY,
            Json(ApiResponse {
                data: Some(data),
                ..ApiResponse::error(format!("Trigger API rejected {}", event_type))
            }),
        ))
    }
}

/// GET /api/v1/trigger/status
pub async fn trigger_status(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<TriggerStatus>>, ApiError> {
    match state.orchestrator.check_trigger_api().await {
        Ok(reachable) => Ok(Json(ApiResponse::success(TriggerStatus {
            repository: state.config.github_repository.clone(),
            reachable,
        }))),
        Err(e) => Err(api_error("Failed to reach trigger API", &e)),
    }
}

/// POST /api/v1/clusters/gke
pub async fn build_gke(
    State(state): State<AppState>,
    Json(request): Json<GkeBuildRequest>,
) -> DispatchResult {
    info!("A request for a GKE cluster {} was received", request.cluster_name);
    match state.orchestrator.trigger_gke_build(&request).await {
        Ok(dispatched) => dispatch_outcome(EventType::GkeBuild, Some(&request.cluster_name), dispatched),
        Err(e) => Err(api_error("Failed to trigger GKE build", &e)),
    }
}

/// POST /api/v1/clusters/eks
pub async fn build_eks(
    State(state): State<AppState>,
    Json(request): Json<EksBuildRequest>,
) -> DispatchResult {
    info!("A request for an EKS cluster {} was received", request.cluster_name);
    match state.orchestrator.trigger_eks_build(&request).await {
        Ok(dispatched) => dispatch_outcome(EventType::EksBuild, Some(&request.cluster_name), dispatched),
        Err(e) => Err(api_error("Failed to trigger EKS build", &e)),
    }
}

/// POST /api/v1/clusters/aks
pub async fn build_aks(
    State(state): State<AppState>,
    Json(request): Json<AksBuildRequest>,
) -> DispatchResult {
    info!("A request for an AKS cluster {} was received", request.cluster_name);
    match state.orchestrator.trigger_aks_build(&request).await {
        Ok(dispatched) => dispatch_outcome(EventType::AksBuild, Some(&request.cluster_name), dispatched),
        Err(e) => Err(api_error("Failed to trigger AKS build", &e)),
    }
}

/// DELETE /api/v1/clusters/:provider/:cluster_name
///
/// The body is optional; without one the configured credentials are used.
pub async fn delete_cluster(
    State(state): State<AppState>,
    Path((provider, cluster_name)): Path<(String, String)>,
    body: Option<Json<DeleteClusterRequest>>,
) -> DispatchResult {
    let provider: ProviderKind = provider
        .parse()
        .map_err(|e: String| bad_request("Invalid provider", e))?;
    let request = body.map(|Json(r)| r).unwrap_or_default();

    info!("A request to delete {} cluster {} was received", provider, cluster_name);
    let event_type = match provider {
        ProviderKind::Gke | ProviderKind::GkeAutopilot => EventType::GkeDelete,
        ProviderKind::Eks => EventType::EksDelete,
        ProviderKind::Aks => EventType::AksDelete,
    };
    match state.orchestrator.delete_cluster(provider, &cluster_name, &request).await {
        Ok(dispatched) => dispatch_outcome(event_type, Some(&cluster_name), dispatched),
        Err(e) => Err(api_error("Failed to trigger cluster deletion", &e)),
    }
}

/// POST /api/v1/agents
pub async fn deploy_agent(
    State(state): State<AppState>,
    Json(request): Json<AgentDeploymentRequest>,
) -> DispatchResult {
    info!(
        "Agent deployment requested on {} cluster {}",
        request.cluster_type, request.cluster_name
    );
    match state.orchestrator.trigger_agent_deployment(&request).await {
        Ok(dispatched) => {
            dispatch_outcome(EventType::AgentDeployment, Some(&request.cluster_name), dispatched)
        }
        Err(e) => Err(api_error("Failed to trigger agent deployment", &e)),
    }
}

/// POST /api/v1/caching/:provider (`gcp` or `aws`)
pub async fn trigger_caching(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    body: Option<Json<CachingRequest>>,
) -> DispatchResult {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let (event_type, result) = match provider.to_ascii_lowercase().as_str() {
        "gcp" | "gke" => (
            EventType::GcpCaching,
            state.orchestrator.trigger_gcp_caching(&request).await,
        ),
        "aws" | "eks" => (
            EventType::AwsCaching,
            state.orchestrator.trigger_aws_caching(&request).await,
        ),
        other => {
            return Err(bad_request(
                "Invalid caching provider",
                format!("{} is not one of: gcp, aws", other),
            ))
        }
    };
    match result {
        Ok(dispatched) => dispatch_outcome(event_type, None, dispatched),
        Err(e) => Err(api_error("Failed to trigger caching", &e)),
    }
}
