// Trolley Backend Library
// Экспортируем публичные модули для использования в тестах и env-converter

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;
pub mod store;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};

// Экспортируем основные типы
pub use config::Config;
pub use error::{Error, Result};
pub use services::{ClusterOrchestrator, GkeDiscovery};
pub use store::ClusterStore;

// Основная структура состояния приложения
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub orchestrator: Arc<ClusterOrchestrator>,
    pub store: Arc<dyn ClusterStore>,
    /// None when no GCP service account could be loaded
    pub discovery: Option<Arc<GkeDiscovery>>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn ClusterStore>) -> Result<Self> {
        let orchestrator = ClusterOrchestrator::new(&config, store.clone())?;
        Ok(Self {
            config,
            orchestrator: Arc::new(orchestrator),
            store,
            discovery: None,
        })
    }

    pub fn with_discovery(mut self, discovery: GkeDiscovery) -> Self {
        self.discovery = Some(Arc::new(discovery));
        self
    }
}

/// API routes without the outer tracing and CORS layers
pub fn router(state: AppState) -> Router {
    use handlers::{
        capabilities_handler, cluster_handler, discovery_handler, health_handler, trigger_handler,
    };

    Router::new()
        .route("/health", get(health_handler::health_check))
        .route("/api/v1/trigger/status", get(trigger_handler::trigger_status))
        .route("/api/v1/clusters", get(cluster_handler::list_clusters))
        .route("/api/v1/clusters/gke", post(trigger_handler::build_gke))
        .route("/api/v1/clusters/eks", post(trigger_handler::build_eks))
        .route("/api/v1/clusters/aks", post(trigger_handler::build_aks))
        .route(
            "/api/v1/clusters/:provider/:cluster_name",
            delete(trigger_handler::delete_cluster),
        )
        .route("/api/v1/agents", post(trigger_handler::deploy_agent))
        .route("/api/v1/caching/:provider", post(trigger_handler::trigger_caching))
        .route("/api/v1/discovery/gke", post(discovery_handler::discover_gke))
        .route(
            "/api/v1/capabilities/:provider",
            get(capabilities_handler::get_capabilities),
        )
        .with_state(state)
}
