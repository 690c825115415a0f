// Services module for trolley-backend
// Оркестрация кластеров, discovery и вспомогательные клиенты

pub mod credentials;
pub mod descriptor;
pub mod discovery;
pub mod dispatch;
pub mod env_file;
pub mod gcp_auth;
pub mod gke;
pub mod kubeconfig;
pub mod orchestrator;

pub use discovery::{DiscoveryReport, GkeDiscovery};
pub use dispatch::{DispatchClient, DispatchEvent, EventType};
pub use orchestrator::ClusterOrchestrator;
