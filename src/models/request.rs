use std::fmt;

use serde::{Deserialize, Serialize};

use super::ProviderKind;

/// Numeric form input. The UI posts these either as JSON numbers or as
/// strings, and the trigger API wants them back as strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Count {
    Number(i64),
    Text(String),
}

impl Count {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Count::Number(n) => Some(*n),
            Count::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl Default for Count {
    fn default() -> Self {
        Count::Number(0)
    }
}

impl fmt::Display for Count {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Count::Number(n) => write!(f, "{}", n),
            Count::Text(s) => f.write_str(s.trim()),
        }
    }
}

impl From<i64> for Count {
    fn from(n: i64) -> Self {
        Count::Number(n)
    }
}

impl From<&str> for Count {
    fn from(s: &str) -> Self {
        Count::Text(s.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GkeBuildRequest {
    pub cluster_name: String,
    pub user_name: String,
    pub project_name: String,
    pub cluster_version: String,
    pub gke_machine_type: String,
    pub region_name: String,
    pub zone_name: String,
    #[serde(default)]
    pub image_type: String,
    pub num_nodes: Count,
    /// Hours until the cluster is torn down
    #[serde(default)]
    pub expiration_time: Count,
    /// Overrides the configured GCP project
    pub gcp_project_id: Option<String>,
    pub google_creds_json: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EksBuildRequest {
    pub cluster_name: String,
    pub user_name: String,
    pub project_name: String,
    pub cluster_version: String,
    /// AWS region
    pub eks_location: String,
    pub eks_machine_type: String,
    pub eks_volume_size: Count,
    pub num_nodes: Count,
    #[serde(default)]
    pub expiration_time: Count,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AksBuildRequest {
    pub cluster_name: String,
    pub user_name: String,
    #[serde(default)]
    pub project_name: String,
    pub cluster_version: String,
    pub aks_location: String,
    pub num_nodes: Count,
    #[serde(default)]
    pub expiration_time: Count,
    pub azure_credentials: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteClusterRequest {
    #[serde(default)]
    pub project_name: String,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub google_creds_json: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDeploymentRequest {
    pub cluster_name: String,
    pub cluster_type: ProviderKind,
    #[serde(default)]
    pub zone_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CachingRequest {
    #[serde(default)]
    pub project_name: String,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub google_creds_json: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListClustersQuery {
    pub provider: Option<ProviderKind>,
}
