//! GKE and Compute Engine REST access used by discovery

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::{ClusterKey, ProviderKind};
use crate::services::gcp_auth::GcpTokenSource;

pub const COMPUTE_API_URL: &str = "https://compute.googleapis.com/compute/v1";
pub const CONTAINER_API_URL: &str = "https://container.googleapis.com/v1";

/// Wildcard zone that lists clusters in every location
pub const ALL_ZONES: &str = "-";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ComputeZone {
    pub name: String,
    /// Full resource URL, e.g. `.../projects/p/regions/us-central1`
    #[serde(default)]
    pub region: String,
}

impl ComputeZone {
    pub fn region_name(&self) -> &str {
        self.region.rsplit('/').next().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GkeCluster {
    pub name: String,
    #[serde(default)]
    pub create_time: String,
    #[serde(default)]
    pub current_master_version: String,
    #[serde(default)]
    pub current_node_version: String,
    #[serde(default)]
    pub zone: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub resource_labels: BTreeMap<String, String>,
    pub node_config: Option<NodeConfig>,
    #[serde(default)]
    pub node_pools: Vec<serde_json::Value>,
    pub autopilot: Option<Autopilot>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfig {
    #[serde(default)]
    pub image_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Autopilot {
    #[serde(default)]
    pub enabled: bool,
}

impl GkeCluster {
    pub fn is_autopilot(&self) -> bool {
        self.autopilot.as_ref().map_or(false, |a| a.enabled)
    }

    pub fn provider(&self) -> ProviderKind {
        if self.is_autopilot() {
            ProviderKind::GkeAutopilot
        } else {
            ProviderKind::Gke
        }
    }

    /// `zone` is deprecated upstream in favour of `location`; prefer the former
    /// while it is still populated since stored records are keyed by it
    pub fn zone_name(&self) -> &str {
        if self.zone.is_empty() {
            &self.location
        } else {
            &self.zone
        }
    }

    pub fn key(&self) -> ClusterKey {
        ClusterKey {
            provider: self.provider(),
            cluster_name: self.name.clone(),
            location: self.zone_name().to_string(),
        }
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait GkeApi: Send + Sync {
    async fn list_zones(&self, project: &str) -> Result<Vec<ComputeZone>>;

    async fn list_clusters(&self, project: &str, zone: &str) -> Result<Vec<GkeCluster>>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ZoneList {
    #[serde(default)]
    items: Vec<ComputeZone>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClusterList {
    #[serde(default)]
    clusters: Vec<GkeCluster>,
    #[serde(default)]
    missing_zones: Vec<String>,
}

pub struct GkeRestClient {
    client: Client,
    tokens: Arc<GcpTokenSource>,
    compute_url: String,
    container_url: String,
}

impl GkeRestClient {
    pub fn new(client: Client, tokens: Arc<GcpTokenSource>) -> Self {
        Self {
            client,
            tokens,
            compute_url: COMPUTE_API_URL.to_string(),
            container_url: CONTAINER_API_URL.to_string(),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<T> {
        let token = self.tokens.access_token().await?;
        let resp = self
            .client
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::provider_api(format!("GET {} failed: HTTP {} - {}", url, status, text)));
        }
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl GkeApi for GkeRestClient {
    async fn list_zones(&self, project: &str) -> Result<Vec<ComputeZone>> {
        let url = format!("{}/projects/{}/zones", self.compute_url, project);
        let mut zones = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let query: Vec<(&str, &str)> = match page_token.as_deref() {
                Some(token) => vec![("pageToken", token)],
                None => Vec::new(),
            };
            let page: ZoneList = self.get_json(&url, &query).await?;
            zones.extend(page.items);
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        Ok(zones)
    }

    async fn list_clusters(&self, project: &str, zone: &str) -> Result<Vec<GkeCluster>> {
        let url = format!(
            "{}/projects/{}/zones/{}/clusters",
            self.container_url, project, zone
        );
        let list: ClusterList = self.get_json(&url, &[]).await?;
        if !list.missing_zones.is_empty() {
            tracing::warn!("GKE did not answer for zones {:?}", list.missing_zones);
        }
        Ok(list.clusters)
    }
}
