//! Cluster lifecycle orchestration.
//!
//! Every operation resolves credentials, assembles a provider specific
//! [`DispatchEvent`] and hands it to the trigger API. Provisioning itself
//! happens out of band; discovery later records what actually exists.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{
    AgentDeploymentRequest, AksBuildRequest, CachingRequest, ClusterRecord, Count,
    DeleteClusterRequest, EksBuildRequest, GkeBuildRequest, Lifetime, ProviderDetails,
    ProviderKind,
};
use crate::services::credentials::{
    AwsCredentialResolver, AzureCredentials, CredentialPayload, CredentialProvider,
    GoogleCredentials,
};
use crate::services::descriptor;
use crate::services::discovery::DISCOVERED_LIFETIME_SECS;
use crate::services::dispatch::{DispatchClient, DispatchEvent, EventType};
use crate::store::ClusterStore;

/// Requested lifetimes beyond this are refused before anything is dispatched
pub const MAX_EXPIRATION_HOURS: i64 = DISCOVERED_LIFETIME_SECS / 3600;

/// Credentials and endpoints used when a request does not carry its own
#[derive(Debug, Clone, Default)]
pub struct OrchestratorDefaults {
    pub gcp_project_id: String,
    pub google_creds_json: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub azure_credentials: String,
    pub trolley_server_url: String,
    pub mongo_url: String,
    pub mongo_user: String,
    pub mongo_password: String,
}

impl From<&Config> for OrchestratorDefaults {
    fn from(config: &Config) -> Self {
        Self {
            gcp_project_id: config.gcp_project_id.clone(),
            google_creds_json: config.google_creds_json.clone(),
            aws_access_key_id: config.aws_access_key_id.clone(),
            aws_secret_access_key: config.aws_secret_access_key.clone(),
            azure_credentials: config.azure_credentials.clone(),
            trolley_server_url: config.trolley_server_url.clone(),
            mongo_url: config.mongo_url.clone(),
            mongo_user: config.mongo_user.clone(),
            mongo_password: config.mongo_password.clone(),
        }
    }
}

#[derive(Clone)]
pub struct ClusterOrchestrator {
    dispatcher: DispatchClient,
    store: Arc<dyn ClusterStore>,
    aws: AwsCredentialResolver,
    defaults: OrchestratorDefaults,
}

impl ClusterOrchestrator {
    pub fn new(config: &Config, store: Arc<dyn ClusterStore>) -> Result<Self> {
        Ok(Self {
            dispatcher: DispatchClient::new(config)?,
            store,
            aws: AwsCredentialResolver::new(&config.aws_credentials_path),
            defaults: OrchestratorDefaults::from(config),
        })
    }

    /// Reachability of the trigger API with the configured token
    pub async fn check_trigger_api(&self) -> Result<bool> {
        self.dispatcher.check().await
    }

    pub async fn trigger_gke_build(&self, request: &GkeBuildRequest) -> Result<bool> {
        let hours = expiration_hours(&request.expiration_time)?;
        let creds = GoogleCredentials(pick(&request.google_creds_json, &self.defaults.google_creds_json))
            .resolve()?;
        let project_id = pick(&request.gcp_project_id, &self.defaults.gcp_project_id);
        let event = gke_build_event(request, &project_id, &creds)?;

        if !self.send(&event, &request.cluster_name).await? {
            return Ok(false);
        }

        let mut record = placeholder(
            ProviderKind::Gke,
            &request.cluster_name,
            &request.user_name,
            &request.project_name,
            hours,
        );
        record.cluster_version = request.cluster_version.clone();
        record.region_name = request.region_name.clone();
        record.zone_name = request.zone_name.clone();
        if let ProviderDetails::Gke { os_image, .. } = &mut record.details {
            *os_image = request.image_type.clone();
        }
        self.record_requested(record).await;
        Ok(true)
    }

    pub async fn trigger_eks_build(&self, request: &EksBuildRequest) -> Result<bool> {
        let hours = expiration_hours(&request.expiration_time)?;
        let creds = self.aws_payload(&request.aws_access_key_id, &request.aws_secret_access_key);
        let descriptor = descriptor::build(
            &request.cluster_name,
            &request.eks_location,
            &request.eks_machine_type,
            &request.num_nodes.to_string(),
            &request.eks_volume_size.to_string(),
        )?;
        let event = eks_build_event(request, &descriptor, &creds)?;

        if !self.send(&event, &request.cluster_name).await? {
            return Ok(false);
        }

        let mut record = placeholder(
            ProviderKind::Eks,
            &request.cluster_name,
            &request.user_name,
            &request.project_name,
            hours,
        );
        record.cluster_version = request.cluster_version.clone();
        record.region_name = request.eks_location.clone();
        self.record_requested(record).await;
        Ok(true)
    }

    pub async fn trigger_aks_build(&self, request: &AksBuildRequest) -> Result<bool> {
        let hours = expiration_hours(&request.expiration_time)?;
        let creds = AzureCredentials(pick(&request.azure_credentials, &self.defaults.azure_credentials))
            .resolve()?;
        let event = aks_build_event(request, &creds);

        if !self.send(&event, &request.cluster_name).await? {
            return Ok(false);
        }

        let mut record = placeholder(
            ProviderKind::Aks,
            &request.cluster_name,
            &request.user_name,
            &request.project_name,
            hours,
        );
        record.cluster_version = request.cluster_version.clone();
        record.region_name = request.aks_location.clone();
        self.record_requested(record).await;
        Ok(true)
    }

    /// Routes a delete to the provider specific operation
    pub async fn delete_cluster(
        &self,
        provider: ProviderKind,
        cluster_name: &str,
        request: &DeleteClusterRequest,
    ) -> Result<bool> {
        match provider {
            ProviderKind::Gke | ProviderKind::GkeAutopilot => {
                self.delete_gke_cluster(cluster_name, request).await
            }
            ProviderKind::Eks => self.delete_eks_cluster(cluster_name, request).await,
            ProviderKind::Aks => self.delete_aks_cluster(cluster_name).await,
        }
    }

    pub async fn delete_gke_cluster(
        &self,
        cluster_name: &str,
        request: &DeleteClusterRequest,
    ) -> Result<bool> {
        let record = match self.store.find_cluster(ProviderKind::Gke, cluster_name).await? {
            Some(record) => Some(record),
            None => {
                self.store
                    .find_cluster(ProviderKind::GkeAutopilot, cluster_name)
                    .await?
            }
        };
        let record = required(record, ProviderKind::Gke, cluster_name, "zone_name", |r| &r.zone_name)?;
        info!("Attempting to delete {} in {}", cluster_name, record.zone_name);

        let creds = GoogleCredentials(pick(&request.google_creds_json, &self.defaults.google_creds_json))
            .resolve()?;
        let mut event = DispatchEvent::new(EventType::GkeDelete)
            .field("cluster_name", cluster_name)
            .field("zone_name", record.zone_name.as_str())
            .field("project_name", request.project_name.as_str());
        creds.write_fields(&mut event.client_payload);

        self.finish_delete(&event, &record).await
    }

    pub async fn delete_eks_cluster(
        &self,
        cluster_name: &str,
        request: &DeleteClusterRequest,
    ) -> Result<bool> {
        let record = self.store.find_cluster(ProviderKind::Eks, cluster_name).await?;
        let record = required(record, ProviderKind::Eks, cluster_name, "region_name", |r| &r.region_name)?;

        let creds = self.aws_payload(&request.aws_access_key_id, &request.aws_secret_access_key);
        let mut event = DispatchEvent::new(EventType::EksDelete)
            .field("cluster_name", cluster_name)
            .field("project_name", request.project_name.as_str())
            .field("region_name", record.region_name.as_str());
        creds.write_fields(&mut event.client_payload);

        self.finish_delete(&event, &record).await
    }

    pub async fn delete_aks_cluster(&self, cluster_name: &str) -> Result<bool> {
        let event = DispatchEvent::new(EventType::AksDelete).field("cluster_name", cluster_name);
        if !self.send(&event, cluster_name).await? {
            return Ok(false);
        }

        // The AKS payload needs no location, so a missing record is not fatal here
        match self.store.find_cluster(ProviderKind::Aks, cluster_name).await {
            Ok(Some(record)) => self.mark_deleted(&record).await,
            Ok(None) => warn!("Deleted AKS cluster {} has no stored record", cluster_name),
            Err(e) => warn!("Failed to look up AKS cluster {}: {}", cluster_name, e),
        }
        Ok(true)
    }

    pub async fn trigger_agent_deployment(&self, request: &AgentDeploymentRequest) -> Result<bool> {
        let event = DispatchEvent::new(EventType::AgentDeployment)
            .field("cluster_name", request.cluster_name.as_str())
            .field("cluster_type", request.cluster_type.as_str())
            .field("zone_name", request.zone_name.as_str())
            .field("trolley_server_url", self.defaults.trolley_server_url.as_str());
        let event = self.with_store_access(event);
        self.send(&event, &request.cluster_name).await
    }

    pub async fn trigger_gcp_caching(&self, request: &CachingRequest) -> Result<bool> {
        let creds = GoogleCredentials(pick(&request.google_creds_json, &self.defaults.google_creds_json))
            .resolve()?;
        let mut event = DispatchEvent::new(EventType::GcpCaching)
            .field("project_name", request.project_name.as_str());
        creds.write_fields(&mut event.client_payload);
        let event = self.with_store_access(event);
        self.send(&event, "").await
    }

    pub async fn trigger_aws_caching(&self, request: &CachingRequest) -> Result<bool> {
        let creds = self.aws_payload(&request.aws_access_key_id, &request.aws_secret_access_key);
        let mut event = DispatchEvent::new(EventType::AwsCaching)
            .field("project_name", request.project_name.as_str());
        creds.write_fields(&mut event.client_payload);
        let event = self.with_store_access(event);
        self.send(&event, "").await
    }

    fn aws_payload(&self, key: &Option<String>, secret: &Option<String>) -> CredentialPayload {
        let key = pick(key, &self.defaults.aws_access_key_id);
        let secret = pick(secret, &self.defaults.aws_secret_access_key);
        match self.aws.with_explicit(&key, &secret).resolve() {
            Ok(payload) => payload,
            Err(e) => {
                warn!("AWS credentials were not found: {}", e);
                CredentialPayload::AwsKeyPair {
                    access_key_id: String::new(),
                    secret_access_key: String::new(),
                }
            }
        }
    }

    fn with_store_access(&self, event: DispatchEvent) -> DispatchEvent {
        event
            .field("mongo_user", self.defaults.mongo_user.as_str())
            .field("mongo_password", self.defaults.mongo_password.as_str())
            .field("mongo_url", self.defaults.mongo_url.as_str())
    }

    async fn send(&self, event: &DispatchEvent, cluster_name: &str) -> Result<bool> {
        let dispatched = self.dispatcher.dispatch(event).await?;
        if dispatched {
            info!(event_type = %event.event_type, cluster_name, "Dispatch accepted");
        } else {
            warn!(event_type = %event.event_type, cluster_name, "Dispatch failed");
        }
        Ok(dispatched)
    }

    async fn finish_delete(&self, event: &DispatchEvent, record: &ClusterRecord) -> Result<bool> {
        if !self.send(event, &record.cluster_name).await? {
            return Ok(false);
        }
        self.mark_deleted(record).await;
        Ok(true)
    }

    async fn mark_deleted(&self, record: &ClusterRecord) {
        if let Err(e) = self.store.set_availability(&record.key(), false).await {
            warn!(
                "Delete of {} was dispatched but the record could not be updated: {}",
                record.cluster_name, e
            );
        }
    }

    /// Store failures after a successful dispatch are logged, not returned:
    /// the event is already sent and discovery will record the cluster.
    async fn record_requested(&self, record: ClusterRecord) {
        let cluster_name = record.cluster_name.clone();
        if let Err(e) = self.store.upsert_cluster(record).await {
            warn!("Failed to record requested cluster {}: {}", cluster_name, e);
        }
    }
}

fn pick(explicit: &Option<String>, fallback: &str) -> String {
    match explicit {
        Some(value) if !value.is_empty() => value.clone(),
        _ => fallback.to_string(),
    }
}

fn required(
    record: Option<ClusterRecord>,
    provider: ProviderKind,
    cluster_name: &str,
    field: &'static str,
    get: impl Fn(&ClusterRecord) -> &String,
) -> Result<ClusterRecord> {
    match record {
        Some(record) if !get(&record).is_empty() => Ok(record),
        _ => {
            warn!(%provider, cluster_name, field, "Delete request without a stored location");
            Err(Error::StoreLookupFailed {
                provider,
                cluster_name: cluster_name.to_string(),
                field,
            })
        }
    }
}

/// Hours from the request; blank means none
fn expiration_hours(raw: &Count) -> Result<i64> {
    if matches!(raw, Count::Text(s) if s.trim().is_empty()) {
        return Ok(0);
    }
    match raw.as_i64() {
        Some(hours) if (0..=MAX_EXPIRATION_HOURS).contains(&hours) => Ok(hours),
        _ => Err(Error::InvalidInput {
            field: "expiration_time",
            value: raw.to_string(),
        }),
    }
}

fn placeholder(
    provider: ProviderKind,
    cluster_name: &str,
    user_name: &str,
    project_name: &str,
    hours: i64,
) -> ClusterRecord {
    let now = Utc::now().timestamp();
    let mut record = ClusterRecord::new(
        cluster_name,
        user_name,
        ProviderDetails::placeholder(provider),
        Lifetime::new(now, now + hours * 3600),
    );
    record.project_name = project_name.to_string();
    record
}

fn gke_build_event(
    request: &GkeBuildRequest,
    project_id: &str,
    creds: &CredentialPayload,
) -> Result<DispatchEvent> {
    let encoded = json!({
        "gcp_project_id": project_id,
        "project_name": request.project_name,
        "cluster_name": request.cluster_name,
        "user_name": request.user_name,
        "cluster_version": request.cluster_version,
        "gke_machine_type": request.gke_machine_type,
        "region_name": request.region_name,
        "zone_name": request.zone_name,
        "image_type": request.image_type,
        "num_nodes": request.num_nodes.to_string(),
        "expiration_time": request.expiration_time.to_string(),
    });
    let mut event = DispatchEvent::new(EventType::GkeBuild);
    creds.write_fields(&mut event.client_payload);
    Ok(event.field("payload", serde_json::to_string(&encoded)?))
}

fn eks_build_event(
    request: &EksBuildRequest,
    descriptor: &descriptor::ProvisioningDescriptor,
    creds: &CredentialPayload,
) -> Result<DispatchEvent> {
    let encoded = json!({
        "cluster_name": request.cluster_name,
        "project_name": request.project_name,
        "user_name": request.user_name,
        "cluster_version": request.cluster_version,
        "region_name": request.eks_location,
        "num_nodes": request.num_nodes.to_string(),
        "expiration_time": request.expiration_time.to_string(),
        "eksctl_deployment_file": serde_json::to_value(descriptor)?,
    });
    let mut event = DispatchEvent::new(EventType::EksBuild);
    creds.write_fields(&mut event.client_payload);
    Ok(event.field("payload", serde_json::to_string(&encoded)?))
}

fn aks_build_event(request: &AksBuildRequest, creds: &CredentialPayload) -> DispatchEvent {
    let mut event = DispatchEvent::new(EventType::AksBuild)
        .field("cluster_name", request.cluster_name.as_str())
        .field("user_name", request.user_name.as_str())
        .field("cluster_version", request.cluster_version.as_str())
        .field("aks_location", request.aks_location.as_str())
        .field("num_nodes", request.num_nodes.to_string())
        .field("expiration_time", request.expiration_time.to_string());
    creds.write_fields(&mut event.client_payload);
    event
}
