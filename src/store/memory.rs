use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{best_match, ClusterStore};
use crate::error::Result;
use crate::models::{ClusterKey, ClusterRecord, ProviderCapabilities, ProviderKind};

/// Process-local store. Used when no Redis URL is configured and in tests.
#[derive(Default)]
pub struct MemoryClusterStore {
    clusters: RwLock<BTreeMap<ClusterKey, ClusterRecord>>,
    capabilities: RwLock<BTreeMap<ProviderKind, ProviderCapabilities>>,
}

impl MemoryClusterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.clusters.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clusters.read().await.is_empty()
    }
}

#[async_trait]
impl ClusterStore for MemoryClusterStore {
    async fn upsert_cluster(&self, mut record: ClusterRecord) -> Result<()> {
        let key = record.key();
        let mut clusters = self.clusters.write().await;
        if let Some(existing) = clusters.get(&key) {
            record.id = existing.id;
        }
        clusters.insert(key, record);
        Ok(())
    }

    async fn get_cluster(&self, key: &ClusterKey) -> Result<Option<ClusterRecord>> {
        Ok(self.clusters.read().await.get(key).cloned())
    }

    async fn find_cluster(
        &self,
        provider: ProviderKind,
        cluster_name: &str,
    ) -> Result<Option<ClusterRecord>> {
        let clusters = self.clusters.read().await;
        let candidates = clusters
            .values()
            .filter(|r| r.provider() == provider && r.cluster_name == cluster_name)
            .cloned()
            .collect();
        Ok(best_match(candidates))
    }

    async fn list_clusters(&self, provider: Option<ProviderKind>) -> Result<Vec<ClusterRecord>> {
        let clusters = self.clusters.read().await;
        Ok(clusters
            .values()
            .filter(|r| provider.map_or(true, |p| r.provider() == p))
            .cloned()
            .collect())
    }

    async fn set_availability(&self, key: &ClusterKey, availability: bool) -> Result<bool> {
        let mut clusters = self.clusters.write().await;
        match clusters.get_mut(key) {
            Some(record) => {
                record.availability = availability;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_capabilities(&self, provider: ProviderKind) -> Result<Option<ProviderCapabilities>> {
        Ok(self.capabilities.read().await.get(&provider).cloned())
    }

    async fn put_capabilities(&self, capabilities: ProviderCapabilities) -> Result<()> {
        self.capabilities
            .write()
            .await
            .insert(capabilities.provider(), capabilities);
        Ok(())
    }
}
