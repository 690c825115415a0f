//! Cluster state store
//!
//! Cluster records and provider capability caches. Records are keyed by
//! `(provider, cluster_name, location)` and written with upsert semantics, so
//! reconciling the same observation twice never duplicates a record.

mod memory;
mod redis_store;

pub use memory::MemoryClusterStore;
pub use redis_store::RedisClusterStore;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::error::Result;
use crate::models::{ClusterKey, ClusterRecord, ProviderCapabilities, ProviderKind};

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterStore: Send + Sync {
    /// Inserts or replaces the record stored under `record.key()`.
    /// An existing record keeps its id.
    async fn upsert_cluster(&self, record: ClusterRecord) -> Result<()>;

    async fn get_cluster(&self, key: &ClusterKey) -> Result<Option<ClusterRecord>>;

    /// Looks a cluster up by name alone, preferring an available record and
    /// then the most recently created one
    async fn find_cluster(
        &self,
        provider: ProviderKind,
        cluster_name: &str,
    ) -> Result<Option<ClusterRecord>>;

    async fn list_clusters(&self, provider: Option<ProviderKind>) -> Result<Vec<ClusterRecord>>;

    /// Returns false when no record exists under `key`
    async fn set_availability(&self, key: &ClusterKey, availability: bool) -> Result<bool>;

    async fn get_capabilities(&self, provider: ProviderKind) -> Result<Option<ProviderCapabilities>>;

    async fn put_capabilities(&self, capabilities: ProviderCapabilities) -> Result<()>;
}

/// Picks the record `find_cluster` should return out of same-named candidates
pub(crate) fn best_match(candidates: Vec<ClusterRecord>) -> Option<ClusterRecord> {
    candidates
        .into_iter()
        .max_by_key(|r| (r.availability, r.created_timestamp))
}
