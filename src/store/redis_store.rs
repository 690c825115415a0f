use async_trait::async_trait;
use redis::{AsyncCommands, Client};

use super::{best_match, ClusterStore};
use crate::error::{Error, Result};
use crate::models::{ClusterKey, ClusterRecord, ProviderCapabilities, ProviderKind};

/// Redis-backed document store.
///
/// Each record lives as JSON under `cluster:<provider>:<name>:<location>`;
/// the set `clusters:<provider>` indexes the record keys of a provider.
#[derive(Clone)]
pub struct RedisClusterStore {
    redis: Client,
}

impl RedisClusterStore {
    pub fn new(redis_url: &str) -> Result<Self> {
        let redis = Client::open(redis_url)?;
        Ok(Self { redis })
    }

    fn record_key(key: &ClusterKey) -> String {
        format!("cluster:{}", key)
    }

    fn index_key(provider: ProviderKind) -> String {
        format!("clusters:{}", provider)
    }

    fn capabilities_key(provider: ProviderKind) -> String {
        format!("capabilities:{}", provider)
    }

    async fn load(conn: &mut redis::aio::Connection, record_key: &str) -> Result<Option<ClusterRecord>> {
        let json: Option<String> = conn.get(record_key).await?;
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn load_provider(
        conn: &mut redis::aio::Connection,
        provider: ProviderKind,
    ) -> Result<Vec<ClusterRecord>> {
        let record_keys: Vec<String> = conn.smembers(Self::index_key(provider)).await?;
        let mut records = Vec::with_capacity(record_keys.len());
        for record_key in record_keys {
            match Self::load(conn, &record_key).await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("Failed to deserialize cluster {}: {}", record_key, e);
                }
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl ClusterStore for RedisClusterStore {
    async fn upsert_cluster(&self, mut record: ClusterRecord) -> Result<()> {
        let key = record.key();
        let record_key = Self::record_key(&key);
        let mut conn = self.redis.get_async_connection().await?;

        if let Some(existing) = Self::load(&mut conn, &record_key).await? {
            record.id = existing.id;
        }
        let json = serde_json::to_string(&record)?;

        let _: () = conn.set(&record_key, json).await?;
        let _: () = conn.sadd(Self::index_key(key.provider), &record_key).await?;
        Ok(())
    }

    async fn get_cluster(&self, key: &ClusterKey) -> Result<Option<ClusterRecord>> {
        let mut conn = self.redis.get_async_connection().await?;
        Self::load(&mut conn, &Self::record_key(key)).await
    }

    async fn find_cluster(
        &self,
        provider: ProviderKind,
        cluster_name: &str,
    ) -> Result<Option<ClusterRecord>> {
        let mut conn = self.redis.get_async_connection().await?;
        let candidates = Self::load_provider(&mut conn, provider)
            .await?
            .into_iter()
            .filter(|r| r.cluster_name == cluster_name)
            .collect();
        Ok(best_match(candidates))
    }

    async fn list_clusters(&self, provider: Option<ProviderKind>) -> Result<Vec<ClusterRecord>> {
        let providers = match provider {
            Some(p) => vec![p],
            None => vec![
                ProviderKind::Gke,
                ProviderKind::GkeAutopilot,
                ProviderKind::Eks,
                ProviderKind::Aks,
            ],
        };

        let mut conn = self.redis.get_async_connection().await?;
        let mut records = Vec::new();
        for provider in providers {
            records.extend(Self::load_provider(&mut conn, provider).await?);
        }
        records.sort_by(|a, b| b.created_timestamp.cmp(&a.created_timestamp));
        Ok(records)
    }

    async fn set_availability(&self, key: &ClusterKey, availability: bool) -> Result<bool> {
        let record_key = Self::record_key(key);
        let mut conn = self.redis.get_async_connection().await?;
        let Some(mut record) = Self::load(&mut conn, &record_key).await? else {
            return Ok(false);
        };
        record.availability = availability;
        let json = serde_json::to_string(&record)?;
        let _: () = conn.set(&record_key, json).await?;
        Ok(true)
    }

    async fn get_capabilities(&self, provider: ProviderKind) -> Result<Option<ProviderCapabilities>> {
        let mut conn = self.redis.get_async_connection().await?;
        let json: Option<String> = conn.get(Self::capabilities_key(provider)).await?;
        json.map(|j| serde_json::from_str(&j).map_err(Error::from))
            .transpose()
    }

    async fn put_capabilities(&self, capabilities: ProviderCapabilities) -> Result<()> {
        let json = serde_json::to_string(&capabilities)?;
        let mut conn = self.redis.get_async_connection().await?;
        let _: () = conn
            .set(Self::capabilities_key(capabilities.provider()), json)
            .await?;
        Ok(())
    }
}
