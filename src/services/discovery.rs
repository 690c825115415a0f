//! GKE discovery and reconciliation into the cluster store.
//!
//! A sweep lists every cluster of the configured project, normalizes each one
//! into a [`ClusterRecord`] and upserts it by `(provider, name, zone)`. Records
//! already owned by a user keep their owner, project and expiration. Stored GKE
//! records that the sweep no longer observes are flagged unavailable.
//!
//! A cluster that fails to normalize (bad timestamp, kubeconfig generation)
//! is reported and skipped; the rest of the sweep carries on.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::models::{
    parse_provider_timestamp, ClusterKey, ClusterRecord, GkeCapabilities, Lifetime,
    ProviderCapabilities, ProviderDetails, ProviderKind, VACANT_USER,
};
use crate::services::gke::{ComputeZone, GkeApi, GkeCluster, ALL_ZONES};
use crate::services::kubeconfig::KubeconfigGenerator;
use crate::store::ClusterStore;

/// Discovered clusters have no natural end of life
pub const DISCOVERED_LIFETIME_SECS: i64 = 60 * 60 * 24 * 365 * 20;

const STOPPING: &str = "STOPPING";

#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryFailure {
    pub cluster_name: String,
    pub reason: String,
}

impl From<&Error> for DiscoveryFailure {
    fn from(e: &Error) -> Self {
        match e {
            Error::DiscoveryPartialFailure {
                cluster_name,
                reason,
            } => Self {
                cluster_name: cluster_name.clone(),
                reason: reason.clone(),
            },
            other => Self {
                cluster_name: String::new(),
                reason: other.to_string(),
            },
        }
    }
}

/// Result of listing and normalizing, before anything is written
#[derive(Debug, Default)]
pub struct DiscoverySweep {
    pub records: Vec<ClusterRecord>,
    pub failures: Vec<DiscoveryFailure>,
    /// Every cluster the provider reported, including failed ones
    pub observed: HashSet<ClusterKey>,
    /// Compute zones listed for this sweep; empty when the listing failed
    pub zones: Vec<ComputeZone>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoveryReport {
    pub provider: Option<ProviderKind>,
    pub upserted: Vec<String>,
    pub marked_unavailable: Vec<String>,
    pub failures: Vec<DiscoveryFailure>,
}

#[derive(Clone)]
pub struct GkeDiscovery {
    api: Arc<dyn GkeApi>,
    kubeconfig: Arc<dyn KubeconfigGenerator>,
    project_id: String,
}

impl GkeDiscovery {
    pub fn new(
        api: Arc<dyn GkeApi>,
        kubeconfig: Arc<dyn KubeconfigGenerator>,
        project_id: impl Into<String>,
    ) -> Self {
        Self {
            api,
            kubeconfig,
            project_id: project_id.into(),
        }
    }

    pub async fn discover(&self) -> Result<DiscoverySweep> {
        self.discover_at(Utc::now()).await
    }

    pub async fn discover_at(&self, now: DateTime<Utc>) -> Result<DiscoverySweep> {
        let zones = match self.api.list_zones(&self.project_id).await {
            Ok(zones) => zones,
            Err(e) => {
                warn!("Listing zones failed, regions will be derived from zone names: {}", e);
                Vec::new()
            }
        };
        let zone_regions: HashMap<String, String> = zones
            .iter()
            .map(|z| (z.name.clone(), z.region_name().to_string()))
            .collect();

        let clusters = self.api.list_clusters(&self.project_id, ALL_ZONES).await?;
        info!(project = %self.project_id, count = clusters.len(), "Listed GKE clusters");

        let mut sweep = DiscoverySweep {
            zones,
            ..Default::default()
        };
        for cluster in &clusters {
            sweep.observed.insert(cluster.key());
            match self.materialize(cluster, &zone_regions, now).await {
                Ok(record) => sweep.records.push(record),
                Err(e) => {
                    warn!("Skipping discovered cluster: {}", e);
                    sweep.failures.push(DiscoveryFailure::from(&e));
                }
            }
        }
        Ok(sweep)
    }

    async fn materialize(
        &self,
        cluster: &GkeCluster,
        zone_regions: &HashMap<String, String>,
        now: DateTime<Utc>,
    ) -> Result<ClusterRecord> {
        let mut record = normalize(cluster, zone_regions, now)?;
        record.kubeconfig = self
            .kubeconfig
            .generate(&cluster.name, cluster.zone_name())
            .await
            .map_err(|e| Error::partial(&cluster.name, format!("kubeconfig: {}", e)))?;
        Ok(record)
    }

    /// Discovers and writes the sweep into `store`, then refreshes the
    /// capability cache from the same zone listing
    pub async fn reconcile(&self, store: &dyn ClusterStore) -> Result<DiscoveryReport> {
        let mut sweep = self.discover().await?;
        let zones = std::mem::take(&mut sweep.zones);
        let report = reconcile_sweep(store, sweep).await?;

        if !zones.is_empty() {
            if let Err(e) = refresh_capabilities(store, &zones).await {
                warn!("GKE capability refresh failed: {}", e);
            }
        }
        Ok(report)
    }
}

/// Rewrites the zone and region parts of the GKE capability cache,
/// keeping what the caching workflow stored for the rest
pub async fn refresh_capabilities(
    store: &dyn ClusterStore,
    zones: &[ComputeZone],
) -> Result<GkeCapabilities> {
    let mut regions_zones: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut regions: Vec<String> = Vec::new();
    for zone in zones {
        let region = zone.region_name().to_string();
        if !regions.contains(&region) {
            regions.push(region.clone());
        }
        regions_zones.entry(region).or_default().push(zone.name.clone());
    }

    let mut cache = match store.get_capabilities(ProviderKind::Gke).await? {
        Some(ProviderCapabilities::Gke(cache)) => cache,
        _ => GkeCapabilities::default(),
    };
    cache.zones_list = zones.iter().map(|z| z.name.clone()).collect();
    cache.regions_list = regions;
    cache.regions_zones_dict = regions_zones;

    store
        .put_capabilities(ProviderCapabilities::Gke(cache.clone()))
        .await?;
    info!(
        zones = cache.zones_list.len(),
        regions = cache.regions_list.len(),
        "Refreshed GKE capability cache"
    );
    Ok(cache)
}

/// Writes a sweep into the store and flags GKE records it no longer
/// observes. Records discovery never saw, such as build placeholders, are
/// left alone.
pub async fn reconcile_sweep(store: &dyn ClusterStore, sweep: DiscoverySweep) -> Result<DiscoveryReport> {
    let mut report = DiscoveryReport {
        provider: Some(ProviderKind::Gke),
        failures: sweep.failures,
        ..Default::default()
    };

    for mut record in sweep.records {
        let key = record.key();
        match store.get_cluster(&key).await {
            Ok(Some(existing)) => merge_tracked(&existing, &mut record),
            Ok(None) => {}
            Err(e) => {
                report.failures.push(DiscoveryFailure {
                    cluster_name: record.cluster_name.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        }
        match store.upsert_cluster(record).await {
            Ok(()) => report.upserted.push(key.cluster_name),
            Err(e) => {
                warn!("Failed to store discovered cluster {}: {}", key, e);
                report.failures.push(DiscoveryFailure {
                    cluster_name: key.cluster_name,
                    reason: e.to_string(),
                });
            }
        }
    }

    for provider in [ProviderKind::Gke, ProviderKind::GkeAutopilot] {
        for stored in store.list_clusters(Some(provider)).await? {
            let key = stored.key();
            if stored.availability && stored.seen_by_discovery() && !sweep.observed.contains(&key) {
                store.set_availability(&key, false).await?;
                info!("Cluster {} is gone, marked unavailable", key);
                report.marked_unavailable.push(stored.cluster_name);
            }
        }
    }

    info!(
        upserted = report.upserted.len(),
        unavailable = report.marked_unavailable.len(),
        failed = report.failures.len(),
        "GKE reconciliation finished"
    );
    Ok(report)
}

/// Keeps what only the store knows: who owns the cluster and until when
fn merge_tracked(existing: &ClusterRecord, observed: &mut ClusterRecord) {
    if !existing.is_vacant() {
        observed.user_name = existing.user_name.clone();
        observed.set_lifetime(Lifetime::new(
            observed.created_timestamp,
            existing.expiration_timestamp,
        ));
    }
    if !existing.project_name.is_empty() {
        observed.project_name = existing.project_name.clone();
    }
    observed.discovered = existing.discovered;
}

/// Provider fields → record, without the kubeconfig
pub fn normalize(
    cluster: &GkeCluster,
    zone_regions: &HashMap<String, String>,
    now: DateTime<Utc>,
) -> Result<ClusterRecord> {
    let created = parse_provider_timestamp(&cluster.create_time).ok_or_else(|| {
        Error::partial(
            &cluster.name,
            format!("unparseable createTime {:?}", cluster.create_time),
        )
    })?;
    let lifetime = Lifetime::new(created, now.timestamp() + DISCOVERED_LIFETIME_SECS);

    let details = if cluster.is_autopilot() {
        ProviderDetails::GkeAutopilot {}
    } else {
        ProviderDetails::Gke {
            runtime_version: cluster.current_node_version.clone(),
            os_image: cluster
                .node_config
                .as_ref()
                .map(|c| c.image_type.clone())
                .unwrap_or_default(),
            tags: cluster.resource_labels.clone(),
            node_pools: cluster.node_pools.clone(),
        }
    };

    let zone = cluster.zone_name().to_string();
    let mut record = ClusterRecord::new(&cluster.name, VACANT_USER, details, lifetime);
    record.region_name = zone_regions
        .get(&zone)
        .cloned()
        .unwrap_or_else(|| region_of(&zone));
    record.zone_name = zone;
    record.cluster_version = cluster.current_master_version.clone();
    record.availability = cluster.status != STOPPING;
    record.discovered = true;
    Ok(record)
}

/// Fallback when the zone is not in the Compute listing: `us-central1-a` →
/// `us-central1`; a regional location is already a region
fn region_of(location: &str) -> String {
    let parts: Vec<&str> = location.split('-').collect();
    if parts.len() == 3 {
        format!("{}-{}", parts[0], parts[1])
    } else {
        location.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::human_timestamp;
    use crate::services::gke::{ComputeZone, MockGkeApi, NodeConfig};
    use crate::services::kubeconfig::MockKubeconfigGenerator;
    use crate::store::{MemoryClusterStore, MockClusterStore};
    use chrono::TimeZone;
    use mockall::predicate::*;

    fn cluster(name: &str, zone: &str) -> GkeCluster {
        GkeCluster {
            name: name.into(),
            create_time: "2023-04-01T10:20:30+00:00".into(),
            current_master_version: "1.27.3-gke.100".into(),
            current_node_version: "1.27.3-gke.100".into(),
            zone: zone.into(),
            location: zone.into(),
            status: "RUNNING".into(),
            node_config: Some(NodeConfig {
                image_type: "COS_CONTAINERD".into(),
            }),
            ..Default::default()
        }
    }

    fn zones() -> Vec<ComputeZone> {
        vec![
            ComputeZone {
                name: "us-central1-a".into(),
                region: "https://www.googleapis.com/compute/v1/projects/p/regions/us-central1".into(),
            },
            ComputeZone {
                name: "us-central1-b".into(),
                region: "https://www.googleapis.com/compute/v1/projects/p/regions/us-central1".into(),
            },
            ComputeZone {
                name: "europe-west1-b".into(),
                region: "https://www.googleapis.com/compute/v1/projects/p/regions/europe-west1".into(),
            },
        ]
    }

    fn api_with(clusters: Vec<GkeCluster>) -> MockGkeApi {
        let mut api = MockGkeApi::new();
        api.expect_list_zones().returning(|_| Ok(zones()));
        api.expect_list_clusters()
            .with(eq("p"), eq(ALL_ZONES))
            .returning(move |_, _| Ok(clusters.clone()));
        api
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn normalize_fills_dual_timestamps_and_sentinel_expiration() {
        let record = normalize(&cluster("c1", "us-central1-a"), &HashMap::new(), now()).unwrap();

        assert_eq!(record.created_timestamp, 1_680_344_430);
        assert_eq!(record.human_created_timestamp, "01-04-2023 10:20:30");
        assert_eq!(record.expiration_timestamp, now().timestamp() + DISCOVERED_LIFETIME_SECS);
        assert_eq!(
            record.human_expiration_timestamp,
            human_timestamp(record.expiration_timestamp)
        );
        assert_eq!(record.user_name, VACANT_USER);
        assert!(record.availability);
        assert!(record.discovered);
        assert_eq!(record.region_name, "us-central1");
        assert_eq!(record.zone_name, "us-central1-a");
        match &record.details {
            ProviderDetails::Gke { os_image, .. } => assert_eq!(os_image, "COS_CONTAINERD"),
            other => panic!("unexpected details {:?}", other),
        }
    }

    #[test]
    fn stopping_clusters_are_unavailable() {
        let mut stopping = cluster("c1", "us-central1-a");
        stopping.status = STOPPING.into();
        let record = normalize(&stopping, &HashMap::new(), now()).unwrap();
        assert!(!record.availability);
    }

    #[test]
    fn bad_create_time_is_a_partial_failure() {
        let mut broken = cluster("c1", "us-central1-a");
        broken.create_time = "n/a".into();
        let err = normalize(&broken, &HashMap::new(), now()).unwrap_err();
        assert!(matches!(err, Error::DiscoveryPartialFailure { .. }));
    }

    #[tokio::test]
    async fn regions_are_distinct_and_ordered() {
        let store = MemoryClusterStore::new();
        let cache = refresh_capabilities(&store, &zones()).await.unwrap();

        assert_eq!(
            cache.regions_list,
            vec!["us-central1".to_string(), "europe-west1".to_string()]
        );
        assert_eq!(cache.zones_list.len(), 3);
    }

    #[tokio::test]
    async fn reconcile_lists_zones_once_and_caches_them() {
        let mut api = MockGkeApi::new();
        api.expect_list_zones().times(1).returning(|_| Ok(zones()));
        api.expect_list_clusters()
            .returning(|_, _| Ok(vec![cluster("c1", "europe-west1-b")]));
        let mut kubeconfig = MockKubeconfigGenerator::new();
        kubeconfig.expect_generate().returning(|_, _| Ok("kind: Config".to_string()));

        let store = MemoryClusterStore::new();
        let discovery = GkeDiscovery::new(Arc::new(api), Arc::new(kubeconfig), "p");
        discovery.reconcile(&store).await.unwrap();

        let stored = store.find_cluster(ProviderKind::Gke, "c1").await.unwrap().unwrap();
        assert_eq!(stored.region_name, "europe-west1");
        match store.get_capabilities(ProviderKind::Gke).await.unwrap() {
            Some(ProviderCapabilities::Gke(cache)) => {
                assert_eq!(cache.regions_zones_dict["europe-west1"], vec!["europe-west1-b".to_string()])
            }
            other => panic!("unexpected capabilities {:?}", other),
        }
    }

    #[tokio::test]
    async fn kubeconfig_failure_is_isolated_to_its_cluster() {
        let api = api_with(vec![cluster("first", "us-central1-a"), cluster("second", "us-central1-b")]);
        let mut kubeconfig = MockKubeconfigGenerator::new();
        kubeconfig
            .expect_generate()
            .with(eq("first"), always())
            .returning(|_, _| Err(Error::command("gcloud exploded")));
        kubeconfig
            .expect_generate()
            .with(eq("second"), eq("us-central1-b"))
            .returning(|_, _| Ok("apiVersion: v1\nkind: Config\n".to_string()));

        let discovery = GkeDiscovery::new(Arc::new(api), Arc::new(kubeconfig), "p");
        let sweep = discovery.discover_at(now()).await.unwrap();

        assert_eq!(sweep.records.len(), 1);
        assert_eq!(sweep.records[0].cluster_name, "second");
        assert!(sweep.records[0].kubeconfig.contains("kind: Config"));
        assert_eq!(sweep.failures.len(), 1);
        assert_eq!(sweep.failures[0].cluster_name, "first");
        assert_eq!(sweep.observed.len(), 2);
    }

    #[tokio::test]
    async fn reconcile_twice_does_not_duplicate() {
        let store = MemoryClusterStore::new();
        let mut kubeconfig = MockKubeconfigGenerator::new();
        kubeconfig
            .expect_generate()
            .returning(|name, _| Ok(format!("kubeconfig for {}", name)));
        let discovery = GkeDiscovery::new(
            Arc::new(api_with(vec![cluster("c1", "us-central1-a"), cluster("c2", "europe-west1-b")])),
            Arc::new(kubeconfig),
            "p",
        );

        discovery.reconcile(&store).await.unwrap();
        let report = discovery.reconcile(&store).await.unwrap();

        assert_eq!(report.upserted.len(), 2);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn owned_records_keep_owner_and_expiration() {
        let store = MemoryClusterStore::new();
        let mut owned = normalize(&cluster("c1", "us-central1-a"), &HashMap::new(), now()).unwrap();
        owned.user_name = "alice".into();
        owned.project_name = "trolley-dev".into();
        owned.discovered = false;
        owned.set_lifetime(Lifetime::new(owned.created_timestamp, owned.created_timestamp + 3600));
        store.upsert_cluster(owned.clone()).await.unwrap();

        let sweep = DiscoverySweep {
            records: vec![normalize(&cluster("c1", "us-central1-a"), &HashMap::new(), now()).unwrap()],
            failures: vec![],
            observed: HashSet::from([owned.key()]),
            ..Default::default()
        };
        reconcile_sweep(&store, sweep).await.unwrap();

        let stored = store.get_cluster(&owned.key()).await.unwrap().unwrap();
        assert_eq!(stored.id, owned.id);
        assert_eq!(stored.user_name, "alice");
        assert_eq!(stored.project_name, "trolley-dev");
        assert_eq!(stored.expiration_timestamp, owned.created_timestamp + 3600);
        assert!(!stored.discovered);
    }

    #[tokio::test]
    async fn unobserved_records_become_unavailable() {
        let store = MemoryClusterStore::new();
        let gone = normalize(&cluster("gone", "us-central1-a"), &HashMap::new(), now()).unwrap();
        let failed = normalize(&cluster("failed", "us-central1-b"), &HashMap::new(), now()).unwrap();
        store.upsert_cluster(gone.clone()).await.unwrap();
        store.upsert_cluster(failed.clone()).await.unwrap();

        let sweep = DiscoverySweep {
            records: vec![],
            failures: vec![DiscoveryFailure {
                cluster_name: "failed".into(),
                reason: "kubeconfig".into(),
            }],
            observed: HashSet::from([failed.key()]),
            ..Default::default()
        };
        let report = reconcile_sweep(&store, sweep).await.unwrap();

        assert_eq!(report.marked_unavailable, vec!["gone".to_string()]);
        assert!(!store.get_cluster(&gone.key()).await.unwrap().unwrap().availability);
        assert!(store.get_cluster(&failed.key()).await.unwrap().unwrap().availability);
    }

    #[tokio::test]
    async fn requested_placeholder_survives_a_sweep() {
        let store = MemoryClusterStore::new();
        let mut requested = ClusterRecord::new(
            "g1",
            "alice",
            ProviderDetails::placeholder(ProviderKind::Gke),
            Lifetime::new(100, 3700),
        );
        requested.zone_name = "us-central1-a".into();
        store.upsert_cluster(requested.clone()).await.unwrap();

        let report = reconcile_sweep(&store, DiscoverySweep::default()).await.unwrap();

        assert!(report.marked_unavailable.is_empty());
        assert!(store.get_cluster(&requested.key()).await.unwrap().unwrap().availability);
    }

    #[tokio::test]
    async fn owned_cluster_seen_once_is_swept_when_gone() {
        let store = MemoryClusterStore::new();
        let mut owned = normalize(&cluster("c1", "us-central1-a"), &HashMap::new(), now()).unwrap();
        owned.user_name = "alice".into();
        owned.discovered = false;
        owned.kubeconfig = "kind: Config".into();
        store.upsert_cluster(owned.clone()).await.unwrap();

        let report = reconcile_sweep(&store, DiscoverySweep::default()).await.unwrap();

        assert_eq!(report.marked_unavailable, vec!["c1".to_string()]);
        assert!(!store.get_cluster(&owned.key()).await.unwrap().unwrap().availability);
    }

    #[tokio::test]
    async fn store_write_failure_is_reported_not_fatal() {
        let mut store = MockClusterStore::new();
        store.expect_get_cluster().returning(|_| Ok(None));
        store
            .expect_upsert_cluster()
            .returning(|_| Err(Error::store("connection reset")));
        store.expect_list_clusters().returning(|_| Ok(vec![]));

        let record = normalize(&cluster("c1", "us-central1-a"), &HashMap::new(), now()).unwrap();
        let sweep = DiscoverySweep {
            observed: HashSet::from([record.key()]),
            records: vec![record],
            ..Default::default()
        };
        let report = reconcile_sweep(&store, sweep).await.unwrap();

        assert!(report.upserted.is_empty());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].cluster_name, "c1");
    }

    #[tokio::test]
    async fn capability_refresh_keeps_cached_machine_types() {
        let store = MemoryClusterStore::new();
        let mut cached = GkeCapabilities::default();
        cached.versions_list = vec!["1.27".into()];
        store
            .put_capabilities(ProviderCapabilities::Gke(cached))
            .await
            .unwrap();

        let cache = refresh_capabilities(&store, &zones()).await.unwrap();

        assert_eq!(cache.versions_list, vec!["1.27".to_string()]);
        assert_eq!(cache.regions_zones_dict["us-central1"].len(), 2);
        assert_eq!(cache.regions_list.len(), 2);
    }
}
