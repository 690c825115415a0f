use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Human readable timestamp layout stored next to every epoch value
pub const HUMAN_TIMESTAMP_FORMAT: &str = "%d-%m-%Y %H:%M:%S";

/// Owner assigned to clusters nobody has claimed yet
pub const VACANT_USER: &str = "vacant";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Gke,
    GkeAutopilot,
    Eks,
    Aks,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Gke => "gke",
            ProviderKind::GkeAutopilot => "gke_autopilot",
            ProviderKind::Eks => "eks",
            ProviderKind::Aks => "aks",
        }
    }

    /// GKE kinds are located by zone, the others by region
    pub fn is_zonal(&self) -> bool {
        matches!(self, ProviderKind::Gke | ProviderKind::GkeAutopilot)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gke" => Ok(ProviderKind::Gke),
            "gke_autopilot" | "gke-autopilot" => Ok(ProviderKind::GkeAutopilot),
            "eks" => Ok(ProviderKind::Eks),
            "aks" => Ok(ProviderKind::Aks),
            other => Err(format!("unknown provider: {}", other)),
        }
    }
}

/// Fields only some providers carry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cluster_type", rename_all = "snake_case")]
pub enum ProviderDetails {
    Gke {
        #[serde(default)]
        runtime_version: String,
        #[serde(default)]
        os_image: String,
        #[serde(default)]
        tags: BTreeMap<String, String>,
        #[serde(default)]
        node_pools: Vec<serde_json::Value>,
    },
    GkeAutopilot {},
    Eks {},
    Aks {
        #[serde(default)]
        resource_group: String,
    },
}

impl ProviderDetails {
    pub fn kind(&self) -> ProviderKind {
        match self {
            ProviderDetails::Gke { .. } => ProviderKind::Gke,
            ProviderDetails::GkeAutopilot {} => ProviderKind::GkeAutopilot,
            ProviderDetails::Eks {} => ProviderKind::Eks,
            ProviderDetails::Aks { .. } => ProviderKind::Aks,
        }
    }

    /// Empty details for a freshly requested cluster
    pub fn placeholder(kind: ProviderKind) -> Self {
        match kind {
            ProviderKind::Gke => ProviderDetails::Gke {
                runtime_version: String::new(),
                os_image: String::new(),
                tags: BTreeMap::new(),
                node_pools: Vec::new(),
            },
            ProviderKind::GkeAutopilot => ProviderDetails::GkeAutopilot {},
            ProviderKind::Eks => ProviderDetails::Eks {},
            ProviderKind::Aks => ProviderDetails::Aks {
                resource_group: String::new(),
            },
        }
    }
}

/// Epoch seconds paired with their human readable rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifetime {
    pub created: i64,
    pub expiration: i64,
}

impl Lifetime {
    /// Expiration never precedes creation
    pub fn new(created: i64, expiration: i64) -> Self {
        Self {
            created,
            expiration: expiration.max(created),
        }
    }
}

pub fn human_timestamp(epoch: i64) -> String {
    match Utc.timestamp_opt(epoch, 0).single() {
        Some(t) => t.format(HUMAN_TIMESTAMP_FORMAT).to_string(),
        None => String::new(),
    }
}

/// Parses provider timestamps such as `2023-04-01T10:20:30+00:00`.
/// Any RFC 3339 offset is honoured; a bare timestamp is read as UTC.
pub fn parse_provider_timestamp(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(t.timestamp());
    }
    NaiveDateTime::parse_from_str(trimmed.trim_end_matches('Z'), "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|t| t.and_utc().timestamp())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterRecord {
    pub id: Uuid,
    pub cluster_name: String,
    pub user_name: String,
    #[serde(default)]
    pub project_name: String,
    #[serde(default)]
    pub kubeconfig: String,
    #[serde(default)]
    pub nodes_names: Vec<String>,
    #[serde(default)]
    pub nodes_ips: Vec<String>,
    pub created_timestamp: i64,
    pub human_created_timestamp: String,
    pub expiration_timestamp: i64,
    pub human_expiration_timestamp: String,
    #[serde(default)]
    pub region_name: String,
    #[serde(default)]
    pub zone_name: String,
    #[serde(default)]
    pub cluster_version: String,
    pub availability: bool,
    #[serde(default)]
    pub discovered: bool,
    #[serde(flatten)]
    pub details: ProviderDetails,
}

impl ClusterRecord {
    pub fn new(
        cluster_name: impl Into<String>,
        user_name: impl Into<String>,
        details: ProviderDetails,
        lifetime: Lifetime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            cluster_name: cluster_name.into(),
            user_name: user_name.into(),
            project_name: String::new(),
            kubeconfig: String::new(),
            nodes_names: Vec::new(),
            nodes_ips: Vec::new(),
            created_timestamp: lifetime.created,
            human_created_timestamp: human_timestamp(lifetime.created),
            expiration_timestamp: lifetime.expiration,
            human_expiration_timestamp: human_timestamp(lifetime.expiration),
            region_name: String::new(),
            zone_name: String::new(),
            cluster_version: String::new(),
            availability: true,
            discovered: false,
            details,
        }
    }

    pub fn provider(&self) -> ProviderKind {
        self.details.kind()
    }

    /// Zone for GKE kinds, region otherwise
    pub fn location(&self) -> &str {
        if self.provider().is_zonal() {
            &self.zone_name
        } else {
            &self.region_name
        }
    }

    pub fn key(&self) -> ClusterKey {
        ClusterKey {
            provider: self.provider(),
            cluster_name: self.cluster_name.clone(),
            location: self.location().to_string(),
        }
    }

    /// Discovery created it or has written its kubeconfig. A placeholder
    /// for a build still provisioning has neither.
    pub fn seen_by_discovery(&self) -> bool {
        self.discovered || !self.kubeconfig.is_empty()
    }

    pub fn is_vacant(&self) -> bool {
        self.user_name.is_empty() || self.user_name == VACANT_USER
    }

    pub fn set_lifetime(&mut self, lifetime: Lifetime) {
        self.created_timestamp = lifetime.created;
        self.human_created_timestamp = human_timestamp(lifetime.created);
        self.expiration_timestamp = lifetime.expiration;
        self.human_expiration_timestamp = human_timestamp(lifetime.expiration);
    }
}

/// Upsert identity of a record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClusterKey {
    pub provider: ProviderKind,
    pub cluster_name: String,
    pub location: String,
}

impl fmt::Display for ClusterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.provider, self.cluster_name, self.location)
    }
}
