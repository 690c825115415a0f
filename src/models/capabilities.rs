use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ProviderKind;

/// Provider capability caches read by the UI. Written by the external caching
/// workflow, partially refreshed by GKE discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum ProviderCapabilities {
    Gke(GkeCapabilities),
    Eks(EksCapabilities),
    Aks(AksCapabilities),
}

impl ProviderCapabilities {
    pub fn provider(&self) -> ProviderKind {
        match self {
            ProviderCapabilities::Gke(_) => ProviderKind::Gke,
            ProviderCapabilities::Eks(_) => ProviderKind::Eks,
            ProviderCapabilities::Aks(_) => ProviderKind::Aks,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GkeCapabilities {
    #[serde(default)]
    pub zones_list: Vec<String>,
    #[serde(default)]
    pub machine_types_dict: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub regions_list: Vec<String>,
    #[serde(default)]
    pub versions_list: Vec<String>,
    #[serde(default)]
    pub gke_image_types: Vec<String>,
    #[serde(default)]
    pub regions_zones_dict: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EksCapabilities {
    #[serde(default)]
    pub zones_list: Vec<String>,
    #[serde(default)]
    pub regions_list: Vec<String>,
    #[serde(default)]
    pub subnets_dict: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub regions_zones_dict: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AksCapabilities {
    #[serde(default)]
    pub locations_dict: BTreeMap<String, String>,
}
