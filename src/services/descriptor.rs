//! eksctl `ClusterConfig` descriptors for EKS builds

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const EKSCTL_API_VERSION: &str = "eksctl.io/v1alpha5";
pub const EKSCTL_KIND: &str = "ClusterConfig";
const DEFAULT_NODE_GROUP: &str = "ng1";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningDescriptor {
    pub api_version: String,
    pub kind: String,
    pub metadata: DescriptorMetadata,
    pub node_groups: Vec<NodeGroup>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorMetadata {
    pub name: String,
    pub region: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeGroup {
    pub name: String,
    pub instance_type: String,
    pub desired_capacity: u32,
    pub volume_size: u32,
}

/// Builds a descriptor with a single node group. Sizes must be positive
/// integers, given either as numbers or numeric strings.
pub fn build(
    cluster_name: &str,
    region: &str,
    instance_type: &str,
    desired_capacity: &str,
    volume_size: &str,
) -> Result<ProvisioningDescriptor> {
    let desired_capacity = positive("desired_capacity", desired_capacity)?;
    let volume_size = positive("volume_size", volume_size)?;

    Ok(ProvisioningDescriptor {
        api_version: EKSCTL_API_VERSION.to_string(),
        kind: EKSCTL_KIND.to_string(),
        metadata: DescriptorMetadata {
            name: cluster_name.to_string(),
            region: region.to_string(),
        },
        node_groups: vec![NodeGroup {
            name: DEFAULT_NODE_GROUP.to_string(),
            instance_type: instance_type.to_string(),
            desired_capacity,
            volume_size,
        }],
    })
}

fn positive(field: &'static str, raw: &str) -> Result<u32> {
    match raw.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(Error::InvalidDescriptorInput {
            field,
            value: raw.to_string(),
        }),
    }
}
