//! Renders a build event payload as a workflow environment file.
//!
//! The build workflow receives the `payload` string of the dispatch event and
//! turns it into `KEY=value` lines written to `$GITHUB_ENV`.

use std::fmt::Write as _;
use std::path::Path;

use serde_json::{Map, Value};

use crate::error::{Error, Result};

pub const DEFAULT_PROJECT_NAME: &str = "trolley-dev";

/// Which build workflow consumes the file
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EnvProvider {
    Gcp,
    Aws,
}

/// Keys in the order the workflows expect them
const KEYS: [&str; 12] = [
    "GCP_PROJECT_ID",
    "PROJECT_NAME",
    "CLUSTER_NAME",
    "USER_NAME",
    "CLUSTER_VERSION",
    "GKE_MACHINE_TYPE",
    "REGION_NAME",
    "ZONE_NAME",
    "IMAGE_TYPE",
    "NUM_NODES",
    "EKSCTL_DEPLOYMENT_FILE",
    "EXPIRATION_TIME",
];

/// Payload fields read only for one provider
fn provider_specific(key: &str) -> Option<EnvProvider> {
    match key {
        "GCP_PROJECT_ID" | "GKE_MACHINE_TYPE" | "ZONE_NAME" | "IMAGE_TYPE" => Some(EnvProvider::Gcp),
        "EKSCTL_DEPLOYMENT_FILE" => Some(EnvProvider::Aws),
        _ => None,
    }
}

/// Strings are written bare, numbers as digits and objects as compact JSON.
/// A line break would start a new `KEY=value` line, so it is refused.
fn scalar(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

pub fn render(payload: &str, provider: EnvProvider) -> Result<String> {
    let fields: Map<String, Value> = serde_json::from_str(payload)?;

    let mut out = String::new();
    for key in KEYS {
        let value = match provider_specific(key) {
            Some(only) if only != provider => String::new(),
            _ => scalar(fields.get(&key.to_ascii_lowercase())),
        };
        if value.contains(['\n', '\r']) {
            return Err(Error::InvalidInput { field: key, value });
        }
        let value = if key == "PROJECT_NAME" && value.is_empty() {
            DEFAULT_PROJECT_NAME.to_string()
        } else {
            value
        };
        // writing to a String cannot fail
        let _ = writeln!(out, "{}={}", key, value);
    }
    Ok(out)
}

/// Renders and writes the file, replacing whatever was there
pub fn write_env_file(path: &Path, payload: &str, provider: EnvProvider) -> Result<String> {
    let content = render(payload, provider)?;
    std::fs::write(path, &content)
        .map_err(|e| Error::command(format!("cannot write {}: {}", path.display(), e)))?;
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn gke_payload() -> String {
        json!({
            "gcp_project_id": "trolley-361905",
            "project_name": "",
            "cluster_name": "g1",
            "user_name": "alice",
            "cluster_version": "1.27",
            "gke_machine_type": "e2-medium",
            "region_name": "us-central1",
            "zone_name": "us-central1-a",
            "image_type": "COS_CONTAINERD",
            "num_nodes": "2",
            "expiration_time": "8"
        })
        .to_string()
    }

    #[test]
    fn gcp_file_has_every_key_in_order() {
        let out = render(&gke_payload(), EnvProvider::Gcp).unwrap();
        let keys: Vec<&str> = out.lines().filter_map(|l| l.split_once('=')).map(|(k, _)| k).collect();

        assert_eq!(keys, KEYS.to_vec());
        assert!(out.starts_with("GCP_PROJECT_ID=trolley-361905\nPROJECT_NAME=trolley-dev\n"));
        assert!(out.contains("ZONE_NAME=us-central1-a\n"));
        assert!(out.contains("EKSCTL_DEPLOYMENT_FILE=\n"));
        assert!(out.ends_with("EXPIRATION_TIME=8\n"));
    }

    #[test]
    fn aws_file_leaves_gcp_fields_empty() {
        let payload = json!({
            "cluster_name": "e1",
            "project_name": "team-a",
            "user_name": "bob",
            "cluster_version": "1.27",
            "region_name": "us-east-1",
            "zone_name": "ignored",
            "num_nodes": "3",
            "expiration_time": "4",
            "eksctl_deployment_file": {"kind": "ClusterConfig"}
        })
        .to_string();
        let out = render(&payload, EnvProvider::Aws).unwrap();

        assert!(out.contains("PROJECT_NAME=team-a\n"));
        assert!(out.contains("ZONE_NAME=\n"));
        assert!(out.contains("GCP_PROJECT_ID=\n"));
        assert!(out.contains("EKSCTL_DEPLOYMENT_FILE={\"kind\":\"ClusterConfig\"}\n"));
        assert!(out.contains("NUM_NODES=3\n"));
    }

    #[test]
    fn non_object_payload_is_rejected() {
        assert!(matches!(
            render("not json", EnvProvider::Gcp),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn line_breaks_cannot_add_keys() {
        let payload = json!({
            "cluster_name": "g1\nEXTRA=1",
            "user_name": "alice"
        })
        .to_string();
        assert!(matches!(
            render(&payload, EnvProvider::Gcp),
            Err(Error::InvalidInput { field: "CLUSTER_NAME", .. })
        ));

        let payload = json!({"cluster_name": "g1", "user_name": "alice\r"}).to_string();
        assert!(render(&payload, EnvProvider::Aws).is_err());
    }

    #[test]
    fn file_is_written_to_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("github_env");
        std::fs::write(&path, "STALE=1\n").unwrap();

        write_env_file(&path, &gke_payload(), EnvProvider::Gcp).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(!written.contains("STALE"));
        assert!(written.contains("CLUSTER_NAME=g1\n"));
    }
}
