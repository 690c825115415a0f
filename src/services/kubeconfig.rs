//! Kubeconfig materialization through the gcloud CLI

use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};

#[cfg_attr(test, automock)]
#[async_trait]
pub trait KubeconfigGenerator: Send + Sync {
    /// Returns the kubeconfig for `cluster_name` at `location` (zone or region)
    async fn generate(&self, cluster_name: &str, location: &str) -> Result<String>;
}

/// Runs `gcloud container clusters get-credentials` into a fixed config path
/// and reads the file back. Calls are serialized because they share the path.
pub struct GcloudKubeconfigGenerator {
    kubeconfig_path: PathBuf,
    project_id: String,
    timeout: Duration,
    lock: Mutex<()>,
}

impl GcloudKubeconfigGenerator {
    pub fn new(kubeconfig_path: impl Into<PathBuf>, project_id: impl Into<String>, timeout: Duration) -> Self {
        Self {
            kubeconfig_path: kubeconfig_path.into(),
            project_id: project_id.into(),
            timeout,
            lock: Mutex::new(()),
        }
    }

    async fn remove_stale(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.kubeconfig_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::command(format!(
                "cannot remove stale kubeconfig {}: {}",
                self.kubeconfig_path.display(),
                e
            ))),
        }
    }
}

/// `us-central1-a` is a zone, `us-central1` a region
fn location_flag(location: &str) -> String {
    let is_zone = location
        .rsplit_once('-')
        .map_or(false, |(_, suffix)| suffix.len() == 1 && suffix.chars().all(|c| c.is_ascii_lowercase()));
    if is_zone {
        format!("--zone={}", location)
    } else {
        format!("--region={}", location)
    }
}

#[async_trait]
impl KubeconfigGenerator for GcloudKubeconfigGenerator {
    async fn generate(&self, cluster_name: &str, location: &str) -> Result<String> {
        let _guard = self.lock.lock().await;

        // A previous cluster's credentials must never be returned for this one
        self.remove_stale().await?;

        let mut command = Command::new("gcloud");
        command
            .args(["container", "clusters", "get-credentials", cluster_name])
            .arg(location_flag(location))
            .arg(format!("--project={}", self.project_id))
            .env("KUBECONFIG", &self.kubeconfig_path)
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| {
                Error::command(format!(
                    "gcloud get-credentials for {} timed out after {}s",
                    cluster_name,
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| Error::command(format!("failed to run gcloud: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::command(format!(
                "gcloud get-credentials for {} failed: {}",
                cluster_name,
                stderr.trim()
            )));
        }

        let kubeconfig = tokio::fs::read_to_string(&self.kubeconfig_path)
            .await
            .map_err(|e| {
                Error::command(format!(
                    "kubeconfig {} not written: {}",
                    self.kubeconfig_path.display(),
                    e
                ))
            })?;
        info!(cluster_name, location, "Generated kubeconfig");
        debug!("The kubeconfig content is: {}", kubeconfig);
        Ok(kubeconfig)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zones_and_regions_get_different_flags() {
        assert_eq!(location_flag("us-central1-a"), "--zone=us-central1-a");
        assert_eq!(location_flag("europe-west4-b"), "--zone=europe-west4-b");
        assert_eq!(location_flag("us-central1"), "--region=us-central1");
    }

    #[tokio::test]
    async fn stale_config_is_removed_and_missing_one_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");
        std::fs::write(&path, "stale").unwrap();

        let generator = GcloudKubeconfigGenerator::new(&path, "p", Duration::from_secs(1));
        generator.remove_stale().await.unwrap();
        assert!(!path.exists());
        generator.remove_stale().await.unwrap();
    }
}
