use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Where the process runs. Decides the default locations of local
/// credential and kubeconfig files; detected once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostPlatform {
    /// Developer workstation (macOS) or a GitHub Actions runner
    Workstation,
    /// The service container
    Container,
}

impl HostPlatform {
    pub fn detect() -> Self {
        if cfg!(target_os = "macos") || env::var("GITHUB_ENV").is_ok() {
            HostPlatform::Workstation
        } else {
            HostPlatform::Container
        }
    }

    fn home(&self) -> PathBuf {
        match self {
            HostPlatform::Workstation => {
                let user = env::var("USER").unwrap_or_else(|_| "runner".to_string());
                PathBuf::from(format!("/Users/{}", user))
            }
            HostPlatform::Container => PathBuf::from("/home/app"),
        }
    }

    pub fn aws_credentials_path(&self) -> PathBuf {
        self.home().join(".aws/credentials")
    }

    pub fn gcp_credentials_path(&self) -> PathBuf {
        self.home().join(".gcp/gcp_credentials.json")
    }

    pub fn kubeconfig_path(&self) -> PathBuf {
        match self {
            HostPlatform::Workstation => self.home().join(".kube/config"),
            HostPlatform::Container => PathBuf::from("/root/.kube/config"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server_address: String,
    pub platform: HostPlatform,
    /// Document store; in-memory store when unset
    pub redis_url: Option<String>,
    pub github_api_url: String,
    pub github_repository: String,
    pub github_actions_token: String,
    pub gcp_project_id: String,
    pub google_creds_json: String,
    pub gcp_credentials_path: PathBuf,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub aws_credentials_path: PathBuf,
    pub azure_credentials: String,
    pub kubeconfig_path: PathBuf,
    pub trolley_server_url: String,
    pub mongo_url: String,
    pub mongo_user: String,
    pub mongo_password: String,
    pub http_timeout_secs: u64,
    pub command_timeout_secs: u64,
    pub log_level: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        // .env is only read when explicitly requested
        if env::var("USE_DOTENV").ok().as_deref() == Some("true") {
            dotenv::dotenv().ok();
        }

        let platform = HostPlatform::detect();

        let config = Config {
            server_address: env::var("SERVER_ADDRESS")
                .unwrap_or_else(|_| "0.0.0.0:8081".to_string()),
            platform,
            redis_url: env::var("REDIS_URL").ok().filter(|v| !v.is_empty()),
            github_api_url: env::var("GITHUB_API_URL")
                .unwrap_or_else(|_| "https://api.github.com".to_string()),
            github_repository: env::var("GITHUB_REPOSITORY").unwrap_or_default(),
            github_actions_token: env::var("GITHUB_ACTIONS_TOKEN").unwrap_or_default(),
            gcp_project_id: env::var("GCP_PROJECT_NAME")
                .unwrap_or_else(|_| "trolley-361905".to_string()),
            google_creds_json: env::var("GOOGLE_CREDS_JSON").unwrap_or_default(),
            gcp_credentials_path: path_var("GCP_CREDENTIALS_PATH", platform.gcp_credentials_path()),
            aws_access_key_id: env::var("AWS_ACCESS_KEY_ID").unwrap_or_default(),
            aws_secret_access_key: env::var("AWS_SECRET_ACCESS_KEY").unwrap_or_default(),
            aws_credentials_path: path_var("AWS_CREDENTIALS_PATH", platform.aws_credentials_path()),
            azure_credentials: env::var("AZURE_CREDENTIALS").unwrap_or_default(),
            kubeconfig_path: path_var("KUBECONFIG_PATH", platform.kubeconfig_path()),
            trolley_server_url: env::var("TROLLEY_SERVER_URL").unwrap_or_default(),
            mongo_url: env::var("MONGO_URL").unwrap_or_default(),
            mongo_user: env::var("MONGO_USER").unwrap_or_default(),
            mongo_password: env::var("MONGO_PASSWORD").unwrap_or_default(),
            http_timeout_secs: numeric_var("HTTP_TIMEOUT_SECS", 30)?,
            command_timeout_secs: numeric_var("COMMAND_TIMEOUT_SECS", 120)?,
            log_level: env::var("RUST_LOG")
                .unwrap_or_else(|_| "info".to_string()),
        };

        Ok(config)
    }

    pub fn github_dispatch_url(&self) -> String {
        format!("{}/repos/{}/dispatches", self.github_api_url, self.github_repository)
    }

    pub fn github_repository_url(&self) -> String {
        format!("{}/repos/{}", self.github_api_url, self.github_repository)
    }
}

fn path_var(name: &str, default: PathBuf) -> PathBuf {
    env::var(name).map(PathBuf::from).unwrap_or(default)
}

fn numeric_var(name: &str, default: u64) -> Result<u64> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{} must be a number of seconds, got {:?}", name, raw)),
        Err(_) => Ok(default),
    }
}
