//! Repository dispatch events sent to the GitHub Actions trigger API

use std::fmt;
use std::time::Duration;

use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "gke-build-api-trigger")]
    GkeBuild,
    #[serde(rename = "eks-build-api-trigger")]
    EksBuild,
    #[serde(rename = "aks-build-api-trigger")]
    AksBuild,
    #[serde(rename = "gke-delete-api-trigger")]
    GkeDelete,
    #[serde(rename = "eks-delete-api-trigger")]
    EksDelete,
    #[serde(rename = "aks-delete-api-trigger")]
    AksDelete,
    #[serde(rename = "trolley-agent-api-deployment-trigger")]
    AgentDeployment,
    #[serde(rename = "gcp-caching-action-trigger")]
    GcpCaching,
    #[serde(rename = "aws-caching-action-trigger")]
    AwsCaching,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::GkeBuild => "gke-build-api-trigger",
            EventType::EksBuild => "eks-build-api-trigger",
            EventType::AksBuild => "aks-build-api-trigger",
            EventType::GkeDelete => "gke-delete-api-trigger",
            EventType::EksDelete => "eks-delete-api-trigger",
            EventType::AksDelete => "aks-delete-api-trigger",
            EventType::AgentDeployment => "trolley-agent-api-deployment-trigger",
            EventType::GcpCaching => "gcp-caching-action-trigger",
            EventType::AwsCaching => "aws-caching-action-trigger",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire object POSTed to `/repos/<repository>/dispatches`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchEvent {
    pub event_type: EventType,
    pub client_payload: Map<String, Value>,
}

impl DispatchEvent {
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            client_payload: Map::new(),
        }
    }

    pub fn field(mut self, key: &str, value: impl Into<String>) -> Self {
        self.client_payload
            .insert(key.to_string(), Value::String(value.into()));
        self
    }
}

/// Thin authenticated client for the trigger API.
/// Only 200 and 204 count as an accepted dispatch; nothing is retried.
#[derive(Clone)]
pub struct DispatchClient {
    client: Client,
    dispatch_url: String,
    repository_url: String,
    authorization: header::HeaderValue,
}

impl DispatchClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;
        let mut authorization =
            header::HeaderValue::from_str(&format!("token {}", config.github_actions_token))
                .map_err(|_| Error::Config("trigger API token is not a valid header value".to_string()))?;
        authorization.set_sensitive(true);

        Ok(Self {
            client,
            dispatch_url: config.github_dispatch_url(),
            repository_url: config.github_repository_url(),
            authorization,
        })
    }

    fn headers(&self) -> header::HeaderMap {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(header::AUTHORIZATION, self.authorization.clone());
        headers
    }

    /// Sends the event. `Ok(false)` when the API rejected it.
    pub async fn dispatch(&self, event: &DispatchEvent) -> Result<bool> {
        let response = self
            .client
            .post(&self.dispatch_url)
            .headers(self.headers())
            .json(event)
            .send()
            .await?;

        let status = response.status();
        info!(event_type = %event.event_type, %status, "This is the request response");
        if is_accepted(status) {
            Ok(true)
        } else {
            let failure = Error::DispatchFailed {
                event_type: event.event_type.to_string(),
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("unknown").to_string(),
            };
            warn!("{}", failure);
            Ok(false)
        }
    }

    /// Verifies that the repository endpoint answers 200 with our token
    pub async fn check(&self) -> Result<bool> {
        let response = self
            .client
            .get(&self.repository_url)
            .headers(self.headers())
            .send()
            .await?;

        if response.status() == StatusCode::OK {
            Ok(true)
        } else {
            info!(
                "Trigger API check failed: {}",
                response.status().canonical_reason().unwrap_or("unknown")
            );
            Ok(false)
        }
    }
}

fn is_accepted(status: StatusCode) -> bool {
    status == StatusCode::OK || status == StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_wire_names() {
        let json = serde_json::to_value(DispatchEvent::new(EventType::AgentDeployment)).unwrap();
        assert_eq!(json["event_type"], "trolley-agent-api-deployment-trigger");
        assert!(json["client_payload"].as_object().unwrap().is_empty());

        for event_type in [
            EventType::GkeBuild,
            EventType::EksBuild,
            EventType::AksBuild,
            EventType::GkeDelete,
            EventType::EksDelete,
            EventType::AksDelete,
            EventType::GcpCaching,
            EventType::AwsCaching,
        ] {
            let value = serde_json::to_value(event_type).unwrap();
            assert_eq!(value, event_type.as_str());
        }
    }

    #[test]
    fn only_200_and_204_are_accepted() {
        assert!(is_accepted(StatusCode::OK));
        assert!(is_accepted(StatusCode::NO_CONTENT));
        assert!(!is_accepted(StatusCode::CREATED));
        assert!(!is_accepted(StatusCode::NOT_FOUND));
        assert!(!is_accepted(StatusCode::UNPROCESSABLE_ENTITY));
    }
}
