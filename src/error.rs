//! Error types for cluster orchestration and discovery

use thiserror::Error;

use crate::models::ProviderKind;

/// Main error type for orchestrator, reconciler and store operations
#[derive(Debug, Error)]
pub enum Error {
    /// Local AWS credentials file missing or malformed
    #[error("credentials unavailable: {0}")]
    CredentialsUnavailable(String),

    /// Node group sizing could not be coerced to a positive integer
    #[error("invalid descriptor input: {field} = {value:?}")]
    InvalidDescriptorInput { field: &'static str, value: String },

    /// Request field outside what the workflows accept
    #[error("invalid input: {field} = {value:?}")]
    InvalidInput { field: &'static str, value: String },

    /// Trigger API answered with something other than 200/204
    #[error("dispatch of {event_type} failed: HTTP {status} {reason}")]
    DispatchFailed {
        event_type: String,
        status: u16,
        reason: String,
    },

    /// One cluster could not be normalized during a discovery sweep
    #[error("discovery of cluster {cluster_name} failed: {reason}")]
    DiscoveryPartialFailure {
        cluster_name: String,
        reason: String,
    },

    /// Region or zone required for a delete request is not in the store
    #[error("store lookup failed for {provider} cluster {cluster_name}: {field} unknown")]
    StoreLookupFailed {
        provider: ProviderKind,
        cluster_name: String,
        field: &'static str,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Cloud provider API returned an error or an unexpected body
    #[error("provider api error: {0}")]
    ProviderApi(String),

    /// External CLI invocation failed or timed out
    #[error("command error: {0}")]
    Command(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn provider_api(msg: impl Into<String>) -> Self {
        Self::ProviderApi(msg.into())
    }

    pub fn command(msg: impl Into<String>) -> Self {
        Self::Command(msg.into())
    }

    pub fn partial(cluster_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DiscoveryPartialFailure {
            cluster_name: cluster_name.into(),
            reason: reason.into(),
        }
    }
}

impl From<redis::RedisError> for Error {
    fn from(e: redis::RedisError) -> Self {
        Self::Store(e.to_string())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
