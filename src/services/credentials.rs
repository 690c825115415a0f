//! Cloud credential resolution.
//!
//! AWS needs an access key pair, taken from the request when both halves are
//! given and otherwise read from the local credentials file. GCP and Azure
//! credentials are opaque blobs handed to the build system unchanged.

use std::fs;
use std::path::PathBuf;

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Credentials in the shape the dispatch payload expects
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialPayload {
    AwsKeyPair {
        access_key_id: String,
        secret_access_key: String,
    },
    GoogleServiceAccount(String),
    AzureCredentials(String),
}

impl CredentialPayload {
    /// Adds this payload's fields to a `client_payload` map
    pub fn write_fields(&self, payload: &mut Map<String, Value>) {
        match self {
            CredentialPayload::AwsKeyPair {
                access_key_id,
                secret_access_key,
            } => {
                payload.insert("aws_access_key_id".into(), Value::String(access_key_id.clone()));
                payload.insert(
                    "aws_secret_access_key".into(),
                    Value::String(secret_access_key.clone()),
                );
            }
            CredentialPayload::GoogleServiceAccount(json) => {
                payload.insert("google_creds_json".into(), Value::String(json.clone()));
            }
            CredentialPayload::AzureCredentials(creds) => {
                payload.insert("azure_credentials".into(), Value::String(creds.clone()));
            }
        }
    }
}

/// Provider-specific credential source
pub trait CredentialProvider: Send + Sync {
    fn resolve(&self) -> Result<CredentialPayload>;
}

/// Resolves AWS key pairs: explicit values first, credentials file second
#[derive(Debug, Clone)]
pub struct AwsCredentialResolver {
    credentials_path: PathBuf,
}

impl AwsCredentialResolver {
    pub fn new(credentials_path: impl Into<PathBuf>) -> Self {
        Self {
            credentials_path: credentials_path.into(),
        }
    }

    pub fn resolve(&self, explicit_key: &str, explicit_secret: &str) -> Result<(String, String)> {
        if !explicit_key.is_empty() && !explicit_secret.is_empty() {
            return Ok((explicit_key.to_string(), explicit_secret.to_string()));
        }

        let body = fs::read_to_string(&self.credentials_path).map_err(|e| {
            Error::CredentialsUnavailable(format!(
                "cannot read {}: {}",
                self.credentials_path.display(),
                e
            ))
        })?;
        parse_credentials_file(&body)
    }

    pub fn with_explicit<'a>(&'a self, key: &'a str, secret: &'a str) -> AwsCredentials<'a> {
        AwsCredentials {
            resolver: self,
            key,
            secret,
        }
    }
}

/// The three-line `[profile]` / `key = value` / `key = value` layout;
/// values are taken by position, not by name.
fn parse_credentials_file(body: &str) -> Result<(String, String)> {
    let lines: Vec<&str> = body.lines().collect();
    if lines.len() < 3 {
        return Err(Error::CredentialsUnavailable(format!(
            "expected at least 3 lines, found {}",
            lines.len()
        )));
    }
    let key = value_of(lines[1])?;
    let secret = value_of(lines[2])?;
    Ok((key, secret))
}

fn value_of(line: &str) -> Result<String> {
    line.split_once('=')
        .map(|(_, value)| value.trim().to_string())
        .ok_or_else(|| Error::CredentialsUnavailable(format!("malformed line {:?}", line)))
}

/// An AWS resolver bound to the explicit values of one request
pub struct AwsCredentials<'a> {
    resolver: &'a AwsCredentialResolver,
    key: &'a str,
    secret: &'a str,
}

impl CredentialProvider for AwsCredentials<'_> {
    fn resolve(&self) -> Result<CredentialPayload> {
        let (access_key_id, secret_access_key) = self.resolver.resolve(self.key, self.secret)?;
        Ok(CredentialPayload::AwsKeyPair {
            access_key_id,
            secret_access_key,
        })
    }
}

/// Service account JSON passed through to the build system
pub struct GoogleCredentials(pub String);

impl CredentialProvider for GoogleCredentials {
    fn resolve(&self) -> Result<CredentialPayload> {
        Ok(CredentialPayload::GoogleServiceAccount(self.0.clone()))
    }
}

/// Azure service principal string passed through to the build system
pub struct AzureCredentials(pub String);

impl CredentialProvider for AzureCredentials {
    fn resolve(&self) -> Result<CredentialPayload> {
        Ok(CredentialPayload::AzureCredentials(self.0.clone()))
    }
}
