mod resolver;

pub use resolver::{SecretResolver, rewrite_loopback};

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::ProvisionError;

/// Minimal logical-read client for a Vault-style KV v2 backend.
///
/// Transport, auth handshake and retry behavior stay with the underlying
/// HTTP client; this only shapes the two reads the pipeline needs.
pub struct VaultClient {
    http: reqwest::Client,
    base: String,
    token: String,
}

/// KV v2 wraps the stored fields in a double `data` envelope.
#[derive(Debug, Deserialize)]
struct KvReadResponse {
    data: KvPayload,
}

#[derive(Debug, Deserialize)]
struct KvPayload {
    data: serde_json::Map<String, serde_json::Value>,
}

impl VaultClient {
    pub fn new(
        address: &str,
        token: &str,
        timeout: Duration,
    ) -> Result<Self, ProvisionError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                ProvisionError::Internal(format!(
                    "cannot build backend http client: {e}"
                ))
            })?;
        Ok(Self {
            http,
            base: address.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    /// Reads a single string field from the secret at `path`.
    ///
    /// Transport failures and non-success statuses are backend-read errors;
    /// an unexpected body shape or a missing field is a decode error.
    pub async fn read_field(
        &self,
        path: &str,
        field: &str,
    ) -> Result<String, ProvisionError> {
        let url = format!("{}/v1/{}", self.base, path);
        debug!(%url, %field, "reading secret field");
        let resp = self
            .http
            .get(&url)
            .header("X-Vault-Token", &self.token)
            .send()
            .await
            .map_err(|e| ProvisionError::BackendRead {
                path: path.to_string(),
                reason: e.to_string(),
            })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ProvisionError::BackendRead {
                path: path.to_string(),
                reason: format!("unexpected status {status}"),
            });
        }
        let body: KvReadResponse = resp.json().await.map_err(|e| {
            ProvisionError::Decode(format!(
                "unexpected secret shape at '{path}': {e}"
            ))
        })?;
        body.data
            .data
            .get(field)
            .and_then(|v| v.as_str())
            .map(str::to_owned)
            .ok_or_else(|| {
                ProvisionError::Decode(format!(
                    "field '{field}' missing from secret at '{path}'"
                ))
            })
    }
}
