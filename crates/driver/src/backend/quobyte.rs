//! Client for the Quobyte JSON-RPC API.

use super::{is_uuid, trailing_uuid, Backend, BackendError, Connector, VolumeSpec, SECRET_PASSWORD, SECRET_USER};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use std::{
  collections::HashMap,
  fmt,
  sync::atomic::{AtomicU64, Ordering},
  time::Duration,
};
use tracing::{debug, instrument};

const ENTITY_EXISTS_ALREADY: &str = "ENTITY_EXISTS_ALREADY";
const ENTITY_NOT_FOUND: &str = "ENTITY_NOT_FOUND";

/// Holds the HTTP connection pool shared by all per-request clients.
#[derive(Debug, Clone)]
pub struct QuobyteConnector {
  http: reqwest::Client,
  url: String,
}

impl QuobyteConnector {
  pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
    let http = reqwest::Client::builder().timeout(timeout).build()?;

    Ok(QuobyteConnector {
      http,
      url: url.into(),
    })
  }
}

fn credential(secrets: &HashMap<String, String>, key: &'static str) -> Result<String, BackendError> {
  match secrets.get(key) {
    Some(v) if !v.is_empty() => Ok(v.clone()),
    _ => Err(BackendError::MissingCredentials(key)),
  }
}

impl Connector for QuobyteConnector {
  type Client = QuobyteClient;

  fn connect(&self, secrets: &HashMap<String, String>) -> Result<QuobyteClient, BackendError> {
    Ok(QuobyteClient {
      http: self.http.clone(),
      url: self.url.clone(),
      user: credential(secrets, SECRET_USER)?,
      password: credential(secrets, SECRET_PASSWORD)?,
      next_id: AtomicU64::new(0),
    })
  }
}

pub struct QuobyteClient {
  http: reqwest::Client,
  url: String,
  user: String,
  password: String,
  next_id: AtomicU64,
}

impl fmt::Debug for QuobyteClient {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("QuobyteClient")
      .field("url", &self.url)
      .field("user", &self.user)
      .field("password", &"SECRET")
      .finish()
  }
}

#[derive(Serialize)]
struct RpcRequest<'a> {
  jsonrpc: &'static str,
  method: &'a str,
  params: serde_json::Value,
  id: u64,
}

#[derive(Deserialize)]
struct RpcResponse {
  #[serde(default)]
  result: serde_json::Value,
  error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
  code: i64,
  message: String,
}

#[derive(Deserialize)]
struct ResolveTenantResult {
  tenant_id: String,
}

#[derive(Deserialize)]
struct VolumeUuidResult {
  volume_uuid: String,
}

/// Turn a JSON-RPC error into the variant the provisioning core acts on.
fn classify(code: i64, message: String) -> BackendError {
  if message.contains(ENTITY_EXISTS_ALREADY) {
    BackendError::AlreadyExists {
      id: trailing_uuid(&message),
    }
  } else if message.contains(ENTITY_NOT_FOUND) {
    BackendError::NotFound(message)
  } else {
    BackendError::Rpc { code, message }
  }
}

impl QuobyteClient {
  async fn call<R: DeserializeOwned>(
    &self,
    method: &str,
    params: serde_json::Value,
  ) -> Result<R, BackendError> {
    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
    debug!(method, id, "Calling Quobyte API");

    let response = self
      .http
      .post(&self.url)
      .basic_auth(&self.user, Some(&self.password))
      .json(&RpcRequest {
        jsonrpc: "2.0",
        method,
        params,
        id,
      })
      .send()
      .await?;

    let status = response.status();
    if !status.is_success() {
      let message = response.text().await.unwrap_or_default();
      return Err(BackendError::Rpc {
        code: i64::from(status.as_u16()),
        message: format!("{}: {}", status, message),
      });
    }

    let body: RpcResponse = response.json().await?;
    if let Some(error) = body.error {
      return Err(classify(error.code, error.message));
    }

    serde_json::from_value(body.result)
      .map_err(|e| BackendError::InvalidResponse(format!("{}: {}", method, e)))
  }
}

#[async_trait]
impl Backend for QuobyteClient {
  #[instrument(level = "debug", skip(self))]
  async fn resolve_tenant(&self, tenant: &str) -> Result<String, BackendError> {
    if is_uuid(tenant) {
      return Ok(tenant.to_owned());
    }

    let result: ResolveTenantResult = self
      .call("resolveTenantName", json!({ "tenant_name": tenant }))
      .await?;
    Ok(result.tenant_id)
  }

  #[instrument(level = "debug", skip(self))]
  async fn resolve_volume(&self, volume: &str, tenant: &str) -> Result<String, BackendError> {
    if is_uuid(volume) {
      return Ok(volume.to_owned());
    }

    let result: VolumeUuidResult = self
      .call(
        "resolveVolumeName",
        json!({ "volume_name": volume, "tenant_domain": tenant }),
      )
      .await?;
    Ok(result.volume_uuid)
  }

  #[instrument(level = "debug", skip(self, spec), fields(name = %spec.name, tenant = %spec.tenant_uuid))]
  async fn create_volume(&self, spec: &VolumeSpec) -> Result<String, BackendError> {
    let labels: Vec<_> = spec
      .labels
      .iter()
      .map(|(name, value)| json!({ "name": name, "value": value }))
      .collect();

    let result: VolumeUuidResult = self
      .call(
        "createVolume",
        json!({
          "name": spec.name,
          "root_user_id": spec.user,
          "root_group_id": spec.group,
          "tenant_id": spec.tenant_uuid,
          "configuration_name": spec.configuration,
          "access_mode": spec.access_mode,
          "label": labels,
        }),
      )
      .await?;
    Ok(result.volume_uuid)
  }

  #[instrument(level = "debug", skip(self))]
  async fn delete_volume(&self, volume_uuid: &str) -> Result<(), BackendError> {
    let _: serde::de::IgnoredAny = self
      .call("deleteVolume", json!({ "volume_uuid": volume_uuid }))
      .await?;
    Ok(())
  }

  #[instrument(level = "debug", skip(self))]
  async fn set_volume_quota(&self, volume_uuid: &str, bytes: u64) -> Result<(), BackendError> {
    let _: serde::de::IgnoredAny = self
      .call(
        "setQuota",
        json!({
          "quotas": [{
            "consumer": [{ "type": "VOLUME", "identifier": volume_uuid }],
            "limits": [{ "type": "LOGICAL_DISK_SPACE", "value": bytes }],
          }]
        }),
      )
      .await?;
    Ok(())
  }
}
