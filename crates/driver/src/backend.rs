//! The seam between the provisioning core and the storage system.
//!
//! [`Backend`] is the set of tenant/volume/quota operations the core needs.
//! [`Connector`] builds one backend client per request from the credentials
//! the CO forwards with it. Classification of backend failures into
//! [`BackendError`] variants happens inside the implementations, so the core
//! never looks at message text.

pub mod fake;
pub mod quobyte;

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use uuid::Uuid;

pub use fake::FakeBackend;
pub use quobyte::{QuobyteClient, QuobyteConnector};

/// Secret key holding the Quobyte API user.
pub const SECRET_USER: &str = "user";
/// Secret key holding the Quobyte API password.
pub const SECRET_PASSWORD: &str = "password";

#[derive(Debug, Error)]
pub enum BackendError {
  /// The entity exists already. `id` is the UUID the backend named as the
  /// existing entity, if the message carried one.
  #[error("entity exists already: {id:?}")]
  AlreadyExists { id: Option<String> },

  #[error("entity not found: {0}")]
  NotFound(String),

  #[error("Quobyte API error {code}: {message}")]
  Rpc { code: i64, message: String },

  #[error("Quobyte API request failed: {0}")]
  Transport(#[from] reqwest::Error),

  #[error("unexpected Quobyte API response: {0}")]
  InvalidResponse(String),

  #[error("secret '{0}' is required to talk to the Quobyte API")]
  MissingCredentials(&'static str),
}

/// Everything needed to create one volume inside an already resolved tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeSpec {
  pub name: String,
  pub tenant_uuid: String,
  pub configuration: String,
  pub user: String,
  pub group: String,
  pub access_mode: u32,
  pub labels: BTreeMap<String, String>,
}

#[async_trait]
pub trait Backend: Send + Sync {
  /// Map a tenant name or UUID to the tenant UUID.
  async fn resolve_tenant(&self, tenant: &str) -> Result<String, BackendError>;

  /// Map a volume name or UUID inside `tenant` (name or UUID) to the volume
  /// UUID. A UUID is returned as is.
  async fn resolve_volume(&self, volume: &str, tenant: &str) -> Result<String, BackendError>;

  /// Returns the UUID of the new volume, or [`BackendError::AlreadyExists`]
  /// when the name is taken inside the tenant.
  async fn create_volume(&self, spec: &VolumeSpec) -> Result<String, BackendError>;

  async fn delete_volume(&self, volume_uuid: &str) -> Result<(), BackendError>;

  /// Set the logical disk space quota of a volume. Replaces any quota the
  /// volume had.
  async fn set_volume_quota(&self, volume_uuid: &str, bytes: u64) -> Result<(), BackendError>;

  /// Delete a volume identified by name or UUID. A volume or tenant that
  /// does not exist counts as deleted.
  async fn delete_volume_by_names(&self, volume: &str, tenant: &str) -> Result<(), BackendError> {
    let volume_uuid = match self.resolve_volume(volume, tenant).await {
      Ok(v) => v,
      Err(BackendError::NotFound(_)) => return Ok(()),
      Err(e) => return Err(e),
    };

    match self.delete_volume(&volume_uuid).await {
      Err(BackendError::NotFound(_)) => Ok(()),
      result => result,
    }
  }

  /// Grow a volume identified by name or UUID to `bytes`.
  async fn expand_volume(&self, volume: &str, tenant: &str, bytes: u64) -> Result<(), BackendError> {
    let volume_uuid = self.resolve_volume(volume, tenant).await?;
    self.set_volume_quota(&volume_uuid, bytes).await
  }
}

/// Creates backend clients from per-request secrets.
pub trait Connector: Send + Sync + 'static {
  type Client: Backend;

  fn connect(&self, secrets: &HashMap<String, String>) -> Result<Self::Client, BackendError>;
}

#[inline]
pub fn is_uuid(value: &str) -> bool {
  Uuid::parse_str(value).is_ok()
}

/// Trailing hyphenated UUID of `message`. Quobyte names the conflicting
/// entity last; earlier UUIDs belong to its parents.
pub fn trailing_uuid(message: &str) -> Option<String> {
  message
    .split(|c: char| !(c.is_ascii_hexdigit() || c == '-'))
    .filter(|token| token.len() == 36)
    .filter_map(|token| Uuid::parse_str(token).ok())
    .last()
    .map(|uuid| uuid.to_string())
}

#[cfg(test)]
mod tests {
  use super::*;
  use test_case::test_case;

  #[test_case("6f6b0e1c-2d4b-4c77-9d0e-2a4cbbd1b6b3" => true ; "hyphenated")]
  #[test_case("My Tenant" => false ; "name")]
  #[test_case("" => false ; "empty")]
  #[test_case("pvc-6f6b0e1c" => false ; "pvc name")]
  fn uuid_detection(value: &str) -> bool {
    is_uuid(value)
  }

  #[test_case(
    "ENTITY_EXISTS_ALREADY/POSIX_ERROR_NONE:[Volume pvc-1 exists already with uuid 6f6b0e1c-2d4b-4c77-9d0e-2a4cbbd1b6b3]"
    => Some("6f6b0e1c-2d4b-4c77-9d0e-2a4cbbd1b6b3".to_owned())
    ; "bracketed")]
  #[test_case(
    "volume 6F6B0E1C-2D4B-4C77-9D0E-2A4CBBD1B6B3 exists"
    => Some("6f6b0e1c-2d4b-4c77-9d0e-2a4cbbd1b6b3".to_owned())
    ; "upper case is normalized")]
  #[test_case(
    "ENTITY_EXISTS_ALREADY/POSIX_ERROR_NONE:[Volume pvc-1 in tenant 11111111-1111-4111-8111-111111111111 exists already with uuid 22222222-2222-4222-8222-222222222222]"
    => Some("22222222-2222-4222-8222-222222222222".to_owned())
    ; "tenant named first")]
  #[test_case("ENTITY_EXISTS_ALREADY/POSIX_ERROR_NONE" => None ; "no uuid")]
  #[test_case("deadbeef-dead-beef-dead-beefdeadbeefdeadbeef" => None ; "overlong token")]
  fn uuid_in_message(message: &str) -> Option<String> {
    trailing_uuid(message)
  }
}
