//! In-memory [`Backend`] used by the test suites.
//!
//! Mirrors the behavior of the Quobyte API the provisioning core relies on:
//! names are unique per tenant, creating an existing name reports the
//! existing UUID, quotas are keyed by volume. Every call is appended to an
//! action log and individual operations can be made to fail.

use super::{is_uuid, Backend, BackendError, Connector, VolumeSpec};
use async_trait::async_trait;
use std::{
  collections::{BTreeMap, HashMap},
  sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use uuid::Uuid;

/// JSON-RPC "internal error", used for injected failures.
pub const INJECTED_ERROR_CODE: i64 = -32603;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FakeOp {
  ResolveTenant,
  ResolveVolume,
  CreateVolume,
  DeleteVolume,
  SetQuota,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeAction {
  ResolveTenant(String),
  ResolveVolume { volume: String, tenant: String },
  CreateVolume(VolumeSpec),
  DeleteVolume(String),
  SetQuota { volume_uuid: String, bytes: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeVolume {
  pub uuid: String,
  pub spec: VolumeSpec,
}

#[derive(Debug)]
struct Failure {
  message: String,
  remaining: Option<usize>,
}

#[derive(Debug, Default)]
struct Inner {
  /// name -> uuid
  tenants: BTreeMap<String, String>,
  /// uuid -> volume
  volumes: BTreeMap<String, FakeVolume>,
  /// volume uuid -> bytes
  quotas: BTreeMap<String, u64>,
  actions: Vec<FakeAction>,
  failures: HashMap<FakeOp, Failure>,
  /// Replaces the id carried by `AlreadyExists`.
  conflict_id: Option<Option<String>>,
  connections: usize,
}

impl Inner {
  fn check(&mut self, op: FakeOp) -> Result<(), BackendError> {
    let exhausted = match self.failures.get_mut(&op) {
      None => return Ok(()),
      Some(failure) => match failure.remaining.as_mut() {
        None => false,
        Some(n) => {
          *n -= 1;
          *n == 0
        }
      },
    };

    let failure = if exhausted {
      self.failures.remove(&op)
    } else {
      self.failures.get(&op).map(|f| Failure {
        message: f.message.clone(),
        remaining: None,
      })
    };

    match failure {
      Some(f) => Err(BackendError::Rpc {
        code: INJECTED_ERROR_CODE,
        message: f.message,
      }),
      None => Ok(()),
    }
  }

  fn tenant_uuid(&self, tenant: &str) -> Option<String> {
    if is_uuid(tenant) {
      return self
        .tenants
        .values()
        .find(|uuid| uuid.as_str() == tenant)
        .cloned();
    }

    self.tenants.get(tenant).cloned()
  }

  fn find_volume(&self, tenant_uuid: &str, name: &str) -> Option<&FakeVolume> {
    self
      .volumes
      .values()
      .find(|v| v.spec.tenant_uuid == tenant_uuid && v.spec.name == name)
  }
}

/// Cloning shares the underlying state, so a test can keep a handle while
/// the provisioner owns another.
#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
  inner: Arc<Mutex<Inner>>,
}

impl FakeBackend {
  pub fn new() -> Self {
    FakeBackend::default()
  }

  /// A backend that knows one tenant per name, with random UUIDs.
  pub fn with_tenants<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
    let backend = FakeBackend::new();
    for name in names {
      backend.add_tenant(name);
    }
    backend
  }

  fn lock(&self) -> MutexGuard<'_, Inner> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Register a tenant and return its UUID.
  pub fn add_tenant(&self, name: &str) -> String {
    let uuid = Uuid::new_v4().to_string();
    self.lock().tenants.insert(name.to_owned(), uuid.clone());
    uuid
  }

  /// Place a volume directly, as if created outside the driver.
  pub fn add_volume(&self, spec: VolumeSpec) -> String {
    let uuid = Uuid::new_v4().to_string();
    self.lock().volumes.insert(
      uuid.clone(),
      FakeVolume {
        uuid: uuid.clone(),
        spec,
      },
    );
    uuid
  }

  /// Report `id` instead of the existing UUID when a create hits a taken
  /// name. `None` makes the conflict anonymous.
  pub fn report_conflicts_as(&self, id: Option<&str>) {
    self.lock().conflict_id = Some(id.map(str::to_owned));
  }

  pub fn tenant_uuid(&self, name: &str) -> Option<String> {
    self.lock().tenant_uuid(name)
  }

  pub fn volume(&self, uuid: &str) -> Option<FakeVolume> {
    self.lock().volumes.get(uuid).cloned()
  }

  pub fn volumes(&self) -> Vec<FakeVolume> {
    self.lock().volumes.values().cloned().collect()
  }

  pub fn quota(&self, volume_uuid: &str) -> Option<u64> {
    self.lock().quotas.get(volume_uuid).copied()
  }

  pub fn quotas(&self) -> BTreeMap<String, u64> {
    self.lock().quotas.clone()
  }

  pub fn actions(&self) -> Vec<FakeAction> {
    self.lock().actions.clone()
  }

  /// How many clients were handed out through [`Connector::connect`].
  pub fn connections(&self) -> usize {
    self.lock().connections
  }

  /// Fail the next call of `op` only.
  pub fn fail_next(&self, op: FakeOp, message: impl Into<String>) {
    self.fail_times(op, 1, message);
  }

  pub fn fail_times(&self, op: FakeOp, times: usize, message: impl Into<String>) {
    if times == 0 {
      return;
    }

    self.lock().failures.insert(
      op,
      Failure {
        message: message.into(),
        remaining: Some(times),
      },
    );
  }

  /// Fail every call of `op` until [`FakeBackend::clear_failures`].
  pub fn fail_always(&self, op: FakeOp, message: impl Into<String>) {
    self.lock().failures.insert(
      op,
      Failure {
        message: message.into(),
        remaining: None,
      },
    );
  }

  pub fn clear_failures(&self) {
    self.lock().failures.clear();
  }
}

#[async_trait]
impl Backend for FakeBackend {
  async fn resolve_tenant(&self, tenant: &str) -> Result<String, BackendError> {
    let mut inner = self.lock();
    inner.actions.push(FakeAction::ResolveTenant(tenant.to_owned()));
    inner.check(FakeOp::ResolveTenant)?;

    inner
      .tenant_uuid(tenant)
      .ok_or_else(|| BackendError::NotFound(format!("tenant '{}'", tenant)))
  }

  async fn resolve_volume(&self, volume: &str, tenant: &str) -> Result<String, BackendError> {
    if is_uuid(volume) {
      return Ok(volume.to_owned());
    }

    let mut inner = self.lock();
    inner.actions.push(FakeAction::ResolveVolume {
      volume: volume.to_owned(),
      tenant: tenant.to_owned(),
    });
    inner.check(FakeOp::ResolveVolume)?;

    let tenant_uuid = inner
      .tenant_uuid(tenant)
      .ok_or_else(|| BackendError::NotFound(format!("tenant '{}'", tenant)))?;

    inner
      .find_volume(&tenant_uuid, volume)
      .map(|v| v.uuid.clone())
      .ok_or_else(|| BackendError::NotFound(format!("volume '{}' in tenant '{}'", volume, tenant)))
  }

  async fn create_volume(&self, spec: &VolumeSpec) -> Result<String, BackendError> {
    let mut inner = self.lock();
    inner.actions.push(FakeAction::CreateVolume(spec.clone()));
    inner.check(FakeOp::CreateVolume)?;

    if !inner.tenants.values().any(|t| *t == spec.tenant_uuid) {
      return Err(BackendError::NotFound(format!("tenant '{}'", spec.tenant_uuid)));
    }

    if let Some(existing) = inner.find_volume(&spec.tenant_uuid, &spec.name) {
      let id = match &inner.conflict_id {
        Some(id) => id.clone(),
        None => Some(existing.uuid.clone()),
      };
      return Err(BackendError::AlreadyExists { id });
    }

    let uuid = Uuid::new_v4().to_string();
    inner.volumes.insert(
      uuid.clone(),
      FakeVolume {
        uuid: uuid.clone(),
        spec: spec.clone(),
      },
    );
    Ok(uuid)
  }

  async fn delete_volume(&self, volume_uuid: &str) -> Result<(), BackendError> {
    let mut inner = self.lock();
    inner.actions.push(FakeAction::DeleteVolume(volume_uuid.to_owned()));
    inner.check(FakeOp::DeleteVolume)?;

    match inner.volumes.remove(volume_uuid) {
      Some(_) => {
        inner.quotas.remove(volume_uuid);
        Ok(())
      }
      None => Err(BackendError::NotFound(format!("volume '{}'", volume_uuid))),
    }
  }

  async fn set_volume_quota(&self, volume_uuid: &str, bytes: u64) -> Result<(), BackendError> {
    let mut inner = self.lock();
    inner.actions.push(FakeAction::SetQuota {
      volume_uuid: volume_uuid.to_owned(),
      bytes,
    });
    inner.check(FakeOp::SetQuota)?;

    if !inner.volumes.contains_key(volume_uuid) {
      return Err(BackendError::NotFound(format!("volume '{}'", volume_uuid)));
    }

    inner.quotas.insert(volume_uuid.to_owned(), bytes);
    Ok(())
  }
}

impl Connector for FakeBackend {
  type Client = FakeBackend;

  fn connect(&self, _secrets: &HashMap<String, String>) -> Result<FakeBackend, BackendError> {
    self.lock().connections += 1;
    Ok(self.clone())
  }
}
