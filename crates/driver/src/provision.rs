//! The provisioning state machine behind CreateVolume, DeleteVolume and
//! ControllerExpandVolume.

use crate::{
  backend::{Backend, BackendError, Connector, VolumeSpec},
  config::{DriverConfig, VolumeDefaults},
  error::ProvisionError,
  handle::VolumeHandle,
  locks::CreateLocks,
  params::CreationRequest,
  tenant::TenantResolver,
};
use std::{collections::HashMap, num::NonZeroU64};
use tracing::{debug, error, info, instrument, warn};

/// Result of a successful CreateVolume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioned {
  pub handle: VolumeHandle,
  /// The capacity the CO asked for, reported back verbatim.
  pub capacity: Option<NonZeroU64>,
}

pub struct Provisioner<C: Connector> {
  connector: C,
  defaults: VolumeDefaults,
  tenants: TenantResolver,
  locks: CreateLocks,
}

impl<C: Connector> Provisioner<C> {
  pub fn new(connector: C, config: &DriverConfig) -> Self {
    Provisioner {
      connector,
      defaults: config.defaults.clone(),
      tenants: TenantResolver::new(config.namespace_as_tenant),
      locks: CreateLocks::new(),
    }
  }

  #[inline]
  pub fn defaults(&self) -> &VolumeDefaults {
    &self.defaults
  }

  /// Create the volume or adopt the one already holding the name, then
  /// attach the quota if one was asked for.
  ///
  /// If the quota cannot be set the volume is deleted again and the quota
  /// error is returned.
  #[instrument(level = "debug", skip(self, request, secrets), fields(name = %request.name))]
  pub async fn create_volume(
    &self,
    request: CreationRequest,
    secrets: &HashMap<String, String>,
  ) -> Result<Provisioned, ProvisionError> {
    let quota = match (request.parameters.create_quota, request.capacity) {
      (false, _) => None,
      (true, Some(capacity)) => Some(capacity),
      (true, None) => {
        return Err(ProvisionError::invalid_argument(
          "createQuota requires capacity_range.required_bytes",
        ))
      }
    };
    self.tenants.select(&request)?;

    let backend = self.connector.connect(secrets)?;
    let _guard = self.locks.lock(&request.name).await;
    let tenant = self.tenants.resolve(&backend, &request).await?;

    let spec = VolumeSpec {
      name: request.name.clone(),
      tenant_uuid: tenant.uuid.clone(),
      configuration: request.parameters.configuration.clone(),
      user: request.parameters.user.clone(),
      group: request.parameters.group.clone(),
      access_mode: request.parameters.access_mode,
      labels: request.parameters.labels.clone(),
    };

    let volume_uuid = match backend.create_volume(&spec).await {
      Ok(uuid) => {
        info!(volume = %uuid, tenant = %tenant.name, "Created volume");
        uuid
      }
      Err(BackendError::AlreadyExists { id }) => {
        // The conflict message is only a hint, the name lookup is authoritative.
        let existing = backend.resolve_volume(&spec.name, &spec.tenant_uuid).await?;
        if id.as_deref().map_or(false, |id| id != existing) {
          warn!(reported = ?id, volume = %existing, "Conflict named a different entity");
        }
        info!(volume = %existing, tenant = %tenant.name, "Volume exists already, reusing it");
        existing
      }
      Err(e) => return Err(e.into()),
    };

    if let Some(bytes) = quota {
      debug!(volume = %volume_uuid, bytes = bytes.get(), "Setting volume quota");
      if let Err(quota_error) = backend.set_volume_quota(&volume_uuid, bytes.get()).await {
        warn!(volume = %volume_uuid, error = %quota_error, "Setting quota failed, deleting volume");
        if let Err(delete_error) = backend.delete_volume(&volume_uuid).await {
          error!(
            volume = %volume_uuid,
            %quota_error,
            %delete_error,
            "Volume left without its quota, manual cleanup required"
          );
        }

        return Err(quota_error.into());
      }
    }

    Ok(Provisioned {
      handle: VolumeHandle::new(tenant.name, volume_uuid),
      capacity: request.capacity,
    })
  }

  /// Delete the volume a handle points at. Volumes that do not exist are
  /// reported as deleted by the backend.
  #[instrument(level = "debug", skip(self, secrets))]
  pub async fn delete_volume(
    &self,
    volume_id: &str,
    secrets: &HashMap<String, String>,
  ) -> Result<(), ProvisionError> {
    if volume_id.is_empty() {
      return Err(ProvisionError::invalid_argument("volume id is required"));
    }
    let handle: VolumeHandle = volume_id.parse()?;

    let backend = self.connector.connect(secrets)?;
    backend
      .delete_volume_by_names(handle.volume(), handle.tenant())
      .await?;

    info!(volume = handle.volume(), tenant = handle.tenant(), "Deleted volume");
    Ok(())
  }

  /// Grow the volume a handle points at to `capacity` bytes and report that
  /// capacity back.
  #[instrument(level = "debug", skip(self, secrets))]
  pub async fn expand_volume(
    &self,
    volume_id: &str,
    capacity: Option<NonZeroU64>,
    secrets: &HashMap<String, String>,
  ) -> Result<NonZeroU64, ProvisionError> {
    let handle: VolumeHandle = volume_id.parse()?;
    let capacity = capacity.ok_or_else(|| {
      ProvisionError::invalid_argument("expansion requires capacity_range.required_bytes")
    })?;

    let backend = self.connector.connect(secrets)?;
    backend
      .expand_volume(handle.volume(), handle.tenant(), capacity.get())
      .await?;

    info!(
      volume = handle.volume(),
      tenant = handle.tenant(),
      bytes = capacity.get(),
      "Expanded volume"
    );
    Ok(capacity)
  }
}
