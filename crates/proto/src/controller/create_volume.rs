use crate::{
  proto,
  secrets::Secrets,
  volume::{parse_capabilities, parse_capacity_range, CapacityRange, VolumeCapability},
};
use std::{collections::HashMap, convert::TryFrom};
use thiserror::Error;

#[derive(Debug)]
pub struct CreateVolumeRequest {
  name: String,
  capacity_range: Option<CapacityRange>,
  volume_capabilities: Vec<VolumeCapability>,
  parameters: HashMap<String, String>,
  secrets: Secrets,
}

impl CreateVolumeRequest {
  /// The suggested name for the storage space. Also the idempotency key:
  /// repeated calls with the same name MUST converge on one volume.
  #[inline]
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Capacity requirements of the volume to be provisioned. `None` lets the
  /// plugin pick.
  #[inline]
  pub fn capacity_range(&self) -> Option<&CapacityRange> {
    self.capacity_range.as_ref()
  }

  /// The capabilities the provisioned volume MUST have. Never empty.
  #[inline]
  pub fn volume_capabilities(&self) -> &[VolumeCapability] {
    &self.volume_capabilities
  }

  /// Opaque, plugin-specific creation parameters (storage class parameters
  /// plus any metadata the provisioner sidecar injects).
  #[inline]
  pub fn parameters(&self) -> &HashMap<String, String> {
    &self.parameters
  }

  /// Secrets required by the plugin to complete volume creation.
  #[inline]
  pub fn secrets(&self) -> &HashMap<String, String> {
    self.secrets.as_ref()
  }
}

impl TryFrom<proto::CreateVolumeRequest> for CreateVolumeRequest {
  type Error = tonic::Status;

  fn try_from(value: proto::CreateVolumeRequest) -> Result<Self, Self::Error> {
    let name = match value.name {
      v if v.is_empty() => {
        return Err(tonic::Status::invalid_argument(
          "CreateVolumeRequest.name is empty",
        ))
      }
      v => v,
    };

    let volume_capabilities = match value.volume_capabilities {
      v if v.is_empty() => {
        return Err(tonic::Status::invalid_argument(
          "CreateVolumeRequest.volume_capabilities is empty",
        ))
      }
      v => parse_capabilities(v)?,
    };

    let capacity_range = parse_capacity_range(value.capacity_range)?;

    Ok(CreateVolumeRequest {
      name,
      capacity_range,
      volume_capabilities,
      parameters: value.parameters,
      secrets: value.secrets.into(),
    })
  }
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CreateVolumeError {
  /// A volume with the given name exists but is incompatible with the request.
  #[error("Volume exists with incompatible parameters: {0}")]
  AlreadyExists(String),

  #[error(transparent)]
  #[doc(hidden)]
  Other(#[from] tonic::Status),
}

impl From<CreateVolumeError> for tonic::Status {
  fn from(value: CreateVolumeError) -> tonic::Status {
    use tonic::{Code, Status};

    match value {
      CreateVolumeError::AlreadyExists(v) => Status::new(Code::AlreadyExists, v),
      CreateVolumeError::Other(v) => v,
    }
  }
}
