use crate::{
  proto,
  secrets::Secrets,
  volume::{parse_capacity_range, CapacityRange, VolumeCapability},
};
use std::{
  collections::HashMap,
  convert::{TryFrom, TryInto},
  num::NonZeroU64,
};
use thiserror::Error;

#[derive(Debug)]
pub struct ControllerExpandVolumeRequest {
  volume_id: String,
  capacity_range: CapacityRange,
  secrets: Secrets,
  volume_capability: Option<VolumeCapability>,
}

impl ControllerExpandVolumeRequest {
  /// The ID of the volume to expand. This field is REQUIRED.
  #[inline]
  pub fn volume_id(&self) -> &str {
    &self.volume_id
  }

  /// Capacity requirements of the volume after expansion. This field is
  /// REQUIRED.
  #[inline]
  pub fn capacity_range(&self) -> &CapacityRange {
    &self.capacity_range
  }

  /// Secrets required by the plugin for expanding the volume.
  #[inline]
  pub fn secrets(&self) -> &HashMap<String, String> {
    self.secrets.as_ref()
  }

  /// How the CO intends to use this volume, if it said so.
  #[inline]
  pub fn volume_capability(&self) -> Option<&VolumeCapability> {
    self.volume_capability.as_ref()
  }
}

impl TryFrom<proto::ControllerExpandVolumeRequest> for ControllerExpandVolumeRequest {
  type Error = tonic::Status;

  fn try_from(value: proto::ControllerExpandVolumeRequest) -> Result<Self, Self::Error> {
    let volume_id = match value.volume_id {
      v if v.is_empty() => {
        return Err(tonic::Status::invalid_argument(
          "ControllerExpandVolumeRequest.volume_id is empty",
        ))
      }
      v => v,
    };

    let capacity_range = parse_capacity_range(value.capacity_range)?.ok_or_else(|| {
      tonic::Status::invalid_argument("ControllerExpandVolumeRequest.capacity_range missing")
    })?;

    let volume_capability = value.volume_capability.map(TryInto::try_into).transpose()?;

    Ok(ControllerExpandVolumeRequest {
      volume_id,
      capacity_range,
      secrets: value.secrets.into(),
      volume_capability,
    })
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerExpandVolumeResponse {
  /// Capacity of volume after expansion.
  capacity_bytes: NonZeroU64,
  /// Whether the CO must follow up with NodeExpandVolume.
  node_expansion_required: bool,
}

impl ControllerExpandVolumeResponse {
  #[inline]
  pub fn new(capacity_bytes: NonZeroU64, node_expansion_required: bool) -> Self {
    ControllerExpandVolumeResponse {
      capacity_bytes,
      node_expansion_required,
    }
  }

  #[inline]
  pub fn capacity_bytes(&self) -> NonZeroU64 {
    self.capacity_bytes
  }

  #[inline]
  pub fn node_expansion_required(&self) -> bool {
    self.node_expansion_required
  }
}

impl From<ControllerExpandVolumeResponse> for proto::ControllerExpandVolumeResponse {
  fn from(value: ControllerExpandVolumeResponse) -> Self {
    proto::ControllerExpandVolumeResponse {
      capacity_bytes: value.capacity_bytes.get() as i64,
      node_expansion_required: value.node_expansion_required,
    }
  }
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ControllerExpandVolumeError {
  /// Indicates that a volume corresponding to the specified volume_id does not exist.
  #[error("Volume does not exist: {0}")]
  VolumeNotFound(String),

  /// Indicates that the capacity range is not allowed by the Plugin.
  #[error("Unsupported 'capacity_range': {0}")]
  UnsupportedCapacityRange(String),

  #[error(transparent)]
  #[doc(hidden)]
  Other(#[from] tonic::Status),
}

impl From<ControllerExpandVolumeError> for tonic::Status {
  fn from(value: ControllerExpandVolumeError) -> Self {
    use tonic::{Code, Status};

    match value {
      ControllerExpandVolumeError::VolumeNotFound(v) => Status::new(Code::NotFound, v),
      ControllerExpandVolumeError::UnsupportedCapacityRange(v) => Status::new(Code::OutOfRange, v),
      ControllerExpandVolumeError::Other(v) => v,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn capacity_range_is_required() {
    let raw = proto::ControllerExpandVolumeRequest {
      volume_id: "tenant|volume".into(),
      capacity_range: Some(proto::CapacityRange::default()),
      secrets: HashMap::new(),
      volume_capability: None,
    };

    let err = ControllerExpandVolumeRequest::try_from(raw).unwrap_err();
    assert_eq!(err.code(), tonic::Code::InvalidArgument);
  }

  #[test]
  fn response_carries_capacity() {
    let capacity = NonZeroU64::new(2048).unwrap();
    let wire = proto::ControllerExpandVolumeResponse::from(ControllerExpandVolumeResponse::new(
      capacity, false,
    ));

    assert_eq!(wire.capacity_bytes, 2048);
    assert!(!wire.node_expansion_required);
  }
}
