use crate::{proto, secrets::Secrets, volume::VolumeCapability};
use std::{
  collections::HashMap,
  convert::{TryFrom, TryInto},
};
use thiserror::Error;

#[derive(Debug)]
pub struct ControllerPublishVolumeRequest {
  volume_id: String,
  node_id: String,
  volume_capability: VolumeCapability,
  readonly: bool,
  secrets: Secrets,
}

impl ControllerPublishVolumeRequest {
  #[inline]
  pub fn volume_id(&self) -> &str {
    &self.volume_id
  }

  /// The node as reported by `NodeGetInfo`.
  #[inline]
  pub fn node_id(&self) -> &str {
    &self.node_id
  }

  #[inline]
  pub fn volume_capability(&self) -> &VolumeCapability {
    &self.volume_capability
  }

  #[inline]
  pub fn readonly(&self) -> bool {
    self.readonly
  }

  #[inline]
  pub fn secrets(&self) -> &HashMap<String, String> {
    self.secrets.as_ref()
  }
}

impl TryFrom<proto::ControllerPublishVolumeRequest> for ControllerPublishVolumeRequest {
  type Error = tonic::Status;

  fn try_from(value: proto::ControllerPublishVolumeRequest) -> Result<Self, Self::Error> {
    if value.volume_id.is_empty() {
      return Err(tonic::Status::invalid_argument(
        "ControllerPublishVolumeRequest.volume_id is empty",
      ));
    }

    if value.node_id.is_empty() {
      return Err(tonic::Status::invalid_argument(
        "ControllerPublishVolumeRequest.node_id is empty",
      ));
    }

    let volume_capability = value
      .volume_capability
      .ok_or_else(|| {
        tonic::Status::invalid_argument("ControllerPublishVolumeRequest.volume_capability missing")
      })?
      .try_into()?;

    Ok(ControllerPublishVolumeRequest {
      volume_id: value.volume_id,
      node_id: value.node_id,
      volume_capability,
      readonly: value.readonly,
      secrets: value.secrets.into(),
    })
  }
}

/// Opaque static publish properties forwarded to the node plugin.
#[derive(Debug, Default)]
pub struct ControllerPublishVolumeResponse {
  publish_context: HashMap<String, String>,
}

impl ControllerPublishVolumeResponse {
  #[inline]
  pub fn new(publish_context: HashMap<String, String>) -> Self {
    ControllerPublishVolumeResponse { publish_context }
  }
}

impl From<ControllerPublishVolumeResponse> for proto::ControllerPublishVolumeResponse {
  fn from(value: ControllerPublishVolumeResponse) -> Self {
    proto::ControllerPublishVolumeResponse {
      publish_context: value.publish_context,
    }
  }
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ControllerPublishVolumeError {
  /// Indicates that a volume corresponding to the specified `volume_id` does not exist.
  #[error("Volume does not exist: {0}")]
  VolumeDoesNotExist(String),

  /// Indicates that a node corresponding to the specified `node_id` does not exist.
  #[error("Node does not exist: {0}")]
  NodeDoesNotExist(String),

  #[error(transparent)]
  #[doc(hidden)]
  Other(#[from] tonic::Status),
}

impl From<ControllerPublishVolumeError> for tonic::Status {
  fn from(value: ControllerPublishVolumeError) -> tonic::Status {
    use tonic::{Code, Status};

    match value {
      ControllerPublishVolumeError::VolumeDoesNotExist(v) => Status::new(Code::NotFound, v),
      ControllerPublishVolumeError::NodeDoesNotExist(v) => Status::new(Code::NotFound, v),
      ControllerPublishVolumeError::Other(v) => v,
    }
  }
}
