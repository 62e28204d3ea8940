use crate::{proto, secrets::Secrets};
use std::{collections::HashMap, convert::TryFrom};
use thiserror::Error;

#[derive(Debug)]
pub struct ControllerUnpublishVolumeRequest {
  volume_id: String,
  node_id: Option<String>,
  secrets: Secrets,
}

impl ControllerUnpublishVolumeRequest {
  #[inline]
  pub fn volume_id(&self) -> &str {
    &self.volume_id
  }

  /// `None` means "unpublish from every node".
  #[inline]
  pub fn node_id(&self) -> Option<&str> {
    self.node_id.as_deref()
  }

  #[inline]
  pub fn secrets(&self) -> &HashMap<String, String> {
    self.secrets.as_ref()
  }
}

impl TryFrom<proto::ControllerUnpublishVolumeRequest> for ControllerUnpublishVolumeRequest {
  type Error = tonic::Status;

  fn try_from(value: proto::ControllerUnpublishVolumeRequest) -> Result<Self, Self::Error> {
    if value.volume_id.is_empty() {
      return Err(tonic::Status::invalid_argument(
        "ControllerUnpublishVolumeRequest.volume_id is empty",
      ));
    }

    let node_id = match value.node_id {
      v if v.is_empty() => None,
      v => Some(v),
    };

    Ok(ControllerUnpublishVolumeRequest {
      volume_id: value.volume_id,
      node_id,
      secrets: value.secrets.into(),
    })
  }
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ControllerUnpublishVolumeError {
  #[error("Node does not exist: {0}")]
  NodeDoesNotExist(String),

  #[error(transparent)]
  #[doc(hidden)]
  Other(#[from] tonic::Status),
}

impl From<ControllerUnpublishVolumeError> for tonic::Status {
  fn from(value: ControllerUnpublishVolumeError) -> tonic::Status {
    use tonic::{Code, Status};

    match value {
      ControllerUnpublishVolumeError::NodeDoesNotExist(v) => Status::new(Code::NotFound, v),
      ControllerUnpublishVolumeError::Other(v) => v,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_node_means_every_node() {
    let parsed = ControllerUnpublishVolumeRequest::try_from(proto::ControllerUnpublishVolumeRequest {
      volume_id: "My Tenant|pvc-1".into(),
      node_id: String::new(),
      secrets: HashMap::new(),
    })
    .unwrap();

    assert_eq!(parsed.node_id(), None);
  }

  #[test]
  fn missing_node_is_not_found() {
    let status = tonic::Status::from(ControllerUnpublishVolumeError::NodeDoesNotExist(
      "node-1".into(),
    ));
    assert_eq!(status.code(), tonic::Code::NotFound);
  }
}
