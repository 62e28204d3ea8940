//! The CSI controller service backed by Quobyte.

use crate::{
  backend::Connector,
  config::DriverConfig,
  params::CreationRequest,
  provision::Provisioner,
};
use async_trait::async_trait;
use quobyte_csi_proto::{
  controller::{
    CapacityRange, ControllerCapabilities, ControllerExpandVolumeError,
    ControllerExpandVolumeRequest, ControllerExpandVolumeResponse, ControllerPublishVolumeError,
    ControllerPublishVolumeRequest, ControllerPublishVolumeResponse, ControllerUnpublishVolumeError,
    ControllerUnpublishVolumeRequest, CreateVolumeError, CreateVolumeRequest, DeleteVolumeError,
    DeleteVolumeRequest, Volume, VolumeCapability,
  },
  ControllerService, IdentityService, VolumeExpansionSupport,
};
use tracing::debug;

pub struct QuobyteController<C: Connector> {
  name: String,
  version: String,
  provisioner: Provisioner<C>,
}

impl<C: Connector> QuobyteController<C> {
  pub fn new(connector: C, config: &DriverConfig) -> Self {
    QuobyteController {
      name: config.driver_name.clone(),
      version: config.driver_version.clone(),
      provisioner: Provisioner::new(connector, config),
    }
  }
}

/// Quobyte volumes are file systems; block access cannot be served.
fn check_capabilities(capabilities: &[VolumeCapability]) -> Result<(), tonic::Status> {
  if capabilities.iter().any(VolumeCapability::is_block) {
    return Err(tonic::Status::invalid_argument(
      "block access type is not supported by Quobyte volumes",
    ));
  }

  Ok(())
}

impl<C: Connector> IdentityService for QuobyteController<C> {
  fn name(&self) -> &str {
    &self.name
  }

  fn version(&self) -> &str {
    &self.version
  }

  fn volume_expansion_support(&self) -> VolumeExpansionSupport {
    VolumeExpansionSupport::Online
  }
}

#[async_trait]
impl<C: Connector> ControllerService for QuobyteController<C> {
  fn capabilities(&self) -> ControllerCapabilities {
    ControllerCapabilities::CREATE_DELETE_VOLUME | ControllerCapabilities::EXPAND_VOLUME
  }

  async fn create_volume(&self, request: CreateVolumeRequest) -> Result<Volume, CreateVolumeError> {
    check_capabilities(request.volume_capabilities())?;

    let capacity = request
      .capacity_range()
      .and_then(CapacityRange::required_bytes);
    let creation = CreationRequest::resolve(
      request.name(),
      capacity,
      request.parameters(),
      self.provisioner.defaults(),
    )
    .map_err(tonic::Status::from)?;

    let provisioned = self
      .provisioner
      .create_volume(creation, request.secrets())
      .await
      .map_err(tonic::Status::from)?;

    Ok(Volume::new(
      provisioned.handle.to_string(),
      provisioned.capacity,
    ))
  }

  async fn delete_volume(&self, request: DeleteVolumeRequest) -> Result<(), DeleteVolumeError> {
    self
      .provisioner
      .delete_volume(request.volume_id(), request.secrets())
      .await
      .map_err(tonic::Status::from)?;

    Ok(())
  }

  // Volumes are mounted by the Quobyte client on the node, there is
  // nothing to attach.
  async fn controller_publish_volume(
    &self,
    request: ControllerPublishVolumeRequest,
  ) -> Result<ControllerPublishVolumeResponse, ControllerPublishVolumeError> {
    debug!(
      volume = request.volume_id(),
      node = request.node_id(),
      "Nothing to publish"
    );
    Ok(ControllerPublishVolumeResponse::default())
  }

  async fn controller_unpublish_volume(
    &self,
    request: ControllerUnpublishVolumeRequest,
  ) -> Result<(), ControllerUnpublishVolumeError> {
    debug!(volume = request.volume_id(), "Nothing to unpublish");
    Ok(())
  }

  async fn controller_expand_volume(
    &self,
    request: ControllerExpandVolumeRequest,
  ) -> Result<ControllerExpandVolumeResponse, ControllerExpandVolumeError> {
    if let Some(capability) = request.volume_capability() {
      check_capabilities(std::slice::from_ref(capability))?;
    }

    let capacity = self
      .provisioner
      .expand_volume(
        request.volume_id(),
        request.capacity_range().required_bytes(),
        request.secrets(),
      )
      .await
      .map_err(tonic::Status::from)?;

    Ok(ControllerExpandVolumeResponse::new(capacity, false))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::backend::FakeBackend;
  use quobyte_csi_proto::proto;
  use std::{collections::HashMap, convert::TryFrom};

  fn controller(backend: &FakeBackend) -> QuobyteController<FakeBackend> {
    QuobyteController::new(backend.clone(), &DriverConfig::default())
  }

  fn capability(access_type: proto::volume_capability::AccessType) -> proto::VolumeCapability {
    proto::VolumeCapability {
      access_type: Some(access_type),
      access_mode: Some(proto::volume_capability::AccessMode {
        mode: proto::volume_capability::access_mode::Mode::MultiNodeMultiWriter as i32,
      }),
    }
  }

  fn mount() -> proto::VolumeCapability {
    capability(proto::volume_capability::AccessType::Mount(
      proto::volume_capability::MountVolume::default(),
    ))
  }

  fn block() -> proto::VolumeCapability {
    capability(proto::volume_capability::AccessType::Block(
      proto::volume_capability::BlockVolume {},
    ))
  }

  fn create_request(capabilities: Vec<proto::VolumeCapability>) -> CreateVolumeRequest {
    CreateVolumeRequest::try_from(proto::CreateVolumeRequest {
      name: "pvc-1".into(),
      capacity_range: Some(proto::CapacityRange {
        required_bytes: 1 << 30,
        limit_bytes: 0,
      }),
      volume_capabilities: capabilities,
      parameters: HashMap::new(),
      secrets: HashMap::new(),
    })
    .unwrap()
  }

  #[test]
  fn identity() {
    let controller = controller(&FakeBackend::new());

    assert_eq!(controller.name(), "csi.quobyte.com");
    assert_eq!(controller.version(), env!("CARGO_PKG_VERSION"));
    assert_eq!(
      controller.volume_expansion_support(),
      VolumeExpansionSupport::Online
    );
  }

  #[test]
  fn advertises_create_delete_and_expand() {
    let caps = controller(&FakeBackend::new()).capabilities();
    assert_eq!(
      caps,
      ControllerCapabilities::CREATE_DELETE_VOLUME | ControllerCapabilities::EXPAND_VOLUME
    );
  }

  #[tokio::test]
  async fn block_volumes_are_rejected_before_the_backend() {
    let backend = FakeBackend::with_tenants(vec!["My Tenant"]);

    let err = controller(&backend)
      .create_volume(create_request(vec![mount(), block()]))
      .await
      .unwrap_err();

    assert_eq!(tonic::Status::from(err).code(), tonic::Code::InvalidArgument);
    assert_eq!(backend.connections(), 0);
  }

  #[tokio::test]
  async fn created_volume_carries_handle_and_capacity() {
    let backend = FakeBackend::with_tenants(vec!["My Tenant"]);

    let volume = controller(&backend)
      .create_volume(create_request(vec![mount()]))
      .await
      .unwrap();

    assert!(volume.volume_id().starts_with("My Tenant|"));
    assert_eq!(volume.capacity_bytes().map(|c| c.get()), Some(1 << 30));
  }
}
