mod capabilities;
mod create_volume;
mod delete_volume;
mod expand_volume;
mod publish_volume;
mod unpublish_volume;

use crate::{
  plugin, proto,
  utils::{record_error, record_request, Record},
  IdentityService,
};
use async_trait::async_trait;
use std::{convert::TryInto, sync::Arc};
use tracing::instrument;

pub use crate::volume::*;
pub use capabilities::*;
pub use create_volume::*;
pub use delete_volume::*;
pub use expand_volume::*;
pub use publish_volume::*;
pub use unpublish_volume::*;

/// The controller half of a CSI plugin.
///
/// Only the RPCs a storage backend can meaningfully implement are part of
/// this trait. Everything else (capability validation, listing, capacity,
/// snapshots, `ControllerGetVolume`) is answered with UNIMPLEMENTED by
/// [`ControllerPlugin`] and never reaches the implementation.
#[async_trait]
pub trait ControllerService: IdentityService {
  /// Get the set of services provided by this controller.
  #[inline]
  fn capabilities(&self) -> ControllerCapabilities {
    ControllerCapabilities::empty()
  }

  /// Provision a new volume. MUST be idempotent on `request.name()`: if the
  /// volume already exists and is compatible, reply with it.
  #[allow(unused_variables)]
  async fn create_volume(&self, request: CreateVolumeRequest) -> Result<Volume, CreateVolumeError> {
    unsupported!("CreateVolume")
  }

  /// Deprovision a volume. MUST be idempotent: a volume that no longer exists
  /// is reported as deleted.
  #[allow(unused_variables)]
  async fn delete_volume(&self, request: DeleteVolumeRequest) -> Result<(), DeleteVolumeError> {
    unsupported!("DeleteVolume")
  }

  /// Make a volume available on a node. Plugins whose nodes attach volumes
  /// on their own reply with an empty publish context.
  #[allow(unused_variables)]
  async fn controller_publish_volume(
    &self,
    request: ControllerPublishVolumeRequest,
  ) -> Result<ControllerPublishVolumeResponse, ControllerPublishVolumeError> {
    unsupported!("ControllerPublishVolume")
  }

  /// Reverse of [`ControllerService::controller_publish_volume`].
  #[allow(unused_variables)]
  async fn controller_unpublish_volume(
    &self,
    request: ControllerUnpublishVolumeRequest,
  ) -> Result<(), ControllerUnpublishVolumeError> {
    unsupported!("ControllerUnpublishVolume")
  }

  /// Grow a volume. MUST be idempotent: a volume already at or above the
  /// requested size is a success.
  #[allow(unused_variables)]
  async fn controller_expand_volume(
    &self,
    request: ControllerExpandVolumeRequest,
  ) -> Result<ControllerExpandVolumeResponse, ControllerExpandVolumeError> {
    unsupported!("ControllerExpandVolume")
  }
}

/// Serves a [`ControllerService`] as the CSI Identity and Controller gRPC
/// services.
pub struct ControllerPlugin<T: ControllerService>(Arc<T>);

impl<T: ControllerService> Clone for ControllerPlugin<T> {
  fn clone(&self) -> Self {
    ControllerPlugin(self.0.clone())
  }
}

impl<T: ControllerService> ControllerPlugin<T> {
  pub fn new(service: Arc<T>) -> Self {
    ControllerPlugin(service)
  }

  pub fn identity_server(&self) -> proto::identity_server::IdentityServer<Self> {
    proto::identity_server::IdentityServer::new(self.clone())
  }

  pub fn controller_server(&self) -> proto::controller_server::ControllerServer<Self> {
    proto::controller_server::ControllerServer::new(self.clone())
  }
}

#[async_trait]
impl<T: ControllerService> proto::identity_server::Identity for ControllerPlugin<T> {
  #[instrument(
    name = "identity.get_plugin_info",
    skip(self, _request),
    fields(name, vendor_version, manifest)
  )]
  async fn get_plugin_info(
    &self,
    _request: tonic::Request<proto::GetPluginInfoRequest>,
  ) -> Result<tonic::Response<proto::GetPluginInfoResponse>, tonic::Status> {
    let response = proto::GetPluginInfoResponse {
      name: self.0.name().record_as("name").into(),
      vendor_version: self.0.version().record_as("vendor_version").into(),
      manifest: self.0.manifest().record_as("manifest").clone(),
    };

    Ok(tonic::Response::new(response))
  }

  #[instrument(
    name = "identity.get_plugin_capabilities",
    skip(self, _request),
    fields(response)
  )]
  async fn get_plugin_capabilities(
    &self,
    _request: tonic::Request<proto::GetPluginCapabilitiesRequest>,
  ) -> Result<tonic::Response<proto::GetPluginCapabilitiesResponse>, tonic::Status> {
    let response = plugin::get_capabilities(&*self.0).record_response();
    Ok(tonic::Response::new(response))
  }

  #[instrument(name = "identity.probe", skip(self, _request), fields(ready))]
  async fn probe(
    &self,
    _request: tonic::Request<proto::ProbeRequest>,
  ) -> Result<tonic::Response<proto::ProbeResponse>, tonic::Status> {
    let response = proto::ProbeResponse {
      ready: Some(self.0.ready().record_as("ready")),
    };

    Ok(tonic::Response::new(response))
  }
}

#[async_trait]
impl<T: ControllerService> proto::controller_server::Controller for ControllerPlugin<T> {
  #[instrument(
    name = "controller.create_volume",
    skip(self, request),
    fields(request, response, error)
  )]
  async fn create_volume(
    &self,
    request: tonic::Request<proto::CreateVolumeRequest>,
  ) -> Result<tonic::Response<proto::CreateVolumeResponse>, tonic::Status> {
    let request = record_request(request.into_inner().try_into()?);
    let response = record_error(self.0.create_volume(request).await)?
      .record_response()
      .try_into()?;
    Ok(tonic::Response::new(response))
  }

  #[instrument(
    name = "controller.delete_volume",
    skip(self, request),
    fields(request, error)
  )]
  async fn delete_volume(
    &self,
    request: tonic::Request<proto::DeleteVolumeRequest>,
  ) -> Result<tonic::Response<proto::DeleteVolumeResponse>, tonic::Status> {
    let request = record_request(request.into_inner().try_into()?);
    record_error(self.0.delete_volume(request).await)?;
    Ok(tonic::Response::new(proto::DeleteVolumeResponse {}))
  }

  #[instrument(
    name = "controller.controller_publish_volume",
    skip(self, request),
    fields(request, response)
  )]
  async fn controller_publish_volume(
    &self,
    request: tonic::Request<proto::ControllerPublishVolumeRequest>,
  ) -> Result<tonic::Response<proto::ControllerPublishVolumeResponse>, tonic::Status> {
    let request = record_request(request.into_inner().try_into()?);
    let response = self
      .0
      .controller_publish_volume(request)
      .await?
      .record_response()
      .into();
    Ok(tonic::Response::new(response))
  }

  #[instrument(
    name = "controller.controller_unpublish_volume",
    skip(self, request),
    fields(request)
  )]
  async fn controller_unpublish_volume(
    &self,
    request: tonic::Request<proto::ControllerUnpublishVolumeRequest>,
  ) -> Result<tonic::Response<proto::ControllerUnpublishVolumeResponse>, tonic::Status> {
    let request = record_request(request.into_inner().try_into()?);
    self.0.controller_unpublish_volume(request).await?;
    Ok(tonic::Response::new(
      proto::ControllerUnpublishVolumeResponse {},
    ))
  }

  #[instrument(name = "controller.validate_volume_capabilities", skip_all)]
  async fn validate_volume_capabilities(
    &self,
    _request: tonic::Request<proto::ValidateVolumeCapabilitiesRequest>,
  ) -> Result<tonic::Response<proto::ValidateVolumeCapabilitiesResponse>, tonic::Status> {
    unsupported!("ValidateVolumeCapabilities")
  }

  #[instrument(name = "controller.list_volumes", skip_all)]
  async fn list_volumes(
    &self,
    _request: tonic::Request<proto::ListVolumesRequest>,
  ) -> Result<tonic::Response<proto::ListVolumesResponse>, tonic::Status> {
    unsupported!("ListVolumes")
  }

  #[instrument(name = "controller.get_capacity", skip_all)]
  async fn get_capacity(
    &self,
    _request: tonic::Request<proto::GetCapacityRequest>,
  ) -> Result<tonic::Response<proto::GetCapacityResponse>, tonic::Status> {
    unsupported!("GetCapacity")
  }

  #[instrument(
    name = "controller.controller_get_capabilities",
    skip(self, _request),
    fields(response)
  )]
  async fn controller_get_capabilities(
    &self,
    _request: tonic::Request<proto::ControllerGetCapabilitiesRequest>,
  ) -> Result<tonic::Response<proto::ControllerGetCapabilitiesResponse>, tonic::Status> {
    let response = self.0.capabilities().record_response().into();
    Ok(tonic::Response::new(response))
  }

  #[instrument(name = "controller.create_snapshot", skip_all)]
  async fn create_snapshot(
    &self,
    _request: tonic::Request<proto::CreateSnapshotRequest>,
  ) -> Result<tonic::Response<proto::CreateSnapshotResponse>, tonic::Status> {
    unsupported!("CreateSnapshot")
  }

  #[instrument(name = "controller.delete_snapshot", skip_all)]
  async fn delete_snapshot(
    &self,
    _request: tonic::Request<proto::DeleteSnapshotRequest>,
  ) -> Result<tonic::Response<proto::DeleteSnapshotResponse>, tonic::Status> {
    unsupported!("DeleteSnapshot")
  }

  #[instrument(name = "controller.list_snapshots", skip_all)]
  async fn list_snapshots(
    &self,
    _request: tonic::Request<proto::ListSnapshotsRequest>,
  ) -> Result<tonic::Response<proto::ListSnapshotsResponse>, tonic::Status> {
    unsupported!("ListSnapshots")
  }

  #[instrument(
    name = "controller.controller_expand_volume",
    skip(self, request),
    fields(request, response, error)
  )]
  async fn controller_expand_volume(
    &self,
    request: tonic::Request<proto::ControllerExpandVolumeRequest>,
  ) -> Result<tonic::Response<proto::ControllerExpandVolumeResponse>, tonic::Status> {
    let request = record_request(request.into_inner().try_into()?);
    let response = record_error(self.0.controller_expand_volume(request).await)?
      .record_response()
      .into();
    Ok(tonic::Response::new(response))
  }

  #[instrument(name = "controller.controller_get_volume", skip_all)]
  async fn controller_get_volume(
    &self,
    _request: tonic::Request<proto::ControllerGetVolumeRequest>,
  ) -> Result<tonic::Response<proto::ControllerGetVolumeResponse>, tonic::Status> {
    unsupported!("ControllerGetVolume")
  }
}
