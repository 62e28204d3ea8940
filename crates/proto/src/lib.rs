//! CSI v1 Identity and Controller plumbing for the Quobyte controller plugin.
//!
//! The generated tonic bindings live in [`proto`]. Drivers implement
//! [`IdentityService`] and [`ControllerService`] against validated request
//! types and hand the implementation to [`ControllerPlugin`], which owns the
//! gRPC surface, the tracing spans and the UNIMPLEMENTED answers.

macro_rules! unsupported {
  ($name:expr) => {{
    ::tracing::error!("Unsupported method {} called", $name);
    return Err(
      ::tonic::Status::new(
        ::tonic::Code::Unimplemented,
        format!("{}: not implemented by the Quobyte CSI controller", $name),
      )
      .into(),
    );
  }};
}

pub mod controller;
pub mod volume;

mod plugin;
mod secrets;
mod utils;

#[allow(clippy::all)]
pub mod proto {
  tonic::include_proto!("csi.v1");
}

use std::collections::HashMap;

use lazy_static::lazy_static;

pub use controller::{ControllerPlugin, ControllerService};

#[derive(Eq, Clone, Copy, PartialEq, Debug, Hash)]
pub enum VolumeExpansionSupport {
  None,
  Offline,
  Online,
}

pub trait IdentityService: Send + Sync + 'static {
  /// The name MUST follow domain name notation format
  /// (<https://tools.ietf.org/html/rfc1035#section-2.3.1>) and be 63
  /// characters or less.
  fn name(&self) -> &str;

  /// Plugin version. Value of this field is opaque to the CO.
  fn version(&self) -> &str;

  /// Whether volumes can be expanded, and if so whether the volume must be
  /// unpublished first.
  #[inline]
  fn volume_expansion_support(&self) -> VolumeExpansionSupport {
    VolumeExpansionSupport::None
  }

  #[inline]
  fn ready(&self) -> bool {
    true
  }

  #[inline]
  fn manifest(&self) -> &HashMap<String, String> {
    lazy_static! {
      static ref EMPTY_MANIFEST: HashMap<String, String> = HashMap::new();
    }

    &EMPTY_MANIFEST
  }
}
