//! Quobyte CSI controller plugin.
//!
//! Turns CSI CreateVolume/DeleteVolume/ControllerExpandVolume calls into
//! Quobyte API calls. The only state carried between calls is the volume
//! handle (see [`handle`]); everything else is resolved against the backend
//! on every request.

pub mod backend;
pub mod config;
pub mod controller;
pub mod error;
pub mod handle;
pub mod params;
pub mod provision;
pub mod server;
pub mod tenant;

mod locks;

pub use backend::{Backend, BackendError, Connector};
pub use config::{DriverConfig, VolumeDefaults};
pub use controller::QuobyteController;
pub use error::ProvisionError;
pub use handle::VolumeHandle;
pub use provision::{Provisioned, Provisioner};
