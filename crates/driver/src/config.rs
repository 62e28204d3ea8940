//! Process-wide driver configuration.
//!
//! Built once at startup (see `main.rs`) and shared read-only behind an
//! `Arc`. Tests construct their own values, so nothing here is global.

use std::time::Duration;

pub const DEFAULT_DRIVER_NAME: &str = "csi.quobyte.com";
pub const DEFAULT_TENANT: &str = "My Tenant";
pub const DEFAULT_CONFIGURATION: &str = "BASE";
pub const DEFAULT_USER: &str = "root";
pub const DEFAULT_GROUP: &str = "nfsnobody";
/// Passed to the backend as the plain integer 777, not as an octal mode.
pub const DEFAULT_ACCESS_MODE: u32 = 777;
pub const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(30);

/// Values used for every volume parameter the storage class leaves unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeDefaults {
  pub tenant: String,
  pub configuration: String,
  pub user: String,
  pub group: String,
  pub access_mode: u32,
  pub create_quota: bool,
}

impl Default for VolumeDefaults {
  fn default() -> Self {
    VolumeDefaults {
      tenant: DEFAULT_TENANT.to_owned(),
      configuration: DEFAULT_CONFIGURATION.to_owned(),
      user: DEFAULT_USER.to_owned(),
      group: DEFAULT_GROUP.to_owned(),
      access_mode: DEFAULT_ACCESS_MODE,
      create_quota: false,
    }
  }
}

#[derive(Debug, Clone)]
pub struct DriverConfig {
  /// Reported through `GetPluginInfo`.
  pub driver_name: String,
  pub driver_version: String,
  /// Quobyte API endpoint, e.g. `http://quobyte-api.quobyte:7860`.
  pub api_url: String,
  /// Per-call timeout for Quobyte API requests.
  pub api_timeout: Duration,
  /// Use the PVC namespace forwarded by the provisioner sidecar as tenant,
  /// overriding the storage class.
  pub namespace_as_tenant: bool,
  pub defaults: VolumeDefaults,
}

impl Default for DriverConfig {
  fn default() -> Self {
    DriverConfig {
      driver_name: DEFAULT_DRIVER_NAME.to_owned(),
      driver_version: env!("CARGO_PKG_VERSION").to_owned(),
      api_url: String::new(),
      api_timeout: DEFAULT_API_TIMEOUT,
      namespace_as_tenant: false,
      defaults: VolumeDefaults::default(),
    }
  }
}
