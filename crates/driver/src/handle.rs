//! The volume handle: the only state the CO carries between calls.
//!
//! CSI does not forward storage class parameters to `DeleteVolume` or
//! `ControllerExpandVolume`, so the tenant is stored next to the volume in the
//! returned volume id: `<tenant name or uuid>|<volume name or uuid>`.
//! Dynamically provisioned volumes always carry UUIDs; pre-provisioned
//! volumes may carry names. Which one it is gets sorted out by the backend.
//!
//! The tenant half is kept as the storage class supplied it. A handle that
//! names its tenant stops resolving once that tenant is renamed in Quobyte,
//! and so does a pre-provisioned handle that names its volume.

use std::{fmt, str::FromStr};
use thiserror::Error;

pub const SEPARATOR: char = '|';

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("volume handle '{0}' is not in the form Tenant|Volume")]
pub struct MalformedHandle(String);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VolumeHandle {
  tenant: String,
  volume: String,
}

impl VolumeHandle {
  pub fn new(tenant: impl Into<String>, volume: impl Into<String>) -> Self {
    VolumeHandle {
      tenant: tenant.into(),
      volume: volume.into(),
    }
  }

  /// Tenant name or UUID.
  #[inline]
  pub fn tenant(&self) -> &str {
    &self.tenant
  }

  /// Volume name or UUID.
  #[inline]
  pub fn volume(&self) -> &str {
    &self.volume
  }

  #[inline]
  pub fn into_parts(self) -> (String, String) {
    (self.tenant, self.volume)
  }
}

impl fmt::Display for VolumeHandle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}{}{}", self.tenant, SEPARATOR, self.volume)
  }
}

/// Splits on the first separator. Anything after it, further separators
/// included, belongs to the volume part.
impl FromStr for VolumeHandle {
  type Err = MalformedHandle;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.split_once(SEPARATOR) {
      Some((tenant, volume)) if !tenant.is_empty() && !volume.is_empty() => {
        Ok(VolumeHandle::new(tenant, volume))
      }
      _ => Err(MalformedHandle(s.to_owned())),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use test_case::test_case;

  #[test_case("tenantX|volY" => Ok(("tenantX".to_owned(), "volY".to_owned())) ; "names")]
  #[test_case(
    "0b1c4a8e-0000-4000-8000-000000000001|9f2d6c3a-0000-4000-8000-000000000002"
    => Ok((
      "0b1c4a8e-0000-4000-8000-000000000001".to_owned(),
      "9f2d6c3a-0000-4000-8000-000000000002".to_owned()
    ))
    ; "uuids")]
  #[test_case("My Tenant|pvc-1" => Ok(("My Tenant".to_owned(), "pvc-1".to_owned())) ; "spaces are kept")]
  #[test_case("a|b|c" => Ok(("a".to_owned(), "b|c".to_owned())) ; "first separator wins")]
  #[test_case("" => Err(()) ; "empty")]
  #[test_case("novolume" => Err(()) ; "no separator")]
  #[test_case("|vol" => Err(()) ; "empty tenant")]
  #[test_case("tenant|" => Err(()) ; "empty volume")]
  fn decode(handle: &str) -> Result<(String, String), ()> {
    handle
      .parse::<VolumeHandle>()
      .map(VolumeHandle::into_parts)
      .map_err(|_| ())
  }

  #[test]
  fn encode_joins_with_separator() {
    assert_eq!(VolumeHandle::new("t", "v").to_string(), "t|v");
  }

  #[test]
  fn round_trip() {
    let pairs = [
      ("My Tenant", "9f2d6c3a-0000-4000-8000-000000000002"),
      ("t", "v"),
      ("tenant/with/slashes", "volume name"),
    ];

    for (tenant, volume) in pairs.iter() {
      let encoded = VolumeHandle::new(*tenant, *volume).to_string();
      let decoded: VolumeHandle = encoded.parse().expect("round trip");
      assert_eq!((decoded.tenant(), decoded.volume()), (*tenant, *volume));
    }
  }

  #[test]
  fn error_names_the_handle() {
    let err = "novolume".parse::<VolumeHandle>().unwrap_err();
    assert_eq!(
      err.to_string(),
      "volume handle 'novolume' is not in the form Tenant|Volume"
    );
  }
}
