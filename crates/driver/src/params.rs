//! Storage class parameters to typed volume parameters.
//!
//! Keys are matched case-insensitively and unknown keys are ignored, so a
//! storage class written for a newer driver still provisions. Every field
//! has a default, which makes an empty parameter map valid.

use crate::{config::VolumeDefaults, error::ProvisionError, tenant::PVC_NAMESPACE_KEY};
use std::{
  collections::{BTreeMap, HashMap},
  num::NonZeroU64,
};

pub const KEY_TENANT: &str = "quobytetenant";
pub const KEY_USER: &str = "user";
pub const KEY_GROUP: &str = "group";
pub const KEY_CONFIGURATION: &str = "quobyteconfig";
pub const KEY_CREATE_QUOTA: &str = "createquota";
pub const KEY_LABELS: &str = "labels";
pub const KEY_ACCESS_MODE: &str = "accessmode";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeParameters {
  /// Tenant name or UUID.
  pub tenant: String,
  pub configuration: String,
  pub user: String,
  pub group: String,
  pub access_mode: u32,
  pub labels: BTreeMap<String, String>,
  pub create_quota: bool,
}

impl VolumeParameters {
  pub fn from_defaults(defaults: &VolumeDefaults) -> Self {
    VolumeParameters {
      tenant: defaults.tenant.clone(),
      configuration: defaults.configuration.clone(),
      user: defaults.user.clone(),
      group: defaults.group.clone(),
      access_mode: defaults.access_mode,
      labels: BTreeMap::new(),
      create_quota: defaults.create_quota,
    }
  }

  /// Apply `parameters` on top of `defaults`.
  ///
  /// When two keys differ only in case, the one sorting last wins.
  pub fn resolve(
    parameters: &HashMap<String, String>,
    defaults: &VolumeDefaults,
  ) -> Result<Self, ProvisionError> {
    let mut resolved = VolumeParameters::from_defaults(defaults);

    let mut keys: Vec<_> = parameters.keys().collect();
    keys.sort();

    for key in keys {
      let value = &parameters[key];
      match key.to_ascii_lowercase().as_str() {
        KEY_TENANT => resolved.tenant = value.clone(),
        KEY_USER => resolved.user = value.clone(),
        KEY_GROUP => resolved.group = value.clone(),
        KEY_CONFIGURATION => resolved.configuration = value.clone(),
        KEY_CREATE_QUOTA => resolved.create_quota = value.eq_ignore_ascii_case("true"),
        KEY_LABELS => resolved.labels = parse_labels(value)?,
        KEY_ACCESS_MODE => resolved.access_mode = parse_access_mode(value)?,
        _ => {}
      }
    }

    Ok(resolved)
  }
}

fn parse_access_mode(value: &str) -> Result<u32, ProvisionError> {
  value.parse().map_err(|e| {
    ProvisionError::invalid_argument(format!(
      "parameter '{}' must be an unsigned 32 bit integer, got '{}': {}",
      KEY_ACCESS_MODE, value, e
    ))
  })
}

/// Parses `key:value[,key:value...]`. Whitespace around keys and values is
/// dropped; an empty string is an empty label set.
pub fn parse_labels(value: &str) -> Result<BTreeMap<String, String>, ProvisionError> {
  let mut labels = BTreeMap::new();
  if value.trim().is_empty() {
    return Ok(labels);
  }

  for entry in value.split(',') {
    let parts: Vec<_> = entry.split(':').collect();
    match parts.as_slice() {
      [key, value] if !key.trim().is_empty() => {
        labels.insert(key.trim().to_owned(), value.trim().to_owned());
      }
      _ => {
        return Err(ProvisionError::invalid_argument(format!(
          "label '{}' in parameter '{}' is not in the form key:value",
          entry, KEY_LABELS
        )))
      }
    }
  }

  Ok(labels)
}

/// A CreateVolume call after parameter resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreationRequest {
  pub name: String,
  /// Requested size, `None` when the CO left it open.
  pub capacity: Option<NonZeroU64>,
  pub parameters: VolumeParameters,
  /// PVC namespace forwarded by the provisioner sidecar, if it did.
  pub namespace: Option<String>,
}

impl CreationRequest {
  pub fn resolve(
    name: impl Into<String>,
    capacity: Option<NonZeroU64>,
    parameters: &HashMap<String, String>,
    defaults: &VolumeDefaults,
  ) -> Result<Self, ProvisionError> {
    Ok(CreationRequest {
      name: name.into(),
      capacity,
      parameters: VolumeParameters::resolve(parameters, defaults)?,
      namespace: parameters.get(PVC_NAMESPACE_KEY).cloned(),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use test_case::test_case;

  fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect()
  }

  fn resolve(pairs: &[(&str, &str)]) -> Result<VolumeParameters, ProvisionError> {
    VolumeParameters::resolve(&params(pairs), &VolumeDefaults::default())
  }

  #[test]
  fn empty_map_yields_defaults() {
    let resolved = resolve(&[]).unwrap();

    assert_eq!(resolved.tenant, "My Tenant");
    assert_eq!(resolved.configuration, "BASE");
    assert_eq!(resolved.user, "root");
    assert_eq!(resolved.group, "nfsnobody");
    assert_eq!(resolved.access_mode, 777);
    assert!(resolved.labels.is_empty());
    assert!(!resolved.create_quota);
  }

  #[test]
  fn defaults_come_from_configuration() {
    let defaults = VolumeDefaults {
      tenant: "ops".into(),
      configuration: "replicated".into(),
      ..VolumeDefaults::default()
    };

    let resolved = VolumeParameters::resolve(&HashMap::new(), &defaults).unwrap();
    assert_eq!(resolved.tenant, "ops");
    assert_eq!(resolved.configuration, "replicated");
  }

  #[test]
  fn every_known_key_is_applied() {
    let resolved = resolve(&[
      ("quobyteTenant", "team-a"),
      ("User", "alice"),
      ("GROUP", "staff"),
      ("quobyteConfig", "ssd"),
      ("createQuota", "TRUE"),
      ("labels", "env:prod, tier : gold"),
      ("accessMode", "750"),
    ])
    .unwrap();

    assert_eq!(resolved.tenant, "team-a");
    assert_eq!(resolved.user, "alice");
    assert_eq!(resolved.group, "staff");
    assert_eq!(resolved.configuration, "ssd");
    assert!(resolved.create_quota);
    assert_eq!(resolved.access_mode, 750);
    assert_eq!(resolved.labels.get("env").map(String::as_str), Some("prod"));
    assert_eq!(resolved.labels.get("tier").map(String::as_str), Some("gold"));
  }

  #[test]
  fn unknown_keys_are_ignored() {
    let resolved = resolve(&[("replicationFactor", "3"), (PVC_NAMESPACE_KEY, "ns")]).unwrap();
    assert_eq!(resolved, VolumeParameters::from_defaults(&VolumeDefaults::default()));
  }

  #[test_case("true" => true ; "lower")]
  #[test_case("True" => true ; "mixed")]
  #[test_case("false" => false ; "explicit false")]
  #[test_case("yes" => false ; "anything else")]
  #[test_case("" => false ; "empty")]
  fn create_quota_flag(value: &str) -> bool {
    resolve(&[("createquota", value)]).unwrap().create_quota
  }

  #[test_case("0" => Some(0) ; "zero")]
  #[test_case("777" => Some(777) ; "decimal")]
  #[test_case("4294967295" => Some(u32::MAX) ; "max")]
  #[test_case("4294967296" => None ; "overflow")]
  #[test_case("-1" => None ; "negative")]
  #[test_case("rwx" => None ; "not a number")]
  #[test_case("" => None ; "empty")]
  fn access_mode(value: &str) -> Option<u32> {
    match resolve(&[("accessmode", value)]) {
      Ok(v) => Some(v.access_mode),
      Err(ProvisionError::InvalidArgument(_)) => None,
      Err(e) => panic!("unexpected {:?}", e),
    }
  }

  #[test_case("" => Some(String::new()) ; "empty")]
  #[test_case("a:b" => Some("a=b".to_owned()) ; "single")]
  #[test_case(" a : b ,c:d" => Some("a=b;c=d".to_owned()) ; "trimmed")]
  #[test_case("a:" => Some("a=".to_owned()) ; "empty value")]
  #[test_case("a" => None ; "missing colon")]
  #[test_case("a:b:c" => None ; "too many colons")]
  #[test_case("a:b," => None ; "trailing comma")]
  #[test_case(":b" => None ; "empty key")]
  fn labels(value: &str) -> Option<String> {
    parse_labels(value).ok().map(|labels| {
      labels
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(";")
    })
  }

  #[test]
  fn malformed_labels_fail_resolution() {
    assert!(matches!(
      resolve(&[("labels", "nocolon")]),
      Err(ProvisionError::InvalidArgument(_))
    ));
  }

  #[test]
  fn creation_request_picks_up_namespace() {
    let request = CreationRequest::resolve(
      "pvc-1",
      NonZeroU64::new(1 << 30),
      &params(&[(PVC_NAMESPACE_KEY, "team-a")]),
      &VolumeDefaults::default(),
    )
    .unwrap();

    assert_eq!(request.name, "pvc-1");
    assert_eq!(request.capacity.map(NonZeroU64::get), Some(1 << 30));
    assert_eq!(request.namespace.as_deref(), Some("team-a"));
  }
}
