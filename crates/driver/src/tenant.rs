use crate::{
  backend::{Backend, BackendError},
  error::ProvisionError,
  params::CreationRequest,
};
use tracing::debug;

/// Metadata key the external provisioner sets when started with
/// `--extra-create-metadata`.
pub const PVC_NAMESPACE_KEY: &str = "csi.storage.k8s.io/pvc/namespace";

/// A tenant as named by the request, together with its UUID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantIdentity {
  pub name: String,
  pub uuid: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TenantResolver {
  namespace_as_tenant: bool,
}

impl TenantResolver {
  pub fn new(namespace_as_tenant: bool) -> Self {
    TenantResolver {
      namespace_as_tenant,
    }
  }

  /// The tenant name or UUID a creation request targets.
  ///
  /// In namespace mode the PVC namespace replaces the storage class tenant
  /// and must be present.
  pub fn select<'a>(&self, request: &'a CreationRequest) -> Result<&'a str, ProvisionError> {
    if !self.namespace_as_tenant {
      return Ok(&request.parameters.tenant);
    }

    request.namespace.as_deref().ok_or_else(|| {
      ProvisionError::failed_precondition(format!(
        "mapping namespaces to tenants requires '{}' in the request parameters; \
         deploy csi-provisioner with --extra-create-metadata=true and retry",
        PVC_NAMESPACE_KEY
      ))
    })
  }

  /// Resolve the request's tenant to its UUID. Nothing is cached.
  pub async fn resolve<B: Backend + ?Sized>(
    &self,
    backend: &B,
    request: &CreationRequest,
  ) -> Result<TenantIdentity, ProvisionError> {
    let name = self.select(request)?;
    let uuid = backend
      .resolve_tenant(name)
      .await
      .map_err(|e| match e {
        BackendError::NotFound(_) => BackendError::NotFound(format!("tenant '{}'", name)),
        e => e,
      })?;

    debug!(tenant = name, %uuid, "Resolved tenant");
    Ok(TenantIdentity {
      name: name.to_owned(),
      uuid,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{backend::FakeBackend, config::VolumeDefaults};
  use std::collections::HashMap;

  fn request(pairs: &[(&str, &str)]) -> CreationRequest {
    let parameters: HashMap<_, _> = pairs
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect();

    CreationRequest::resolve("pvc-1", None, &parameters, &VolumeDefaults::default()).unwrap()
  }

  #[test]
  fn storage_class_tenant_by_default() {
    let request = request(&[("quobytetenant", "team-a"), (PVC_NAMESPACE_KEY, "ns")]);
    assert_eq!(TenantResolver::new(false).select(&request).unwrap(), "team-a");
  }

  #[test]
  fn namespace_overrides_tenant() {
    let request = request(&[("quobytetenant", "team-a"), (PVC_NAMESPACE_KEY, "ns")]);
    assert_eq!(TenantResolver::new(true).select(&request).unwrap(), "ns");
  }

  #[test]
  fn namespace_mode_requires_namespace() {
    let request = request(&[("quobytetenant", "team-a")]);
    assert!(matches!(
      TenantResolver::new(true).select(&request),
      Err(ProvisionError::FailedPrecondition(_))
    ));
  }

  #[tokio::test]
  async fn resolves_to_uuid() {
    let backend = FakeBackend::new();
    let uuid = backend.add_tenant("My Tenant");

    let tenant = TenantResolver::default()
      .resolve(&backend, &request(&[]))
      .await
      .unwrap();

    assert_eq!(
      tenant,
      TenantIdentity {
        name: "My Tenant".into(),
        uuid
      }
    );
  }

  #[tokio::test]
  async fn unknown_tenant_is_not_found() {
    let backend = FakeBackend::new();

    let err = TenantResolver::default()
      .resolve(&backend, &request(&[("quobytetenant", "nobody")]))
      .await
      .unwrap_err();

    match err {
      ProvisionError::Backend(BackendError::NotFound(what)) => assert_eq!(what, "tenant 'nobody'"),
      other => panic!("unexpected {:?}", other),
    }
  }

  #[tokio::test]
  async fn every_call_resolves_again() {
    let backend = FakeBackend::with_tenants(vec!["My Tenant"]);
    let resolver = TenantResolver::default();

    resolver.resolve(&backend, &request(&[])).await.unwrap();
    resolver.resolve(&backend, &request(&[])).await.unwrap();
    assert_eq!(backend.actions().len(), 2);
  }
}
