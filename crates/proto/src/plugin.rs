use crate::{proto, IdentityService, VolumeExpansionSupport};
use tracing::debug;

use proto::plugin_capability::{service, volume_expansion, Service, Type, VolumeExpansion};

/// Plugin capabilities for a plugin that serves the controller service.
pub(crate) fn get_capabilities(s: &impl IdentityService) -> proto::GetPluginCapabilitiesResponse {
  let mut capabilities = vec![proto::PluginCapability {
    r#type: Some(Type::Service(Service {
      r#type: service::Type::ControllerService.into(),
    })),
  }];

  let volume_expansion_support = s.volume_expansion_support();
  let expansion = match volume_expansion_support {
    VolumeExpansionSupport::None => None,
    VolumeExpansionSupport::Offline => Some(volume_expansion::Type::Offline),
    VolumeExpansionSupport::Online => Some(volume_expansion::Type::Online),
  };

  if let Some(expansion) = expansion {
    capabilities.push(proto::PluginCapability {
      r#type: Some(Type::VolumeExpansion(VolumeExpansion {
        r#type: expansion.into(),
      })),
    });
  }

  debug!(?volume_expansion_support, count = capabilities.len());
  proto::GetPluginCapabilitiesResponse { capabilities }
}
