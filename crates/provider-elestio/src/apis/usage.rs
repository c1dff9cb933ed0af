use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::apis::ProviderConfigReference;

/// Records that a managed resource uses a provider config.
///
/// One record exists per managed resource. It is named after the UID of that resource and
/// owned by it, so it is garbage collected together with the resource. A config with usage
/// records must not be deleted.
#[derive(Clone, CustomResource, Debug, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[kube(
    group = "elestio.crossplane.io",
    version = "v1beta1",
    kind = "ProviderConfigUsage",
    plural = "providerconfigusages",
    crates(
        kube_core = "kube::core",
        k8s_openapi = "k8s_openapi",
        schemars = "schemars"
    ),
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfigUsageSpec {
    /// The provider config that is used.
    pub provider_config_ref: ProviderConfigReference,

    /// The managed resource using the provider config.
    pub resource_ref: TypedReference,
}

#[derive(Clone, Debug, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}
