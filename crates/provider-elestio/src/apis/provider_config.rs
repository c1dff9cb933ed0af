use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::apis::Condition;

/// Credentials for the Elestio API, scoped to a single namespace.
///
/// Managed resources in the same namespace reference it by name. A `secretRef` given here is
/// always read from the namespace of the referring managed resource, whatever namespace the
/// reference itself names.
#[derive(Clone, CustomResource, Debug, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[kube(
    group = "elestio.crossplane.io",
    version = "v1beta1",
    kind = "ProviderConfig",
    plural = "providerconfigs",
    status = "ProviderConfigStatus",
    crates(
        kube_core = "kube::core",
        k8s_openapi = "k8s_openapi",
        schemars = "schemars"
    ),
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfigSpec {
    /// Credentials required to authenticate against the Elestio API.
    pub credentials: ProviderCredentials,
}

/// Credentials for the Elestio API, usable from every namespace.
#[derive(Clone, CustomResource, Debug, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[kube(
    group = "elestio.crossplane.io",
    version = "v1beta1",
    kind = "ClusterProviderConfig",
    plural = "clusterproviderconfigs",
    status = "ProviderConfigStatus",
    crates(
        kube_core = "kube::core",
        k8s_openapi = "k8s_openapi",
        schemars = "schemars"
    )
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterProviderConfigSpec {
    /// Credentials required to authenticate against the Elestio API.
    pub credentials: ProviderCredentials,
}

/// Where the credential payload is read from.
///
/// The payload is a JSON object holding the `email` and `api_token` of the Elestio account.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCredentials {
    /// Source of the provider credentials.
    pub source: CredentialsSource,

    /// A key of a Secret. Required for the `Secret` source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<SecretKeySelector>,

    /// An environment variable of the provider process. Required for the `Environment` source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<EnvSelector>,

    /// A file on the filesystem of the provider process. Required for the `Filesystem` source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fs: Option<FsSelector>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Display, Eq, JsonSchema, PartialEq, Serialize)]
pub enum CredentialsSource {
    #[default]
    None,
    Secret,
    InjectedIdentity,
    Environment,
    Filesystem,
}

#[derive(Clone, Debug, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretKeySelector {
    /// Name of the Secret.
    pub name: String,

    /// Namespace of the Secret.
    pub namespace: String,

    /// The key to select.
    pub key: String,
}

#[derive(Clone, Debug, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvSelector {
    /// Name of the environment variable.
    pub name: String,
}

#[derive(Clone, Debug, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FsSelector {
    /// Path to the file.
    pub path: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfigStatus {
    /// The number of managed resources currently using this config.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<i64>,

    #[serde(default)]
    pub conditions: Vec<Condition>,
}
