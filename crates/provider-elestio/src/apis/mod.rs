//! Kubernetes API types served by the provider.
//!
//! The `elestio.crossplane.io` group holds the provider configuration kinds
//! ([`ProviderConfig`], [`ClusterProviderConfig`]) and the usage records that
//! pin them ([`ProviderConfigUsage`]). Managed resources live in their own
//! groups below it, see [`service`].

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

mod provider_config;
pub mod service;
mod usage;

pub use provider_config::{
    ClusterProviderConfig, ClusterProviderConfigSpec, CredentialsSource, EnvSelector, FsSelector,
    ProviderConfig, ProviderConfigSpec, ProviderConfigStatus, ProviderCredentials,
    SecretKeySelector,
};
pub use usage::{ProviderConfigUsage, ProviderConfigUsageSpec, TypedReference};

/// API group of the provider configuration kinds.
pub const GROUP: &str = "elestio.crossplane.io";

/// Label put on every [`ProviderConfigUsage`], holding the name of the used config.
pub const LABEL_PROVIDER_CONFIG: &str = "elestio.crossplane.io/provider-config";

const DEFAULT_PROVIDER_CONFIG_NAME: &str = "default";

/// A reference from a managed resource to the configuration it is provisioned with.
///
/// The kind is kept as a plain string so that references to kinds this provider does not
/// serve survive deserialization and can be reported when the reference is resolved, see
/// [`ProviderConfigKind`].
#[derive(Clone, Debug, Deserialize, Eq, Hash, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfigReference {
    /// Name of the referenced config.
    pub name: String,

    /// Kind of the referenced config, either `ProviderConfig` or `ClusterProviderConfig`.
    #[serde(default = "ProviderConfigReference::default_kind")]
    pub kind: String,
}

impl ProviderConfigReference {
    pub fn new(kind: ProviderConfigKind, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.to_string(),
        }
    }

    fn default_kind() -> String {
        ProviderConfigKind::ClusterProviderConfig.to_string()
    }
}

impl Default for ProviderConfigReference {
    fn default() -> Self {
        Self::new(
            ProviderConfigKind::ClusterProviderConfig,
            DEFAULT_PROVIDER_CONFIG_NAME,
        )
    }
}

/// The kinds a [`ProviderConfigReference`] can point at.
#[derive(Clone, Copy, Debug, Display, EnumString, Eq, Hash, PartialEq)]
pub enum ProviderConfigKind {
    /// Namespaced, looked up in the namespace of the managed resource.
    ProviderConfig,

    /// Cluster scoped.
    ClusterProviderConfig,
}

/// Reference to a Secret in the namespace of the referring object.
#[derive(Clone, Debug, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalSecretReference {
    /// Name of the Secret.
    pub name: String,
}

/// A status condition, as reported on provider configs and managed resources.
#[derive(Clone, Debug, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of the condition, for example `Ready` or `Synced`.
    #[serde(rename = "type")]
    pub type_: String,

    /// One of `True`, `False` or `Unknown`.
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}
