//! Capabilities of managed resources.
//!
//! Resources are queried for what they support instead of being matched against concrete
//! types. Only resources that expose a [`ModernManaged`] view can be set up with resolved
//! credentials.

use std::borrow::Cow;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::apis::ProviderConfigReference;

/// A Kubernetes object representing an externally provisioned infrastructure object.
pub trait Managed: Send + Sync {
    fn object_meta(&self) -> &ObjectMeta;

    fn api_version(&self) -> Cow<'_, str>;

    fn kind(&self) -> Cow<'_, str>;

    /// Returns the modern view of this resource, if it supports one.
    fn as_modern(&self) -> Option<&dyn ModernManaged> {
        None
    }
}

/// A managed resource which references its provider config by kind and name and lives in a
/// namespace.
pub trait ModernManaged: Managed {
    fn provider_config_reference(&self) -> Option<&ProviderConfigReference>;
}
