//! Access to the Kubernetes API.
//!
//! Everything the provider reads from or writes to the API server goes through
//! [`ProviderClient`], so the setup path can run against a mock in tests.

use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::{
    Api, ResourceExt,
    api::{Patch, PatchParams},
};
#[cfg(test)]
use mockall::automock;
use serde::de::DeserializeOwned;
use snafu::{OptionExt, ResultExt, Snafu};

use crate::apis::{ClusterProviderConfig, ProviderConfig, ProviderConfigUsage, service::Service};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to get {kind} {name:?}"))]
    GetObject {
        source: kube::Error,
        kind: String,
        name: String,
        namespace: Option<String>,
    },

    #[snafu(display("failed to apply {kind} {name:?}"))]
    ApplyObject {
        source: kube::Error,
        kind: String,
        name: String,
    },

    #[snafu(display("object {kind} {name:?} has no namespace"))]
    ObjectHasNoNamespace { kind: String, name: String },
}

/// The Kubernetes operations needed to resolve provider configs.
///
/// Reads of objects that do not exist return `Ok(None)`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn get_provider_config(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<ProviderConfig>>;

    async fn get_cluster_provider_config(
        &self,
        name: &str,
    ) -> Result<Option<ClusterProviderConfig>>;

    async fn get_secret(&self, name: &str, namespace: &str) -> Result<Option<Secret>>;

    async fn get_usage(&self, name: &str, namespace: &str) -> Result<Option<ProviderConfigUsage>>;

    /// Creates or updates the usage record using server-side apply.
    async fn apply_usage(&self, usage: &ProviderConfigUsage) -> Result<ProviderConfigUsage>;

    async fn get_service(&self, name: &str, namespace: &str) -> Result<Option<Service>>;
}

/// [`ProviderClient`] backed by a [`kube::Client`].
#[derive(Clone)]
pub struct KubeProviderClient {
    client: kube::Client,
    apply_patch_params: PatchParams,
}

impl KubeProviderClient {
    pub fn new(client: kube::Client, field_manager: &str) -> Self {
        Self {
            client,
            apply_patch_params: PatchParams::apply(field_manager).force(),
        }
    }

    async fn get_opt<K>(
        &self,
        api: Api<K>,
        name: &str,
        namespace: Option<&str>,
    ) -> Result<Option<K>>
    where
        K: kube::Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug,
    {
        api.get_opt(name).await.context(GetObjectSnafu {
            kind: K::kind(&()),
            name,
            namespace: namespace.map(ToOwned::to_owned),
        })
    }
}

#[async_trait]
impl ProviderClient for KubeProviderClient {
    async fn get_provider_config(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<ProviderConfig>> {
        let api = Api::namespaced(self.client.clone(), namespace);
        self.get_opt(api, name, Some(namespace)).await
    }

    async fn get_cluster_provider_config(
        &self,
        name: &str,
    ) -> Result<Option<ClusterProviderConfig>> {
        let api = Api::all(self.client.clone());
        self.get_opt(api, name, None).await
    }

    async fn get_secret(&self, name: &str, namespace: &str) -> Result<Option<Secret>> {
        let api = Api::namespaced(self.client.clone(), namespace);
        self.get_opt(api, name, Some(namespace)).await
    }

    async fn get_usage(&self, name: &str, namespace: &str) -> Result<Option<ProviderConfigUsage>> {
        let api = Api::namespaced(self.client.clone(), namespace);
        self.get_opt(api, name, Some(namespace)).await
    }

    async fn apply_usage(&self, usage: &ProviderConfigUsage) -> Result<ProviderConfigUsage> {
        let name = usage.name_any();
        let namespace = usage.namespace().context(ObjectHasNoNamespaceSnafu {
            kind: "ProviderConfigUsage",
            name: name.clone(),
        })?;

        let api: Api<ProviderConfigUsage> = Api::namespaced(self.client.clone(), &namespace);
        api.patch(&name, &self.apply_patch_params, &Patch::Apply(usage))
            .await
            .context(ApplyObjectSnafu {
                kind: "ProviderConfigUsage",
                name: &name,
            })
    }

    async fn get_service(&self, name: &str, namespace: &str) -> Result<Option<Service>> {
        let api = Api::namespaced(self.client.clone(), namespace);
        self.get_opt(api, name, Some(namespace)).await
    }
}
