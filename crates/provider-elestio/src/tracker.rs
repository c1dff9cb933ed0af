//! Tracking which managed resources use which provider config.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use snafu::{OptionExt, ResultExt, Snafu, ensure};
use tracing::debug;

use crate::{
    apis::{
        LABEL_PROVIDER_CONFIG, ProviderConfigReference, ProviderConfigUsage,
        ProviderConfigUsageSpec, TypedReference,
    },
    client::{self, ProviderClient},
    managed::Managed,
};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("managed resource {name:?} has no UID"))]
    MissingUid { name: String },

    #[snafu(display("managed resource {name:?} has no namespace"))]
    MissingNamespace { name: String },

    #[snafu(display("failed to read ProviderConfigUsage {usage:?}"))]
    GetUsage { source: client::Error, usage: String },

    #[snafu(display("ProviderConfigUsage {usage:?} is controlled by another object"))]
    NotControllable { usage: String },

    #[snafu(display("failed to apply ProviderConfigUsage {usage:?}"))]
    ApplyUsage { source: client::Error, usage: String },
}

/// Records [`ProviderConfigUsage`]s for managed resources.
pub struct ProviderConfigUsageTracker<'a> {
    client: &'a dyn ProviderClient,
}

impl<'a> ProviderConfigUsageTracker<'a> {
    pub fn new(client: &'a dyn ProviderClient) -> Self {
        Self { client }
    }

    /// Ensures a usage record links `mg` to the config named by `reference`.
    ///
    /// An existing record that already points at `reference` is left alone. A record owned by
    /// an object other than `mg` is never taken over.
    pub async fn track(&self, mg: &dyn Managed, reference: &ProviderConfigReference) -> Result<()> {
        let meta = mg.object_meta();
        let name = meta.name.clone().unwrap_or_default();
        let uid = meta
            .uid
            .as_deref()
            .context(MissingUidSnafu { name: &name })?;
        let namespace = meta
            .namespace
            .as_deref()
            .context(MissingNamespaceSnafu { name: &name })?;

        let current = self
            .client
            .get_usage(uid, namespace)
            .await
            .context(GetUsageSnafu { usage: uid })?;

        if let Some(current) = current {
            ensure!(
                is_controllable_by(&current, uid),
                NotControllableSnafu { usage: uid }
            );
            if &current.spec.provider_config_ref == reference {
                debug!(usage = uid, "ProviderConfigUsage is up to date");
                return Ok(());
            }
        }

        let usage = desired_usage(mg, &name, uid, namespace, reference);
        self.client
            .apply_usage(&usage)
            .await
            .context(ApplyUsageSnafu { usage: uid })?;

        debug!(
            usage = uid,
            provider_config.kind = %reference.kind,
            provider_config.name = %reference.name,
            "tracked ProviderConfigUsage"
        );
        Ok(())
    }
}

/// An object without a controller can be adopted, otherwise only its controller may update it.
fn is_controllable_by(usage: &ProviderConfigUsage, uid: &str) -> bool {
    usage
        .metadata
        .owner_references
        .iter()
        .flatten()
        .find(|owner| owner.controller == Some(true))
        .is_none_or(|controller| controller.uid == uid)
}

fn desired_usage(
    mg: &dyn Managed,
    name: &str,
    uid: &str,
    namespace: &str,
    reference: &ProviderConfigReference,
) -> ProviderConfigUsage {
    let api_version = mg.api_version().into_owned();
    let kind = mg.kind().into_owned();

    let mut usage = ProviderConfigUsage::new(
        uid,
        ProviderConfigUsageSpec {
            provider_config_ref: reference.clone(),
            resource_ref: TypedReference {
                api_version: api_version.clone(),
                kind: kind.clone(),
                name: name.to_owned(),
                uid: Some(uid.to_owned()),
            },
        },
    );
    usage.metadata.namespace = Some(namespace.to_owned());
    usage.metadata.labels = Some(BTreeMap::from([(
        LABEL_PROVIDER_CONFIG.to_owned(),
        reference.name.clone(),
    )]));
    usage.metadata.owner_references = Some(vec![OwnerReference {
        api_version,
        kind,
        name: name.to_owned(),
        uid: uid.to_owned(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }]);
    usage
}
