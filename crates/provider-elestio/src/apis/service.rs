//! The `Service` managed resource, an Elestio service provisioned through the
//! `elestio_service` Terraform resource.
//!
//! The nested `admin`, `database_admin`, `ssh_keys` and `ssh_public_keys` blocks of the
//! Terraform resource are not exposed, see [`crate::config::service`].

use std::borrow::Cow;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{CustomResource, Resource};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    apis::{Condition, LocalSecretReference, ProviderConfigReference},
    managed::{Managed, ModernManaged},
};

#[derive(Clone, CustomResource, Debug, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[kube(
    group = "service.elestio.crossplane.io",
    version = "v1alpha1",
    kind = "Service",
    plural = "services",
    status = "ServiceStatus",
    crates(
        kube_core = "kube::core",
        k8s_openapi = "k8s_openapi",
        schemars = "schemars"
    ),
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    /// Desired state of the Elestio service.
    pub for_provider: ServiceParameters,

    /// The provider config used to provision this service.
    ///
    /// Defaults to the `ClusterProviderConfig` named `default`.
    #[serde(default = "default_provider_config_ref")]
    pub provider_config_ref: Option<ProviderConfigReference>,

    /// The Secret the connection details of this service are written to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_connection_secret_to_ref: Option<LocalSecretReference>,
}

fn default_provider_config_ref() -> Option<ProviderConfigReference> {
    Some(ProviderConfigReference::default())
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceParameters {
    /// Elestio project the service belongs to.
    pub project_id: String,

    /// Name of the server, for example `postgresql-production`.
    pub server_name: String,

    /// Server size identifier of the cloud provider, for example `SMALL-1C-2G`.
    pub server_type: String,

    /// Template of the deployed software, for example `11` for PostgreSQL.
    pub template_id: i64,

    /// Version of the deployed software.
    pub version: String,

    /// Cloud provider, for example `hetzner` or `aws`.
    pub provider_name: String,

    /// Datacenter of the cloud provider, for example `fsn1`.
    pub datacenter: String,

    /// Support level, one of `level1`, `level2` or `level3`.
    pub support_level: String,

    /// Email address of the service administrator.
    pub admin_email: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_auto_updates_enabled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_auto_updates_enabled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backups_enabled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_backups_enabled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firewall_enabled: Option<bool>,

    /// Keep the backups after the service is deleted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_backups_on_delete_enabled: Option<bool>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    /// Observed state of the Elestio service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_provider: Option<ServiceObservation>,

    #[serde(default)]
    pub conditions: Vec<Condition>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceObservation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<String>,

    /// Canonical DNS name of the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cname: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_user: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl ServiceObservation {
    /// The observed attributes keyed by their Terraform attribute names.
    pub fn terraform_attributes(&self) -> Map<String, Value> {
        [
            ("id", &self.id),
            ("status", &self.status),
            ("ipv4", &self.ipv4),
            ("ipv6", &self.ipv6),
            ("cname", &self.cname),
            ("admin_email", &self.admin_email),
            ("admin_user", &self.admin_user),
            ("created_at", &self.created_at),
        ]
        .into_iter()
        .filter_map(|(key, value)| {
            value
                .as_ref()
                .map(|value| (key.to_owned(), Value::String(value.clone())))
        })
        .collect()
    }
}

impl Managed for Service {
    fn object_meta(&self) -> &ObjectMeta {
        self.meta()
    }

    fn api_version(&self) -> Cow<'_, str> {
        <Self as Resource>::api_version(&())
    }

    fn kind(&self) -> Cow<'_, str> {
        <Self as Resource>::kind(&())
    }

    fn as_modern(&self) -> Option<&dyn ModernManaged> {
        Some(self)
    }
}

impl ModernManaged for Service {
    fn provider_config_reference(&self) -> Option<&ProviderConfigReference> {
        self.spec.provider_config_ref.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::apis::ProviderConfigKind;

    #[test]
    fn test_provider_config_ref_defaults() {
        let input = indoc! {r#"
          forProvider:
            projectId: "1234"
            serverName: postgresql-production
            serverType: SMALL-1C-2G
            templateId: 11
            version: "16"
            providerName: hetzner
            datacenter: fsn1
            supportLevel: level1
            adminEmail: ops@example.com
        "#};

        let spec: ServiceSpec = serde_yaml::from_str(input).expect("Failed to parse valid spec");
        assert_eq!(
            spec.provider_config_ref,
            Some(ProviderConfigReference::new(
                ProviderConfigKind::ClusterProviderConfig,
                "default"
            ))
        );
    }

    #[test]
    fn test_explicit_null_provider_config_ref() {
        let input = indoc! {r#"
          forProvider:
            projectId: "1234"
            serverName: redis
            serverType: SMALL-1C-2G
            templateId: 12
            version: "7"
            providerName: hetzner
            datacenter: fsn1
            supportLevel: level1
            adminEmail: ops@example.com
          providerConfigRef: null
        "#};

        let spec: ServiceSpec = serde_yaml::from_str(input).expect("Failed to parse valid spec");
        assert_eq!(spec.provider_config_ref, None);
    }

    #[test]
    fn test_terraform_attributes_skip_unset_fields() {
        let observation = ServiceObservation {
            ipv4: Some("203.0.113.7".to_owned()),
            cname: Some("redis-u123.vm.elestio.app".to_owned()),
            ..ServiceObservation::default()
        };

        let attributes = observation.terraform_attributes();
        assert_eq!(attributes.len(), 2);
        assert_eq!(attributes["ipv4"], "203.0.113.7");
        assert_eq!(attributes["cname"], "redis-u123.vm.elestio.app");
    }

    #[test]
    fn test_service_is_modern_managed() {
        let service = Service::new(
            "redis",
            ServiceSpec {
                for_provider: ServiceParameters::default(),
                provider_config_ref: Some(ProviderConfigReference::new(
                    ProviderConfigKind::ProviderConfig,
                    "team-a",
                )),
                write_connection_secret_to_ref: None,
            },
        );

        assert_eq!(Managed::kind(&service), "Service");
        assert_eq!(
            Managed::api_version(&service),
            "service.elestio.crossplane.io/v1alpha1"
        );
        let modern = service.as_modern().expect("Service is a modern managed resource");
        assert_eq!(
            modern.provider_config_reference().map(|r| r.name.as_str()),
            Some("team-a")
        );
    }
}
