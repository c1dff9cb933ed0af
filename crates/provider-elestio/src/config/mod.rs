//! Per-resource configuration of the Terraform resources exposed by the provider.
//!
//! A [`Provider`] holds one [`Resource`] per Terraform resource of the Elestio provider
//! schema. Resource configurators registered with
//! [`Provider::add_resource_configurator`] adjust these before CRDs are generated from them:
//! they rename API groups and kinds, drop schema fields that have no CRD representation and
//! declare how connection secrets are derived.

use std::collections::BTreeMap;

use convert_case::{Case, Casing};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::{
    apis::GROUP,
    config::schema::{ProviderSchemas, ResourceSchema},
};

pub mod schema;
pub mod service;

/// Prefix of every Terraform resource name of the Elestio provider.
pub const RESOURCE_PREFIX: &str = "elestio";

/// Connection secret data, keyed by secret key.
pub type ConnectionDetails = BTreeMap<String, Vec<u8>>;

pub type ConnectionDetailsError = Box<dyn std::error::Error + Send + Sync>;

/// Derives additional connection details from the Terraform attributes of a resource.
pub type ConnectionDetailsFn =
    fn(&Map<String, Value>) -> Result<ConnectionDetails, ConnectionDetailsError>;

pub type ResourceConfiguratorFn = fn(&mut Resource);

/// A Terraform schema element, keyed by name in [`TerraformResource::schema`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SchemaElement {
    Attribute(Value),

    /// A nested block.
    Block(Value),
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TerraformResource {
    pub schema: BTreeMap<String, SchemaElement>,
}

impl TerraformResource {
    fn from_schema(resource: &ResourceSchema) -> Self {
        let Some(block) = &resource.block else {
            return Self::default();
        };

        let attributes = block
            .attributes
            .iter()
            .map(|(name, schema)| (name.clone(), SchemaElement::Attribute(schema.clone())));
        let blocks = block
            .block_types
            .iter()
            .map(|(name, schema)| (name.clone(), SchemaElement::Block(schema.clone())));

        Self {
            schema: attributes.chain(blocks).collect(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Sensitive {
    pub additional_connection_details_fn: Option<ConnectionDetailsFn>,
}

/// Configuration of one Terraform resource.
#[derive(Clone, Debug)]
pub struct Resource {
    /// Terraform resource name, for example `elestio_service`.
    pub name: String,

    /// First label of the API group, completed by [`GROUP`].
    pub short_group: String,

    pub kind: String,

    pub terraform_resource: TerraformResource,

    pub sensitive: Sensitive,
}

impl Resource {
    /// A resource with the default group (the provider's own) and a kind derived from the
    /// resource name, for example `elestio_load_balancer` becomes `LoadBalancer`.
    pub fn new(name: &str, terraform_resource: TerraformResource) -> Self {
        let kind = name
            .strip_prefix(RESOURCE_PREFIX)
            .and_then(|rest| rest.strip_prefix('_'))
            .unwrap_or(name)
            .to_case(Case::Pascal);

        Self {
            name: name.to_owned(),
            short_group: RESOURCE_PREFIX.to_owned(),
            kind,
            terraform_resource,
            sensitive: Sensitive::default(),
        }
    }

    /// The full API group, for example `service.elestio.crossplane.io`.
    pub fn group(&self) -> String {
        if self.short_group.is_empty() || self.short_group == RESOURCE_PREFIX {
            GROUP.to_owned()
        } else {
            format!("{short_group}.{GROUP}", short_group = self.short_group)
        }
    }

    /// Derives the additional connection details from `attributes`, if the resource declares
    /// any.
    pub fn connection_details(
        &self,
        attributes: &Map<String, Value>,
    ) -> Result<ConnectionDetails, ConnectionDetailsError> {
        match self.sensitive.additional_connection_details_fn {
            Some(derive) => derive(attributes),
            None => Ok(ConnectionDetails::new()),
        }
    }

    pub fn summary(&self) -> ResourceSummary {
        ResourceSummary {
            name: self.name.clone(),
            group: self.group(),
            kind: self.kind.clone(),
            fields: self.terraform_resource.schema.keys().cloned().collect(),
            connection_details: self.sensitive.additional_connection_details_fn.is_some(),
        }
    }
}

/// Printable overview of a configured [`Resource`].
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSummary {
    pub name: String,
    pub group: String,
    pub kind: String,
    pub fields: Vec<String>,
    pub connection_details: bool,
}

#[derive(Debug, Default)]
pub struct Provider {
    pub resources: BTreeMap<String, Resource>,
    configurators: BTreeMap<String, Vec<ResourceConfiguratorFn>>,
}

impl Provider {
    /// Creates a resource for every Elestio resource in `schemas`.
    pub fn new(schemas: &ProviderSchemas) -> Self {
        let resources = schemas
            .resources()
            .filter(|(name, _)| name.starts_with(&format!("{RESOURCE_PREFIX}_")))
            .map(|(name, schema)| {
                (
                    name.clone(),
                    Resource::new(name, TerraformResource::from_schema(schema)),
                )
            })
            .collect();

        Self {
            resources,
            configurators: BTreeMap::new(),
        }
    }

    /// Registers a configurator for the resource `name`. Configurators of one resource run in
    /// registration order.
    pub fn add_resource_configurator(&mut self, name: &str, configurator: ResourceConfiguratorFn) {
        self.configurators
            .entry(name.to_owned())
            .or_default()
            .push(configurator);
    }

    /// Applies all registered configurators.
    pub fn configure_resources(&mut self) {
        for (name, configurators) in &self.configurators {
            let Some(resource) = self.resources.get_mut(name) else {
                warn!(resource = %name, "skipping configurators of unknown resource");
                continue;
            };

            for configure in configurators {
                configure(resource);
            }
            debug!(
                resource = %name,
                group = %resource.group(),
                kind = %resource.kind,
                "configured resource"
            );
        }
    }
}

/// Builds the provider with every resource configurator applied.
pub fn get_provider(schemas: &ProviderSchemas) -> Provider {
    let mut provider = Provider::new(schemas);
    service::configure(&mut provider);
    provider.configure_resources();
    provider
}
