//! The Terraform provider schema document, as printed by `terraform providers schema -json`.
//!
//! Only the parts the provider works with are typed. Everything else is carried along
//! untouched so the document can be written back.

use std::{collections::BTreeMap, path::Path};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use snafu::{ResultExt, Snafu};
use tracing::{debug, info};

/// Attributes typed as `cty.DynamicPseudoType`, which have no CRD schema equivalent. They only
/// hold optional local metadata.
pub const DYNAMIC_FIELDS: [&str; 2] = ["local_field", "local_field_sensitive"];

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to read schema file {path:?}"))]
    ReadFile {
        source: std::io::Error,
        path: String,
    },

    #[snafu(display("failed to parse schema file {path:?}"))]
    ParseFile {
        source: serde_json::Error,
        path: String,
    },

    #[snafu(display("failed to serialize schema"))]
    Serialize { source: serde_json::Error },

    #[snafu(display("failed to write schema file {path:?}"))]
    WriteFile {
        source: std::io::Error,
        path: String,
    },
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ProviderSchemas {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub provider_schemas: BTreeMap<String, ProviderSchema>,

    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ProviderSchema {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub resource_schemas: BTreeMap<String, ResourceSchema>,

    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ResourceSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<Block>,

    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Block {
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub block_types: Map<String, Value>,

    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl ProviderSchemas {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read(path).context(ReadFileSnafu {
            path: path.display().to_string(),
        })?;
        serde_json::from_slice(&contents).context(ParseFileSnafu {
            path: path.display().to_string(),
        })
    }

    /// Writes the document as compact single-line JSON.
    pub fn write_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let contents = serde_json::to_vec(self).context(SerializeSnafu)?;
        std::fs::write(path, contents).context(WriteFileSnafu {
            path: path.display().to_string(),
        })
    }

    /// All resource schemas of all providers, keyed by resource name.
    pub fn resources(&self) -> impl Iterator<Item = (&String, &ResourceSchema)> {
        self.provider_schemas
            .values()
            .flat_map(|provider| provider.resource_schemas.iter())
    }

    /// Removes the [`DYNAMIC_FIELDS`] from every resource and returns the removed attribute
    /// names per resource. Resources without such attributes are not listed.
    pub fn remove_dynamic_fields(&mut self) -> BTreeMap<String, Vec<String>> {
        let mut removed = BTreeMap::new();

        for provider in self.provider_schemas.values_mut() {
            for (resource_name, resource) in &mut provider.resource_schemas {
                let Some(block) = resource.block.as_mut() else {
                    continue;
                };

                let fields: Vec<String> = DYNAMIC_FIELDS
                    .into_iter()
                    .filter(|field| block.attributes.remove(*field).is_some())
                    .map(ToOwned::to_owned)
                    .collect();

                if !fields.is_empty() {
                    debug!(resource = %resource_name, ?fields, "removed dynamic fields");
                    removed.insert(resource_name.clone(), fields);
                }
            }
        }

        removed
    }
}

/// Removes the [`DYNAMIC_FIELDS`] from the schema file at `path`.
///
/// The file is only rewritten if something was removed.
pub fn prune_schema_file(path: impl AsRef<Path>) -> Result<BTreeMap<String, Vec<String>>> {
    let path = path.as_ref();
    let mut schemas = ProviderSchemas::from_file(path)?;
    let removed = schemas.remove_dynamic_fields();

    if removed.is_empty() {
        info!(path = %path.display(), "no dynamic fields found to remove");
    } else {
        schemas.write_file(path)?;
        info!(
            path = %path.display(),
            resources = removed.len(),
            "removed dynamic type fields from schema"
        );
    }

    Ok(removed)
}
