//! Configuration of the `elestio_service` resource.

use serde_json::{Map, Value};

use crate::config::{ConnectionDetails, ConnectionDetailsError, Provider, Resource};

pub const RESOURCE_NAME: &str = "elestio_service";

/// Schema fields without a CRD representation. Credentials and keys are managed in Elestio
/// itself and surface through connection details instead.
pub const ELIDED_FIELDS: [&str; 4] = ["admin", "database_admin", "ssh_keys", "ssh_public_keys"];

/// Terraform attributes copied into the connection secret, keyed by secret key.
const CONNECTION_ATTRIBUTES: [(&str, &str); 6] = [
    ("ipv4", "ipv4"),
    ("ipv6", "ipv6"),
    ("cname", "cname"),
    ("endpoint", "cname"),
    ("admin_email", "admin_email"),
    ("admin_user", "admin_user"),
];

pub fn configure(provider: &mut Provider) {
    provider.add_resource_configurator(RESOURCE_NAME, configure_resource);
}

fn configure_resource(resource: &mut Resource) {
    "service".clone_into(&mut resource.short_group);
    "Service".clone_into(&mut resource.kind);

    for field in ELIDED_FIELDS {
        resource.terraform_resource.schema.remove(field);
    }

    resource.sensitive.additional_connection_details_fn = Some(connection_details);
}

/// Publishes the addresses and admin identity of a service. Attributes that are missing, empty
/// or not strings are skipped.
pub fn connection_details(
    attributes: &Map<String, Value>,
) -> Result<ConnectionDetails, ConnectionDetailsError> {
    Ok(CONNECTION_ATTRIBUTES
        .into_iter()
        .filter_map(|(key, attribute)| {
            attributes
                .get(attribute)
                .and_then(Value::as_str)
                .filter(|value| !value.is_empty())
                .map(|value| (key.to_owned(), value.as_bytes().to_vec()))
        })
        .collect())
}
