//! YAML output of the custom resource definitions served by the provider.

use std::io::Write;

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::CustomResourceExt;
use snafu::{ResultExt, Snafu};

use crate::apis::{ClusterProviderConfig, ProviderConfig, ProviderConfigUsage, service::Service};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to serialize CRD {name:?} as YAML"))]
    SerializeYaml {
        source: serde_yaml::Error,
        name: String,
    },

    #[snafu(display("failed to write YAML document separator"))]
    WriteDocumentSeparator { source: std::io::Error },

    #[snafu(display("failed to write YAML to stdout"))]
    WriteToStdout { source: std::io::Error },
}

/// All definitions, cluster-wide provider configuration first.
pub fn definitions() -> Vec<CustomResourceDefinition> {
    vec![
        ProviderConfig::crd(),
        ClusterProviderConfig::crd(),
        ProviderConfigUsage::crd(),
        Service::crd(),
    ]
}

/// Writes `crds` as explicit YAML documents, each starting with `---`.
pub fn write_yaml<W: Write>(crds: &[CustomResourceDefinition], mut writer: W) -> Result<()> {
    for crd in crds {
        writer
            .write_all(b"---\n")
            .context(WriteDocumentSeparatorSnafu)?;
        serde_yaml::to_writer(&mut writer, crd).with_context(|_| SerializeYamlSnafu {
            name: crd.metadata.name.clone().unwrap_or_default(),
        })?;
    }
    Ok(())
}

pub fn print_yaml() -> Result<()> {
    let mut buffer = Vec::new();
    write_yaml(&definitions(), &mut buffer)?;
    std::io::stdout()
        .write_all(&buffer)
        .context(WriteToStdoutSnafu)
}
