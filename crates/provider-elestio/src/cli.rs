//! Command line interface of the provider binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::clients::{CredentialPolicy, ProviderIdentity};

pub const DEFAULT_TERRAFORM_VERSION: &str = "1.5.7";
pub const DEFAULT_TERRAFORM_PROVIDER_SOURCE: &str = "elestio/elestio";
pub const DEFAULT_FIELD_MANAGER: &str = "provider-elestio";

#[derive(Debug, Parser)]
#[command(author, version, about = "Crossplane provider for Elestio managed services")]
pub struct Opts {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Print CRD objects.
    Crd,

    /// Remove attributes of dynamic type from a Terraform provider schema file.
    PruneSchema(SchemaArguments),

    /// Print the resources configured from a Terraform provider schema file.
    Resources(SchemaArguments),

    /// Build the Terraform setup of a managed Service, with credentials redacted.
    Setup(SetupArguments),

    /// Print the connection details derived from the observed state of a managed Service.
    ConnectionDetails(ServiceSelector),
}

#[derive(Debug, PartialEq, Eq, Args)]
pub struct SchemaArguments {
    /// Path to the output of `terraform providers schema -json`.
    #[arg(long, short = 's', value_name = "FILE", env = "TERRAFORM_PROVIDER_SCHEMA")]
    pub schema: PathBuf,
}

#[derive(Debug, PartialEq, Eq, Args)]
pub struct ServiceSelector {
    /// Name of the Service.
    #[arg(long)]
    pub name: String,

    /// Namespace of the Service.
    #[arg(long, short = 'n', default_value = "default")]
    pub namespace: String,
}

#[derive(Debug, PartialEq, Eq, Args)]
pub struct SetupArguments {
    #[command(flatten)]
    pub service: ServiceSelector,

    /// How credentials are passed to the Terraform provider.
    #[arg(long, env, value_enum, default_value_t = CredentialPolicy::Resolved)]
    pub credential_policy: CredentialPolicy,

    /// Field manager of server-side applied ProviderConfigUsages.
    #[arg(long, env, default_value = DEFAULT_FIELD_MANAGER)]
    pub field_manager: String,

    #[command(flatten)]
    pub terraform: TerraformOptions,
}

#[derive(Debug, PartialEq, Eq, Args)]
pub struct TerraformOptions {
    /// Version of the Terraform CLI.
    #[arg(long, env, default_value = DEFAULT_TERRAFORM_VERSION)]
    pub terraform_version: semver::Version,

    /// Registry source of the Terraform provider.
    #[arg(long, env, default_value = DEFAULT_TERRAFORM_PROVIDER_SOURCE)]
    pub terraform_provider_source: String,

    /// Version of the Terraform provider.
    #[arg(long, env)]
    pub terraform_provider_version: String,
}

impl From<TerraformOptions> for ProviderIdentity {
    fn from(options: TerraformOptions) -> Self {
        Self {
            version: options.terraform_version.to_string(),
            source: options.terraform_provider_source,
            provider_version: options.terraform_provider_version,
        }
    }
}
