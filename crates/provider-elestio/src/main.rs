use std::collections::BTreeMap;

use clap::Parser;
use provider_elestio::{
    apis::service::Service,
    cli::{Command, Opts, SchemaArguments, ServiceSelector, SetupArguments},
    client::{self, KubeProviderClient, ProviderClient},
    clients::{self, TerraformSetupBuilder},
    config::{self, ConnectionDetailsError, schema::ProviderSchemas},
    crd, logging,
};
use snafu::{OptionExt, ResultExt, Snafu};
use tracing::info;

const APP_NAME: &str = "provider-elestio";
const LOG_ENV: &str = "ELESTIO_PROVIDER_LOG";

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to initialize logging"))]
    InitializeLogging { source: logging::Error },

    #[snafu(display("failed to print CRDs"))]
    PrintCrds { source: crd::Error },

    #[snafu(display("failed to prune Terraform provider schema"))]
    PruneSchema { source: config::schema::Error },

    #[snafu(display("failed to load Terraform provider schema"))]
    LoadSchema { source: config::schema::Error },

    #[snafu(display("failed to create Kubernetes client"))]
    CreateClient { source: kube::Error },

    #[snafu(display("failed to get Service {name:?} in namespace {namespace:?}"))]
    GetService {
        source: client::Error,
        name: String,
        namespace: String,
    },

    #[snafu(display("Service {name:?} in namespace {namespace:?} does not exist"))]
    ServiceNotFound { name: String, namespace: String },

    #[snafu(display("failed to build Terraform setup"))]
    BuildSetup { source: clients::Error },

    #[snafu(display("failed to derive connection details"))]
    DeriveConnectionDetails { source: ConnectionDetailsError },

    #[snafu(display("failed to serialize output as YAML"))]
    SerializeYaml { source: serde_yaml::Error },
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), Error> {
    let opts = Opts::parse();
    logging::initialize_logging(LOG_ENV, APP_NAME).context(InitializeLoggingSnafu)?;

    match opts.command {
        Command::Crd => crd::print_yaml().context(PrintCrdsSnafu)?,
        Command::PruneSchema(SchemaArguments { schema }) => {
            config::schema::prune_schema_file(&schema).context(PruneSchemaSnafu)?;
        }
        Command::Resources(SchemaArguments { schema }) => {
            let schemas = ProviderSchemas::from_file(&schema).context(LoadSchemaSnafu)?;
            let provider = config::get_provider(&schemas);
            let summaries: Vec<_> = provider
                .resources
                .values()
                .map(config::Resource::summary)
                .collect();
            print_yaml(&summaries)?;
        }
        Command::Setup(SetupArguments {
            service,
            credential_policy,
            field_manager,
            terraform,
        }) => {
            let client = kube_client(&field_manager).await?;
            let mg = get_service(&client, &service).await?;

            let builder = TerraformSetupBuilder::new(terraform.into(), credential_policy);
            info!(policy = %builder.policy(), "building Terraform setup");
            let setup = builder.setup(&client, &mg).await.context(BuildSetupSnafu)?;
            print_yaml(&setup.redacted())?;
        }
        Command::ConnectionDetails(service) => {
            let client = kube_client(APP_NAME).await?;
            let mg = get_service(&client, &service).await?;

            let attributes = mg
                .status
                .and_then(|status| status.at_provider)
                .map(|observation| observation.terraform_attributes())
                .unwrap_or_default();
            let details = config::service::connection_details(&attributes)
                .context(DeriveConnectionDetailsSnafu)?;
            let printable: BTreeMap<_, _> = details
                .iter()
                .map(|(key, value)| (key, String::from_utf8_lossy(value)))
                .collect();
            print_yaml(&printable)?;
        }
    }

    Ok(())
}

async fn kube_client(field_manager: &str) -> Result<KubeProviderClient, Error> {
    let client = kube::Client::try_default().await.context(CreateClientSnafu)?;
    Ok(KubeProviderClient::new(client, field_manager))
}

async fn get_service(
    client: &dyn ProviderClient,
    ServiceSelector { name, namespace }: &ServiceSelector,
) -> Result<Service, Error> {
    client
        .get_service(name, namespace)
        .await
        .context(GetServiceSnafu { name, namespace })?
        .context(ServiceNotFoundSnafu { name, namespace })
}

fn print_yaml<T: serde::Serialize>(value: &T) -> Result<(), Error> {
    let yaml = serde_yaml::to_string(value).context(SerializeYamlSnafu)?;
    print!("{yaml}");
    Ok(())
}
