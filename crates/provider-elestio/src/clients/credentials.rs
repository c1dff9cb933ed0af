//! Reading the credential payload a provider config points at.

use std::collections::BTreeMap;

use snafu::{OptionExt, ResultExt, Snafu};
use tracing::debug;
use zeroize::Zeroizing;

use crate::{
    apis::{CredentialsSource, ProviderCredentials},
    client::{self, ProviderClient},
};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("cannot extract from secret key when none specified"))]
    MissingSecretRef,

    #[snafu(display("cannot extract from environment variable when none specified"))]
    MissingEnvSelector,

    #[snafu(display("cannot extract from filesystem when no path specified"))]
    MissingFsSelector,

    #[snafu(display("failed to read credentials Secret {name:?} in namespace {namespace:?}"))]
    GetSecret {
        source: client::Error,
        name: String,
        namespace: String,
    },

    #[snafu(display("credentials Secret {name:?} in namespace {namespace:?} does not exist"))]
    SecretNotFound { name: String, namespace: String },

    #[snafu(display("credentials Secret {name:?} in namespace {namespace:?} has no key {key:?}"))]
    MissingSecretKey {
        name: String,
        namespace: String,
        key: String,
    },

    #[snafu(display("failed to read credentials from environment variable {name:?}"))]
    ReadEnvironment {
        source: std::env::VarError,
        name: String,
    },

    #[snafu(display("failed to read credentials from file {path:?}"))]
    ReadFile {
        source: std::io::Error,
        path: String,
    },

    #[snafu(display("credentials source {credentials_source} is not supported"))]
    UnsupportedSource {
        credentials_source: CredentialsSource,
    },
}

/// Reads the raw credential payload from wherever `credentials` points.
///
/// The `None` source yields an empty payload.
pub async fn extract_credentials(
    client: &dyn ProviderClient,
    credentials: &ProviderCredentials,
) -> Result<Zeroizing<Vec<u8>>> {
    debug!(source = %credentials.source, "extracting credentials");

    match credentials.source {
        CredentialsSource::None => Ok(Zeroizing::new(Vec::new())),
        CredentialsSource::Secret => {
            let selector = credentials.secret_ref.as_ref().context(MissingSecretRefSnafu)?;
            let secret = client
                .get_secret(&selector.name, &selector.namespace)
                .await
                .context(GetSecretSnafu {
                    name: &selector.name,
                    namespace: &selector.namespace,
                })?
                .context(SecretNotFoundSnafu {
                    name: &selector.name,
                    namespace: &selector.namespace,
                })?;

            secret
                .data
                .and_then(|mut data| data.remove(&selector.key))
                .map(|value| Zeroizing::new(value.0))
                .context(MissingSecretKeySnafu {
                    name: &selector.name,
                    namespace: &selector.namespace,
                    key: &selector.key,
                })
        }
        CredentialsSource::Environment => {
            let selector = credentials.env.as_ref().context(MissingEnvSelectorSnafu)?;
            let value = std::env::var(&selector.name).context(ReadEnvironmentSnafu {
                name: &selector.name,
            })?;
            Ok(Zeroizing::new(value.into_bytes()))
        }
        CredentialsSource::Filesystem => {
            let selector = credentials.fs.as_ref().context(MissingFsSelectorSnafu)?;
            let contents = tokio::fs::read(&selector.path)
                .await
                .context(ReadFileSnafu {
                    path: &selector.path,
                })?;
            Ok(Zeroizing::new(contents))
        }
        credentials_source @ CredentialsSource::InjectedIdentity => {
            UnsupportedSourceSnafu { credentials_source }.fail()
        }
    }
}

/// Decodes a credential payload as a flat JSON object of strings.
pub fn decode_credentials(payload: &[u8]) -> serde_json::Result<BTreeMap<String, String>> {
    serde_json::from_slice(payload)
}
