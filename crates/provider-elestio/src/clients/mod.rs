//! Terraform provider setup.
//!
//! Before the Terraform execution layer acts on a managed resource, it asks
//! [`TerraformSetupBuilder::setup`] for the identity of the Terraform provider to run and the
//! configuration to hand to it. With [`CredentialPolicy::Resolved`] the configuration holds the
//! Elestio credentials of the provider config the resource references:
//!
//! 1. the resource must expose a [`ModernManaged`](crate::managed::ModernManaged) view,
//! 2. which must carry a provider config reference,
//! 3. the referenced [`ProviderConfig`] or [`ClusterProviderConfig`] is fetched,
//! 4. a [`ProviderConfigUsage`](crate::apis::ProviderConfigUsage) is recorded,
//! 5. the credential payload is extracted, see [`credentials`],
//! 6. and decoded,
//! 7. and must contain a non-empty `email` and `api_token`.
//!
//! Any failing step ends the setup with an error. Retrying is left to the caller.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};
use snafu::{OptionExt, ResultExt, Snafu};
use tracing::{debug, instrument};

use crate::{
    apis::{ClusterProviderConfig, ProviderConfig, ProviderConfigKind, ProviderCredentials},
    client::{self, ProviderClient},
    managed::Managed,
    tracker::{self, ProviderConfigUsageTracker},
};

pub mod credentials;

/// Key of the account email in the credential payload and the provider configuration.
pub const KEY_EMAIL: &str = "email";

/// Key of the API token in the credential payload and the provider configuration.
pub const KEY_API_TOKEN: &str = "api_token";

const REDACTED: &str = "<redacted>";

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("cannot resolve provider config"))]
    ResolveProviderConfig { source: ResolveError },

    #[snafu(display("cannot extract credentials"))]
    ExtractCredentials { source: credentials::Error },

    #[snafu(display("cannot unmarshal credentials as JSON"))]
    DecodeCredentials { source: serde_json::Error },

    #[snafu(display("email is required in Elestio credentials"))]
    MissingEmail,

    #[snafu(display("api_token is required in Elestio credentials"))]
    MissingApiToken,
}

/// Failures of finding the provider config of a managed resource and recording its usage.
#[derive(Debug, Snafu)]
pub enum ResolveError {
    #[snafu(display("resource {kind} must be a modern managed resource"))]
    NotModernManaged { kind: String },

    #[snafu(display("no providerConfigRef provided"))]
    NoProviderConfigReference,

    #[snafu(display("unknown kind {kind:?} for ProviderConfig"))]
    UnknownProviderConfigKind {
        source: strum::ParseError,
        kind: String,
    },

    #[snafu(display("managed resource has no namespace to look up ProviderConfig {name:?} in"))]
    MissingManagedNamespace { name: String },

    #[snafu(display("cannot get referenced {kind} {name:?}"))]
    GetProviderConfig {
        source: client::Error,
        kind: ProviderConfigKind,
        name: String,
    },

    #[snafu(display("referenced {kind} {name:?} does not exist"))]
    ProviderConfigNotFound {
        kind: ProviderConfigKind,
        name: String,
    },

    #[snafu(display("cannot track ProviderConfig usage"))]
    TrackUsage { source: tracker::Error },
}

/// How the Terraform provider obtains its credentials.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, clap::ValueEnum, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum CredentialPolicy {
    /// Resolve the provider config of each managed resource and pass its credentials on.
    #[default]
    Resolved,

    /// Pass no credentials on. The Terraform provider reads `ELESTIO_EMAIL` and
    /// `ELESTIO_API_TOKEN` from the environment of the provider process.
    Environment,
}

/// Which Terraform provider to run, and with which Terraform version.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProviderIdentity {
    /// Version of the Terraform CLI.
    pub version: String,

    /// Registry source of the Terraform provider, for example `elestio/elestio`.
    pub source: String,

    /// Version constraint of the Terraform provider.
    pub provider_version: String,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct ProviderRequirement {
    pub source: String,
    pub version: String,
}

/// What the Terraform execution layer needs to run the provider for one managed resource.
#[derive(Clone, Default, Eq, PartialEq, Serialize)]
pub struct Setup {
    pub version: String,
    pub requirement: ProviderRequirement,
    pub configuration: Map<String, Value>,
}

impl Setup {
    /// A copy with every configuration value masked, for printing.
    pub fn redacted(&self) -> Self {
        Self {
            configuration: self
                .configuration
                .keys()
                .map(|key| (key.clone(), Value::from(REDACTED)))
                .collect(),
            ..self.clone()
        }
    }
}

// Configuration values are credentials.
impl fmt::Debug for Setup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Setup")
            .field("version", &self.version)
            .field("requirement", &self.requirement)
            .field("configuration", &self.configuration.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Builds the [`Setup`] of managed resources for one Terraform provider identity.
#[derive(Clone, Debug)]
pub struct TerraformSetupBuilder {
    identity: ProviderIdentity,
    policy: CredentialPolicy,
}

impl TerraformSetupBuilder {
    pub fn new(identity: ProviderIdentity, policy: CredentialPolicy) -> Self {
        Self { identity, policy }
    }

    pub fn policy(&self) -> CredentialPolicy {
        self.policy
    }

    /// Builds the setup for `mg`.
    ///
    /// Dropping the returned future cancels any pending API request.
    #[instrument(
        skip_all,
        fields(
            managed.kind = %mg.kind(),
            managed.name = mg.object_meta().name.as_deref(),
            managed.namespace = mg.object_meta().namespace.as_deref(),
            policy = %self.policy,
        )
    )]
    pub async fn setup(&self, client: &dyn ProviderClient, mg: &dyn Managed) -> Result<Setup> {
        let mut setup = Setup {
            version: self.identity.version.clone(),
            requirement: ProviderRequirement {
                source: self.identity.source.clone(),
                version: self.identity.provider_version.clone(),
            },
            configuration: Map::new(),
        };

        if self.policy == CredentialPolicy::Environment {
            debug!("leaving credentials to the environment of the Terraform provider");
            return Ok(setup);
        }

        let credentials = resolve_provider_config(client, mg)
            .await
            .context(ResolveProviderConfigSnafu)?;
        let payload = credentials::extract_credentials(client, &credentials)
            .await
            .context(ExtractCredentialsSnafu)?;
        let mut creds =
            credentials::decode_credentials(&payload).context(DecodeCredentialsSnafu)?;

        let email = creds
            .remove(KEY_EMAIL)
            .filter(|email| !email.is_empty())
            .context(MissingEmailSnafu)?;
        let api_token = creds
            .remove(KEY_API_TOKEN)
            .filter(|token| !token.is_empty())
            .context(MissingApiTokenSnafu)?;

        setup.configuration = Map::from_iter([
            (KEY_EMAIL.to_owned(), Value::String(email)),
            (KEY_API_TOKEN.to_owned(), Value::String(api_token)),
        ]);

        debug!("resolved Elestio credentials");
        Ok(setup)
    }
}

/// A fetched provider config of either kind.
enum ResolvedProviderConfig {
    Namespaced(ProviderConfig),
    Cluster(ClusterProviderConfig),
}

impl ResolvedProviderConfig {
    async fn fetch(
        client: &dyn ProviderClient,
        kind: ProviderConfigKind,
        name: &str,
        namespace: Option<&str>,
    ) -> Result<Self, ResolveError> {
        let resolved = match kind {
            ProviderConfigKind::ProviderConfig => {
                let namespace = namespace.context(MissingManagedNamespaceSnafu { name })?;
                client
                    .get_provider_config(name, namespace)
                    .await
                    .context(GetProviderConfigSnafu { kind, name })?
                    .map(Self::Namespaced)
            }
            ProviderConfigKind::ClusterProviderConfig => client
                .get_cluster_provider_config(name)
                .await
                .context(GetProviderConfigSnafu { kind, name })?
                .map(Self::Cluster),
        };

        resolved.context(ProviderConfigNotFoundSnafu { kind, name })
    }

    /// The credentials of the config. Secrets of a namespaced config are always read from the
    /// namespace of the managed resource.
    fn into_credentials(self, managed_namespace: Option<&str>) -> ProviderCredentials {
        match self {
            Self::Namespaced(pc) => {
                let mut credentials = pc.spec.credentials;
                if let (Some(secret_ref), Some(namespace)) =
                    (credentials.secret_ref.as_mut(), managed_namespace)
                {
                    namespace.clone_into(&mut secret_ref.namespace);
                }
                credentials
            }
            Self::Cluster(cpc) => cpc.spec.credentials,
        }
    }
}

async fn resolve_provider_config(
    client: &dyn ProviderClient,
    mg: &dyn Managed,
) -> Result<ProviderCredentials, ResolveError> {
    let modern = mg.as_modern().context(NotModernManagedSnafu {
        kind: mg.kind(),
    })?;
    let reference = modern
        .provider_config_reference()
        .context(NoProviderConfigReferenceSnafu)?;
    let kind = reference
        .kind
        .parse::<ProviderConfigKind>()
        .context(UnknownProviderConfigKindSnafu {
            kind: &reference.kind,
        })?;

    let namespace = mg.object_meta().namespace.as_deref();
    let resolved = ResolvedProviderConfig::fetch(client, kind, &reference.name, namespace).await?;

    ProviderConfigUsageTracker::new(client)
        .track(mg, reference)
        .await
        .context(TrackUsageSnafu)?;

    Ok(resolved.into_credentials(namespace))
}

#[cfg(test)]
mod tests {
    use std::{borrow::Cow, collections::BTreeMap};

    use k8s_openapi::{
        ByteString, api::core::v1::Secret, apimachinery::pkg::apis::meta::v1::ObjectMeta,
    };
    use rstest::rstest;

    use super::*;
    use crate::{
        apis::{
            ClusterProviderConfigSpec, CredentialsSource, ProviderConfigReference,
            ProviderConfigSpec, SecretKeySelector,
            service::{Service, ServiceParameters, ServiceSpec},
        },
        client::MockProviderClient,
    };

    const EMAIL: &str = "ops@example.com";
    const API_TOKEN: &str = "c2VjcmV0LXRva2Vu"; // pragma: allowlist secret

    fn identity() -> ProviderIdentity {
        ProviderIdentity {
            version: "1.5.7".to_owned(),
            source: "elestio/elestio".to_owned(),
            provider_version: "0.19.0".to_owned(),
        }
    }

    fn builder() -> TerraformSetupBuilder {
        TerraformSetupBuilder::new(identity(), CredentialPolicy::Resolved)
    }

    fn service(reference: Option<ProviderConfigReference>) -> Service {
        let mut service = Service::new(
            "redis",
            ServiceSpec {
                for_provider: ServiceParameters::default(),
                provider_config_ref: reference,
                write_connection_secret_to_ref: None,
            },
        );
        service.metadata.namespace = Some("team-a".to_owned());
        service.metadata.uid = Some("0b0b7c8e-0d0f-4c8e-9a57-3b0c3f7b5d1e".to_owned());
        service
    }

    fn secret_credentials(namespace: &str) -> ProviderCredentials {
        ProviderCredentials {
            source: CredentialsSource::Secret,
            secret_ref: Some(SecretKeySelector {
                name: "elestio-creds".to_owned(),
                namespace: namespace.to_owned(),
                key: "credentials".to_owned(),
            }),
            ..ProviderCredentials::default()
        }
    }

    fn credentials_secret(payload: &str) -> Secret {
        Secret {
            data: Some(BTreeMap::from([(
                "credentials".to_owned(),
                ByteString(payload.as_bytes().to_vec()),
            )])),
            ..Secret::default()
        }
    }

    fn provider_config(namespace: &str) -> ProviderConfig {
        let mut pc = ProviderConfig::new(
            "team-a",
            ProviderConfigSpec {
                credentials: secret_credentials(namespace),
            },
        );
        pc.metadata.namespace = Some("team-a".to_owned());
        pc
    }

    fn cluster_provider_config() -> ClusterProviderConfig {
        ClusterProviderConfig::new(
            "default",
            ClusterProviderConfigSpec {
                credentials: secret_credentials("crossplane-system"),
            },
        )
    }

    /// A client serving the default ClusterProviderConfig whose Secret holds `payload`.
    fn client_with_payload(payload: &'static str) -> MockProviderClient {
        let mut client = MockProviderClient::new();
        client
            .expect_get_cluster_provider_config()
            .returning(|_| Ok(Some(cluster_provider_config())));
        client.expect_get_usage().returning(|_, _| Ok(None));
        client
            .expect_apply_usage()
            .returning(|usage| Ok(usage.clone()));
        client
            .expect_get_secret()
            .withf(|name, namespace| name == "elestio-creds" && namespace == "crossplane-system")
            .returning(move |_, _| Ok(Some(credentials_secret(payload))));
        client
    }

    struct LegacyResource {
        metadata: ObjectMeta,
    }

    impl Managed for LegacyResource {
        fn object_meta(&self) -> &ObjectMeta {
            &self.metadata
        }

        fn api_version(&self) -> Cow<'_, str> {
            Cow::Borrowed("legacy.elestio.crossplane.io/v1alpha1")
        }

        fn kind(&self) -> Cow<'_, str> {
            Cow::Borrowed("LegacyResource")
        }
    }

    #[tokio::test]
    async fn test_setup_with_cluster_provider_config() {
        let client = client_with_payload(r#"{"email":"ops@example.com","api_token":"c2VjcmV0LXRva2Vu","region":"eu"}"#);

        let setup = builder()
            .setup(&client, &service(Some(ProviderConfigReference::default())))
            .await
            .expect("setup succeeds");

        assert_eq!(setup.version, "1.5.7");
        assert_eq!(
            setup.requirement,
            ProviderRequirement {
                source: "elestio/elestio".to_owned(),
                version: "0.19.0".to_owned(),
            }
        );
        assert_eq!(
            setup.configuration,
            Map::from_iter([
                (KEY_EMAIL.to_owned(), Value::from(EMAIL)),
                (KEY_API_TOKEN.to_owned(), Value::from(API_TOKEN)),
            ])
        );
    }

    #[tokio::test]
    async fn test_setup_reads_secret_from_managed_namespace() {
        let mut client = MockProviderClient::new();
        client
            .expect_get_provider_config()
            .withf(|name, namespace| name == "team-a" && namespace == "team-a")
            .returning(|_, _| Ok(Some(provider_config("somewhere-else"))));
        client.expect_get_usage().returning(|_, _| Ok(None));
        client
            .expect_apply_usage()
            .times(1)
            .returning(|usage| Ok(usage.clone()));
        client
            .expect_get_secret()
            .withf(|name, namespace| name == "elestio-creds" && namespace == "team-a")
            .returning(|_, _| {
                Ok(Some(credentials_secret(
                    r#"{"email":"ops@example.com","api_token":"c2VjcmV0LXRva2Vu"}"#,
                )))
            });

        let reference = ProviderConfigReference::new(ProviderConfigKind::ProviderConfig, "team-a");
        let setup = builder()
            .setup(&client, &service(Some(reference)))
            .await
            .expect("setup succeeds");

        assert_eq!(setup.configuration.len(), 2);
        assert_eq!(setup.configuration[KEY_EMAIL], EMAIL);
    }

    #[tokio::test]
    async fn test_setup_missing_provider_config_tracks_nothing() {
        let mut client = MockProviderClient::new();
        client
            .expect_get_cluster_provider_config()
            .returning(|_| Ok(None));
        client.expect_get_usage().never();
        client.expect_apply_usage().never();
        client.expect_get_secret().never();

        let err = builder()
            .setup(&client, &service(Some(ProviderConfigReference::default())))
            .await
            .expect_err("missing config must fail");

        assert!(matches!(
            err,
            Error::ResolveProviderConfig {
                source: ResolveError::ProviderConfigNotFound { .. }
            }
        ));
    }

    #[tokio::test]
    async fn test_setup_fails_when_usage_can_not_be_written() {
        let mut client = MockProviderClient::new();
        client
            .expect_get_cluster_provider_config()
            .returning(|_| Ok(Some(cluster_provider_config())));
        client.expect_get_usage().returning(|_, _| Ok(None));
        client.expect_apply_usage().times(1).returning(|_| {
            Err(client::Error::ObjectHasNoNamespace {
                kind: "ProviderConfigUsage".to_owned(),
                name: "0b0b7c8e-0d0f-4c8e-9a57-3b0c3f7b5d1e".to_owned(),
            })
        });
        client.expect_get_secret().never();

        let err = builder()
            .setup(&client, &service(Some(ProviderConfigReference::default())))
            .await
            .expect_err("failing usage write must fail the setup");

        assert!(matches!(
            err,
            Error::ResolveProviderConfig {
                source: ResolveError::TrackUsage {
                    source: tracker::Error::ApplyUsage { .. }
                }
            }
        ));
    }

    #[tokio::test]
    async fn test_setup_fails_when_provider_config_can_not_be_read() {
        let mut client = MockProviderClient::new();
        client
            .expect_get_cluster_provider_config()
            .times(1)
            .returning(|name| {
                Err(client::Error::ObjectHasNoNamespace {
                    kind: "ClusterProviderConfig".to_owned(),
                    name: name.to_owned(),
                })
            });
        client.expect_get_usage().never();
        client.expect_apply_usage().never();
        client.expect_get_secret().never();

        let err = builder()
            .setup(&client, &service(Some(ProviderConfigReference::default())))
            .await
            .expect_err("failing read must fail the setup");

        assert!(matches!(
            err,
            Error::ResolveProviderConfig {
                source: ResolveError::GetProviderConfig {
                    kind: ProviderConfigKind::ClusterProviderConfig,
                    ..
                }
            }
        ));
    }

    #[rstest]
    #[case(r#"{"email":"ops@example.com"}"#)]
    #[case(r#"{"email":"ops@example.com","api_token":""}"#)]
    #[tokio::test]
    async fn test_setup_missing_api_token(#[case] payload: &'static str) {
        let client = client_with_payload(payload);

        let err = builder()
            .setup(&client, &service(Some(ProviderConfigReference::default())))
            .await
            .expect_err("missing api token must fail");

        assert!(matches!(err, Error::MissingApiToken));
        assert_eq!(err.to_string(), "api_token is required in Elestio credentials");
    }

    #[rstest]
    #[case(r#"{"api_token":"c2VjcmV0LXRva2Vu"}"#)]
    #[case(r#"{"email":"","api_token":"c2VjcmV0LXRva2Vu"}"#)]
    #[tokio::test]
    async fn test_setup_missing_email(#[case] payload: &'static str) {
        let client = client_with_payload(payload);

        let err = builder()
            .setup(&client, &service(Some(ProviderConfigReference::default())))
            .await
            .expect_err("missing email must fail");

        assert!(matches!(err, Error::MissingEmail));
    }

    #[tokio::test]
    async fn test_setup_malformed_payload() {
        let client = client_with_payload("email=ops@example.com");

        let err = builder()
            .setup(&client, &service(Some(ProviderConfigReference::default())))
            .await
            .expect_err("malformed payload must fail");

        assert!(matches!(err, Error::DecodeCredentials { .. }));
    }

    #[tokio::test]
    async fn test_setup_without_reference() {
        let client = MockProviderClient::new();

        let err = builder()
            .setup(&client, &service(None))
            .await
            .expect_err("missing reference must fail");

        assert!(matches!(
            err,
            Error::ResolveProviderConfig {
                source: ResolveError::NoProviderConfigReference
            }
        ));
        assert_eq!(err.to_string(), "cannot resolve provider config");
        assert_eq!(
            std::error::Error::source(&err).map(ToString::to_string),
            Some("no providerConfigRef provided".to_owned())
        );
    }

    #[tokio::test]
    async fn test_setup_unknown_reference_kind() {
        let client = MockProviderClient::new();
        let reference = ProviderConfigReference {
            name: "default".to_owned(),
            kind: "StoreConfig".to_owned(),
        };

        let err = builder()
            .setup(&client, &service(Some(reference)))
            .await
            .expect_err("unknown kind must fail");

        assert!(matches!(
            err,
            Error::ResolveProviderConfig {
                source: ResolveError::UnknownProviderConfigKind { .. }
            }
        ));
    }

    #[tokio::test]
    async fn test_setup_requires_modern_managed_resource() {
        let client = MockProviderClient::new();
        let legacy = LegacyResource {
            metadata: ObjectMeta::default(),
        };

        let err = builder()
            .setup(&client, &legacy)
            .await
            .expect_err("legacy resources must fail");

        assert!(matches!(
            err,
            Error::ResolveProviderConfig {
                source: ResolveError::NotModernManaged { .. }
            }
        ));
    }

    #[tokio::test]
    async fn test_environment_policy_never_calls_the_api() {
        // Any call on a mock without expectations panics.
        let client = MockProviderClient::new();
        let builder = TerraformSetupBuilder::new(identity(), CredentialPolicy::Environment);

        let legacy = LegacyResource {
            metadata: ObjectMeta::default(),
        };
        for setup in [
            builder.setup(&client, &legacy).await,
            builder.setup(&client, &service(None)).await,
        ] {
            let setup = setup.expect("environment policy never fails");
            assert!(setup.configuration.is_empty());
            assert_eq!(setup.requirement.source, "elestio/elestio");
        }
    }

    #[test]
    fn test_redacted_setup_hides_credentials() {
        let setup = Setup {
            configuration: Map::from_iter([
                (KEY_EMAIL.to_owned(), Value::from(EMAIL)),
                (KEY_API_TOKEN.to_owned(), Value::from(API_TOKEN)),
            ]),
            ..Setup::default()
        };

        let redacted = setup.redacted();
        assert_eq!(redacted.configuration[KEY_API_TOKEN], REDACTED);
        assert!(!format!("{setup:?}").contains(API_TOKEN));
    }
}
