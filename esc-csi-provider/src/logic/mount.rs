use crate::{helper::esc_client::EnvironmentClient, logic::credentials::CredentialResolver};
use esc_csi_domain::{
    parse_file_permission, parse_node_publish_secrets, prelude::ToBytesExt, ApplicationError,
    EnvironmentHandle, InternalError, MountConfig, MountConfigOptions, MountEntries,
    MountOutcome, MountRequest, ObjectSpec, ObjectVersion, OutputFile, ProviderError, SecretSpec,
    SpecEntry,
};
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Contents produced for one entry of the mount.
struct Payload {
    path: String,
    source_key: String,
    contents: Vec<u8>,
}

/// Serves mount requests. Holds no per-call state and is shared by every
/// in-flight call.
#[derive(Clone)]
pub struct MountHandler {
    credentials: CredentialResolver,
    environments: Arc<dyn EnvironmentClient>,
    options: MountConfigOptions,
}

impl MountHandler {
    pub fn new(
        credentials: CredentialResolver,
        environments: Arc<dyn EnvironmentClient>,
        options: MountConfigOptions,
    ) -> Self {
        Self {
            credentials,
            environments,
            options,
        }
    }

    #[tracing::instrument(skip_all, fields(target_path = %request.target_path))]
    pub async fn mount(&self, request: &MountRequest) -> Result<MountOutcome, ProviderError> {
        let (config, mode) = match self.configure(request) {
            Ok(configured) => configured,
            Err(e) => {
                warn!("Rejecting mount with invalid configuration: {e}");
                return Ok(MountOutcome::rejected(
                    e,
                    ApplicationError::invalid_secret_provider_class,
                ));
            }
        };

        debug!(
            pod = config.pod.name.as_deref().unwrap_or_default(),
            namespace = config.pod.namespace.as_deref().unwrap_or_default(),
            secret_provider_class = config.secret_provider_class.as_deref().unwrap_or_default(),
            "Mount configured with {} entries",
            config.entries.len()
        );

        if config.entries.is_empty() {
            info!("No objects declared, nothing to mount");
            return Ok(MountOutcome::nothing_to_mount());
        }

        let credentials = match self
            .credentials
            .resolve(&config.auth_secret_namespace, &config.auth_secret_name)
            .await
        {
            Ok(credentials) => credentials,
            Err(e) => {
                warn!("Rejecting mount without credentials: {e}");
                return Ok(MountOutcome::rejected(e, ApplicationError::bad_request));
            }
        };

        let handle = self
            .environments
            .open(
                &config.api_url,
                &config.organization,
                &config.project,
                &config.environment,
                &credentials,
            )
            .await?;

        let payloads = match &config.entries {
            MountEntries::Secrets(secrets) => self.read_secrets(&handle, secrets).await?,
            MountEntries::Objects(objects) => self.read_objects(&handle, objects).await?,
        };

        let identifier = handle.identifier();
        let (files, object_versions): (Vec<_>, Vec<_>) = payloads
            .into_iter()
            .map(|payload| {
                let version = ObjectVersion::new(
                    &payload.path,
                    &identifier,
                    &config.target_path,
                    &payload.source_key,
                );
                let file = OutputFile {
                    path: payload.path,
                    mode,
                    contents: payload.contents,
                };
                (file, version)
            })
            .unzip();

        info!("Mounting {} files from environment {identifier}", files.len());

        Ok(MountOutcome::Mounted {
            files,
            object_versions,
        })
    }

    fn configure(&self, request: &MountRequest) -> Result<(MountConfig, u32), ProviderError> {
        let config = MountConfig::parse(&request.attributes, &request.target_path, &self.options)?;
        let mode = parse_file_permission(&request.permission)?;
        let node_secrets = parse_node_publish_secrets(&request.secrets)?;

        if !node_secrets.is_empty() {
            debug!("Ignoring node publish secrets {node_secrets:?}");
        }

        Ok((config, mode))
    }

    async fn read_secrets(
        &self,
        handle: &EnvironmentHandle,
        secrets: &[SecretSpec],
    ) -> Result<Vec<Payload>, ProviderError> {
        try_join_all(secrets.iter().map(|spec| async move {
            let value = self
                .environments
                .read_property(handle, &spec.secret_key)
                .await?;
            let contents = spec.format.render(value.to_bytes()?)?;

            Ok::<_, ProviderError>(Payload {
                path: spec.file_name().to_string(),
                source_key: spec.source_key().to_string(),
                contents,
            })
        }))
        .await
    }

    async fn read_objects(
        &self,
        handle: &EnvironmentHandle,
        objects: &[ObjectSpec],
    ) -> Result<Vec<Payload>, ProviderError> {
        let properties = self.environments.read_all(handle).await?;

        objects
            .iter()
            .map(|spec| {
                let value = properties.get(&spec.name).ok_or_else(|| {
                    InternalError::property_not_found(
                        &format!("{} in environment {}", spec.name, handle.identifier()),
                        Some("object"),
                    )
                })?;

                Ok(Payload {
                    path: spec.file_name().to_string(),
                    source_key: spec.source_key().to_string(),
                    contents: value.to_bytes()?,
                })
            })
            .collect()
    }
}
