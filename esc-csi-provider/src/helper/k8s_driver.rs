use async_trait::async_trait;
use esc_csi_domain::{InternalError, ProviderError};
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use std::collections::BTreeMap;

/// Read access to Kubernetes secret objects.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Returns the decoded data of the secret `namespace/name`.
    async fn get(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, Vec<u8>>, ProviderError>;
}

pub struct KubeSecretStore {
    client: Client,
}

impl KubeSecretStore {
    pub async fn new() -> Result<Self, ProviderError> {
        let client = Client::try_default().await.map_err(|e| {
            tracing::error!("Could not connect to kubernetes: {e}");
            InternalError::io_err("Could not connect to kubernetes", None)
        })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SecretStore for KubeSecretStore {
    async fn get(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, Vec<u8>>, ProviderError> {
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), namespace);

        let secret = secrets.get(name).await.map_err(|e| {
            tracing::error!("Could not read secret {namespace}/{name}: {e}");
            match e {
                kube::Error::Api(response) if response.code == 404 => {
                    InternalError::credential_not_found(
                        &format!("secret {namespace}/{name} not found"),
                        Some("secret"),
                    )
                }
                e => InternalError::connection_error(
                    &format!("could not read secret {namespace}/{name}: {e}"),
                    Some("kubernetes"),
                ),
            }
        })?;

        Ok(secret
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| (key, value.0))
            .collect())
    }
}
