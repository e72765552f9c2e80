use crate::helper::k8s_driver::SecretStore;
use esc_csi_domain::{Credentials, InternalError, ProviderError};
use std::sync::Arc;

/// Key of the access token inside the referenced Kubernetes secret.
pub const ACCESS_TOKEN_KEY: &str = "pulumi-access-token";

#[derive(Clone)]
pub struct CredentialResolver {
    secrets: Arc<dyn SecretStore>,
}

impl CredentialResolver {
    pub fn new(secrets: Arc<dyn SecretStore>) -> Self {
        Self { secrets }
    }

    /// Reads the access token from the secret `namespace/name`. Surrounding
    /// whitespace is stripped on purpose: tokens stored with `kubectl create
    /// secret --from-file` usually carry a trailing newline.
    pub async fn resolve(&self, namespace: &str, name: &str) -> Result<Credentials, ProviderError> {
        let mut data = self.secrets.get(namespace, name).await?;

        let token = data
            .remove(ACCESS_TOKEN_KEY)
            .ok_or_else(|| {
                InternalError::credential_not_found(
                    &format!("token not found in secret {namespace}/{name}"),
                    Some("access_token"),
                )
            })
            .and_then(|token| {
                String::from_utf8(token).map_err(|_| {
                    InternalError::deserialize_error(
                        &format!("token in secret {namespace}/{name} is not valid utf-8"),
                        Some("access_token"),
                    )
                })
            })?;

        let token = token.trim();
        if token.is_empty() {
            return Err(InternalError::credential_not_found(
                &format!("token in secret {namespace}/{name} is empty"),
                Some("access_token"),
            ));
        }

        tracing::debug!("Resolved access token from secret {namespace}/{name}");

        Ok(Credentials::new(token))
    }
}
