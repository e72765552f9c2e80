use super::spec::{ObjectSpec, SecretSpec, SpecEntry};
use crate::{prelude::StringExt, InternalError, ProviderError};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use url::Url;

pub const DEFAULT_API_URL: &str = "https://api.pulumi.com/api/esc";

pub const API_URL: &str = "apiUrl";
pub const ORGANIZATION: &str = "organization";
pub const PROJECT: &str = "project";
pub const ENVIRONMENT: &str = "environment";
pub const AUTH_SECRET_NAME: &str = "authSecretName";
pub const AUTH_SECRET_NAMESPACE: &str = "authSecretNamespace";
pub const SECRETS: &str = "secrets";
pub const OBJECTS: &str = "objects";
pub const SECRET_PROVIDER_CLASS: &str = "secretProviderClass";
pub const POD_NAME: &str = "csi.storage.k8s.io/pod.name";
pub const POD_NAMESPACE: &str = "csi.storage.k8s.io/pod.namespace";
pub const POD_UID: &str = "csi.storage.k8s.io/pod.uid";
pub const SERVICE_ACCOUNT_NAME: &str = "csi.storage.k8s.io/serviceAccount.name";
pub const SERVICE_ACCOUNT_TOKENS: &str = "csi.storage.k8s.io/serviceAccount.tokens";
pub const EPHEMERAL: &str = "csi.storage.k8s.io/ephemeral";

const KNOWN_ATTRIBUTES: [&str; 15] = [
    API_URL,
    ORGANIZATION,
    PROJECT,
    ENVIRONMENT,
    AUTH_SECRET_NAME,
    AUTH_SECRET_NAMESPACE,
    SECRETS,
    OBJECTS,
    SECRET_PROVIDER_CLASS,
    POD_NAME,
    POD_NAMESPACE,
    POD_UID,
    SERVICE_ACCOUNT_NAME,
    SERVICE_ACCOUNT_TOKENS,
    EPHEMERAL,
];

const MAX_FILE_PERMISSION: u32 = 0o7777;

/// Settings the configuration falls back to when the attributes leave them out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountConfigOptions {
    pub default_api_url: String,
}

impl MountConfigOptions {
    pub fn new(default_api_url: impl Into<String>) -> Self {
        Self {
            default_api_url: default_api_url.into(),
        }
    }
}

impl Default for MountConfigOptions {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

/// Metadata the CSI driver passes about the pod being mounted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodInfo {
    pub name: Option<String>,
    pub namespace: Option<String>,
    pub uid: Option<String>,
    pub service_account_name: Option<String>,
    pub ephemeral: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountEntries {
    Secrets(Vec<SecretSpec>),
    Objects(Vec<ObjectSpec>),
}

impl MountEntries {
    pub fn len(&self) -> usize {
        match self {
            MountEntries::Secrets(entries) => entries.len(),
            MountEntries::Objects(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Validated attributes of one mount request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountConfig {
    pub api_url: Url,
    pub organization: String,
    pub project: String,
    pub environment: String,
    pub auth_secret_name: String,
    pub auth_secret_namespace: String,
    pub secret_provider_class: Option<String>,
    pub pod: PodInfo,
    pub entries: MountEntries,
    pub target_path: String,
}

impl MountConfig {
    /// Decodes and validates the JSON encoded attribute map of a mount request.
    pub fn parse(
        attributes: &str,
        target_path: &str,
        options: &MountConfigOptions,
    ) -> Result<Self, ProviderError> {
        let attributes: BTreeMap<String, Value> = if attributes.is_blank() {
            BTreeMap::new()
        } else {
            serde_json::from_str(attributes).map_err(|e| {
                InternalError::configuration_error(
                    &format!("failed to unmarshal attributes: {e}"),
                    Some("attributes"),
                )
            })?
        };

        if let Some(unknown) = attributes
            .keys()
            .find(|key| !KNOWN_ATTRIBUTES.contains(&key.as_str()))
        {
            return Err(InternalError::configuration_error(
                &format!("unknown attribute: {unknown}"),
                Some("attributes"),
            ));
        }

        let organization = required(&attributes, ORGANIZATION)?;
        let project = required(&attributes, PROJECT)?;
        let environment = required(&attributes, ENVIRONMENT)?;
        let auth_secret_name = required(&attributes, AUTH_SECRET_NAME)?;
        let auth_secret_namespace = required(&attributes, AUTH_SECRET_NAMESPACE)?;

        let api_url = attribute(&attributes, API_URL)?
            .filter(|url| !url.is_blank())
            .unwrap_or_else(|| options.default_api_url.clone());
        let api_url = Url::parse(api_url.trim()).map_err(|e| {
            InternalError::configuration_error(
                &format!("{API_URL}: invalid url {api_url:?}: {e}"),
                Some(API_URL),
            )
        })?;

        let entries = match (
            attribute(&attributes, SECRETS)?,
            attribute(&attributes, OBJECTS)?,
        ) {
            (Some(secrets), None) => {
                let secrets = parse_entries::<SecretSpec>(SECRETS, &secrets)?;
                if secrets.is_empty() {
                    return Err(InternalError::configuration_error(
                        &format!("{SECRETS}: at least one entry is required"),
                        Some(SECRETS),
                    ));
                }
                MountEntries::Secrets(secrets)
            }
            (None, Some(objects)) => MountEntries::Objects(parse_entries(OBJECTS, &objects)?),
            (None, None) => {
                return Err(InternalError::configuration_error(
                    &format!("{SECRETS} or {OBJECTS} is required"),
                    None,
                ))
            }
            (Some(_), Some(_)) => {
                return Err(InternalError::configuration_error(
                    &format!("{SECRETS} and {OBJECTS} are mutually exclusive"),
                    None,
                ))
            }
        };

        let pod = PodInfo {
            name: attribute(&attributes, POD_NAME)?,
            namespace: attribute(&attributes, POD_NAMESPACE)?,
            uid: attribute(&attributes, POD_UID)?,
            service_account_name: attribute(&attributes, SERVICE_ACCOUNT_NAME)?,
            ephemeral: attribute(&attributes, EPHEMERAL)?
                .is_some_and(|ephemeral| ephemeral.trim().eq_ignore_ascii_case("true")),
        };

        Ok(Self {
            api_url,
            organization,
            project,
            environment,
            auth_secret_name,
            auth_secret_namespace,
            secret_provider_class: attribute(&attributes, SECRET_PROVIDER_CLASS)?,
            pod,
            entries,
            target_path: target_path.to_string(),
        })
    }
}

fn attribute(
    attributes: &BTreeMap<String, Value>,
    key: &str,
) -> Result<Option<String>, ProviderError> {
    match attributes.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(InternalError::configuration_error(
            &format!("{key}: expected a string value"),
            Some(key),
        )),
    }
}

fn required(attributes: &BTreeMap<String, Value>, key: &str) -> Result<String, ProviderError> {
    attribute(attributes, key)?
        .filter(|value| !value.is_blank())
        .ok_or_else(|| InternalError::configuration_error(&format!("{key} is required"), Some(key)))
}

fn parse_entries<T>(field: &str, raw: &str) -> Result<Vec<T>, ProviderError>
where
    T: DeserializeOwned + SpecEntry,
{
    let entries: Vec<T> = if raw.is_blank() {
        Vec::new()
    } else {
        serde_yaml::from_str::<Option<Vec<T>>>(raw)
            .map_err(|e| {
                InternalError::configuration_error(&format!("{field}: {e}"), Some(field))
            })?
            .unwrap_or_default()
    };

    let mut file_names = HashSet::new();
    for (index, entry) in entries.iter().enumerate() {
        entry.validate().map_err(|reason| {
            InternalError::configuration_error(&format!("{field}.[{index}]: {reason}"), Some(field))
        })?;

        if !file_names.insert(entry.file_name()) {
            return Err(InternalError::configuration_error(
                &format!(
                    "{field}.[{index}]: duplicate file name {:?}",
                    entry.file_name()
                ),
                Some(field),
            ));
        }
    }

    Ok(entries)
}

/// Decodes the JSON encoded file mode the driver sends with every mount.
pub fn parse_file_permission(permission: &str) -> Result<u32, ProviderError> {
    let mode: u32 = serde_json::from_str(permission.trim()).map_err(|e| {
        InternalError::configuration_error(
            &format!("failed to unmarshal file permission {permission:?}: {e}"),
            Some("permission"),
        )
    })?;

    if mode > MAX_FILE_PERMISSION {
        return Err(InternalError::configuration_error(
            &format!("file permission {mode:o} is out of range"),
            Some("permission"),
        ));
    }

    Ok(mode)
}

/// Decodes the node publish secrets of a mount request and returns their keys.
/// The values are dropped immediately.
pub fn parse_node_publish_secrets(secrets: &str) -> Result<Vec<String>, ProviderError> {
    if secrets.is_blank() {
        return Ok(Vec::new());
    }

    serde_json::from_str::<BTreeMap<String, String>>(secrets)
        .map(|secrets| secrets.into_keys().collect())
        .map_err(|e| {
            InternalError::configuration_error(
                &format!("failed to unmarshal node publish secrets: {e}"),
                Some("secrets"),
            )
        })
}
