use crate::{ApplicationError, ProviderError};
use secrecy::{ExposeSecret, SecretString};
use std::fmt::{Debug, Formatter, Result as FmtResult};
use url::Url;

/// Version id answered when a mount declares nothing to write.
pub const NO_SECRETS_ID: &str = "NO_SECRETS";
pub const NO_SECRETS_VERSION: &str = "0";

/// Access token resolved for a single mount. Never cached across calls.
#[derive(Debug, Clone)]
pub struct Credentials {
    access_token: SecretString,
}

impl Credentials {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::new(access_token.into()),
        }
    }

    pub fn access_token(&self) -> &str {
        self.access_token.expose_secret()
    }
}

/// An environment opened for the duration of one mount.
#[derive(Debug, Clone)]
pub struct EnvironmentHandle {
    pub api_url: Url,
    pub organization: String,
    pub project: String,
    pub environment: String,
    /// Id of the open session; keys every subsequent read.
    pub session_id: String,
    pub credentials: Credentials,
}

impl EnvironmentHandle {
    /// Stable name of the environment, independent of the open session.
    pub fn identifier(&self) -> String {
        format!("{}/{}/{}", self.organization, self.project, self.environment)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct OutputFile {
    pub path: String,
    pub mode: u32,
    pub contents: Vec<u8>,
}

impl Debug for OutputFile {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("OutputFile")
            .field("path", &self.path)
            .field("mode", &format_args!("{:o}", self.mode))
            .field("contents", &format_args!("<{} bytes>", self.contents.len()))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectVersion {
    pub id: String,
    pub version: String,
}

impl ObjectVersion {
    /// Version of a written file. Identical inputs always yield the same
    /// version, so the driver can skip rewriting unchanged content.
    pub fn new(id: &str, environment: &str, target_path: &str, source_key: &str) -> Self {
        Self {
            id: id.to_string(),
            version: format!("{environment}-{target_path}-{source_key}"),
        }
    }

    pub fn no_secrets() -> Self {
        Self {
            id: NO_SECRETS_ID.to_string(),
            version: NO_SECRETS_VERSION.to_string(),
        }
    }
}

/// Raw fields of a mount call as the driver sends them.
#[derive(Clone, Default)]
pub struct MountRequest {
    /// JSON object of mount attributes.
    pub attributes: String,
    /// JSON object of node publish secrets.
    pub secrets: String,
    pub target_path: String,
    /// JSON number holding the file mode.
    pub permission: String,
}

impl Debug for MountRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("MountRequest")
            .field("attributes", &self.attributes)
            .field("secrets", &"<redacted>")
            .field("target_path", &self.target_path)
            .field("permission", &self.permission)
            .finish()
    }
}

/// Result of a mount that reached a decision. Failures that are not the
/// caller's to fix are returned as errors instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountOutcome {
    Mounted {
        files: Vec<OutputFile>,
        object_versions: Vec<ObjectVersion>,
    },
    Rejected(ApplicationError),
}

impl MountOutcome {
    pub fn nothing_to_mount() -> Self {
        MountOutcome::Mounted {
            files: Vec::new(),
            object_versions: vec![ObjectVersion::no_secrets()],
        }
    }

    /// Attributes `error` to the caller with the given error class.
    pub fn rejected(error: ProviderError, into: fn(&str, Option<&str>) -> ProviderError) -> Self {
        match error.into_application(into) {
            ProviderError::Application(e) => MountOutcome::Rejected(e),
            ProviderError::Internal(e) => MountOutcome::Rejected(ApplicationError::BadRequest {
                message: e.to_string(),
                subtype: None,
            }),
        }
    }

    /// Error code for the response, set only when the mount was rejected.
    pub fn code(&self) -> Option<&str> {
        match self {
            MountOutcome::Mounted { .. } => None,
            MountOutcome::Rejected(e) => Some(e.as_ref()),
        }
    }
}
