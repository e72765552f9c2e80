#[cfg(feature = "grpc-error")]
pub mod grpc_error;

use crate::prelude::StringExt;
use serde::Serialize;
use std::convert::AsRef;
use std::{
    error::Error as StdError,
    fmt::{Debug, Display, Formatter, Result as FmtResult},
};
use strum::AsRefStr;
use thiserror::Error as ThisError;

pub trait ErrorMeta {
    fn code(&self) -> ErrorCode;
    fn key(&self) -> ErrorKey;
    fn message(&self) -> ErrorMessage;
}

#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize)]
pub struct ErrorCode(u16);

impl Display for ErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize)]
pub struct ErrorKey(String);

impl ErrorKey {
    pub fn internal(key: &str, subtype: Option<&str>) -> Self {
        if let Some(subtype) = subtype {
            ErrorKey(format!("err::internal::{}::{}", key, subtype))
        } else {
            ErrorKey(format!("err::internal::{}", key))
        }
    }

    pub fn application(key: &str, subtype: Option<&str>) -> Self {
        if let Some(subtype) = subtype {
            ErrorKey(format!("err::application::{}::{}", key, subtype))
        } else {
            ErrorKey(format!("err::application::{}", key))
        }
    }
}

impl Display for ErrorKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize)]
pub struct ErrorMessage(String);

impl AsRef<str> for ErrorMessage {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for ErrorMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

/// Failures raised while serving a mount. None of these are surfaced as a
/// response error code; they fail the call.
#[derive(ThisError, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, AsRefStr)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "PascalCase")]
pub enum InternalError {
    #[error("An unknown error occurred: {}", .message)]
    UnknownError {
        message: String,
        subtype: Option<String>,
    },
    #[error("A connection error occurred: {}", .message)]
    ConnectionError {
        message: String,
        subtype: Option<String>,
    },
    #[error("An error while performing an IO operation: {}", .message)]
    IOErr {
        message: String,
        subtype: Option<String>,
    },
    #[error("Configuration error: {}", .message)]
    ConfigurationError {
        message: String,
        subtype: Option<String>,
    },
    #[error("Credential not found: {}", .message)]
    CredentialNotFound {
        message: String,
        subtype: Option<String>,
    },
    #[error("Environment unavailable: {}", .message)]
    EnvironmentUnavailable {
        message: String,
        subtype: Option<String>,
    },
    #[error("Property not found: {}", .message)]
    PropertyNotFound {
        message: String,
        subtype: Option<String>,
    },
    #[error("unsupported value type: {}", .message)]
    UnsupportedValueType {
        message: String,
        subtype: Option<String>,
    },
    #[error("Serialization error: {}", .message)]
    SerializeError {
        message: String,
        subtype: Option<String>,
    },
    #[error("Deserialization error: {}", .message)]
    DeserializeError {
        message: String,
        subtype: Option<String>,
    },
}

impl From<anyhow::Error> for InternalError {
    fn from(error: anyhow::Error) -> Self {
        match error.downcast_ref::<InternalError>() {
            Some(internal_error) => internal_error.clone(),
            None => InternalError::UnknownError {
                message: error.to_string(),
                subtype: None,
            },
        }
    }
}

impl InternalError {
    pub fn connection_error(message: &str, subtype: Option<&str>) -> ProviderError {
        ProviderError::internal(InternalError::ConnectionError {
            message: message.to_string(),
            subtype: subtype.map(|s| s.snake_case()),
        })
    }

    pub fn io_err(message: &str, subtype: Option<&str>) -> ProviderError {
        ProviderError::internal(InternalError::IOErr {
            message: message.to_string(),
            subtype: subtype.map(|s| s.snake_case()),
        })
    }

    pub fn configuration_error(message: &str, subtype: Option<&str>) -> ProviderError {
        ProviderError::internal(InternalError::ConfigurationError {
            message: message.to_string(),
            subtype: subtype.map(|s| s.snake_case()),
        })
    }

    pub fn credential_not_found(message: &str, subtype: Option<&str>) -> ProviderError {
        ProviderError::internal(InternalError::CredentialNotFound {
            message: message.to_string(),
            subtype: subtype.map(|s| s.snake_case()),
        })
    }

    pub fn environment_unavailable(message: &str, subtype: Option<&str>) -> ProviderError {
        ProviderError::internal(InternalError::EnvironmentUnavailable {
            message: message.to_string(),
            subtype: subtype.map(|s| s.snake_case()),
        })
    }

    pub fn property_not_found(message: &str, subtype: Option<&str>) -> ProviderError {
        ProviderError::internal(InternalError::PropertyNotFound {
            message: message.to_string(),
            subtype: subtype.map(|s| s.snake_case()),
        })
    }

    pub fn unsupported_value_type(kind: &str, subtype: Option<&str>) -> ProviderError {
        ProviderError::internal(InternalError::UnsupportedValueType {
            message: kind.to_string(),
            subtype: subtype.map(|s| s.snake_case()),
        })
    }

    pub fn serialize_error(message: &str, subtype: Option<&str>) -> ProviderError {
        ProviderError::internal(InternalError::SerializeError {
            message: message.to_string(),
            subtype: subtype.map(|s| s.snake_case()),
        })
    }

    pub fn deserialize_error(message: &str, subtype: Option<&str>) -> ProviderError {
        ProviderError::internal(InternalError::DeserializeError {
            message: message.to_string(),
            subtype: subtype.map(|s| s.snake_case()),
        })
    }
}

impl ErrorMeta for InternalError {
    fn code(&self) -> ErrorCode {
        match self {
            InternalError::UnknownError { .. } => ErrorCode(1000),
            InternalError::ConnectionError { .. } => ErrorCode(1001),
            InternalError::IOErr { .. } => ErrorCode(1002),
            InternalError::ConfigurationError { .. } => ErrorCode(1003),
            InternalError::CredentialNotFound { .. } => ErrorCode(1004),
            InternalError::EnvironmentUnavailable { .. } => ErrorCode(1005),
            InternalError::PropertyNotFound { .. } => ErrorCode(1006),
            InternalError::UnsupportedValueType { .. } => ErrorCode(1007),
            InternalError::SerializeError { .. } => ErrorCode(1008),
            InternalError::DeserializeError { .. } => ErrorCode(1009),
        }
    }

    fn key(&self) -> ErrorKey {
        match self {
            InternalError::UnknownError { subtype, .. } => {
                ErrorKey::internal("unknown", subtype.as_deref())
            }
            InternalError::ConnectionError { subtype, .. } => {
                ErrorKey::internal("connection_error", subtype.as_deref())
            }
            InternalError::IOErr { subtype, .. } => {
                ErrorKey::internal("io_err", subtype.as_deref())
            }
            InternalError::ConfigurationError { subtype, .. } => {
                ErrorKey::internal("configuration_error", subtype.as_deref())
            }
            InternalError::CredentialNotFound { subtype, .. } => {
                ErrorKey::internal("credential_not_found", subtype.as_deref())
            }
            InternalError::EnvironmentUnavailable { subtype, .. } => {
                ErrorKey::internal("environment_unavailable", subtype.as_deref())
            }
            InternalError::PropertyNotFound { subtype, .. } => {
                ErrorKey::internal("property_not_found", subtype.as_deref())
            }
            InternalError::UnsupportedValueType { subtype, .. } => {
                ErrorKey::internal("unsupported_value_type", subtype.as_deref())
            }
            InternalError::SerializeError { subtype, .. } => {
                ErrorKey::internal("serialize_error", subtype.as_deref())
            }
            InternalError::DeserializeError { subtype, .. } => {
                ErrorKey::internal("deserialize_error", subtype.as_deref())
            }
        }
    }

    fn message(&self) -> ErrorMessage {
        match self {
            InternalError::UnknownError { message, .. }
            | InternalError::ConnectionError { message, .. }
            | InternalError::IOErr { message, .. }
            | InternalError::ConfigurationError { message, .. }
            | InternalError::CredentialNotFound { message, .. }
            | InternalError::EnvironmentUnavailable { message, .. }
            | InternalError::PropertyNotFound { message, .. }
            | InternalError::UnsupportedValueType { message, .. }
            | InternalError::SerializeError { message, .. }
            | InternalError::DeserializeError { message, .. } => ErrorMessage(message.to_string()),
        }
    }
}

impl Debug for InternalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        writeln!(f, "{}\n", &self)?;
        let mut current = self.source();

        while let Some(cause) = current {
            writeln!(f, "Caused by:\n\t{}", cause)?;
            current = cause.source();
        }

        Ok(())
    }
}

/// Caller-attributable failures. Their PascalCase name is what the CSI
/// driver receives in the mount response error code.
#[derive(ThisError, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, AsRefStr)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "PascalCase")]
pub enum ApplicationError {
    #[error("Invalid SecretProviderClass: {}", .message)]
    InvalidSecretProviderClass {
        message: String,
        subtype: Option<String>,
    },
    #[error("Bad Request: {}", .message)]
    BadRequest {
        message: String,
        subtype: Option<String>,
    },
}

impl From<anyhow::Error> for ApplicationError {
    fn from(error: anyhow::Error) -> Self {
        match error.downcast_ref::<ApplicationError>() {
            Some(application_error) => application_error.clone(),
            None => ApplicationError::BadRequest {
                message: error.to_string(),
                subtype: None,
            },
        }
    }
}

impl ApplicationError {
    pub fn invalid_secret_provider_class(message: &str, subtype: Option<&str>) -> ProviderError {
        ProviderError::application(ApplicationError::InvalidSecretProviderClass {
            message: message.to_string(),
            subtype: subtype.map(|s| s.snake_case()),
        })
    }

    pub fn bad_request(message: &str, subtype: Option<&str>) -> ProviderError {
        ProviderError::application(ApplicationError::BadRequest {
            message: message.to_string(),
            subtype: subtype.map(|s| s.snake_case()),
        })
    }
}

impl ErrorMeta for ApplicationError {
    fn code(&self) -> ErrorCode {
        match self {
            ApplicationError::InvalidSecretProviderClass { .. } => ErrorCode(2000),
            ApplicationError::BadRequest { .. } => ErrorCode(2001),
        }
    }

    fn key(&self) -> ErrorKey {
        match self {
            ApplicationError::InvalidSecretProviderClass { subtype, .. } => {
                ErrorKey::application("invalid_secret_provider_class", subtype.as_deref())
            }
            ApplicationError::BadRequest { subtype, .. } => {
                ErrorKey::application("bad_request", subtype.as_deref())
            }
        }
    }

    fn message(&self) -> ErrorMessage {
        match self {
            ApplicationError::InvalidSecretProviderClass { message, .. }
            | ApplicationError::BadRequest { message, .. } => ErrorMessage(message.to_string()),
        }
    }
}

impl Debug for ApplicationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        writeln!(f, "{}\n", &self)?;
        let mut current = self.source();

        while let Some(cause) = current {
            writeln!(f, "Caused by:\n\t{}", cause)?;
            current = cause.source();
        }

        Ok(())
    }
}

#[derive(ThisError, Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize)]
#[serde(untagged)]
pub enum ProviderError {
    Internal(InternalError),
    Application(ApplicationError),
}

impl AsRef<str> for ProviderError {
    fn as_ref(&self) -> &str {
        match self {
            ProviderError::Internal(e) => e.as_ref(),
            ProviderError::Application(e) => e.as_ref(),
        }
    }
}

impl From<anyhow::Error> for ProviderError {
    fn from(error: anyhow::Error) -> Self {
        match error.downcast_ref::<ProviderError>() {
            Some(provider_error) => provider_error.clone(),
            None => ProviderError::Internal(InternalError::UnknownError {
                message: error.to_string(),
                subtype: None,
            }),
        }
    }
}

impl ProviderError {
    fn internal(internal: InternalError) -> Self {
        ProviderError::Internal(internal)
    }

    fn application(application: ApplicationError) -> Self {
        ProviderError::Application(application)
    }

    /// Re-attributes an error to the caller, keeping its message.
    pub fn into_application(
        self,
        into: fn(&str, Option<&str>) -> ProviderError,
    ) -> ProviderError {
        match self {
            application @ ProviderError::Application(_) => application,
            ProviderError::Internal(e) => into(&e.to_string(), Some(e.as_ref())),
        }
    }
}

impl ErrorMeta for ProviderError {
    fn code(&self) -> ErrorCode {
        match self {
            ProviderError::Internal(e) => e.code(),
            ProviderError::Application(e) => e.code(),
        }
    }

    fn key(&self) -> ErrorKey {
        match self {
            ProviderError::Internal(e) => e.key(),
            ProviderError::Application(e) => e.key(),
        }
    }

    fn message(&self) -> ErrorMessage {
        match self {
            ProviderError::Internal(e) => e.message(),
            ProviderError::Application(e) => e.message(),
        }
    }
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ProviderError::Internal(e) => write!(f, "{}", e),
            ProviderError::Application(e) => write!(f, "{}", e),
        }
    }
}
