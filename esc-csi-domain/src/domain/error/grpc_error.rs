use crate::{ApplicationError, ErrorMeta, InternalError, ProviderError};
use tonic::{Code, Status};

impl From<&ProviderError> for Code {
    fn from(value: &ProviderError) -> Self {
        match value {
            ProviderError::Internal(e) => match e {
                InternalError::ConfigurationError { .. } | InternalError::DeserializeError { .. } => {
                    Code::InvalidArgument
                }
                InternalError::CredentialNotFound { .. } | InternalError::PropertyNotFound { .. } => {
                    Code::NotFound
                }
                InternalError::EnvironmentUnavailable { .. }
                | InternalError::ConnectionError { .. } => Code::Unavailable,
                InternalError::UnsupportedValueType { .. } => Code::FailedPrecondition,
                InternalError::UnknownError { .. }
                | InternalError::IOErr { .. }
                | InternalError::SerializeError { .. } => Code::Internal,
            },
            ProviderError::Application(e) => match e {
                ApplicationError::InvalidSecretProviderClass { .. }
                | ApplicationError::BadRequest { .. } => Code::InvalidArgument,
            },
        }
    }
}

impl From<ProviderError> for Status {
    fn from(value: ProviderError) -> Self {
        (&value).into()
    }
}

impl From<&ProviderError> for Status {
    fn from(value: &ProviderError) -> Self {
        Status::new(Code::from(value), format!("{} ({})", value, value.key()))
    }
}
