use async_trait::async_trait;
use esc_csi_domain::{Credentials, EnvironmentHandle, InternalError, ProviderError, RawValue};
use reqwest::{header, Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::{collections::BTreeMap, time::Duration};
use url::Url;

/// Access to Pulumi ESC environments.
#[async_trait]
pub trait EnvironmentClient: Send + Sync {
    async fn open(
        &self,
        api_url: &Url,
        organization: &str,
        project: &str,
        environment: &str,
        credentials: &Credentials,
    ) -> Result<EnvironmentHandle, ProviderError>;

    /// Reads a single property by its path, e.g. `app.database.password`.
    async fn read_property(
        &self,
        handle: &EnvironmentHandle,
        key: &str,
    ) -> Result<RawValue, ProviderError>;

    /// Reads every top level property of the environment.
    async fn read_all(
        &self,
        handle: &EnvironmentHandle,
    ) -> Result<BTreeMap<String, RawValue>, ProviderError>;
}

#[derive(Debug, Deserialize)]
struct OpenEnvironment {
    id: String,
    #[serde(default)]
    diagnostics: Option<Diagnostics>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Diagnostics {
    List(Vec<Diagnostic>),
    Wrapped {
        #[serde(default)]
        diagnostics: Vec<Diagnostic>,
    },
}

impl Diagnostics {
    fn into_vec(self) -> Vec<Diagnostic> {
        match self {
            Diagnostics::List(diagnostics) | Diagnostics::Wrapped { diagnostics } => diagnostics,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Diagnostic {
    summary: String,
    #[serde(default)]
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenedEnvironment {
    #[serde(default)]
    properties: BTreeMap<String, Value>,
}

#[derive(Clone)]
pub struct EscClient {
    client: Client,
}

impl EscClient {
    pub fn new(user_agent: &str, timeout: Option<Duration>) -> Result<Self, ProviderError> {
        let mut builder = Client::builder().user_agent(user_agent);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder.build().map_err(|e| {
            InternalError::configuration_error(
                &format!("Could not build http client: {e}"),
                Some("http_client"),
            )
        })?;

        Ok(Self { client })
    }

    fn endpoint(api_url: &Url, segments: &[&str]) -> Result<Url, ProviderError> {
        let mut url = api_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                InternalError::configuration_error(
                    &format!("{api_url} cannot be used as a base url"),
                    Some("apiUrl"),
                )
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn session_url(handle: &EnvironmentHandle) -> Result<Url, ProviderError> {
        Self::endpoint(
            &handle.api_url,
            &[
                "environments",
                &handle.organization,
                &handle.project,
                &handle.environment,
                "open",
                &handle.session_id,
            ],
        )
    }

    async fn get(&self, url: Url, credentials: &Credentials) -> Result<Response, ProviderError> {
        self.client
            .get(url)
            .header(header::ACCEPT, "application/json")
            .header(
                header::AUTHORIZATION,
                format!("token {}", credentials.access_token()),
            )
            .send()
            .await
            .map_err(|e| {
                InternalError::connection_error(&format!("Request to ESC failed: {e}"), Some("esc"))
            })
    }
}

#[async_trait]
impl EnvironmentClient for EscClient {
    async fn open(
        &self,
        api_url: &Url,
        organization: &str,
        project: &str,
        environment: &str,
        credentials: &Credentials,
    ) -> Result<EnvironmentHandle, ProviderError> {
        let url = Self::endpoint(
            api_url,
            &["environments", organization, project, environment, "open"],
        )?;
        let name = format!("{organization}/{project}/{environment}");

        tracing::debug!("Opening environment {name}");

        let response = self
            .client
            .post(url)
            .header(header::ACCEPT, "application/json")
            .header(
                header::AUTHORIZATION,
                format!("token {}", credentials.access_token()),
            )
            .send()
            .await
            .map_err(|e| {
                InternalError::environment_unavailable(
                    &format!("could not open environment {name}: {e}"),
                    Some("transport"),
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InternalError::environment_unavailable(
                &format!("could not open environment {name}: {status} {body}"),
                Some(status.canonical_reason().unwrap_or("status")),
            ));
        }

        let opened = response.json::<OpenEnvironment>().await.map_err(|e| {
            InternalError::deserialize_error(
                &format!("Invalid response opening environment {name}: {e}"),
                Some("open"),
            )
        })?;

        let diagnostics = opened
            .diagnostics
            .map(Diagnostics::into_vec)
            .unwrap_or_default();
        if !diagnostics.is_empty() {
            let summary = diagnostics
                .iter()
                .map(|d| match &d.path {
                    Some(path) => format!("{path}: {}", d.summary),
                    None => d.summary.clone(),
                })
                .collect::<Vec<_>>()
                .join("; ");
            return Err(InternalError::environment_unavailable(
                &format!("environment {name} has errors: {summary}"),
                Some("diagnostics"),
            ));
        }

        Ok(EnvironmentHandle {
            api_url: api_url.clone(),
            organization: organization.to_string(),
            project: project.to_string(),
            environment: environment.to_string(),
            session_id: opened.id,
            credentials: credentials.clone(),
        })
    }

    async fn read_property(
        &self,
        handle: &EnvironmentHandle,
        key: &str,
    ) -> Result<RawValue, ProviderError> {
        let mut url = Self::session_url(handle)?;
        url.query_pairs_mut().append_pair("property", key);

        let response = self.get(url, &handle.credentials).await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(InternalError::property_not_found(
                &format!("{key} in environment {}", handle.identifier()),
                Some("property"),
            )),
            status if !status.is_success() => Err(InternalError::connection_error(
                &format!(
                    "could not read {key} from environment {}: {status}",
                    handle.identifier()
                ),
                Some("esc"),
            )),
            _ => {
                let value = response.json::<Value>().await.map_err(|e| {
                    InternalError::deserialize_error(
                        &format!("Invalid value for {key}: {e}"),
                        Some("property"),
                    )
                })?;
                Ok(unwrap_value(value))
            }
        }
    }

    async fn read_all(
        &self,
        handle: &EnvironmentHandle,
    ) -> Result<BTreeMap<String, RawValue>, ProviderError> {
        let url = Self::session_url(handle)?;
        let response = self.get(url, &handle.credentials).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(InternalError::connection_error(
                &format!(
                    "could not read environment {}: {status}",
                    handle.identifier()
                ),
                Some("esc"),
            ));
        }

        let opened = response.json::<OpenedEnvironment>().await.map_err(|e| {
            InternalError::deserialize_error(
                &format!("Invalid environment {}: {e}", handle.identifier()),
                Some("environment"),
            )
        })?;

        Ok(opened
            .properties
            .into_iter()
            .map(|(key, value)| (key, unwrap_value(value)))
            .collect())
    }
}

/// ESC wraps every value, at every depth, as `{value, secret, unknown, trace}`.
fn unwrap_value(wrapped: Value) -> RawValue {
    let Value::Object(mut wrapper) = wrapped else {
        return wrapped.into();
    };

    if wrapper.get("unknown").and_then(Value::as_bool) == Some(true) {
        return RawValue::unsupported("unknown");
    }

    match wrapper.remove("value") {
        Some(Value::Array(items)) => {
            RawValue::Sequence(items.into_iter().map(unwrap_value).collect())
        }
        Some(Value::Object(entries)) => RawValue::Mapping(
            entries
                .into_iter()
                .map(|(key, value)| (key, unwrap_value(value)))
                .collect(),
        ),
        Some(scalar) => scalar.into(),
        None => RawValue::Null,
    }
}
