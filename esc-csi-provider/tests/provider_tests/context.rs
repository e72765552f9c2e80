use async_trait::async_trait;
use esc_csi_domain::{
    Credentials, EnvironmentHandle, InternalError, MountConfigOptions, MountRequest,
    ProviderError, RawValue,
};
use esc_csi_provider::{
    helper::{esc_client::EnvironmentClient, k8s_driver::SecretStore},
    logic::{
        credentials::{CredentialResolver, ACCESS_TOKEN_KEY},
        mount::MountHandler,
    },
};
use serde_json::{json, Value};
use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};
use url::Url;

pub const TARGET_PATH: &str = "/var/lib/kubelet/pods/7d3c/volumes/kubernetes.io~csi/secrets/mount";

#[derive(Default)]
pub struct FakeSecretStore {
    pub data: BTreeMap<String, Vec<u8>>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl SecretStore for FakeSecretStore {
    async fn get(
        &self,
        _namespace: &str,
        _name: &str,
    ) -> Result<BTreeMap<String, Vec<u8>>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.data.clone())
    }
}

#[derive(Default)]
pub struct FakeEnvironment {
    pub properties: BTreeMap<String, RawValue>,
    pub unavailable: bool,
    pub opens: AtomicUsize,
    pub property_reads: AtomicUsize,
    pub bulk_reads: AtomicUsize,
}

#[async_trait]
impl EnvironmentClient for FakeEnvironment {
    async fn open(
        &self,
        api_url: &Url,
        organization: &str,
        project: &str,
        environment: &str,
        credentials: &Credentials,
    ) -> Result<EnvironmentHandle, ProviderError> {
        let opened = self.opens.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(InternalError::environment_unavailable(
                "401 Unauthorized",
                None,
            ));
        }

        Ok(EnvironmentHandle {
            api_url: api_url.clone(),
            organization: organization.to_string(),
            project: project.to_string(),
            environment: environment.to_string(),
            session_id: format!("session-{opened}"),
            credentials: credentials.clone(),
        })
    }

    async fn read_property(
        &self,
        handle: &EnvironmentHandle,
        key: &str,
    ) -> Result<RawValue, ProviderError> {
        self.property_reads.fetch_add(1, Ordering::SeqCst);

        let mut segments = key.split('.');
        let first = segments.next().unwrap_or_default();
        let mut value = self.properties.get(first);
        for segment in segments {
            value = match value {
                Some(RawValue::Mapping(entries)) => entries.get(segment),
                _ => None,
            };
        }

        value.cloned().ok_or_else(|| {
            InternalError::property_not_found(
                &format!("{key} in environment {}", handle.identifier()),
                None,
            )
        })
    }

    async fn read_all(
        &self,
        _handle: &EnvironmentHandle,
    ) -> Result<BTreeMap<String, RawValue>, ProviderError> {
        self.bulk_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.properties.clone())
    }
}

pub struct TestContext {
    pub secrets: Arc<FakeSecretStore>,
    pub environments: Arc<FakeEnvironment>,
    pub handler: MountHandler,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with(token_store(), environment())
    }

    pub fn with(secrets: FakeSecretStore, environments: FakeEnvironment) -> Self {
        let secrets = Arc::new(secrets);
        let environments = Arc::new(environments);
        let handler = MountHandler::new(
            CredentialResolver::new(secrets.clone()),
            environments.clone(),
            MountConfigOptions::default(),
        );

        Self {
            secrets,
            environments,
            handler,
        }
    }

    pub fn secret_store_calls(&self) -> usize {
        self.secrets.calls.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> usize {
        self.environments.opens.load(Ordering::SeqCst)
    }

    pub fn property_reads(&self) -> usize {
        self.environments.property_reads.load(Ordering::SeqCst)
    }

    pub fn bulk_reads(&self) -> usize {
        self.environments.bulk_reads.load(Ordering::SeqCst)
    }
}

pub fn token_store() -> FakeSecretStore {
    FakeSecretStore {
        data: BTreeMap::from([(ACCESS_TOKEN_KEY.to_string(), b"pul-test-token".to_vec())]),
        ..Default::default()
    }
}

pub fn environment() -> FakeEnvironment {
    FakeEnvironment {
        properties: properties(json!({
            "app": {
                "db": {"host": "db.internal", "port": 5432, "password": "hunter2"},
                "hosts": ["a.internal", "b.internal"],
                "ratio": 3.0,
                "debug": false,
                "config": "{\"level\":\"info\",\"sinks\":[\"stdout\"]}",
                "optional": null
            },
            "password": "s3cr3t",
            "user": "admin"
        })),
        ..Default::default()
    }
}

pub fn properties(value: Value) -> BTreeMap<String, RawValue> {
    match RawValue::from(value) {
        RawValue::Mapping(entries) => entries,
        _ => BTreeMap::new(),
    }
}

/// Attributes of a SecretProviderClass, with `overrides` applied. A null
/// override removes the attribute.
pub fn attributes(overrides: Value) -> String {
    let mut attributes = json!({
        "organization": "acme",
        "project": "payments",
        "environment": "prod",
        "authSecretName": "esc-token",
        "authSecretNamespace": "default",
        "secretProviderClass": "esc-secrets",
        "csi.storage.k8s.io/pod.name": "web-0",
        "csi.storage.k8s.io/pod.namespace": "default"
    });

    if let (Some(attributes), Some(overrides)) = (attributes.as_object_mut(), overrides.as_object())
    {
        for (key, value) in overrides {
            if value.is_null() {
                attributes.remove(key);
            } else {
                attributes.insert(key.clone(), value.clone());
            }
        }
    }

    attributes.to_string()
}

pub fn request(overrides: Value) -> MountRequest {
    MountRequest {
        attributes: attributes(overrides),
        secrets: "{}".to_string(),
        target_path: TARGET_PATH.to_string(),
        permission: "420".to_string(),
    }
}
