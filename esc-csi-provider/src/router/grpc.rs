use crate::logic::mount::MountHandler;
use esc_csi_domain::{MountOutcome, MountRequest};
use std::sync::Arc;
use tonic::{Request, Response, Status};
use tracing::error;

pub mod v1alpha1 {
    tonic::include_proto!("v1alpha1");
}

use v1alpha1::csi_driver_provider_server::{CsiDriverProvider, CsiDriverProviderServer};

/// Version of the driver to provider API served here.
pub const API_VERSION: &str = "v1alpha1";
pub const RUNTIME_NAME: &str = "secrets-store-csi-driver-provider-pulumi-esc";

pub struct CsiProviderService {
    handler: Arc<MountHandler>,
}

impl CsiProviderService {
    pub fn new(handler: Arc<MountHandler>) -> Self {
        Self { handler }
    }

    pub fn into_server(self) -> CsiDriverProviderServer<Self> {
        CsiDriverProviderServer::new(self)
    }
}

impl From<v1alpha1::MountRequest> for MountRequest {
    fn from(request: v1alpha1::MountRequest) -> Self {
        MountRequest {
            attributes: request.attributes,
            secrets: request.secrets,
            target_path: request.target_path,
            permission: request.permission,
        }
    }
}

impl From<MountOutcome> for v1alpha1::MountResponse {
    fn from(outcome: MountOutcome) -> Self {
        match outcome {
            MountOutcome::Mounted {
                files,
                object_versions,
            } => v1alpha1::MountResponse {
                object_version: object_versions
                    .into_iter()
                    .map(|version| v1alpha1::ObjectVersion {
                        id: version.id,
                        version: version.version,
                    })
                    .collect(),
                error: None,
                files: files
                    .into_iter()
                    .map(|file| v1alpha1::File {
                        path: file.path,
                        // Modes never exceed 0o7777.
                        mode: file.mode as i32,
                        contents: file.contents,
                    })
                    .collect(),
            },
            MountOutcome::Rejected(e) => v1alpha1::MountResponse {
                object_version: Vec::new(),
                error: Some(v1alpha1::Error {
                    code: e.as_ref().to_string(),
                }),
                files: Vec::new(),
            },
        }
    }
}

#[tonic::async_trait]
impl CsiDriverProvider for CsiProviderService {
    async fn version(
        &self,
        _request: Request<v1alpha1::VersionRequest>,
    ) -> Result<Response<v1alpha1::VersionResponse>, Status> {
        Ok(Response::new(v1alpha1::VersionResponse {
            version: API_VERSION.to_string(),
            runtime_name: RUNTIME_NAME.to_string(),
            runtime_version: env!("CARGO_PKG_VERSION").to_string(),
        }))
    }

    async fn mount(
        &self,
        request: Request<v1alpha1::MountRequest>,
    ) -> Result<Response<v1alpha1::MountResponse>, Status> {
        let request: MountRequest = request.into_inner().into();

        match self.handler.mount(&request).await {
            Ok(outcome) => Ok(Response::new(outcome.into())),
            Err(e) => {
                error!("Mount of {} failed: {e}", request.target_path);
                Err(e.into())
            }
        }
    }
}
