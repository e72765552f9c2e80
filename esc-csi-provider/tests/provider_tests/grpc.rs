use crate::context::{attributes, TestContext, TARGET_PATH};
use esc_csi_provider::router::grpc::{
    v1alpha1::{
        csi_driver_provider_server::CsiDriverProvider, MountRequest, ObjectVersion,
        VersionRequest,
    },
    CsiProviderService, API_VERSION, RUNTIME_NAME,
};
use serde_json::json;
use std::sync::Arc;
use tonic::{Code, Request};

fn service(context: TestContext) -> CsiProviderService {
    CsiProviderService::new(Arc::new(context.handler))
}

fn mount_request(attributes: String) -> MountRequest {
    MountRequest {
        attributes,
        secrets: String::new(),
        target_path: TARGET_PATH.to_string(),
        permission: "256".to_string(),
        current_object_version: Vec::new(),
    }
}

#[tokio::test]
async fn test_version() {
    let response = service(TestContext::new())
        .version(Request::new(VersionRequest {
            version: "v1alpha1".to_string(),
        }))
        .await
        .expect("version should answer")
        .into_inner();

    assert_eq!(response.version, API_VERSION);
    assert_eq!(response.runtime_name, RUNTIME_NAME);
    assert_eq!(response.runtime_version, env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_mount_response() {
    let response = service(TestContext::new())
        .mount(Request::new(mount_request(attributes(json!({
            "secrets": "- fileName: password\n  secretKey: password\n"
        })))))
        .await
        .expect("mount should succeed")
        .into_inner();

    assert!(response.error.is_none());
    assert_eq!(response.files.len(), 1);
    assert_eq!(response.files[0].path, "password");
    assert_eq!(response.files[0].mode, 0o400);
    assert_eq!(response.files[0].contents, b"s3cr3t".to_vec());
    assert_eq!(
        response.object_version,
        vec![ObjectVersion {
            id: "password".to_string(),
            version: format!("acme/payments/prod-{TARGET_PATH}-password"),
        }]
    );
}

#[tokio::test]
async fn test_rejected_mount_carries_error_code() {
    let response = service(TestContext::new())
        .mount(Request::new(mount_request(attributes(json!({
            "secrets": "- fileName: password\n  secretKey: password\n",
            "region": "eu-west-1"
        })))))
        .await
        .expect("rejection is answered")
        .into_inner();

    assert!(response.files.is_empty());
    assert!(response.object_version.is_empty());
    assert_eq!(
        response.error.map(|e| e.code).as_deref(),
        Some("InvalidSecretProviderClass")
    );
}

#[tokio::test]
async fn test_failed_mount_is_a_status() {
    let status = service(TestContext::new())
        .mount(Request::new(mount_request(attributes(json!({
            "secrets": "- fileName: token\n  secretKey: app.token\n"
        })))))
        .await
        .expect_err("missing property must fail the call");

    assert_eq!(status.code(), Code::NotFound);
    assert!(status.message().contains("app.token"));
}
