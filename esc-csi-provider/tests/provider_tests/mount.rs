use crate::context::{
    environment, properties, request, token_store, FakeEnvironment, FakeSecretStore, TestContext,
    TARGET_PATH,
};
use esc_csi_domain::{MountOutcome, ObjectVersion, OutputFile, RawValue};
use serde_json::{json, Value};
use std::collections::BTreeMap;

const SECRETS: &str = r#"
- fileName: db-password
  secretKey: app.db.password
- fileName: db.json
  secretKey: app.db
  format: json
- fileName: logging.yaml
  secretKey: app.config
  format: yaml
- fileName: hosts
  secretKey: app.hosts
- fileName: ratio
  secretKey: app.ratio
- fileName: debug
  secretKey: app.debug
- fileName: optional
  secretKey: app.optional
"#;

fn mounted(outcome: MountOutcome) -> (Vec<OutputFile>, Vec<ObjectVersion>) {
    match outcome {
        MountOutcome::Mounted {
            files,
            object_versions,
        } => (files, object_versions),
        MountOutcome::Rejected(e) => panic!("mount was rejected: {e}"),
    }
}

fn contents(files: &[OutputFile]) -> BTreeMap<&str, String> {
    files
        .iter()
        .map(|file| {
            (
                file.path.as_str(),
                String::from_utf8(file.contents.clone()).expect("utf-8 contents"),
            )
        })
        .collect()
}

#[tokio::test]
async fn test_mount_secrets() {
    let context = TestContext::new();

    let outcome = context
        .handler
        .mount(&request(json!({ "secrets": SECRETS })))
        .await
        .expect("mount should succeed");
    let (files, versions) = mounted(outcome);

    assert_eq!(files.len(), 7);
    assert!(files.iter().all(|file| file.mode == 0o644));

    let contents = contents(&files);
    assert_eq!(contents["db-password"], "hunter2");
    assert_eq!(contents["hosts"], "a.internal\nb.internal");
    assert_eq!(contents["ratio"], "3");
    assert_eq!(contents["debug"], "false");
    assert_eq!(contents["optional"], "");
    assert_eq!(contents["logging.yaml"], "level: info\nsinks:\n- stdout\n");

    let db: Value = serde_json::from_str(&contents["db.json"]).expect("pretty json");
    assert_eq!(
        db,
        json!({"host": "db.internal", "port": 5432, "password": "hunter2"})
    );
    assert!(contents["db.json"].starts_with("{\n  \""));

    assert_eq!(versions.len(), files.len());
    for (file, version) in files.iter().zip(&versions) {
        assert_eq!(file.path, version.id);
    }
    assert_eq!(
        versions[0].version,
        format!("acme/payments/prod-{TARGET_PATH}-app.db.password")
    );

    assert_eq!(context.secret_store_calls(), 1);
    assert_eq!(context.opens(), 1);
    assert_eq!(context.property_reads(), 7);
    assert_eq!(context.bulk_reads(), 0);
}

#[tokio::test]
async fn test_mount_objects() {
    let context = TestContext::new();

    let outcome = context
        .handler
        .mount(&request(json!({
            "objects": "- objectName: password\n  objectAlias: db-password\n- objectName: user\n"
        })))
        .await
        .expect("mount should succeed");
    let (files, versions) = mounted(outcome);

    let contents = contents(&files);
    assert_eq!(contents.len(), 2);
    assert_eq!(contents["db-password"], "s3cr3t");
    assert_eq!(contents["user"], "admin");

    assert_eq!(versions[0].id, "db-password");
    assert_eq!(
        versions[0].version,
        format!("acme/payments/prod-{TARGET_PATH}-password")
    );

    assert_eq!(context.bulk_reads(), 1);
    assert_eq!(context.property_reads(), 0);
}

#[tokio::test]
async fn test_non_string_objects_are_coerced() {
    let mut environment = environment();
    environment.properties.extend(properties(json!({
        "ports": [80, 443],
        "limits": {"memory": "1Gi", "cpu": 2},
        "replicas": 3,
        "zones": ["eu-west-1a", "eu-west-1b"]
    })));
    let context = TestContext::with(token_store(), environment);

    let outcome = context
        .handler
        .mount(&request(json!({
            "objects": "- objectName: ports\n- objectName: limits\n- objectName: replicas\n- objectName: zones\n"
        })))
        .await
        .expect("mount should succeed");
    let (files, _) = mounted(outcome);

    let contents = contents(&files);
    assert_eq!(contents["ports"], "[80,443]");
    assert_eq!(contents["limits"], r#"{"cpu":2,"memory":"1Gi"}"#);
    assert_eq!(contents["replicas"], "3");
    assert_eq!(contents["zones"], "eu-west-1a\neu-west-1b");
    assert_eq!(context.bulk_reads(), 1);
}

#[tokio::test]
async fn test_concurrent_mounts_are_independent() {
    let context = TestContext::new();
    let succeeding = request(json!({ "secrets": SECRETS }));
    let failing = request(json!({
        "secrets": "- fileName: token\n  secretKey: app.missing\n"
    }));
    let rejected = request(json!({ "secrets": SECRETS, "organization": null }));

    let (succeeded, failed, rejected) = tokio::join!(
        context.handler.mount(&succeeding),
        context.handler.mount(&failing),
        context.handler.mount(&rejected),
    );

    let (files, versions) = mounted(succeeded.expect("mount should succeed"));
    assert_eq!(files.len(), 7);
    assert_eq!(versions.len(), 7);
    assert_eq!(contents(&files)["db-password"], "hunter2");

    let err = failed.expect_err("missing property must fail the call");
    assert_eq!(err.as_ref(), "PropertyNotFound");

    let rejected = rejected.expect("rejection is not a call failure");
    assert_eq!(rejected.code(), Some("InvalidSecretProviderClass"));

    assert_eq!(context.opens(), 2);
    assert_eq!(context.secret_store_calls(), 2);
}

#[tokio::test]
async fn test_versions_are_stable_across_mounts() {
    let context = TestContext::new();
    let request = request(json!({ "secrets": SECRETS }));

    let (_, first) = mounted(context.handler.mount(&request).await.expect("first mount"));
    let (_, second) = mounted(context.handler.mount(&request).await.expect("second mount"));

    assert_eq!(context.opens(), 2);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_empty_objects_mount_nothing() {
    let context = TestContext::new();

    let outcome = context
        .handler
        .mount(&request(json!({ "objects": "" })))
        .await
        .expect("mount should succeed");
    let (files, versions) = mounted(outcome);

    assert!(files.is_empty());
    assert_eq!(
        versions,
        vec![ObjectVersion {
            id: "NO_SECRETS".to_string(),
            version: "0".to_string(),
        }]
    );
    assert_eq!(context.secret_store_calls(), 0);
    assert_eq!(context.opens(), 0);
}

#[tokio::test]
async fn test_missing_field_is_rejected_before_any_call() {
    for field in [
        "organization",
        "project",
        "environment",
        "authSecretName",
        "authSecretNamespace",
    ] {
        let context = TestContext::new();

        let outcome = context
            .handler
            .mount(&request(json!({ "secrets": SECRETS, field: null })))
            .await
            .expect("rejection is not a call failure");

        assert_eq!(outcome.code(), Some("InvalidSecretProviderClass"));
        let MountOutcome::Rejected(e) = outcome else {
            panic!("expected a rejection");
        };
        assert!(e.to_string().contains(&format!("{field} is required")));

        assert_eq!(context.secret_store_calls(), 0);
        assert_eq!(context.opens(), 0);
    }
}

#[tokio::test]
async fn test_invalid_permission_is_rejected() {
    let context = TestContext::new();
    let mut request = request(json!({ "secrets": SECRETS }));
    request.permission = "\"rw-r--r--\"".to_string();

    let outcome = context.handler.mount(&request).await.expect("rejection");

    assert_eq!(outcome.code(), Some("InvalidSecretProviderClass"));
    assert_eq!(context.secret_store_calls(), 0);
}

#[tokio::test]
async fn test_malformed_node_publish_secrets_are_rejected() {
    let context = TestContext::new();
    let mut request = request(json!({ "secrets": SECRETS }));
    request.secrets = "[1, 2]".to_string();

    let outcome = context.handler.mount(&request).await.expect("rejection");

    assert_eq!(outcome.code(), Some("InvalidSecretProviderClass"));
}

#[tokio::test]
async fn test_missing_access_token_is_a_bad_request() {
    let context = TestContext::with(FakeSecretStore::default(), environment());

    let outcome = context
        .handler
        .mount(&request(json!({ "secrets": SECRETS })))
        .await
        .expect("rejection is not a call failure");

    assert_eq!(outcome.code(), Some("BadRequest"));
    assert_eq!(context.secret_store_calls(), 1);
    assert_eq!(context.opens(), 0);
}

#[tokio::test]
async fn test_unavailable_environment_fails_the_call() {
    let context = TestContext::with(
        token_store(),
        FakeEnvironment {
            unavailable: true,
            ..environment()
        },
    );

    let err = context
        .handler
        .mount(&request(json!({ "secrets": SECRETS })))
        .await
        .expect_err("open failure must fail the call");

    assert_eq!(err.as_ref(), "EnvironmentUnavailable");
    assert_eq!(context.property_reads(), 0);
}

#[tokio::test]
async fn test_missing_property_fails_the_call() {
    let context = TestContext::new();

    let err = context
        .handler
        .mount(&request(json!({
            "secrets": "- fileName: a\n  secretKey: app.db.password\n- fileName: b\n  secretKey: app.missing\n"
        })))
        .await
        .expect_err("missing property must fail the call");

    assert_eq!(err.as_ref(), "PropertyNotFound");
}

#[tokio::test]
async fn test_missing_object_fails_the_call() {
    let context = TestContext::new();

    let err = context
        .handler
        .mount(&request(json!({ "objects": "- objectName: token\n" })))
        .await
        .expect_err("missing object must fail the call");

    assert_eq!(err.as_ref(), "PropertyNotFound");
}

#[tokio::test]
async fn test_unsupported_value_fails_without_files() {
    let mut environment = environment();
    environment
        .properties
        .insert("pending".to_string(), RawValue::unsupported("unknown"));
    let context = TestContext::with(token_store(), environment);

    let err = context
        .handler
        .mount(&request(json!({
            "secrets": "- fileName: password\n  secretKey: password\n- fileName: pending\n  secretKey: pending\n"
        })))
        .await
        .expect_err("unsupported value must fail the call");

    assert_eq!(err.as_ref(), "UnsupportedValueType");
    assert_eq!(err.to_string(), "unsupported value type: unknown");
}
