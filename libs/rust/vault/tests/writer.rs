//! Secret writer against a mock Key Vault.

use azkvbs_common::{RetryConfig, RetryPolicy};
use azkvbs_keyvault::{KeyVaultClient, KeyVaultError, MachineRole, SecretWriter, StaticToken, VaultConfig};
use base64::{Engine, engine::general_purpose::STANDARD};
use std::collections::HashSet;
use std::time::Duration;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> KeyVaultClient<StaticToken> {
    let config = VaultConfig::default().with_secret_url_template(format!(
        "{}/secrets/{{secret-name}}/{{secret-version}}",
        server.uri()
    ));
    KeyVaultClient::new("cluster-vault", config, StaticToken::new("test-token")).unwrap()
}

fn secret(plaintext: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_json(serde_json::json!({ "value": STANDARD.encode(plaintext) }))
}

async fn serve_everything(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path_regex(r"^/secrets/[a-z-]+/$"))
        .respond_with(secret("placeholder"))
        .mount(server)
        .await;
}

async fn requested_secrets(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|request| {
            request
                .url
                .path()
                .trim_start_matches("/secrets/")
                .trim_end_matches('/')
                .to_string()
        })
        .collect()
}

fn fast_retries(max_retries: u32) -> RetryPolicy {
    RetryPolicy::new(
        RetryConfig::default()
            .with_max_retries(max_retries)
            .with_initial_delay(Duration::from_millis(1))
            .without_jitter(),
    )
}

#[tokio::test]
async fn master_bootstrap_writes_decoded_ca() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/secrets/ca-crt/"))
        .respond_with(secret("hello"))
        .with_priority(1)
        .mount(&server)
        .await;
    serve_everything(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let client = client(&server);
    let report = SecretWriter::new(&client, dir.path())
        .run(MachineRole::Master)
        .await
        .unwrap();

    assert_eq!(std::fs::read(dir.path().join("ca.crt")).unwrap(), b"hello");
    assert_eq!(report.written.len(), MachineRole::Master.secrets().len());
    assert_eq!(report.written[0].bytes, 5);
    for target in MachineRole::Master.secrets() {
        assert!(dir.path().join(target.file_name).is_file());
    }
}

#[tokio::test]
async fn each_role_requests_exactly_its_table() {
    for role in MachineRole::ALL {
        let server = MockServer::start().await;
        serve_everything(&server).await;

        let dir = tempfile::tempdir().unwrap();
        let client = client(&server);
        SecretWriter::new(&client, dir.path()).run(role).await.unwrap();

        let requested: Vec<String> = requested_secrets(&server).await;
        let expected: HashSet<String> = role
            .secrets()
            .iter()
            .map(|t| t.secret_name.to_string())
            .collect();
        assert_eq!(requested.len(), expected.len(), "{role} fetched a secret twice");
        assert_eq!(requested.into_iter().collect::<HashSet<_>>(), expected);
    }
}

#[tokio::test]
async fn not_found_aborts_before_later_secrets() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/secrets/apiserver-crt/"))
        .respond_with(ResponseTemplate::new(404))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    serve_everything(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let client = client(&server);
    let err = SecretWriter::new(&client, dir.path())
        .with_retry_policy(fast_retries(3))
        .run(MachineRole::Master)
        .await
        .unwrap_err();

    assert!(matches!(err, KeyVaultError::Remote { status, .. } if status.as_u16() == 404));
    assert_eq!(requested_secrets(&server).await, ["ca-crt", "apiserver-crt"]);
    assert!(dir.path().join("ca.crt").is_file());
    assert!(!dir.path().join("apiserver.crt").exists());
    assert!(!dir.path().join("apiserver.key").exists());
}

#[tokio::test]
async fn transient_failure_fails_fast_without_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/secrets/minion-proxy-kubeconfig/"))
        .respond_with(ResponseTemplate::new(503))
        .with_priority(1)
        .up_to_n_times(1)
        .mount(&server)
        .await;
    serve_everything(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let client = client(&server);
    let err = SecretWriter::new(&client, dir.path())
        .run(MachineRole::Minion)
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(requested_secrets(&server).await, ["minion-proxy-kubeconfig"]);
}

#[tokio::test]
async fn transient_failure_recovers_with_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/secrets/minion-proxy-kubeconfig/"))
        .respond_with(ResponseTemplate::new(503))
        .with_priority(1)
        .up_to_n_times(1)
        .mount(&server)
        .await;
    serve_everything(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let client = client(&server);
    let report = SecretWriter::new(&client, dir.path())
        .with_retry_policy(fast_retries(2))
        .run(MachineRole::Minion)
        .await
        .unwrap();

    assert_eq!(report.written.len(), 2);
    assert_eq!(
        requested_secrets(&server).await,
        [
            "minion-proxy-kubeconfig",
            "minion-proxy-kubeconfig",
            "minion-kubelet-kubeconfig"
        ]
    );
}
